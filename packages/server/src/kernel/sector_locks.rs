//! Per-(job, sector) mutual exclusion for validation runs.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::common::JobId;

type SectorKey = (JobId, i32);

/// Serializes validation and advancement for one sector.
///
/// Two photos for the same sector are evaluated one after the other, so
/// the second run always sees the cursor the first one wrote. Different
/// sectors and jobs never wait on each other.
#[derive(Clone, Default)]
pub struct SectorLocks {
    locks: Arc<DashMap<SectorKey, Arc<Mutex<()>>>>,
}

/// Held while a sector is being worked on. Dropping the last guard for a
/// sector with no waiters removes its map entry.
pub struct SectorGuard {
    guard: Option<OwnedMutexGuard<()>>,
    key: SectorKey,
    locks: Arc<DashMap<SectorKey, Arc<Mutex<()>>>>,
}

impl Drop for SectorGuard {
    fn drop(&mut self) {
        // Release first so the guard's own reference is gone before counting.
        self.guard.take();
        self.locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl SectorLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, job_id: JobId, sector: i32) -> SectorGuard {
        let key = (job_id, sector);
        // Cloned under the shard lock, so a concurrent release cannot
        // remove the entry between lookup and clone.
        let lock = self
            .locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        SectorGuard {
            guard: Some(lock.lock_owned().await),
            key,
            locks: self.locks.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
