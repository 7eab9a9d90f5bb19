//! In-memory document store for tests and database-less development.
//!
//! Data is lost on restart. Each trait method takes the lock once, so every
//! mutation is atomic with respect to other callers, matching the
//! single-statement guarantees of the Postgres store.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::common::{JobId, PhotoId};
use crate::domains::jobs::models::{
    Job, JobRollup, JobStatus, Photo, SectorProgress, SectorStatus,
};
use crate::domains::jobs::photo_types::PhotoType;
use crate::domains::validation::Verdict;
use crate::kernel::{DocumentStore, JobStore, PhotoStore, SectorAdvance};

#[derive(Default)]
pub struct MemoryStore {
    /// Insertion order.
    jobs: RwLock<Vec<Job>>,
    /// Insertion order.
    photos: RwLock<Vec<Photo>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn job_count(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn photo_count(&self) -> usize {
        self.photos.read().await.len()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn find_job(&self, id: JobId) -> Result<Option<Job>> {
        Ok(self.jobs.read().await.iter().find(|j| j.id == id).cloned())
    }

    async fn find_job_for_site(&self, worker_phone: &str, site_id: &str) -> Result<Option<Job>> {
        Ok(self
            .jobs
            .read()
            .await
            .iter()
            .filter(|j| j.worker_phone == worker_phone && j.site_id == site_id)
            // `max_by_key` keeps the last of equal keys, i.e. the latest insert.
            .max_by_key(|j| (j.status != JobStatus::Done, j.created_at))
            .cloned())
    }

    async fn find_active_job(&self, worker_phone: &str) -> Result<Option<Job>> {
        Ok(self
            .jobs
            .read()
            .await
            .iter()
            .find(|j| j.worker_phone == worker_phone && j.status.is_active())
            .cloned())
    }

    async fn find_active_job_for_site(
        &self,
        worker_phone: &str,
        site_id: &str,
    ) -> Result<Option<Job>> {
        Ok(self
            .jobs
            .read()
            .await
            .iter()
            .find(|j| {
                j.worker_phone == worker_phone && j.site_id == site_id && j.status.is_active()
            })
            .cloned())
    }

    async fn list_jobs(&self) -> Result<Vec<Job>> {
        let mut jobs = self.jobs.read().await.clone();
        jobs.reverse();
        // Stable sort keeps reverse insertion order for equal timestamps.
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    async fn insert_job(&self, job: &Job) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.iter().any(|j| j.id == job.id) {
            anyhow::bail!("job {} already exists", job.id);
        }
        jobs.push(job.clone());
        Ok(())
    }

    async fn push_sector(&self, job_id: JobId, sector: &SectorProgress) -> Result<bool> {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.iter_mut().find(|j| j.id == job_id) else {
            return Ok(false);
        };
        if job.has_sector(sector.sector) {
            return Ok(false);
        }
        job.sectors.push(sector.clone());
        Ok(true)
    }

    async fn set_job_status(&self, job_id: JobId, status: JobStatus) -> Result<bool> {
        let mut jobs = self.jobs.write().await;
        match jobs.iter_mut().find(|j| j.id == job_id) {
            Some(job) if job.status != JobStatus::Done => {
                job.status = status;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_rollup(&self, job_id: JobId, rollup: &JobRollup) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        if let Some(job) = jobs.iter_mut().find(|j| j.id == job_id) {
            job.apply_rollup(rollup);
        }
        Ok(())
    }

    async fn advance_sector(
        &self,
        job_id: JobId,
        sector: i32,
        from_index: usize,
    ) -> Result<SectorAdvance> {
        let mut jobs = self.jobs.write().await;
        let Some(progress) = jobs
            .iter_mut()
            .find(|j| j.id == job_id)
            .and_then(|j| j.sectors.iter_mut().find(|s| s.sector == sector))
        else {
            return Ok(SectorAdvance::Missing);
        };

        if progress.current_index != from_index || progress.is_exhausted() {
            return Ok(SectorAdvance::Conflict {
                current_index: progress.current_index,
            });
        }

        progress.current_index += 1;
        progress.status = progress.derived_status();
        Ok(SectorAdvance::Advanced(progress.clone()))
    }

    async fn mark_sector_done(&self, job_id: JobId, sector: i32) -> Result<bool> {
        let mut jobs = self.jobs.write().await;
        let Some(progress) = jobs
            .iter_mut()
            .find(|j| j.id == job_id)
            .and_then(|j| j.sectors.iter_mut().find(|s| s.sector == sector))
        else {
            return Ok(false);
        };
        progress.status = SectorStatus::Done;
        Ok(true)
    }

    async fn delete_job(&self, job_id: JobId) -> Result<bool> {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|j| j.id != job_id);
        Ok(jobs.len() != before)
    }
}

#[async_trait]
impl PhotoStore for MemoryStore {
    async fn insert_photo(&self, photo: &Photo) -> Result<()> {
        let mut photos = self.photos.write().await;
        if photos.iter().any(|p| p.id == photo.id) {
            anyhow::bail!("photo {} already exists", photo.id);
        }
        photos.push(photo.clone());
        Ok(())
    }

    async fn find_photo(&self, id: PhotoId) -> Result<Option<Photo>> {
        Ok(self.photos.read().await.iter().find(|p| p.id == id).cloned())
    }

    async fn photos_for_job(&self, job_id: JobId, sector: Option<i32>) -> Result<Vec<Photo>> {
        Ok(self
            .photos
            .read()
            .await
            .iter()
            .filter(|p| p.job_id == job_id && sector.map_or(true, |s| p.sector == s))
            .cloned()
            .collect())
    }

    async fn prior_phashes(
        &self,
        job_id: JobId,
        sector: i32,
        photo_type: &PhotoType,
    ) -> Result<Vec<String>> {
        Ok(self
            .photos
            .read()
            .await
            .iter()
            .filter(|p| {
                p.job_id == job_id
                    && p.sector == sector
                    && &p.photo_type == photo_type
                    && p.status.is_resolved()
            })
            .filter_map(|p| p.phash.clone())
            .collect())
    }

    async fn resolve_photo(&self, id: PhotoId, verdict: &Verdict) -> Result<bool> {
        let mut photos = self.photos.write().await;
        match photos.iter_mut().find(|p| p.id == id) {
            Some(photo) if !photo.status.is_resolved() => {
                photo.apply_verdict(verdict);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_photos_for_job(&self, job_id: JobId) -> Result<u64> {
        let mut photos = self.photos.write().await;
        let before = photos.len();
        photos.retain(|p| p.job_id != job_id);
        Ok((before - photos.len()) as u64)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
