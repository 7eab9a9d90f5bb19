//! Pure sector selection. Callers persist any status change.

use crate::domains::jobs::models::{Job, SectorProgress};
use crate::domains::jobs::photo_types::PhotoType;

/// First sector, in stored order, that still has a type to collect.
///
/// A sector whose cursor reached the end is skipped even if its `DONE`
/// flag has not been written yet.
pub fn pick_active_sector(sectors: &[SectorProgress]) -> Option<i32> {
    sectors.iter().find(|s| !s.is_done()).map(|s| s.sector)
}

/// True when the job has at least one sector and every sector is done.
///
/// An empty list is not done: a job without sectors has nothing completed.
pub fn all_sectors_done(sectors: &[SectorProgress]) -> bool {
    !sectors.is_empty() && sectors.iter().all(SectorProgress::is_done)
}

/// Type currently expected for `sector`, or `None` if the sector is
/// missing or its checklist is exhausted.
pub fn expected_type_for_sector(job: &Job, sector: i32) -> Option<PhotoType> {
    job.sector(sector)?.expected_type().cloned()
}
