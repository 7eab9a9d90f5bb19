// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Sector progression lives in domains/jobs and is written against these traits.
//
// Naming convention: Base* for external services; *Store for persistence.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use image::DynamicImage;

use crate::common::{JobId, PhotoId};
use crate::domains::jobs::models::{Job, JobRollup, JobStatus, Photo, SectorProgress};
use crate::domains::jobs::photo_types::PhotoType;
use crate::domains::validation::{PipelineContext, Verdict};

// =============================================================================
// Document store (jobs + photos)
// =============================================================================

/// Result of a compare-and-increment on a sector cursor.
#[derive(Debug, Clone, PartialEq)]
pub enum SectorAdvance {
    /// Cursor moved by one; carries the sector as written.
    Advanced(SectorProgress),
    /// The stored cursor no longer matched the pre-advance index
    /// (or was already exhausted).
    Conflict { current_index: usize },
    /// No such job or sector.
    Missing,
}

/// Persistence for jobs and their embedded sectors.
///
/// Every mutation is a single filtered write; callers re-read the job after
/// writing instead of carrying local state across awaits.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn find_job(&self, id: JobId) -> Result<Option<Job>>;

    /// Job for (worker, site) in any status. An open job wins over a `DONE`
    /// one; among equals the newest wins.
    async fn find_job_for_site(&self, worker_phone: &str, site_id: &str) -> Result<Option<Job>>;

    /// Oldest `PENDING`/`IN_PROGRESS` job for the worker.
    async fn find_active_job(&self, worker_phone: &str) -> Result<Option<Job>>;

    /// Oldest `PENDING`/`IN_PROGRESS` job for (worker, site).
    async fn find_active_job_for_site(
        &self,
        worker_phone: &str,
        site_id: &str,
    ) -> Result<Option<Job>>;

    /// All jobs, newest first.
    async fn list_jobs(&self) -> Result<Vec<Job>>;

    async fn insert_job(&self, job: &Job) -> Result<()>;

    /// Append a sector. Returns `false` (and changes nothing) when the job
    /// already has that sector number or does not exist.
    async fn push_sector(&self, job_id: JobId, sector: &SectorProgress) -> Result<bool>;

    /// Set the job status. A `DONE` job never moves back; returns whether a
    /// row changed.
    async fn set_job_status(&self, job_id: JobId, status: JobStatus) -> Result<bool>;

    /// Overwrite the rollup fields that are present in `rollup`.
    async fn update_rollup(&self, job_id: JobId, rollup: &JobRollup) -> Result<()>;

    /// Increment the cursor of (job, sector) by one, only if it still equals
    /// `from_index` and is below the checklist length. The sector status is
    /// rewritten in the same write.
    async fn advance_sector(
        &self,
        job_id: JobId,
        sector: i32,
        from_index: usize,
    ) -> Result<SectorAdvance>;

    /// Set (job, sector) status to `DONE`.
    async fn mark_sector_done(&self, job_id: JobId, sector: i32) -> Result<bool>;

    async fn delete_job(&self, job_id: JobId) -> Result<bool>;
}

/// Persistence for photos.
#[async_trait]
pub trait PhotoStore: Send + Sync {
    async fn insert_photo(&self, photo: &Photo) -> Result<()>;

    async fn find_photo(&self, id: PhotoId) -> Result<Option<Photo>>;

    /// Photos of a job in insertion order, optionally for one sector.
    async fn photos_for_job(&self, job_id: JobId, sector: Option<i32>) -> Result<Vec<Photo>>;

    /// Perceptual hashes of resolved photos in exactly (job, sector, type).
    async fn prior_phashes(
        &self,
        job_id: JobId,
        sector: i32,
        photo_type: &PhotoType,
    ) -> Result<Vec<String>>;

    /// Write a verdict onto a photo that is still `PROCESSING`.
    /// Returns `false` if the photo is missing or already resolved.
    async fn resolve_photo(&self, id: PhotoId, verdict: &Verdict) -> Result<bool>;

    async fn delete_photos_for_job(&self, job_id: JobId) -> Result<u64>;
}

/// Composite store used by the activities.
#[async_trait]
pub trait DocumentStore: JobStore + PhotoStore {
    /// Short backend name for health output.
    fn backend(&self) -> &'static str;

    /// Cheap liveness probe for the health endpoint.
    async fn ping(&self) -> Result<()>;
}

// =============================================================================
// Blob store
// =============================================================================

#[async_trait]
pub trait BaseBlobStore: Send + Sync {
    /// Store bytes under `key`; returns an opaque locator.
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<String>;

    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Short-lived URL for reading `key`. Never persisted.
    fn presign(&self, key: &str, ttl: Duration) -> Result<String>;

    /// Check the `expires`/`sig` pair of a URL produced by `presign`.
    fn verify_presigned(&self, key: &str, expires: i64, signature: &str) -> bool;
}

// =============================================================================
// Validation pipeline (external image analysis)
// =============================================================================

#[async_trait]
pub trait BaseValidationPipeline: Send + Sync {
    /// Validate one decoded image. `existing_phashes` is the duplicate
    /// reference set for exactly (job, sector, expected type).
    async fn validate(
        &self,
        image: &DynamicImage,
        context: &PipelineContext,
        existing_phashes: &[String],
    ) -> Result<Verdict>;
}

// =============================================================================
// Messaging transport
// =============================================================================

#[async_trait]
pub trait BaseNotifier: Send + Sync {
    /// Deliver a text (and optional media) message to a worker address.
    async fn send(&self, address: &str, text: &str, media_url: Option<&str>) -> Result<()>;
}

#[async_trait]
pub trait BaseMediaFetcher: Send + Sync {
    /// Download an inbound media attachment.
    async fn fetch(&self, media_url: &str) -> Result<Vec<u8>>;
}
