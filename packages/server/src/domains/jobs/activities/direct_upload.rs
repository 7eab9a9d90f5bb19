//! Synchronous upload path used by field tooling and debugging.
//!
//! Skips the messaging framing: the caller names the worker, site and
//! sector, and waits for the verdict.

use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::common::JobId;
use crate::domains::jobs::activities::create_job::worker_and_site;
use crate::domains::jobs::activities::progression::{
    advance_on_pass, decode_for_pipeline, evaluate, photo_key, record_rollup, SectorCursor,
};
use crate::domains::jobs::errors::JobError;
use crate::domains::jobs::models::{Job, JobStatus, Photo, PhotoFields, SectorProgress, SectorStatus};
use crate::domains::jobs::photo_types::PhotoType;
use crate::domains::validation::VerdictStatus;
use crate::kernel::ServerDeps;

#[derive(Debug, Clone)]
pub struct DirectUpload {
    pub worker_phone: String,
    pub site_id: String,
    pub sector: i32,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub job_id: JobId,
    pub sector: i32,
    #[serde(rename = "type")]
    pub photo_type: PhotoType,
    pub status: VerdictStatus,
    pub reason: Vec<String>,
    pub fields: PhotoFields,
}

/// Active job for (worker, site) holding `sector`, created or extended as
/// needed. The job is touched, so it leaves `PENDING`.
async fn active_job_with_sector(
    phone: String,
    site_id: String,
    sector: i32,
    deps: &ServerDeps,
) -> Result<Job, JobError> {
    let Some(job) = deps.store.find_active_job_for_site(&phone, &site_id).await? else {
        let mut first = SectorProgress::new(sector);
        first.status = SectorStatus::InProgress;
        let mut job = Job::new(phone, site_id, first);
        job.status = JobStatus::InProgress;
        deps.store.insert_job(&job).await?;
        info!(job_id = %job.id, sector, "Job created by direct upload");
        return Ok(job);
    };

    if !job.has_sector(sector) {
        let mut added = SectorProgress::new(sector);
        added.status = SectorStatus::InProgress;
        if deps.store.push_sector(job.id, &added).await? {
            info!(job_id = %job.id, sector, "Sector added by direct upload");
        } else {
            debug!(job_id = %job.id, sector, "Sector added concurrently");
        }
    }
    if job.status == JobStatus::Pending {
        deps.store.set_job_status(job.id, JobStatus::InProgress).await?;
    }

    deps.store
        .find_job(job.id)
        .await?
        .ok_or(JobError::NotFound(job.id))
}

/// Validate an uploaded photo and apply it to the sector immediately.
pub async fn direct_upload(upload: DirectUpload, deps: &ServerDeps) -> Result<UploadResult, JobError> {
    let (phone, site_id) = worker_and_site(&upload.worker_phone, &upload.site_id)?;
    let job = active_job_with_sector(phone, site_id, upload.sector, deps).await?;

    let _guard = deps.sector_locks.acquire(job.id, upload.sector).await;

    // Re-read under the lock; a background run may have advanced the sector.
    let job = deps
        .store
        .find_job(job.id)
        .await?
        .ok_or(JobError::NotFound(job.id))?;
    let cursor = SectorCursor::read(&job, upload.sector);

    let image = decode_for_pipeline(upload.bytes.clone(), deps.processing.max_image_side).await?;
    let verdict = evaluate(job.id, &cursor, &image, deps).await?;

    record_rollup(job.id, &verdict, deps).await?;

    let key = photo_key(job.id, upload.sector, &verdict.photo_type);
    deps.blobs.put(&key, &upload.bytes).await.map_err(|e| {
        warn!(job_id = %job.id, key = %key, error = %e, "Blob write failed");
        JobError::SaveFailed(e)
    })?;
    let photo = Photo::resolved(job.id, upload.sector, key, &verdict);
    deps.store
        .insert_photo(&photo)
        .await
        .map_err(JobError::SaveFailed)?;

    let progression = advance_on_pass(job.id, &cursor, &verdict, deps).await?;

    info!(
        job_id = %job.id,
        photo_id = %photo.id,
        sector = upload.sector,
        photo_type = %verdict.photo_type,
        status = ?verdict.status,
        advanced = progression.advanced,
        "Direct upload processed"
    );

    let reason = verdict.stored_reasons();
    Ok(UploadResult {
        job_id: job.id,
        sector: upload.sector,
        photo_type: verdict.photo_type,
        status: verdict.status,
        reason,
        fields: verdict.fields,
    })
}
