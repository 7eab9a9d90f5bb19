//! Background validation of an ingested photo.
//!
//! Runs after the webhook has already answered. Everything here is keyed by
//! the placeholder photo id handed over at ingestion, never by a lookup.

use bytes::Bytes;
use tracing::{error, info, warn};

use crate::common::{JobId, PhotoId};
use crate::config::ProcessingFailurePolicy;
use crate::domains::jobs::activities::progression::{
    advance_on_pass, decode_for_pipeline, evaluate, record_rollup, Progression, SectorCursor,
};
use crate::domains::jobs::errors::ProcessError;
use crate::domains::jobs::messages::OutboundMessage;
use crate::domains::jobs::photo_types::PhotoType;
use crate::domains::validation::Verdict;
use crate::kernel::ServerDeps;

#[derive(Debug, Clone)]
pub struct ProcessPhotoRequest {
    pub job_id: JobId,
    pub photo_id: PhotoId,
    pub sector: i32,
    /// Type expected when the photo arrived.
    pub type_hint: PhotoType,
    /// Transport address replies go to.
    pub worker_address: String,
    pub image_bytes: Bytes,
}

#[derive(Debug, Clone)]
pub struct ProcessedPhoto {
    pub verdict: Verdict,
    pub progression: Progression,
    pub reply: OutboundMessage,
}

/// Hand a placeholder photo to the background tracker.
pub fn schedule_photo_processing(request: ProcessPhotoRequest, deps: &ServerDeps) {
    let task_deps = deps.clone();
    deps.background.spawn(async move {
        process_photo_and_notify(request, &task_deps).await;
    });
}

/// Validate one photo and apply the verdict.
///
/// Returns `Ok(None)` when the job disappeared in the meantime.
pub async fn process_photo(
    request: &ProcessPhotoRequest,
    deps: &ServerDeps,
) -> Result<Option<ProcessedPhoto>, ProcessError> {
    let _guard = deps
        .sector_locks
        .acquire(request.job_id, request.sector)
        .await;

    let Some(job) = deps
        .store
        .find_job(request.job_id)
        .await
        .map_err(ProcessError::Store)?
    else {
        info!(job_id = %request.job_id, photo_id = %request.photo_id, "Job gone before processing; skipping");
        return Ok(None);
    };

    let cursor = SectorCursor::read(&job, request.sector);
    let image =
        decode_for_pipeline(request.image_bytes.clone(), deps.processing.max_image_side).await?;
    let verdict = evaluate(request.job_id, &cursor, &image, deps).await?;

    record_rollup(request.job_id, &verdict, deps).await?;

    let resolved = deps
        .store
        .resolve_photo(request.photo_id, &verdict)
        .await
        .map_err(ProcessError::Store)?;
    if !resolved {
        return Err(ProcessError::PhotoAlreadyResolved(request.photo_id));
    }

    let progression = match advance_on_pass(request.job_id, &cursor, &verdict, deps).await {
        Ok(progression) => progression,
        Err(ProcessError::JobMissing(_)) => return Ok(None),
        Err(e) => return Err(e),
    };

    info!(
        job_id = %request.job_id,
        photo_id = %request.photo_id,
        sector = request.sector,
        photo_type = %verdict.photo_type,
        status = ?verdict.status,
        advanced = progression.advanced,
        "Photo processed"
    );

    let reply = deps.messages.verdict_reply(
        &verdict,
        cursor.expected.as_ref(),
        progression.next_expected.as_ref(),
        progression.job_done,
    );

    Ok(Some(ProcessedPhoto {
        verdict,
        progression,
        reply,
    }))
}

/// Task boundary: process, then tell the worker. Never returns an error.
pub async fn process_photo_and_notify(request: ProcessPhotoRequest, deps: &ServerDeps) {
    match process_photo(&request, deps).await {
        Ok(Some(processed)) => deliver(&request.worker_address, &processed.reply, deps).await,
        Ok(None) => {}
        Err(err) => {
            error!(
                job_id = %request.job_id,
                photo_id = %request.photo_id,
                sector = request.sector,
                error = %err,
                "Background photo processing failed"
            );
            if deps.processing.failure_policy == ProcessingFailurePolicy::NotifyRetake
                && err.warrants_retake()
            {
                let reply = deps.messages.processing_failed(Some(&request.type_hint));
                deliver(&request.worker_address, &reply, deps).await;
            }
        }
    }
}

/// Send a message, logging instead of failing.
pub async fn deliver(address: &str, message: &OutboundMessage, deps: &ServerDeps) {
    if let Err(e) = deps
        .notifier
        .send(address, &message.text, message.media_url.as_deref())
        .await
    {
        warn!(to = %address, error = %e, "Failed to notify worker");
    }
}
