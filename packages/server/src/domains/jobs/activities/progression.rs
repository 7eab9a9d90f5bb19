//! Applying a verdict to a job: rollup, sector advance, completion.
//!
//! Shared by background processing and the synchronous upload path. Callers
//! hold the sector lock for the whole evaluate-then-advance sequence.

use bytes::Bytes;
use chrono::Utc;
use image::DynamicImage;
use tracing::{debug, info};
use uuid::Uuid;

use crate::common::JobId;
use crate::domains::jobs::errors::ProcessError;
use crate::domains::jobs::models::{Job, JobRollup, JobStatus, SectorStatus};
use crate::domains::jobs::photo_types::PhotoType;
use crate::domains::jobs::selector::{all_sectors_done, expected_type_for_sector};
use crate::domains::validation::{imaging, PipelineContext, Verdict};
use crate::kernel::{SectorAdvance, ServerDeps};

/// Sector position read before the photo is evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct SectorCursor {
    pub sector: i32,
    pub expected: Option<PhotoType>,
    pub index: usize,
}

impl SectorCursor {
    pub fn read(job: &Job, sector: i32) -> Self {
        let progress = job.sector(sector);
        Self {
            sector,
            expected: progress.and_then(|s| s.expected_type().cloned()),
            index: progress.map(|s| s.current_index).unwrap_or(0),
        }
    }
}

/// Job state after a verdict was applied.
#[derive(Debug, Clone)]
pub struct Progression {
    pub advanced: bool,
    /// Type the sector expects next; `None` once it is complete.
    pub next_expected: Option<PhotoType>,
    pub job_done: bool,
    pub job: Job,
}

/// Blob key for a raw upload.
pub fn photo_key(job_id: JobId, sector: i32, photo_type: &PhotoType) -> String {
    let uid = Uuid::new_v4().simple().to_string();
    format!(
        "jobs/{}/raw/{}-{}-sec{}_{}.jpg",
        job_id,
        Utc::now().timestamp_millis(),
        &uid[..8],
        sector,
        photo_type.as_str().to_ascii_lowercase()
    )
}

/// Decode and downscale off the async runtime.
pub async fn decode_for_pipeline(bytes: Bytes, max_side: u32) -> Result<DynamicImage, ProcessError> {
    tokio::task::spawn_blocking(move || {
        imaging::decode(&bytes).map(|image| imaging::downscale(image, max_side))
    })
    .await
    .map_err(|e| ProcessError::Decode(e.to_string()))?
    .map_err(|e| ProcessError::Decode(e.to_string()))
}

/// Run the pipeline against the duplicate reference set of exactly
/// (job, sector, expected type).
pub async fn evaluate(
    job_id: JobId,
    cursor: &SectorCursor,
    image: &DynamicImage,
    deps: &ServerDeps,
) -> Result<Verdict, ProcessError> {
    let existing_phashes = match &cursor.expected {
        Some(expected) => deps
            .store
            .prior_phashes(job_id, cursor.sector, expected)
            .await
            .map_err(ProcessError::Store)?,
        None => Vec::new(),
    };

    let context = PipelineContext {
        expected_type: cursor.expected.clone(),
    };
    let verdict = deps
        .pipeline
        .validate(image, &context, &existing_phashes)
        .await
        .map_err(ProcessError::Pipeline)?;

    Ok(verdict.with_type_fallback(cursor.expected.as_ref()))
}

/// Copy extracted identifiers onto the job. Applied for failing photos too.
pub async fn record_rollup(
    job_id: JobId,
    verdict: &Verdict,
    deps: &ServerDeps,
) -> Result<(), ProcessError> {
    if let Some(rollup) = JobRollup::from_fields(&verdict.fields) {
        deps.store
            .update_rollup(job_id, &rollup)
            .await
            .map_err(ProcessError::Store)?;
    }
    Ok(())
}

/// Advance the sector on an exact-type pass, then close out the sector and
/// the job when nothing is left to collect.
pub async fn advance_on_pass(
    job_id: JobId,
    cursor: &SectorCursor,
    verdict: &Verdict,
    deps: &ServerDeps,
) -> Result<Progression, ProcessError> {
    let mut advanced = false;

    if verdict.advances(cursor.expected.as_ref()) {
        match deps
            .store
            .advance_sector(job_id, cursor.sector, cursor.index)
            .await
            .map_err(ProcessError::Store)?
        {
            SectorAdvance::Advanced(progress) => {
                debug!(
                    job_id = %job_id,
                    sector = cursor.sector,
                    current_index = progress.current_index,
                    "Sector advanced"
                );
                advanced = true;
            }
            SectorAdvance::Conflict { current_index } => {
                return Err(ProcessError::AdvanceConflict {
                    sector: cursor.sector,
                    expected_index: cursor.index,
                    current_index,
                });
            }
            SectorAdvance::Missing => return Err(ProcessError::JobMissing(job_id)),
        }
    }

    let mut job = deps
        .store
        .find_job(job_id)
        .await
        .map_err(ProcessError::Store)?
        .ok_or(ProcessError::JobMissing(job_id))?;

    if let Some(progress) = job.sector(cursor.sector) {
        if progress.is_exhausted() && progress.status != SectorStatus::Done {
            deps.store
                .mark_sector_done(job_id, cursor.sector)
                .await
                .map_err(ProcessError::Store)?;
        }
    }

    if job.status != JobStatus::Done && all_sectors_done(&job.sectors) {
        deps.store
            .set_job_status(job_id, JobStatus::Done)
            .await
            .map_err(ProcessError::Store)?;
        job.status = JobStatus::Done;
        info!(job_id = %job_id, site_id = %job.site_id, "All sectors complete; job done");
    }

    Ok(Progression {
        advanced,
        next_expected: expected_type_for_sector(&job, cursor.sector),
        job_done: job.status == JobStatus::Done,
        job,
    })
}
