//! Inbound photo ingestion for the messaging webhook.
//!
//! Does only the work needed to answer quickly: find the job and sector,
//! store the raw bytes, write a placeholder photo, and schedule validation.

use anyhow::Result;
use bytes::Bytes;
use tracing::{info, warn};

use crate::common::utils::normalize_phone;
use crate::common::{JobId, PhotoId};
use crate::domains::jobs::activities::process_photo::{
    schedule_photo_processing, ProcessPhotoRequest,
};
use crate::domains::jobs::activities::progression::photo_key;
use crate::domains::jobs::messages::{Messages, OutboundMessage};
use crate::domains::jobs::models::{JobStatus, Photo};
use crate::domains::jobs::photo_types::PhotoType;
use crate::domains::jobs::selector::{all_sectors_done, expected_type_for_sector, pick_active_sector};
use crate::kernel::ServerDeps;

/// Transport-neutral view of an inbound message.
#[derive(Debug, Clone, Default)]
pub struct InboundPhoto {
    /// Sender address as the transport reports it (e.g. `whatsapp:+91...`).
    pub sender: String,
    pub media_count: u32,
    pub media_url: Option<String>,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    NoActiveJob,
    /// Active job without any sectors yet.
    NoSectors { job_id: JobId },
    JobComplete { job_id: JobId },
    AwaitingMedia { expected: Option<PhotoType> },
    UnsupportedMedia { expected: Option<PhotoType> },
    FetchFailed { expected: Option<PhotoType> },
    SaveFailed,
    Accepted {
        job_id: JobId,
        photo_id: PhotoId,
        sector: i32,
        type_hint: PhotoType,
    },
}

impl IngestOutcome {
    /// Immediate reply to the sender.
    pub fn reply(&self, messages: &Messages) -> OutboundMessage {
        match self {
            Self::NoActiveJob | Self::NoSectors { .. } => messages.no_active_job(),
            Self::JobComplete { .. } => messages.all_sectors_complete(),
            Self::AwaitingMedia { expected } => messages.send_photo(expected.as_ref()),
            Self::UnsupportedMedia { expected } => messages.invalid_image(expected.as_ref()),
            Self::FetchFailed { expected } => messages.download_failed(expected.as_ref()),
            Self::SaveFailed => messages.save_failed(),
            Self::Accepted { .. } => messages.processing(),
        }
    }
}

fn is_image(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| ct.trim().to_ascii_lowercase().starts_with("image/"))
        .unwrap_or(false)
}

/// Route one inbound message to the worker's active job.
///
/// Store lookups propagate as errors; download and save failures become
/// outcomes with a retry prompt.
pub async fn ingest_inbound_photo(inbound: InboundPhoto, deps: &ServerDeps) -> Result<IngestOutcome> {
    let phone = normalize_phone(&inbound.sender);
    if phone.is_empty() {
        return Ok(IngestOutcome::NoActiveJob);
    }

    let Some(mut job) = deps.store.find_active_job(&phone).await? else {
        return Ok(IngestOutcome::NoActiveJob);
    };

    if job.status == JobStatus::Pending {
        deps.store.set_job_status(job.id, JobStatus::InProgress).await?;
        job.status = JobStatus::InProgress;
    }

    let Some(sector) = pick_active_sector(&job.sectors) else {
        if !all_sectors_done(&job.sectors) {
            return Ok(IngestOutcome::NoSectors { job_id: job.id });
        }
        deps.store.set_job_status(job.id, JobStatus::Done).await?;
        info!(job_id = %job.id, "No sector left to collect; job closed");
        return Ok(IngestOutcome::JobComplete { job_id: job.id });
    };
    let expected = expected_type_for_sector(&job, sector);

    if inbound.media_count == 0 {
        return Ok(IngestOutcome::AwaitingMedia { expected });
    }
    let media_url = match inbound.media_url.as_deref() {
        Some(url) if is_image(inbound.content_type.as_deref()) => url,
        _ => return Ok(IngestOutcome::UnsupportedMedia { expected }),
    };

    let bytes = match deps.media.fetch(media_url).await {
        Ok(bytes) => Bytes::from(bytes),
        Err(e) => {
            warn!(job_id = %job.id, error = %e, "Media download failed");
            return Ok(IngestOutcome::FetchFailed { expected });
        }
    };

    let type_hint = expected.clone().unwrap_or_else(PhotoType::fallback);
    let key = photo_key(job.id, sector, &type_hint);
    if let Err(e) = deps.blobs.put(&key, &bytes).await {
        warn!(job_id = %job.id, key = %key, error = %e, "Blob write failed");
        return Ok(IngestOutcome::SaveFailed);
    }

    let photo = Photo::placeholder(job.id, sector, type_hint.clone(), key);
    if let Err(e) = deps.store.insert_photo(&photo).await {
        warn!(job_id = %job.id, error = %e, "Placeholder photo insert failed");
        return Ok(IngestOutcome::SaveFailed);
    }

    info!(
        job_id = %job.id,
        photo_id = %photo.id,
        sector,
        type_hint = %type_hint,
        "Photo accepted; validating in background"
    );

    schedule_photo_processing(
        ProcessPhotoRequest {
            job_id: job.id,
            photo_id: photo.id,
            sector,
            type_hint: type_hint.clone(),
            worker_address: inbound.sender,
            image_bytes: bytes,
        },
        deps,
    );

    Ok(IngestOutcome::Accepted {
        job_id: job.id,
        photo_id: photo.id,
        sector,
        type_hint,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_image_content_types_are_accepted() {
        assert!(is_image(Some("image/jpeg")));
        assert!(is_image(Some(" IMAGE/PNG ")));
        assert!(!is_image(Some("video/mp4")));
        assert!(!is_image(None));
    }

    #[test]
    fn accepted_reply_is_the_processing_notice() {
        let messages = Messages::default();
        let outcome = IngestOutcome::Accepted {
            job_id: JobId::new(),
            photo_id: PhotoId::new(),
            sector: 1,
            type_hint: PhotoType::labelling(),
        };
        assert_eq!(outcome.reply(&messages), messages.processing());
        assert_eq!(IngestOutcome::SaveFailed.reply(&messages), messages.save_failed());
    }
}
