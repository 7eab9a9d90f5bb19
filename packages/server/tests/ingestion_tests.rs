//! Ingestion outcomes: what is written, and what the worker is told,
//! before any background work runs.

mod common;

use common::*;
use fieldlens_core::domains::jobs::activities::{ingest_inbound_photo, InboundPhoto, IngestOutcome};
use fieldlens_core::domains::jobs::{JobStatus, PhotoStatus, PhotoType, SectorStatus};
use fieldlens_core::kernel::test_dependencies::MockValidationPipeline;
use fieldlens_core::kernel::{JobStore, MemoryBlobStore};

async fn ingest(harness: &TestHarness, inbound: InboundPhoto) -> IngestOutcome {
    ingest_inbound_photo(inbound, &harness.deps)
        .await
        .expect("ingest")
}

#[tokio::test]
async fn unknown_sender_has_no_active_job() {
    let harness = TestHarness::new();

    let outcome = ingest(&harness, photo_message()).await;

    assert_eq!(outcome, IngestOutcome::NoActiveJob);
    assert!(harness.mocks.media.calls().is_empty());
    assert!(outcome
        .reply(&harness.deps.messages)
        .text
        .contains("No active job"));
}

#[tokio::test]
async fn done_job_is_not_active() {
    let harness = TestHarness::new();
    let job = seed_job(&harness.deps, vec![sector_with(1, &[PhotoType::labelling()])]).await;
    harness
        .deps
        .store
        .set_job_status(job.id, JobStatus::Done)
        .await
        .unwrap();

    assert_eq!(ingest(&harness, photo_message()).await, IngestOutcome::NoActiveJob);
}

#[tokio::test]
async fn first_message_moves_pending_job_in_progress() {
    let harness = TestHarness::new();
    let job = seed_job(&harness.deps, vec![sector_with(1, &[PhotoType::labelling()])]).await;
    assert_eq!(job.status, JobStatus::Pending);

    let outcome = ingest(&harness, text_message()).await;

    assert_eq!(
        outcome,
        IngestOutcome::AwaitingMedia {
            expected: Some(PhotoType::labelling())
        }
    );
    assert_eq!(harness.job(job.id).await.status, JobStatus::InProgress);
    assert!(harness.photos(job.id).await.is_empty());
}

#[tokio::test]
async fn non_image_media_is_refused() {
    let harness = TestHarness::new();
    let job = seed_job(&harness.deps, vec![sector_with(1, &[PhotoType::labelling()])]).await;

    let outcome = ingest(
        &harness,
        InboundPhoto {
            content_type: Some("video/mp4".to_string()),
            ..photo_message()
        },
    )
    .await;

    assert!(matches!(outcome, IngestOutcome::UnsupportedMedia { .. }));
    assert!(harness.mocks.media.calls().is_empty());
    assert!(harness.photos(job.id).await.is_empty());
}

#[tokio::test]
async fn download_failure_writes_nothing() {
    let harness = TestHarness::new();
    let job = seed_job(&harness.deps, vec![sector_with(1, &[PhotoType::labelling()])]).await;

    let outcome = ingest(
        &harness,
        InboundPhoto {
            media_url: Some("https://api.twilio.com/missing".to_string()),
            ..photo_message()
        },
    )
    .await;

    assert!(matches!(outcome, IngestOutcome::FetchFailed { .. }));
    assert!(harness.photos(job.id).await.is_empty());
    assert!(harness.mocks.blobs.keys().await.is_empty());
}

#[tokio::test]
async fn blob_failure_skips_placeholder_and_background_work() {
    let harness = TestHarness::with(default_mocks().blob_store(MemoryBlobStore::failing()));
    let job = seed_job(&harness.deps, vec![sector_with(1, &[PhotoType::labelling()])]).await;

    let outcome = ingest(&harness, photo_message()).await;
    harness.settle().await;

    assert_eq!(outcome, IngestOutcome::SaveFailed);
    assert!(harness.photos(job.id).await.is_empty());
    assert_eq!(harness.mocks.pipeline.call_count(), 0);
    assert!(outcome
        .reply(&harness.deps.messages)
        .text
        .contains("Could not save"));
}

#[tokio::test]
async fn accepted_photo_is_stored_as_processing_placeholder() {
    let harness = TestHarness::with_pipeline(
        MockValidationPipeline::new().with_delay(std::time::Duration::from_millis(50)),
    );
    let job = seed_job(
        &harness.deps,
        vec![sector_with(3, &[PhotoType::labelling(), PhotoType::azimuth()])],
    )
    .await;

    let outcome = ingest(&harness, photo_message()).await;
    let IngestOutcome::Accepted {
        job_id,
        photo_id,
        sector,
        type_hint,
    } = outcome.clone()
    else {
        panic!("expected Accepted, got {:?}", outcome);
    };
    assert_eq!(job_id, job.id);
    assert_eq!(sector, 3);
    assert_eq!(type_hint, PhotoType::labelling());

    // Still processing: the reply did not wait for validation.
    let photos = harness.photos(job.id).await;
    assert_eq!(photos.len(), 1);
    assert_eq!(photos[0].id, photo_id);
    assert_eq!(photos[0].status, PhotoStatus::Processing);
    assert!(photos[0].phash.is_none());
    assert!(photos[0]
        .s3_key
        .starts_with(&format!("jobs/{}/raw/", job.id)));
    assert!(photos[0].s3_key.ends_with("-sec3_labelling.jpg"));
    assert_eq!(harness.mocks.blobs.keys().await, vec![photos[0].s3_key.clone()]);

    harness.settle().await;
    let photos = harness.photos(job.id).await;
    assert_eq!(photos[0].status, PhotoStatus::Pass);
}

#[tokio::test]
async fn exhausted_job_is_closed_on_next_message() {
    let harness = TestHarness::new();
    let mut sector = sector_with(1, &[PhotoType::labelling()]);
    // Cursor ran off the end but the flags were never written.
    sector.current_index = 1;
    sector.status = SectorStatus::InProgress;
    let job = seed_job(&harness.deps, vec![sector]).await;

    let outcome = ingest(&harness, photo_message()).await;

    assert_eq!(outcome, IngestOutcome::JobComplete { job_id: job.id });
    assert_eq!(harness.job(job.id).await.status, JobStatus::Done);
    assert!(harness.mocks.media.calls().is_empty());
}

#[tokio::test]
async fn job_without_sectors_is_never_marked_done() {
    let harness = TestHarness::new();
    let job = seed_empty_job(&harness.deps).await;

    let outcome = ingest(&harness, photo_message()).await;

    assert_eq!(outcome, IngestOutcome::NoSectors { job_id: job.id });
    assert_ne!(harness.job(job.id).await.status, JobStatus::Done);
}

#[tokio::test]
async fn sender_address_formats_resolve_to_same_worker() {
    let harness = TestHarness::new();
    seed_job(&harness.deps, vec![sector_with(1, &[PhotoType::labelling()])]).await;

    for sender in ["whatsapp:+9999", "+9999", "9999"] {
        let outcome = ingest(
            &harness,
            InboundPhoto {
                sender: sender.to_string(),
                ..text_message()
            },
        )
        .await;
        assert!(matches!(outcome, IngestOutcome::AwaitingMedia { .. }), "{}", sender);
    }
}
