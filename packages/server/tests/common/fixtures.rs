//! Test fixtures for creating test data.
//!
//! Jobs are inserted straight into the store so tests can start from any
//! sector layout.

use fieldlens_core::domains::jobs::activities::InboundPhoto;
use fieldlens_core::domains::jobs::{Job, PhotoType, SectorProgress};
use fieldlens_core::kernel::{JobStore, ServerDeps};
use image::{DynamicImage, ImageFormat, Luma};
use std::io::Cursor;

/// Sender address as the messaging transport reports it.
pub const WORKER_ADDRESS: &str = "whatsapp:+9999";
/// The same worker after normalization.
pub const WORKER_PHONE: &str = "9999";
pub const SITE: &str = "S1";
pub const MEDIA_URL: &str = "https://api.twilio.com/2010-04-01/Media/ME1";

/// A small, sharp checkerboard PNG.
pub fn image_bytes() -> Vec<u8> {
    let image = image::ImageBuffer::from_fn(64, 64, |x, y| {
        if ((x / 8) + (y / 8)) % 2 == 0 {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    });
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(image)
        .write_to(&mut out, ImageFormat::Png)
        .expect("encode test png");
    out.into_inner()
}

/// Inbound message carrying one image attachment.
pub fn photo_message() -> InboundPhoto {
    InboundPhoto {
        sender: WORKER_ADDRESS.to_string(),
        media_count: 1,
        media_url: Some(MEDIA_URL.to_string()),
        content_type: Some("image/jpeg".to_string()),
    }
}

/// Inbound message with text only.
pub fn text_message() -> InboundPhoto {
    InboundPhoto {
        sender: WORKER_ADDRESS.to_string(),
        ..Default::default()
    }
}

/// Sector `n` with an explicit checklist.
pub fn sector_with(n: i32, types: &[PhotoType]) -> SectorProgress {
    SectorProgress::with_types(n, types.to_vec())
}

/// Insert a `PENDING` job for the test worker at `SITE` with the given sectors.
pub async fn seed_job(deps: &ServerDeps, sectors: Vec<SectorProgress>) -> Job {
    let mut sectors = sectors.into_iter();
    let first = sectors.next().unwrap_or_else(|| SectorProgress::new(1));
    let mut job = Job::new(WORKER_PHONE, SITE, first);
    job.sectors.extend(sectors);
    deps.store.insert_job(&job).await.expect("insert job");
    job
}

/// Insert a job with no sectors at all.
pub async fn seed_empty_job(deps: &ServerDeps) -> Job {
    let mut job = Job::new(WORKER_PHONE, SITE, SectorProgress::new(1));
    job.sectors.clear();
    deps.store.insert_job(&job).await.expect("insert job");
    job
}
