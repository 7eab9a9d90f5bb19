//! CPU-only validation pipeline.
//!
//! Computes the perceptual hash, duplicate and blur checks locally. It has
//! no OCR, so it cannot classify the photo: the detected type is the
//! expected type and no fields are extracted. Use the remote pipeline when
//! an analysis service is available.

use anyhow::{Context, Result};
use async_trait::async_trait;
use image::DynamicImage;
use tracing::debug;

use crate::domains::jobs::models::PhotoChecks;
use crate::domains::jobs::photo_types::PhotoType;
use crate::domains::validation::imaging;
use crate::domains::validation::{PipelineContext, Verdict, VerdictStatus};
use crate::kernel::BaseValidationPipeline;

pub const REASON_BLURRY: &str = "blurry";
pub const REASON_DUPLICATE: &str = "duplicate";

pub struct LocalValidationPipeline {
    blur_threshold: f64,
}

impl LocalValidationPipeline {
    pub fn new(blur_threshold: f64) -> Self {
        Self { blur_threshold }
    }

    /// Synchronous core; run it off the async executor.
    pub fn evaluate(
        &self,
        image: &DynamicImage,
        context: &PipelineContext,
        existing_phashes: &[String],
    ) -> Verdict {
        let phash = imaging::perceptual_hash(image);
        let is_duplicate = imaging::is_perceptual_duplicate(&phash, existing_phashes);
        let blur_score = imaging::blur_score(image);

        let mut reasons = Vec::new();
        if blur_score < self.blur_threshold {
            reasons.push(REASON_BLURRY.to_string());
        }
        if is_duplicate {
            reasons.push(REASON_DUPLICATE.to_string());
        }

        debug!(
            phash = %phash,
            blur_score,
            is_duplicate,
            references = existing_phashes.len(),
            "Local validation evaluated image"
        );

        Verdict {
            photo_type: context
                .expected_type
                .clone()
                .unwrap_or_else(PhotoType::fallback),
            status: if reasons.is_empty() {
                VerdictStatus::Pass
            } else {
                VerdictStatus::Fail
            },
            reasons,
            phash: Some(phash),
            checks: PhotoChecks {
                blur_score: Some(blur_score),
                is_duplicate: Some(is_duplicate),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

#[async_trait]
impl BaseValidationPipeline for LocalValidationPipeline {
    async fn validate(
        &self,
        image: &DynamicImage,
        context: &PipelineContext,
        existing_phashes: &[String],
    ) -> Result<Verdict> {
        let pipeline = Self::new(self.blur_threshold);
        let image = image.clone();
        let context = context.clone();
        let existing = existing_phashes.to_vec();
        tokio::task::spawn_blocking(move || pipeline.evaluate(&image, &context, &existing))
            .await
            .context("local validation task panicked")
    }
}
