use std::io::Cursor;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat};
use serde::Serialize;

use crate::domains::validation::{PipelineContext, Verdict};
use crate::kernel::BaseValidationPipeline;

/// Client for an external image-analysis service (OCR, classification,
/// quality checks) exposing `POST /validate`.
pub struct RemoteValidationPipeline {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidateRequest<'a> {
    expected_type: Option<&'a str>,
    existing_phashes: &'a [String],
    image_base64: String,
}

impl RemoteValidationPipeline {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/validate", self.base_url)
    }
}

fn encode_jpeg_base64(image: &DynamicImage) -> Result<String> {
    let mut buf = Cursor::new(Vec::new());
    // JPEG has no alpha channel
    DynamicImage::ImageRgb8(image.to_rgb8())
        .write_to(&mut buf, ImageFormat::Jpeg)
        .context("Failed to encode image as JPEG")?;
    Ok(STANDARD.encode(buf.into_inner()))
}

#[async_trait]
impl BaseValidationPipeline for RemoteValidationPipeline {
    async fn validate(
        &self,
        image: &DynamicImage,
        context: &PipelineContext,
        existing_phashes: &[String],
    ) -> Result<Verdict> {
        let image = image.clone();
        let image_base64 = tokio::task::spawn_blocking(move || encode_jpeg_base64(&image))
            .await
            .context("JPEG encoding task panicked")??;

        let request = ValidateRequest {
            expected_type: context.expected_type.as_ref().map(|t| t.as_str()),
            existing_phashes,
            image_base64,
        };

        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await
            .context("Failed to send validation request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Analysis service error {}: {}", status, body);
        }

        let verdict: Verdict = response
            .json()
            .await
            .context("Failed to parse analysis service verdict")?;

        Ok(verdict.with_type_fallback(context.expected_type.as_ref()))
    }
}
