//! Server dependencies for activities (using traits for testability)
//!
//! This module provides the central dependency container used by the jobs
//! domain. All external services sit behind trait objects so tests can swap
//! in mocks.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio_util::task::TaskTracker;
use tracing::info;
use twilio::TwilioService;

use crate::config::ProcessingConfig;
use crate::domains::jobs::messages::Messages;
use crate::kernel::{
    BaseBlobStore, BaseMediaFetcher, BaseNotifier, BaseValidationPipeline, DocumentStore,
    SectorLocks,
};

// =============================================================================
// TwilioService Adapter (implements BaseNotifier + BaseMediaFetcher)
// =============================================================================

/// Wrapper around TwilioService that implements the messaging traits
pub struct TwilioAdapter(pub Arc<TwilioService>);

impl TwilioAdapter {
    pub fn new(service: Arc<TwilioService>) -> Self {
        Self(service)
    }
}

#[async_trait]
impl BaseNotifier for TwilioAdapter {
    async fn send(&self, address: &str, text: &str, media_url: Option<&str>) -> Result<()> {
        let message = self
            .0
            .send_message(address, text, media_url)
            .await
            .map_err(|e| anyhow::anyhow!("{}", e))?;
        info!(sid = %message.sid, to = %address, "Notified worker");
        Ok(())
    }
}

#[async_trait]
impl BaseMediaFetcher for TwilioAdapter {
    async fn fetch(&self, media_url: &str) -> Result<Vec<u8>> {
        self.0
            .fetch_media(media_url)
            .await
            .map_err(|e| anyhow::anyhow!("{}", e))
    }
}

// =============================================================================
// Fallbacks when the transport is not configured
// =============================================================================

/// Logs outbound messages instead of sending them.
pub struct LoggingNotifier;

#[async_trait]
impl BaseNotifier for LoggingNotifier {
    async fn send(&self, address: &str, text: &str, media_url: Option<&str>) -> Result<()> {
        info!(
            to = %address,
            media_url = media_url.unwrap_or(""),
            text = %text,
            "Messaging transport not configured; outbound message skipped"
        );
        Ok(())
    }
}

/// Plain HTTP GET for media URLs that need no credentials.
pub struct HttpMediaFetcher {
    client: reqwest::Client,
}

impl HttpMediaFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl BaseMediaFetcher for HttpMediaFetcher {
    async fn fetch(&self, media_url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(media_url).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("media download returned {}", response.status());
        }
        Ok(response.bytes().await?.to_vec())
    }
}

// =============================================================================
// ServerDeps
// =============================================================================

/// Server dependencies accessible to activities
#[derive(Clone)]
pub struct ServerDeps {
    pub store: Arc<dyn DocumentStore>,
    pub blobs: Arc<dyn BaseBlobStore>,
    pub pipeline: Arc<dyn BaseValidationPipeline>,
    pub notifier: Arc<dyn BaseNotifier>,
    pub media: Arc<dyn BaseMediaFetcher>,
    pub messages: Messages,
    pub processing: ProcessingConfig,
    /// Lifetime of presigned blob URLs handed to API clients.
    pub presign_ttl: Duration,
    /// Serializes validation per (job, sector).
    pub sector_locks: SectorLocks,
    /// Background validation tasks; drained on shutdown.
    pub background: TaskTracker,
}

impl ServerDeps {
    /// Create new ServerDeps with the given dependencies
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BaseBlobStore>,
        pipeline: Arc<dyn BaseValidationPipeline>,
        notifier: Arc<dyn BaseNotifier>,
        media: Arc<dyn BaseMediaFetcher>,
        messages: Messages,
        processing: ProcessingConfig,
        presign_ttl: Duration,
    ) -> Self {
        Self {
            store,
            blobs,
            pipeline,
            notifier,
            media,
            messages,
            processing,
            presign_ttl,
            sector_locks: SectorLocks::new(),
            background: TaskTracker::new(),
        }
    }

    /// Wait for in-flight background tasks (shutdown).
    pub async fn drain_background(&self) {
        self.background.close();
        self.background.wait().await;
    }

    /// Wait for every task spawned so far, then keep accepting new ones.
    pub async fn settle_background(&self) {
        self.drain_background().await;
        self.background.reopen();
    }
}
