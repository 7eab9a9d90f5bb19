// TestDependencies - mock implementations for testing
//
// Provides mock services that can be injected into ServerDeps for tests.

use anyhow::Result;
use async_trait::async_trait;
use image::{DynamicImage, GenericImageView};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::{
    BaseBlobStore, BaseMediaFetcher, BaseNotifier, BaseValidationPipeline, MemoryBlobStore,
    MemoryStore, ServerDeps,
};
use crate::config::{ProcessingConfig, ProcessingFailurePolicy};
use crate::domains::jobs::messages::Messages;
use crate::domains::jobs::photo_types::PhotoType;
use crate::domains::validation::{PipelineContext, Verdict, VerdictStatus};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// =============================================================================
// Mock Validation Pipeline
// =============================================================================

/// Arguments captured from a validate call
#[derive(Debug, Clone)]
pub struct ValidateCall {
    pub expected_type: Option<PhotoType>,
    pub existing_phashes: Vec<String>,
    pub dimensions: (u32, u32),
}

pub struct MockValidationPipeline {
    responses: Arc<Mutex<Vec<Result<Verdict, String>>>>,
    calls: Arc<Mutex<Vec<ValidateCall>>>,
    delay: Option<Duration>,
}

impl MockValidationPipeline {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            delay: None,
        }
    }

    /// Queue a verdict to be returned
    pub fn with_verdict(self, verdict: Verdict) -> Self {
        lock(&self.responses).push(Ok(verdict));
        self
    }

    /// Queue a `{type, status, reason}` verdict
    pub fn with_result(self, photo_type: PhotoType, status: VerdictStatus, reasons: &[&str]) -> Self {
        self.with_verdict(Verdict {
            photo_type,
            status,
            reasons: reasons.iter().map(|r| r.to_string()).collect(),
            ..Default::default()
        })
    }

    /// Queue a pipeline crash
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        lock(&self.responses).push(Err(message.into()));
        self
    }

    /// Sleep inside every call, to widen race windows in concurrency tests
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Get all calls with their arguments
    pub fn calls(&self) -> Vec<ValidateCall> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }
}

impl Default for MockValidationPipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseValidationPipeline for MockValidationPipeline {
    async fn validate(
        &self,
        image: &DynamicImage,
        context: &PipelineContext,
        existing_phashes: &[String],
    ) -> Result<Verdict> {
        // Record the call
        lock(&self.calls).push(ValidateCall {
            expected_type: context.expected_type.clone(),
            existing_phashes: existing_phashes.to_vec(),
            dimensions: image.dimensions(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let queued = {
            let mut responses = lock(&self.responses);
            if responses.is_empty() {
                None
            } else {
                Some(responses.remove(0))
            }
        };

        match queued {
            Some(Ok(verdict)) => Ok(verdict),
            Some(Err(message)) => Err(anyhow::anyhow!(message)),
            // Default: pass as whatever was expected
            None => Ok(Verdict {
                photo_type: context
                    .expected_type
                    .clone()
                    .unwrap_or_else(PhotoType::fallback),
                status: VerdictStatus::Pass,
                ..Default::default()
            }),
        }
    }
}

// =============================================================================
// Mock Notifier
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub address: String,
    pub text: String,
    pub media_url: Option<String>,
}

pub struct MockNotifier {
    sent: Arc<Mutex<Vec<SentMessage>>>,
    fail: bool,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            fail: false,
        }
    }

    /// A notifier whose sends always fail (after recording them)
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    /// Get all messages that were sent
    pub fn sent(&self) -> Vec<SentMessage> {
        lock(&self.sent).clone()
    }

    pub fn last(&self) -> Option<SentMessage> {
        lock(&self.sent).last().cloned()
    }

    /// Check if a message containing the given text was sent
    pub fn was_sent_with(&self, text: &str) -> bool {
        lock(&self.sent).iter().any(|m| m.text.contains(text))
    }
}

impl Default for MockNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseNotifier for MockNotifier {
    async fn send(&self, address: &str, text: &str, media_url: Option<&str>) -> Result<()> {
        lock(&self.sent).push(SentMessage {
            address: address.to_string(),
            text: text.to_string(),
            media_url: media_url.map(str::to_string),
        });
        if self.fail {
            anyhow::bail!("mock notifier failure");
        }
        Ok(())
    }
}

// =============================================================================
// Mock Media Fetcher
// =============================================================================

pub struct MockMediaFetcher {
    media: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockMediaFetcher {
    pub fn new() -> Self {
        Self {
            media: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Serve `bytes` for `url`; unknown URLs fail to download
    pub fn with_media(self, url: impl Into<String>, bytes: Vec<u8>) -> Self {
        lock(&self.media).insert(url.into(), bytes);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }
}

impl Default for MockMediaFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseMediaFetcher for MockMediaFetcher {
    async fn fetch(&self, media_url: &str) -> Result<Vec<u8>> {
        lock(&self.calls).push(media_url.to_string());
        lock(&self.media)
            .get(media_url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("404 for {}", media_url))
    }
}

// =============================================================================
// TestDependencies - Builder for test dependencies
// =============================================================================

#[derive(Clone)]
pub struct TestDependencies {
    pub store: Arc<MemoryStore>,
    pub blobs: Arc<MemoryBlobStore>,
    pub pipeline: Arc<MockValidationPipeline>,
    pub notifier: Arc<MockNotifier>,
    pub media: Arc<MockMediaFetcher>,
    pub messages: Messages,
    pub processing: ProcessingConfig,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            blobs: Arc::new(MemoryBlobStore::new()),
            pipeline: Arc::new(MockValidationPipeline::new()),
            notifier: Arc::new(MockNotifier::new()),
            media: Arc::new(MockMediaFetcher::new()),
            messages: Messages::default(),
            processing: ProcessingConfig::default(),
        }
    }

    /// Set a mock validation pipeline
    pub fn mock_pipeline(mut self, pipeline: MockValidationPipeline) -> Self {
        self.pipeline = Arc::new(pipeline);
        self
    }

    /// Set a mock notifier
    pub fn mock_notifier(mut self, notifier: MockNotifier) -> Self {
        self.notifier = Arc::new(notifier);
        self
    }

    /// Set a mock media fetcher
    pub fn mock_media(mut self, media: MockMediaFetcher) -> Self {
        self.media = Arc::new(media);
        self
    }

    /// Set the blob store
    pub fn blob_store(mut self, blobs: MemoryBlobStore) -> Self {
        self.blobs = Arc::new(blobs);
        self
    }

    pub fn failure_policy(mut self, policy: ProcessingFailurePolicy) -> Self {
        self.processing.failure_policy = policy;
        self
    }

    /// Convert into ServerDeps for testing
    pub fn into_deps(self) -> ServerDeps {
        let blobs: Arc<dyn BaseBlobStore> = self.blobs;
        ServerDeps::new(
            self.store,
            blobs,
            self.pipeline,
            self.notifier,
            self.media,
            self.messages,
            self.processing,
            Duration::from_secs(3600),
        )
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
