//! Test harness wiring mock services into `ServerDeps`.
//!
//! Every test gets its own in-memory store, blob store and mocks, so tests
//! run in parallel without shared state.

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use fieldlens_core::common::JobId;
use fieldlens_core::domains::jobs::{Job, Photo};
use fieldlens_core::kernel::test_dependencies::{MockMediaFetcher, MockValidationPipeline};
use fieldlens_core::kernel::{JobStore, PhotoStore, ServerDeps, TestDependencies};
use fieldlens_core::server::build_app;
use http_body_util::BodyExt;
use tower::ServiceExt;

use super::fixtures::MEDIA_URL;
use super::image_bytes;

/// Mocks with a valid image served at `MEDIA_URL`.
pub fn default_mocks() -> TestDependencies {
    TestDependencies::new().mock_media(MockMediaFetcher::new().with_media(MEDIA_URL, image_bytes()))
}

pub struct TestHarness {
    /// Handles to the mocks, for assertions.
    pub mocks: TestDependencies,
    pub deps: ServerDeps,
}

impl TestHarness {
    /// Harness whose media fetcher serves a valid image at `MEDIA_URL`.
    pub fn new() -> Self {
        Self::with(default_mocks())
    }

    pub fn with_pipeline(pipeline: MockValidationPipeline) -> Self {
        Self::with(default_mocks().mock_pipeline(pipeline))
    }

    pub fn with(mocks: TestDependencies) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let deps = mocks.clone().into_deps();
        Self { mocks, deps }
    }

    pub fn app(&self) -> Router {
        build_app(self.deps.clone(), &[])
    }

    /// Send one request through the router.
    pub async fn request(&self, request: Request<Body>) -> Response<Body> {
        self.app().oneshot(request).await.expect("router is infallible")
    }

    /// Wait for every background validation spawned so far.
    pub async fn settle(&self) {
        self.deps.settle_background().await;
    }

    pub async fn job(&self, id: JobId) -> Job {
        self.deps
            .store
            .find_job(id)
            .await
            .expect("store read")
            .expect("job exists")
    }

    pub async fn photos(&self, id: JobId) -> Vec<Photo> {
        self.deps
            .store
            .photos_for_job(id, None)
            .await
            .expect("store read")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Collect a response body into bytes.
pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).expect("json body")
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).expect("utf-8 body")
}
