//! Application setup and router.

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Extension},
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::kernel::ServerDeps;
use crate::server::routes::{
    create_job_handler, debug_upload_handler, delete_job_handler, get_job_handler,
    health_handler, list_jobs_handler, sector_template_handler, serve_upload_handler,
    whatsapp_webhook_handler,
};

/// Upper bound for multipart uploads.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Shared application state
#[derive(Clone)]
pub struct AxumAppState {
    pub deps: Arc<ServerDeps>,
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([CONTENT_TYPE]);

    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

/// Build the Axum application router
pub fn build_app(deps: ServerDeps, allowed_origins: &[String]) -> Router {
    let app_state = AxumAppState {
        deps: Arc::new(deps),
    };

    Router::new()
        .route("/health", get(health_handler))
        // Messaging transport
        .route("/whatsapp/webhook", post(whatsapp_webhook_handler))
        // Job administration
        .route("/jobs", get(list_jobs_handler).post(create_job_handler))
        .route(
            "/jobs/templates/sector/:sector",
            get(sector_template_handler),
        )
        .route("/jobs/:id", get(get_job_handler).delete(delete_job_handler))
        // Synchronous upload path
        .route(
            "/debug/upload",
            post(debug_upload_handler).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        // Presigned blob reads
        .route("/uploads/*key", get(serve_upload_handler))
        .layer(Extension(app_state))
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
}
