//! Reads of presigned blob URLs.

use axum::{
    extract::{Extension, Path, Query},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::server::app::AxumAppState;

#[derive(Debug, Deserialize)]
pub struct SignedQuery {
    pub expires: i64,
    pub sig: String,
}

pub async fn serve_upload_handler(
    Extension(state): Extension<AxumAppState>,
    Path(key): Path<String>,
    query: Option<Query<SignedQuery>>,
) -> Response {
    let Some(Query(signed)) = query else {
        return (StatusCode::FORBIDDEN, "missing signature").into_response();
    };

    let blobs = &state.deps.blobs;
    if !blobs.verify_presigned(&key, signed.expires, &signed.sig) {
        debug!(key = %key, "Rejected blob read with bad or expired signature");
        return (StatusCode::FORBIDDEN, "invalid or expired signature").into_response();
    }

    match blobs.get(&key).await {
        Ok(bytes) => {
            let content_type = mime_guess::from_path(&key).first_or_octet_stream();
            ([(header::CONTENT_TYPE, content_type.to_string())], bytes).into_response()
        }
        Err(e) => {
            warn!(key = %key, error = %e, "Blob read failed");
            (StatusCode::NOT_FOUND, "not found").into_response()
        }
    }
}
