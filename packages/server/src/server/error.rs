//! HTTP mapping for domain errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{debug, error};

use crate::domains::jobs::JobError;

impl JobError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::DecodeFailed(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::SectorExists { .. } | Self::JobClosed(_) | Self::Conflict { .. } => {
                StatusCode::CONFLICT
            }
            Self::PipelineFailed(_) | Self::SaveFailed(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for JobError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %format!("{:#}", self), "Request failed");
        } else {
            debug!(error = %self, "Request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
