use serde::Deserialize;

/// Subset of the Message resource returned by the Messages API.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageResource {
    pub sid: String,
    pub status: Option<String>,
    pub to: Option<String>,
    pub from: Option<String>,
    pub error_code: Option<i64>,
    pub error_message: Option<String>,
}
