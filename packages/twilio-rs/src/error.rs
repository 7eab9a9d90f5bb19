use thiserror::Error;

#[derive(Debug, Error)]
pub enum TwilioError {
    #[error("request to Twilio failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Twilio returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Twilio sender number is not configured")]
    NotConfigured,

    #[error("failed to render TwiML: {0}")]
    Xml(String),
}
