use anyhow::{bail, Context, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEV_SIGNING_SECRET: &str = "dev-only-signing-secret";

/// Application configuration loaded from environment variables.
///
/// Read once at startup and injected into the components that need it.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// When absent the in-memory document store is used.
    pub database_url: Option<String>,
    pub twilio: Option<TwilioConfig>,
    pub storage: StorageConfig,
    pub processing: ProcessingConfig,
    /// Remote analysis service; the local heuristic pipeline is used when absent.
    pub analysis_service_url: Option<String>,
    pub example_image_base_url: Option<String>,
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    /// e.g. `whatsapp:+14155238886`. Outbound delivery is disabled without it.
    pub whatsapp_from: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub local_dir: PathBuf,
    pub public_base_url: String,
    pub signing_secret: String,
    pub presign_ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    /// Longest image edge handed to the validation pipeline.
    pub max_image_side: u32,
    pub blur_threshold: f64,
    pub failure_policy: ProcessingFailurePolicy,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_image_side: 1280,
            blur_threshold: 60.0,
            failure_policy: ProcessingFailurePolicy::Silent,
        }
    }
}

/// What the worker hears when background decoding or validation fails.
///
/// Either way the photo stays `PROCESSING`; the next message from the worker
/// re-prompts for the same type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingFailurePolicy {
    /// Log only.
    #[default]
    Silent,
    /// Log and ask the worker to resend.
    NotifyRetake,
}

impl FromStr for ProcessingFailurePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "silent" => Ok(Self::Silent),
            "notify" | "notify_retake" => Ok(Self::NotifyRetake),
            other => bail!("unknown processing failure policy: {}", other),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let port: u16 = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .context("PORT must be a valid number")?;

        let twilio = match (
            non_empty("TWILIO_ACCOUNT_SID"),
            non_empty("TWILIO_AUTH_TOKEN"),
        ) {
            (Some(account_sid), Some(auth_token)) => Some(TwilioConfig {
                account_sid,
                auth_token,
                whatsapp_from: non_empty("TWILIO_WHATSAPP_FROM"),
            }),
            _ => None,
        };

        let signing_secret = match non_empty("STORAGE_SIGNING_SECRET") {
            Some(secret) => secret,
            None if cfg!(debug_assertions) => DEV_SIGNING_SECRET.to_string(),
            None => bail!("STORAGE_SIGNING_SECRET must be set"),
        };

        let storage = StorageConfig {
            local_dir: PathBuf::from(
                non_empty("LOCAL_STORAGE_DIR").unwrap_or_else(|| "/tmp/_local_uploads".to_string()),
            ),
            public_base_url: non_empty("PUBLIC_BASE_URL")
                .unwrap_or_else(|| format!("http://localhost:{}", port)),
            signing_secret,
            presign_ttl: Duration::from_secs(
                parse_or("PRESIGN_TTL_SECS", 3600).context("PRESIGN_TTL_SECS must be a number")?,
            ),
        };

        let defaults = ProcessingConfig::default();
        let processing = ProcessingConfig {
            max_image_side: parse_or("MAX_IMAGE_SIDE", defaults.max_image_side)
                .context("MAX_IMAGE_SIDE must be a number")?,
            blur_threshold: parse_or("BLUR_THRESHOLD", defaults.blur_threshold)
                .context("BLUR_THRESHOLD must be a number")?,
            failure_policy: match non_empty("PROCESSING_FAILURE_POLICY") {
                Some(raw) => raw.parse()?,
                None => defaults.failure_policy,
            },
        };

        Ok(Self {
            port,
            database_url: non_empty("DATABASE_URL"),
            twilio,
            storage,
            processing,
            analysis_service_url: non_empty("ANALYSIS_SERVICE_URL"),
            example_image_base_url: non_empty("EXAMPLE_IMAGE_BASE_URL"),
            allowed_origins: non_empty("ALLOWED_ORIGINS")
                .map(|raw| {
                    raw.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        })
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match non_empty(key) {
        Some(raw) => Ok(raw.parse()?),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_policy_parses_known_values() {
        assert_eq!(
            "silent".parse::<ProcessingFailurePolicy>().unwrap(),
            ProcessingFailurePolicy::Silent
        );
        assert_eq!(
            " Notify ".parse::<ProcessingFailurePolicy>().unwrap(),
            ProcessingFailurePolicy::NotifyRetake
        );
        assert!("loud".parse::<ProcessingFailurePolicy>().is_err());
    }
}
