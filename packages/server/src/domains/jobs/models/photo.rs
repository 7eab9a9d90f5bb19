use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::common::{JobId, PhotoId};
use crate::domains::jobs::photo_types::PhotoType;
use crate::domains::validation::Verdict;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhotoStatus {
    /// Placeholder written at ingestion, not yet validated.
    Processing,
    Pass,
    Fail,
}

impl PhotoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "PROCESSING",
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Processing)
    }
}

impl fmt::Display for PhotoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhotoStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PROCESSING" => Ok(Self::Processing),
            "PASS" => Ok(Self::Pass),
            "FAIL" => Ok(Self::Fail),
            other => Err(anyhow!("unknown photo status: {}", other)),
        }
    }
}

/// Structured fields extracted from a photo.
///
/// Unknown keys returned by the analysis service are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rsn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azimuth_deg: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Quality metrics computed for a photo.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoChecks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blur_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_duplicate: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skew_deg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_label_ids: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: PhotoId,
    pub job_id: JobId,
    pub sector: i32,
    /// Expected type while processing, detected type once resolved.
    #[serde(rename = "type")]
    pub photo_type: PhotoType,
    /// Blob-store key. Access URLs are presigned from it on demand.
    pub s3_key: String,
    pub phash: Option<String>,
    pub ocr_text: Option<String>,
    pub fields: PhotoFields,
    pub checks: PhotoChecks,
    pub status: PhotoStatus,
    pub reason: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Photo {
    /// Placeholder written before background validation runs.
    pub fn placeholder(job_id: JobId, sector: i32, type_hint: PhotoType, s3_key: String) -> Self {
        Self {
            id: PhotoId::new(),
            job_id,
            sector,
            photo_type: type_hint,
            s3_key,
            phash: None,
            ocr_text: None,
            fields: PhotoFields::default(),
            checks: PhotoChecks::default(),
            status: PhotoStatus::Processing,
            reason: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Photo whose verdict is already known (synchronous upload path).
    pub fn resolved(job_id: JobId, sector: i32, s3_key: String, verdict: &Verdict) -> Self {
        let mut photo = Self::placeholder(job_id, sector, verdict.photo_type.clone(), s3_key);
        photo.apply_verdict(verdict);
        photo
    }

    pub fn apply_verdict(&mut self, verdict: &Verdict) {
        self.photo_type = verdict.photo_type.clone();
        self.phash = verdict.phash.clone();
        self.ocr_text = verdict.ocr_text.clone();
        self.fields = verdict.fields.clone();
        self.checks = verdict.checks.clone();
        self.status = verdict.status.into();
        self.reason = verdict.stored_reasons();
    }
}
