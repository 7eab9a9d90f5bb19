use serde::{Deserialize, Deserializer, Serialize};

use crate::domains::jobs::models::{PhotoChecks, PhotoFields, PhotoStatus};
use crate::domains::jobs::photo_types::PhotoType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerdictStatus {
    Pass,
    Fail,
}

impl From<VerdictStatus> for PhotoStatus {
    fn from(status: VerdictStatus) -> Self {
        match status {
            VerdictStatus::Pass => PhotoStatus::Pass,
            VerdictStatus::Fail => PhotoStatus::Fail,
        }
    }
}

/// What the pipeline is told about the photo it is looking at.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineContext {
    pub expected_type: Option<PhotoType>,
}

/// Structured result of validating one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    /// Detected type. Blank when the service sent none; see
    /// [`Verdict::with_type_fallback`].
    #[serde(rename = "type", default = "blank_type", deserialize_with = "blank_when_null")]
    pub photo_type: PhotoType,
    pub status: VerdictStatus,
    #[serde(default, rename = "reason")]
    pub reasons: Vec<String>,
    #[serde(default)]
    pub phash: Option<String>,
    #[serde(default)]
    pub fields: PhotoFields,
    #[serde(default)]
    pub checks: PhotoChecks,
    #[serde(default)]
    pub ocr_text: Option<String>,
}

fn blank_type() -> PhotoType {
    PhotoType::new("")
}

fn blank_when_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<PhotoType, D::Error> {
    Ok(Option::<PhotoType>::deserialize(deserializer)?.unwrap_or_else(blank_type))
}

impl Default for Verdict {
    fn default() -> Self {
        Self {
            photo_type: PhotoType::fallback(),
            status: VerdictStatus::Fail,
            reasons: Vec::new(),
            phash: None,
            fields: PhotoFields::default(),
            checks: PhotoChecks::default(),
            ocr_text: None,
        }
    }
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        self.status == VerdictStatus::Pass
    }

    /// Fill a blank detected type from the expected type (or the fallback),
    /// so the stored photo always carries a type token.
    pub fn with_type_fallback(mut self, expected: Option<&PhotoType>) -> Self {
        if self.photo_type.is_empty() {
            self.photo_type = expected.cloned().unwrap_or_else(PhotoType::fallback);
        }
        self
    }

    /// The exact-type pass that is allowed to advance a sector.
    pub fn advances(&self, expected: Option<&PhotoType>) -> bool {
        match expected {
            Some(expected) => self.is_pass() && &self.photo_type == expected,
            None => false,
        }
    }

    /// Reasons worth persisting: a pass carries none.
    pub fn stored_reasons(&self) -> Vec<String> {
        if self.is_pass() {
            Vec::new()
        } else {
            self.reasons.clone()
        }
    }

    /// Reasons joined for a worker-facing message.
    pub fn reason_text(&self) -> String {
        if self.reasons.is_empty() {
            "needs retake".to_string()
        } else {
            self.reasons.join("; ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pass(t: PhotoType) -> Verdict {
        Verdict {
            photo_type: t,
            status: VerdictStatus::Pass,
            ..Default::default()
        }
    }

    #[test]
    fn only_exact_type_pass_advances() {
        let labelling = PhotoType::labelling();
        assert!(pass(PhotoType::labelling()).advances(Some(&labelling)));
        assert!(!pass(PhotoType::azimuth()).advances(Some(&labelling)));
        assert!(!pass(PhotoType::labelling()).advances(None));

        let mut failed = pass(PhotoType::labelling());
        failed.status = VerdictStatus::Fail;
        assert!(!failed.advances(Some(&labelling)));
    }

    #[test]
    fn parses_service_json() {
        let json = r#"{
            "type": "labelling",
            "status": "FAIL",
            "reason": ["blurry", "duplicate"],
            "phash": "00ff00ff00ff00ff",
            "fields": {"macId": "AA:BB", "rsn": "R1"},
            "checks": {"blurScore": 12.5, "isDuplicate": true},
            "ocrText": null
        }"#;
        let v: Verdict = serde_json::from_str(json).unwrap();
        assert_eq!(v.photo_type, PhotoType::labelling());
        assert_eq!(v.status, VerdictStatus::Fail);
        assert_eq!(v.reason_text(), "blurry; duplicate");
        assert_eq!(v.checks.is_duplicate, Some(true));
        assert_eq!(v.fields.rsn.as_deref(), Some("R1"));
    }

    #[test]
    fn blank_type_falls_back_to_expected() {
        let v = Verdict {
            photo_type: PhotoType::new(""),
            ..Default::default()
        }
        .with_type_fallback(Some(&PhotoType::azimuth()));
        assert_eq!(v.photo_type, PhotoType::azimuth());

        let v = Verdict {
            photo_type: PhotoType::new(""),
            ..Default::default()
        }
        .with_type_fallback(None);
        assert_eq!(v.photo_type, PhotoType::labelling());
    }

    #[test]
    fn null_or_missing_type_resolves_through_fallback() {
        for json in [
            r#"{"type": null, "status": "PASS"}"#,
            r#"{"status": "PASS"}"#,
        ] {
            let v: Verdict = serde_json::from_str(json).unwrap();
            assert!(v.photo_type.is_empty());
            assert_eq!(
                v.clone().with_type_fallback(Some(&PhotoType::azimuth())).photo_type,
                PhotoType::azimuth()
            );
            assert_eq!(v.with_type_fallback(None).photo_type, PhotoType::labelling());
        }
    }

    #[test]
    fn pass_stores_no_reasons() {
        let mut v = Verdict {
            status: VerdictStatus::Pass,
            reasons: vec!["low contrast".to_string()],
            ..Default::default()
        };
        assert!(v.stored_reasons().is_empty());
        v.status = VerdictStatus::Fail;
        assert_eq!(v.stored_reasons(), vec!["low contrast".to_string()]);
    }

    #[test]
    fn empty_reasons_read_as_needs_retake() {
        assert_eq!(Verdict::default().reason_text(), "needs retake");
    }
}
