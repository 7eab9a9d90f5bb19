//! Photo-type tokens and the per-type catalog (labels, prompts, examples).

use serde::{Deserialize, Serialize};
use std::fmt;

pub const LABELLING: &str = "LABELLING";
pub const AZIMUTH: &str = "AZIMUTH";

/// A photo-type token such as `LABELLING` or `AZIMUTH`.
///
/// Always stored trimmed and upper-cased so comparisons between the
/// expected type and a detected type are exact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct PhotoType(String);

impl PhotoType {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_ascii_uppercase())
    }

    pub fn labelling() -> Self {
        Self(LABELLING.to_string())
    }

    pub fn azimuth() -> Self {
        Self(AZIMUTH.to_string())
    }

    /// Type assumed when nothing more specific is known.
    pub fn fallback() -> Self {
        Self::labelling()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for PhotoType {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<&str> for PhotoType {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<PhotoType> for String {
    fn from(t: PhotoType) -> Self {
        t.0
    }
}

impl fmt::Display for PhotoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for PhotoType {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

/// Ordered checklist for a sector, fixed when the sector is created.
pub fn required_types_for_sector(_sector: i32) -> Vec<PhotoType> {
    vec![PhotoType::labelling(), PhotoType::azimuth()]
}

pub fn type_label(photo_type: &PhotoType) -> String {
    match photo_type.as_str() {
        LABELLING => "Antenna labelling".to_string(),
        AZIMUTH => "Azimuth (compass)".to_string(),
        other => title_case(other),
    }
}

/// Instruction sent to the worker when this type is expected next.
pub fn type_prompt(photo_type: &PhotoType) -> String {
    match photo_type.as_str() {
        LABELLING => {
            "Send a clear photo of the antenna LABEL with the MAC ID and RSN readable.".to_string()
        }
        AZIMUTH => "Send a photo of the compass showing the sector AZIMUTH.".to_string(),
        _ => format!("Send a clear photo of the {}.", type_label(photo_type)),
    }
}

/// Reference images shown next to prompts, when a base URL is configured.
#[derive(Debug, Clone, Default)]
pub struct ExampleImages {
    base_url: Option<String>,
}

impl ExampleImages {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            base_url: base_url.map(|u| u.trim_end_matches('/').to_string()),
        }
    }

    pub fn example_url(&self, photo_type: &PhotoType) -> Option<String> {
        let base = self.base_url.as_deref()?;
        Some(format!(
            "{}/{}.jpg",
            base,
            photo_type.as_str().to_ascii_lowercase()
        ))
    }
}

fn title_case(token: &str) -> String {
    token
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let lower = w.to_ascii_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
