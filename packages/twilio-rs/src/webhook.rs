//! Inbound messaging webhook payload (form-encoded).

use serde::{Deserialize, Deserializer};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundMessage {
    #[serde(rename = "From", default)]
    pub from: Option<String>,
    #[serde(rename = "WaId", default)]
    pub wa_id: Option<String>,
    #[serde(rename = "Body", default)]
    pub body: Option<String>,
    #[serde(rename = "NumMedia", default, deserialize_with = "lenient_count")]
    pub num_media: u32,
    #[serde(rename = "MediaUrl0", default)]
    pub media_url0: Option<String>,
    #[serde(rename = "MediaContentType0", default)]
    pub media_content_type0: Option<String>,
}

/// First attachment of an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMedia {
    pub url: String,
    pub content_type: String,
}

impl InboundMessage {
    /// Sender address, preferring `From` over the bare WhatsApp id.
    pub fn sender(&self) -> &str {
        self.from
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.wa_id.as_deref())
            .unwrap_or("")
    }

    /// Only the first attachment is honored; any others are ignored.
    pub fn first_media(&self) -> Option<InboundMedia> {
        if self.num_media == 0 {
            return None;
        }
        Some(InboundMedia {
            url: self.media_url0.clone().unwrap_or_default(),
            content_type: self.media_content_type0.clone().unwrap_or_default(),
        })
    }
}

fn lenient_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.trim().parse().ok()).unwrap_or(0))
}
