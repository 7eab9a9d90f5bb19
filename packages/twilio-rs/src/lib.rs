// Minimal Twilio client for the WhatsApp/SMS messaging channel:
// outbound messages, inbound media download, TwiML replies.

use std::collections::HashMap;
use std::time::Duration;

pub mod error;
pub mod models;
pub mod twiml;
pub mod webhook;

use reqwest::{header, Client};

pub use crate::error::TwilioError;
use crate::models::MessageResource;

const API_BASE: &str = "https://api.twilio.com/2010-04-01";
const MEDIA_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct TwilioOptions {
    pub account_sid: String,
    pub auth_token: String,
    /// Sender address, e.g. `whatsapp:+14155238886`. Outbound messages
    /// fail with `NotConfigured` while it is empty.
    pub from_number: String,
}

#[derive(Debug, Clone)]
pub struct TwilioService {
    options: TwilioOptions,
    client: Client,
}

impl TwilioService {
    pub fn new(options: TwilioOptions) -> Self {
        let client = Client::builder()
            .timeout(MEDIA_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { options, client }
    }

    pub fn from_number(&self) -> &str {
        &self.options.from_number
    }

    /// Address a recipient on the same channel as the configured sender.
    ///
    /// A WhatsApp sender can only reach `whatsapp:` recipients, so bare
    /// numbers get the prefix.
    pub fn channel_address(&self, recipient: &str) -> String {
        if self.options.from_number.starts_with("whatsapp:") && !recipient.starts_with("whatsapp:")
        {
            format!("whatsapp:{}", recipient)
        } else {
            recipient.to_string()
        }
    }

    /// Send a message through the Messages API.
    ///
    /// `media_url` is attached only when it is an absolute http(s) URL.
    pub async fn send_message(
        &self,
        recipient: &str,
        body: &str,
        media_url: Option<&str>,
    ) -> Result<MessageResource, TwilioError> {
        if self.options.from_number.is_empty() {
            return Err(TwilioError::NotConfigured);
        }

        let url = format!(
            "{base}/Accounts/{sid}/Messages.json",
            base = API_BASE,
            sid = self.options.account_sid
        );

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/x-www-form-urlencoded"),
        );

        let to = self.channel_address(recipient);
        let mut form_body: HashMap<&str, &str> = HashMap::new();
        form_body.insert("From", &self.options.from_number);
        form_body.insert("To", &to);
        form_body.insert("Body", body);
        if let Some(media) = media_url.filter(|m| twiml::is_http_url(m)) {
            form_body.insert("MediaUrl", media);
        }

        let response = self
            .client
            .post(url)
            .basic_auth(&self.options.account_sid, Some(&self.options.auth_token))
            .headers(headers)
            .form(&form_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "Twilio rejected outbound message");
            return Err(TwilioError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<MessageResource>().await?)
    }

    /// Download an inbound media attachment.
    ///
    /// Twilio media URLs require the account credentials and usually
    /// redirect to a CDN location.
    pub async fn fetch_media(&self, media_url: &str) -> Result<Vec<u8>, TwilioError> {
        let response = self
            .client
            .get(media_url)
            .basic_auth(&self.options.account_sid, Some(&self.options.auth_token))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TwilioError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}
