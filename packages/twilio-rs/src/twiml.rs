//! TwiML rendering for synchronous webhook replies.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::TwilioError;

/// Content type Twilio expects for a TwiML body.
pub const CONTENT_TYPE: &str = "application/xml";

pub(crate) fn is_http_url(url: &str) -> bool {
    let lower = url.trim().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

#[derive(Debug, Clone, Default)]
struct Message {
    body: String,
    media: Vec<String>,
}

/// Builder for a `<Response>` carrying zero or more `<Message>` verbs.
#[derive(Debug, Clone, Default)]
pub struct MessagingResponse {
    messages: Vec<Message>,
}

impl MessagingResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message. Media URLs that are not absolute http(s) URLs are dropped.
    pub fn message<I, S>(mut self, body: impl Into<String>, media: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let media = media
            .into_iter()
            .map(|m| m.as_ref().trim().to_string())
            .filter(|m| is_http_url(m))
            .collect();
        self.messages.push(Message {
            body: body.into(),
            media,
        });
        self
    }

    pub fn to_xml(&self) -> Result<String, TwilioError> {
        let mut writer = Writer::new(Vec::new());
        write(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        write(&mut writer, Event::Start(BytesStart::new("Response")))?;
        for message in &self.messages {
            write(&mut writer, Event::Start(BytesStart::new("Message")))?;
            text_element(&mut writer, "Body", &message.body)?;
            for media in &message.media {
                text_element(&mut writer, "Media", media)?;
            }
            write(&mut writer, Event::End(BytesEnd::new("Message")))?;
        }
        write(&mut writer, Event::End(BytesEnd::new("Response")))?;
        String::from_utf8(writer.into_inner()).map_err(|e| TwilioError::Xml(e.to_string()))
    }
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), TwilioError> {
    writer
        .write_event(event)
        .map_err(|e| TwilioError::Xml(e.to_string()))
}

fn text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<(), TwilioError> {
    write(writer, Event::Start(BytesStart::new(name)))?;
    write(writer, Event::Text(BytesText::new(text)))?;
    write(writer, Event::End(BytesEnd::new(name)))
}
