//! Messaging webhook: form-encoded inbound event in, TwiML reply out.

use axum::{
    extract::{rejection::FormRejection, Extension, Form},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::{debug, error};
use twilio::twiml::{self, MessagingResponse};
use twilio::webhook::InboundMessage;

use crate::domains::jobs::activities::{ingest_inbound_photo, InboundPhoto};
use crate::domains::jobs::messages::OutboundMessage;
use crate::server::app::AxumAppState;

impl From<InboundMessage> for InboundPhoto {
    fn from(message: InboundMessage) -> Self {
        let media = message.first_media();
        Self {
            sender: message.sender().to_string(),
            media_count: message.num_media,
            media_url: media.as_ref().map(|m| m.url.clone()).filter(|u| !u.is_empty()),
            content_type: media.map(|m| m.content_type),
        }
    }
}

fn twiml_reply(reply: &OutboundMessage) -> Response {
    match MessagingResponse::new()
        .message(reply.text.clone(), reply.media_url.iter())
        .to_xml()
    {
        Ok(xml) => ([(header::CONTENT_TYPE, twiml::CONTENT_TYPE)], xml).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render webhook reply");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn whatsapp_webhook_handler(
    Extension(state): Extension<AxumAppState>,
    form: Result<Form<InboundMessage>, FormRejection>,
) -> Response {
    let Form(message) = match form {
        Ok(form) => form,
        Err(FormRejection::InvalidFormContentType(rejection)) => {
            debug!(error = %rejection, "Webhook body is not form-encoded");
            return (StatusCode::UNSUPPORTED_MEDIA_TYPE, rejection.body_text()).into_response();
        }
        Err(rejection) => {
            debug!(error = %rejection, "Malformed webhook body");
            return (StatusCode::BAD_REQUEST, rejection.body_text()).into_response();
        }
    };

    let deps = &state.deps;
    let reply = match ingest_inbound_photo(message.into(), deps).await {
        Ok(outcome) => {
            debug!(outcome = ?outcome, "Inbound message handled");
            outcome.reply(&deps.messages)
        }
        Err(e) => {
            error!(error = %format!("{:#}", e), "Inbound message failed");
            deps.messages.save_failed()
        }
    };

    twiml_reply(&reply)
}
