use crate::completion::{CompletionError, CompletionResult, ErrorBody};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::collections::HashMap;

/// Raw decoded form fields. A repeated key keeps its last value.
pub type FormFields = HashMap<String, String>;

/// Inbound message webhook, as posted by Twilio.
#[derive(Debug)]
pub struct InboundForm {
    pub body: Option<String>,
    pub from: Option<String>,
    pub message_sid: Option<String>,
}
impl From<FormFields> for InboundForm {
    fn from(mut fields: FormFields) -> Self {
        Self {
            body: fields.remove("Body"),
            from: fields.remove("From"),
            message_sid: fields.remove("MessageSid"),
        }
    }
}

/// Delivery status callback, as posted by Twilio.
#[derive(Debug)]
pub struct StatusCallbackForm {
    pub message_status: Option<String>,
    pub message_sid: Option<String>,
}
impl From<FormFields> for StatusCallbackForm {
    fn from(mut fields: FormFields) -> Self {
        Self {
            message_status: fields.remove("MessageStatus"),
            message_sid: fields.remove("MessageSid"),
        }
    }
}

#[derive(Serialize)]
pub struct IndexResponse {
    pub ok: bool,
    pub message: String,
    pub routes: &'static [&'static str],
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub ok: bool,
}

#[derive(Serialize)]
pub struct StatusAck {
    pub ok: bool,
    pub received: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

#[derive(Debug, Default, PartialEq, Serialize)]
pub struct DiagnosticResponse {
    pub ok: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_text: Option<String>,
}
impl From<CompletionResult> for DiagnosticResponse {
    fn from(result: CompletionResult) -> Self {
        match result {
            Ok(text) => Self {
                ok: true,
                text: Some(text),
                ..Default::default()
            },
            Err(CompletionError::Status { status, body }) => {
                let (error, error_text) = match body {
                    ErrorBody::Json(json) => (Some(json), None),
                    ErrorBody::Text(text) => (None, Some(text)),
                };
                Self {
                    ok: false,
                    status: Some(status),
                    error,
                    error_text,
                    ..Default::default()
                }
            }
            Err(e) => Self {
                ok: false,
                error: Some(serde_json::Value::String(e.to_string())),
                ..Default::default()
            },
        }
    }
}

/// A rendered TwiML document.
pub struct TwimlResponse(pub String);
impl IntoResponse for TwimlResponse {
    fn into_response(self) -> Response {
        ([(header::CONTENT_TYPE, "application/xml")], self.0).into_response()
    }
}

pub struct UnsupportedMediaType;
impl IntoResponse for UnsupportedMediaType {
    fn into_response(self) -> Response {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Unsupported Media Type (expected form-urlencoded)",
        )
            .into_response()
    }
}
