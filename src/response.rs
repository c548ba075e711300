use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Success envelope shared by every API handler: `{success, message, data?}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Result-set size, sent alongside list data where clients page on it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

pub struct ApiReply<T: Serialize> {
    status: StatusCode,
    envelope: Envelope<T>,
}

impl<T: Serialize> ApiReply<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self::with_status(StatusCode::OK, message, Some(data))
    }

    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self::with_status(StatusCode::CREATED, message, Some(data))
    }

    fn with_status(status: StatusCode, message: impl Into<String>, data: Option<T>) -> Self {
        Self {
            status,
            envelope: Envelope {
                success: true,
                message: message.into(),
                data,
                count: None,
            },
        }
    }
}

impl<T: Serialize> ApiReply<Vec<T>> {
    /// `ok` plus a top-level `count` of the returned items.
    pub fn counted(message: impl Into<String>, data: Vec<T>) -> Self {
        let count = data.len();
        let mut reply = Self::ok(message, data);
        reply.envelope.count = Some(count);
        reply
    }
}

impl ApiReply<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::OK, message, None)
    }
}

impl<T: Serialize> IntoResponse for ApiReply<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self.envelope)).into_response()
    }
}
