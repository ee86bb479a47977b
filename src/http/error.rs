//! Terminal error responder.
//!
//! Every failure in the chain ends up as an [`ApiError`]; its
//! `IntoResponse` implementation is the only place an error is logged and
//! turned into a client-visible response.
//!
//! # Design Decisions
//! - Clients get `{"error": "Server error"}` and the error's status
//! - The rate-limit rejection carries its configured message instead
//! - Internal detail is logged, never sent

use std::any::Any;
use std::time::Duration;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::http::contact::HandlerError;

/// Body text used for every error without a dedicated client message.
pub const GENERIC_ERROR: &str = "Server error";

/// Errors raised by pipeline stages, routing, or the contact collaborator.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("malformed request body: {0}")]
    MalformedBody(String),

    #[error("origin `{0}` is not allowed")]
    OriginRejected(String),

    #[error("rate limit exceeded for client {client}")]
    TooManyRequests {
        client: String,
        message: String,
        retry_after: Duration,
    },

    #[error("contact handler failed: {0}")]
    Handler(#[from] HandlerError),

    #[error("no route or static file for {0}")]
    NotFound(String),

    #[error("failed to read request body: {0}")]
    BodyRead(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status reported to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::MalformedBody(_) | ApiError::BodyRead(_) => StatusCode::BAD_REQUEST,
            ApiError::OriginRejected(_) => StatusCode::FORBIDDEN,
            ApiError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Handler(e) => e.status().unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message placed in the `error` field of the JSON body.
    fn client_message(&self) -> &str {
        match self {
            ApiError::TooManyRequests { message, .. } => message,
            _ => GENERIC_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %self, "Request rejected");
        }

        let mut response = (status, Json(json!({ "error": self.client_message() }))).into_response();

        if let ApiError::TooManyRequests { retry_after, .. } = &self {
            let secs = retry_after.as_secs_f64().ceil() as u64;
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }

        response
    }
}

/// Converts a caught handler panic into the terminal error response.
///
/// Used with `tower_http::catch_panic::CatchPanicLayer::custom`.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic".to_string()
    };

    ApiError::Internal(format!("handler panicked: {detail}")).into_response()
}
