//! Contact route dispatch.
//!
//! `/api/contact` hands the sanitized request to a [`ContactHandler`]. The
//! business logic (validation rules, delivery) lives behind that trait; the
//! bundled [`LogContactHandler`] only checks the required fields and logs the
//! submission.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures_util::future::BoxFuture;
use serde_json::{json, Value};
use thiserror::Error;

use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::pipeline::{Params, SanitizedInput};

/// Request handed to the contact collaborator.
///
/// Body and query have already been XSS- and injection-sanitized and the
/// query has been deduplicated.
#[derive(Debug, Clone)]
pub struct ContactRequest {
    pub method: Method,
    pub headers: HeaderMap,
    pub client: String,
    pub query: Params,
    pub body: Option<Value>,
}

/// Successful collaborator result.
#[derive(Debug, Clone)]
pub struct ContactResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl ContactResponse {
    pub fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body,
        }
    }
}

impl IntoResponse for ContactResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Error raised by the contact collaborator, with an optional status.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct HandlerError {
    status: Option<StatusCode>,
    message: String,
}

impl HandlerError {
    /// An error reported to the client as 500.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }
}

/// The contact-form collaborator.
pub trait ContactHandler: Send + Sync + 'static {
    fn handle(&self, request: ContactRequest) -> BoxFuture<'static, Result<ContactResponse, HandlerError>>;
}

/// Default collaborator: accepts POSTed submissions carrying a name and an
/// email address and logs them.
#[derive(Debug, Clone, Default)]
pub struct LogContactHandler;

impl ContactHandler for LogContactHandler {
    fn handle(&self, request: ContactRequest) -> BoxFuture<'static, Result<ContactResponse, HandlerError>> {
        Box::pin(async move {
            if request.method != Method::POST {
                return Err(HandlerError::with_status(
                    StatusCode::METHOD_NOT_ALLOWED,
                    format!("{} not supported on contact route", request.method),
                ));
            }

            let body = request.body.unwrap_or(Value::Null);
            required_field(&body, "name")?;
            let email = required_field(&body, "email")?;
            if !email.contains('@') {
                return Err(HandlerError::with_status(
                    StatusCode::BAD_REQUEST,
                    "email is not an address",
                ));
            }

            let message_len = body
                .get("message")
                .and_then(Value::as_str)
                .map(str::len)
                .unwrap_or(0);

            // Name and email stay out of the logs.
            tracing::info!(client = %request.client, message_len, "Contact submission received");

            Ok(ContactResponse::ok(json!({ "ok": true })))
        })
    }
}

fn required_field<'a>(body: &'a Value, field: &str) -> Result<&'a str, HandlerError> {
    body.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| HandlerError::with_status(StatusCode::BAD_REQUEST, format!("{field} is required")))
}

/// Axum handler for `/api/contact`.
pub async fn contact_route(
    State(state): State<AppState>,
    request: Request,
) -> Result<ContactResponse, ApiError> {
    let (mut parts, _body) = request.into_parts();
    let Some(input) = parts.extensions.remove::<SanitizedInput>() else {
        return Err(ApiError::Internal("contact route reached without pipeline input".into()));
    };

    let request = ContactRequest {
        method: parts.method,
        headers: parts.headers,
        client: input.client,
        query: input.query,
        body: input.body,
    };

    Ok(state.contact.handle(request).await?)
}

/// Shared handle to the collaborator.
pub type SharedContactHandler = Arc<dyn ContactHandler>;

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: Method, body: Option<Value>) -> ContactRequest {
        ContactRequest {
            method,
            headers: HeaderMap::new(),
            client: "127.0.0.1".into(),
            query: Params::new(),
            body,
        }
    }

    #[tokio::test]
    async fn test_accepts_complete_submission() {
        let response = LogContactHandler
            .handle(request(
                Method::POST,
                Some(json!({ "name": "Ada", "email": "ada@example.com", "message": "hi" })),
            ))
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, json!({ "ok": true }));
    }

    #[tokio::test]
    async fn test_missing_fields_are_bad_request() {
        let err = LogContactHandler
            .handle(request(Method::POST, Some(json!({ "name": "  " }))))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));

        let err = LogContactHandler
            .handle(request(Method::POST, Some(json!({ "name": "Ada", "email": "nope" }))))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_submission_log_has_no_personal_fields() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        LogContactHandler
            .handle(request(
                Method::POST,
                Some(json!({ "name": "Ada Lovelace", "email": "ada@example.com", "message": "hello" })),
            ))
            .await
            .unwrap();

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Contact submission received"), "{output}");
        assert!(output.contains("message_len=5"), "{output}");
        assert!(!output.contains("Ada Lovelace"), "{output}");
        assert!(!output.contains("ada@example.com"), "{output}");
    }

    #[tokio::test]
    async fn test_get_is_not_allowed() {
        let err = LogContactHandler.handle(request(Method::GET, None)).await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::METHOD_NOT_ALLOWED));
    }
}
