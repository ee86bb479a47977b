//! Origin restriction.
//!
//! Browsers send `Origin` on cross-origin and on state-changing requests. A
//! request whose `Origin` differs from the configured one is rejected with
//! 403 before it reaches any handler; requests without the header pass.
//! Allowed-origin CORS headers and preflight answers come from `CorsLayer`.

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_http::cors::{AllowHeaders, CorsLayer};

use crate::http::error::ApiError;
use crate::observability::metrics;

/// The single origin allowed to call the server from a browser.
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    allowed: HeaderValue,
}

impl OriginPolicy {
    pub fn new(origin: &str) -> Result<Self, header::InvalidHeaderValue> {
        Ok(Self {
            allowed: HeaderValue::from_str(origin)?,
        })
    }

    /// Scheme and host compare case-insensitively.
    pub fn allows(&self, origin: &HeaderValue) -> bool {
        origin
            .as_bytes()
            .eq_ignore_ascii_case(self.allowed.as_bytes())
    }

    /// CORS layer answering preflights for the allowed origin.
    pub fn cors_layer(&self) -> CorsLayer {
        CorsLayer::new()
            .allow_origin(self.allowed.clone())
            .allow_methods([
                Method::GET,
                Method::HEAD,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
            ])
            .allow_headers(AllowHeaders::mirror_request())
    }
}

/// Middleware rejecting requests from disallowed origins.
pub async fn origin_guard(
    State(policy): State<OriginPolicy>,
    request: Request,
    next: Next,
) -> Response {
    match request.headers().get(header::ORIGIN) {
        Some(origin) if !policy.allows(origin) => {
            metrics::record_origin_rejected();
            let origin = String::from_utf8_lossy(origin.as_bytes()).into_owned();
            ApiError::OriginRejected(origin).into_response()
        }
        _ => next.run(request).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_origin_match() {
        let policy = OriginPolicy::new("https://lumelaunch.com").unwrap();

        assert!(policy.allows(&HeaderValue::from_static("https://lumelaunch.com")));
        assert!(policy.allows(&HeaderValue::from_static("HTTPS://LumeLaunch.com")));
        assert!(!policy.allows(&HeaderValue::from_static("https://evil.example")));
        assert!(!policy.allows(&HeaderValue::from_static("http://lumelaunch.com")));
        assert!(!policy.allows(&HeaderValue::from_static("https://lumelaunch.com.evil.example")));
    }

    #[test]
    fn test_invalid_origin_value_is_an_error() {
        assert!(OriginPolicy::new("https://bad\norigin").is_err());
    }
}
