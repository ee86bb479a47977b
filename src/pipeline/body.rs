//! JSON body parsing stage.

use axum::http::{header, HeaderMap};
use serde_json::{Map, Value};

use crate::http::error::ApiError;
use crate::pipeline::{Flow, RequestContext, Stage};

/// Parses JSON bodies into `RequestContext::body`.
///
/// Non-JSON requests pass through with `body == None`. Only objects and
/// arrays are accepted at the top level; an empty body parses as `{}`.
#[derive(Debug, Clone, Default)]
pub struct JsonBodyStage;

impl Stage for JsonBodyStage {
    fn name(&self) -> &'static str {
        "json_body"
    }

    fn apply(&self, mut ctx: RequestContext) -> Flow {
        if !is_json(&ctx.parts.headers) {
            return Flow::Continue(ctx);
        }

        if ctx.raw_body.iter().all(u8::is_ascii_whitespace) {
            ctx.body = Some(Value::Object(Map::new()));
            return Flow::Continue(ctx);
        }

        match serde_json::from_slice::<Value>(&ctx.raw_body) {
            Ok(value @ (Value::Object(_) | Value::Array(_))) => {
                ctx.body = Some(value);
                Flow::Continue(ctx)
            }
            Ok(_) => Flow::Fail(ApiError::MalformedBody(
                "top-level JSON value must be an object or array".into(),
            )),
            Err(e) => Flow::Fail(ApiError::MalformedBody(e.to_string())),
        }
    }
}

/// `application/json` or any `application/*+json` media type.
fn is_json(headers: &HeaderMap) -> bool {
    let Some(content_type) = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return false;
    };

    let media_type = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    media_type == "application/json"
        || (media_type.starts_with("application/") && media_type.ends_with("+json"))
}
