//! Operator-key stripping for NoSQL injection.
//!
//! Keys beginning with `$` or containing `.` are removed from the parsed
//! body at any depth and from the query string. Bracketed query keys
//! (`filter[$gt]`) are checked segment by segment.

use serde_json::Value;

use crate::observability::metrics;
use crate::pipeline::{Flow, RequestContext, Stage};

/// True for keys that could be read as query operators or paths.
pub fn is_prohibited_key(key: &str) -> bool {
    key.starts_with('$') || key.contains('.')
}

fn is_prohibited_query_key(key: &str) -> bool {
    key.split(['[', ']']).any(is_prohibited_key)
}

/// Remove prohibited keys from a JSON tree. Returns how many were removed.
pub fn strip_value(value: &mut Value) -> usize {
    match value {
        Value::Object(map) => {
            let before = map.len();
            map.retain(|key, _| !is_prohibited_key(key));
            let removed = before - map.len();
            removed + map.values_mut().map(strip_value).sum::<usize>()
        }
        Value::Array(items) => items.iter_mut().map(strip_value).sum(),
        _ => 0,
    }
}

/// Strips operator-like keys from the parsed body and query.
#[derive(Debug, Clone, Default)]
pub struct InjectionStage;

impl Stage for InjectionStage {
    fn name(&self) -> &'static str {
        "injection"
    }

    fn apply(&self, mut ctx: RequestContext) -> Flow {
        let mut removed = ctx.body.as_mut().map(strip_value).unwrap_or(0);

        let before = ctx.query.len();
        ctx.query.retain(|(key, _)| !is_prohibited_query_key(key));
        removed += before - ctx.query.len();

        if removed > 0 {
            tracing::warn!(client = %ctx.client, removed, "Stripped operator keys from request input");
            metrics::record_sanitized("injection", removed);
        }
        Flow::Continue(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use serde_json::json;

    #[test]
    fn test_where_key_is_stripped() {
        let mut value = json!({ "$where": "1==1" });
        assert_eq!(strip_value(&mut value), 1);
        assert_eq!(value, json!({}));
    }

    #[test]
    fn test_nested_and_dotted_keys() {
        let mut value = json!({
            "email": { "$gt": "" },
            "profile.admin": true,
            "items": [{ "$set": 1, "ok": 2 }],
            "name": "Ada"
        });

        assert_eq!(strip_value(&mut value), 3);
        assert_eq!(
            value,
            json!({ "email": {}, "items": [{ "ok": 2 }], "name": "Ada" })
        );
        assert_eq!(strip_value(&mut value), 0);
    }

    #[test]
    fn test_values_with_dollar_are_kept() {
        let mut value = json!({ "price": "$5.00" });
        assert_eq!(strip_value(&mut value), 0);
    }

    #[test]
    fn test_query_keys_checked_per_segment() {
        assert!(is_prohibited_query_key("filter[$gt]"));
        assert!(is_prohibited_query_key("$where"));
        assert!(is_prohibited_query_key("a[b.c]"));
        assert!(!is_prohibited_query_key("filter[name]"));

        let (parts, ()) = axum::http::Request::builder()
            .uri("/api/contact?name=ada&user%5B%24ne%5D=x&page=2")
            .body(())
            .unwrap()
            .into_parts();
        let ctx = RequestContext::new(parts, Bytes::new());

        match InjectionStage.apply(ctx) {
            Flow::Continue(ctx) => assert_eq!(
                ctx.query,
                vec![("name".into(), "ada".into()), ("page".into(), "2".into())]
            ),
            other => panic!("expected continue, got {other:?}"),
        }
    }
}
