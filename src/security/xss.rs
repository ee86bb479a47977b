//! Markup escaping for untrusted input.
//!
//! `<` and `>` in string values and object keys become `&lt;` and `&gt;`.
//! `&` is left alone so that escaping an already escaped value changes
//! nothing.

use std::borrow::Cow;

use serde_json::Value;

use crate::observability::metrics;
use crate::pipeline::{Flow, RequestContext, Stage};

/// Escape markup delimiters in `input`, borrowing when nothing changes.
pub fn clean_text(input: &str) -> Cow<'_, str> {
    if !input.contains(['<', '>']) {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len() + 8);
    for ch in input.chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
    Cow::Owned(out)
}

/// Escape every string in a JSON tree, object keys included. Returns how
/// many strings changed.
pub fn clean_value(value: &mut Value) -> usize {
    match value {
        Value::String(s) => replace_if_changed(s),
        Value::Array(items) => items.iter_mut().map(clean_value).sum(),
        Value::Object(map) => {
            let dirty: Vec<String> = map
                .keys()
                .filter(|key| key.contains(['<', '>']))
                .cloned()
                .collect();

            let mut changed = dirty.len();
            for key in dirty {
                if let Some(inner) = map.remove(&key) {
                    map.insert(clean_text(&key).into_owned(), inner);
                }
            }
            changed += map.values_mut().map(clean_value).sum::<usize>();
            changed
        }
        _ => 0,
    }
}

fn replace_if_changed(s: &mut String) -> usize {
    let cleaned = match clean_text(s) {
        Cow::Owned(cleaned) => Some(cleaned),
        Cow::Borrowed(_) => None,
    };

    match cleaned {
        Some(cleaned) => {
            *s = cleaned;
            1
        }
        None => 0,
    }
}

/// Escapes markup in the parsed body and query values.
#[derive(Debug, Clone, Default)]
pub struct XssStage;

impl Stage for XssStage {
    fn name(&self) -> &'static str {
        "xss"
    }

    fn apply(&self, mut ctx: RequestContext) -> Flow {
        let mut changed = ctx.body.as_mut().map(clean_value).unwrap_or(0);
        for (key, value) in ctx.query.iter_mut() {
            changed += replace_if_changed(key);
            changed += replace_if_changed(value);
        }

        if changed > 0 {
            tracing::debug!(client = %ctx.client, changed, "Escaped markup in request input");
            metrics::record_sanitized("xss", changed);
        }
        Flow::Continue(ctx)
    }
}
