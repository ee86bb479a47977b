//! HTTP parameter pollution normalization.
//!
//! A query parameter given more than once collapses to its **last** value,
//! keeping the position of its first occurrence. The original values are
//! kept in `RequestContext::polluted`. Allow-listed names keep every value.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::pipeline::{Flow, RequestContext, Stage};

/// Normalized pairs plus the collapsed parameters' original values.
pub type Normalized = (Vec<(String, String)>, BTreeMap<String, Vec<String>>);

/// Collapse repeated keys in `pairs`, last value wins.
pub fn normalize(pairs: Vec<(String, String)>, allow_multiple: &HashSet<String>) -> Normalized {
    let mut order: Vec<String> = Vec::new();
    let mut grouped: HashMap<String, Vec<String>> = HashMap::new();

    for (key, value) in pairs {
        grouped
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(value);
    }

    let mut normalized = Vec::with_capacity(order.len());
    let mut polluted = BTreeMap::new();

    for key in order {
        let Some(values) = grouped.remove(&key) else {
            continue;
        };

        if values.len() > 1 && !allow_multiple.contains(&key) {
            let last = values.last().cloned().unwrap_or_default();
            polluted.insert(key.clone(), values);
            normalized.push((key, last));
        } else {
            normalized.extend(values.into_iter().map(|value| (key.clone(), value)));
        }
    }

    (normalized, polluted)
}

/// Deduplicates repeated query parameters.
#[derive(Debug, Clone, Default)]
pub struct PollutionStage {
    allow_multiple: HashSet<String>,
}

impl PollutionStage {
    pub fn new(allow_multiple: impl IntoIterator<Item = String>) -> Self {
        Self {
            allow_multiple: allow_multiple.into_iter().collect(),
        }
    }
}

impl Stage for PollutionStage {
    fn name(&self) -> &'static str {
        "pollution"
    }

    fn apply(&self, mut ctx: RequestContext) -> Flow {
        let pairs = std::mem::take(&mut ctx.query);
        let (normalized, polluted) = normalize(pairs, &self.allow_multiple);

        if !polluted.is_empty() {
            tracing::debug!(
                client = %ctx.client,
                params = ?polluted.keys().collect::<Vec<_>>(),
                "Collapsed repeated query parameters"
            );
        }

        ctx.query = normalized;
        ctx.polluted.extend(polluted);
        Flow::Continue(ctx)
    }
}
