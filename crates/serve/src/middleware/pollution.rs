//! HTTP parameter pollution protection
//!
//! A query key sent more than once arrives as an array, which handlers
//! expecting a single value would misread. Arrays collapse to their last
//! value unless the key is whitelisted; the original arrays stay available
//! to handlers through [`PollutedQuery`](crate::context::PollutedQuery).

use crate::context::RequestContext;
use crate::pipeline::{Stage, StageOutcome};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Collapses repeated query parameters
#[derive(Debug, Clone, Default)]
pub struct PollutionGuard {
    whitelist: HashSet<String>,
}

impl PollutionGuard {
    pub fn new(whitelist: impl IntoIterator<Item = String>) -> Self {
        Self {
            whitelist: whitelist.into_iter().collect(),
        }
    }

    /// Collapse arrays in `query`, returning the originals that were replaced
    pub fn collapse(&self, query: &mut Map<String, Value>) -> Map<String, Value> {
        let mut polluted = Map::new();
        for (key, value) in query.iter_mut() {
            if self.whitelist.contains(key) {
                continue;
            }
            if let Value::Array(items) = value {
                let last = items.last().cloned().unwrap_or(Value::Null);
                polluted.insert(key.clone(), std::mem::replace(value, last));
            }
        }
        query.retain(|_, v| !v.is_null());
        polluted
    }
}

#[async_trait]
impl Stage for PollutionGuard {
    fn name(&self) -> &'static str {
        "parameter_pollution"
    }

    async fn on_request(&self, ctx: &mut RequestContext) -> StageOutcome {
        let polluted = self.collapse(&mut ctx.query);
        if !polluted.is_empty() {
            tracing::debug!(keys = ?polluted.keys().collect::<Vec<_>>(), "Collapsed repeated query parameters");
            ctx.polluted = polluted;
        }
        StageOutcome::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn query(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_last_value_wins() {
        let guard = PollutionGuard::default();
        let mut q = query(json!({"keyword": ["shirt", "jeans"], "page": "1"}));
        let polluted = guard.collapse(&mut q);

        assert_eq!(q["keyword"], "jeans");
        assert_eq!(q["page"], "1");
        assert_eq!(polluted["keyword"], json!(["shirt", "jeans"]));
        assert!(!polluted.contains_key("page"));
    }

    #[test]
    fn test_whitelisted_keys_stay_arrays() {
        let guard = PollutionGuard::new(vec!["tags".to_string()]);
        let mut q = query(json!({"tags": ["a", "b"], "sort": ["x", "y"]}));
        let polluted = guard.collapse(&mut q);

        assert_eq!(q["tags"], json!(["a", "b"]));
        assert_eq!(q["sort"], "y");
        assert_eq!(polluted.len(), 1);
    }

    #[test]
    fn test_empty_array_is_dropped() {
        let guard = PollutionGuard::default();
        let mut q = query(json!({"ids": []}));
        guard.collapse(&mut q);
        assert!(!q.contains_key("ids"));
    }
}
