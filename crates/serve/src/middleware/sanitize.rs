//! Input sanitization stages
//!
//! Two independent rewrites over the JSON body, the parsed query and the
//! request path. Neither ever fails a request.
//!
//! - [`NoSqlSanitizer`] removes object keys that start with `$` or contain
//!   `.`, so client input cannot smuggle query operators into a document
//!   store lookup. With a replacement configured the keys are renamed.
//! - [`XssSanitizer`] escapes markup in string values and trims them.

use crate::context::RequestContext;
use crate::pipeline::{Stage, StageOutcome};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, warn};

fn is_operator_key(key: &str) -> bool {
    key.starts_with('$') || key.contains('.')
}

fn rename_operator_key(key: &str, replacement: &str) -> String {
    let renamed = match key.strip_prefix('$') {
        Some(rest) => format!("{}{}", replacement, rest),
        None => key.to_string(),
    };
    renamed.replace('.', replacement)
}

/// Strip or rename operator keys in `value`, recursively. Returns how many
/// keys were rewritten.
pub fn neutralize_operator_keys(value: &mut Value, replace_with: Option<&str>) -> usize {
    match value {
        Value::Object(map) => neutralize_map(map, replace_with),
        Value::Array(items) => items
            .iter_mut()
            .map(|item| neutralize_operator_keys(item, replace_with))
            .sum(),
        _ => 0,
    }
}

fn neutralize_map(map: &mut Map<String, Value>, replace_with: Option<&str>) -> usize {
    let flagged: Vec<String> = map.keys().filter(|k| is_operator_key(k)).cloned().collect();
    let mut rewritten = flagged.len();

    for key in flagged {
        if let Some(value) = map.remove(&key) {
            if let Some(replacement) = replace_with {
                map.insert(rename_operator_key(&key, replacement), value);
            }
        }
    }

    for child in map.values_mut() {
        rewritten += neutralize_operator_keys(child, replace_with);
    }
    rewritten
}

/// Escape markup characters and trim surrounding whitespace
pub fn clean_markup(input: &str) -> String {
    input.trim().replace('<', "&lt;").replace('>', "&gt;")
}

/// Escape markup in every string value of `value`, recursively. Keys are
/// left alone.
pub fn clean_markup_values(value: &mut Value) {
    match value {
        Value::String(s) => {
            let cleaned = clean_markup(s);
            if cleaned != *s {
                *s = cleaned;
            }
        }
        Value::Array(items) => items.iter_mut().for_each(clean_markup_values),
        Value::Object(map) => map.values_mut().for_each(clean_markup_values),
        _ => {}
    }
}

/// Escape markup inside each decoded path segment and re-encode it
pub fn clean_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            let decoded = urlencoding::decode(segment)
                .map(|s| s.into_owned())
                .unwrap_or_else(|_| segment.to_string());
            let cleaned = clean_markup(&decoded);
            if cleaned == decoded {
                segment.to_string()
            } else {
                urlencoding::encode(&cleaned).into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Removes query-operator keys from body and query
#[derive(Debug, Clone, Default)]
pub struct NoSqlSanitizer {
    replace_with: Option<String>,
}

impl NoSqlSanitizer {
    pub fn new(replace_with: Option<String>) -> Self {
        Self { replace_with }
    }
}

#[async_trait]
impl Stage for NoSqlSanitizer {
    fn name(&self) -> &'static str {
        "nosql_sanitize"
    }

    async fn on_request(&self, ctx: &mut RequestContext) -> StageOutcome {
        let replace_with = self.replace_with.as_deref();
        let mut rewritten = neutralize_map(&mut ctx.query, replace_with);
        if let Some(body) = ctx.json.as_mut() {
            rewritten += neutralize_operator_keys(body, replace_with);
        }

        if rewritten > 0 {
            warn!(
                path = %ctx.path,
                client = %ctx.client_id,
                keys = rewritten,
                "Neutralized operator keys in request input"
            );
        }
        StageOutcome::Continue
    }
}

/// Escapes markup in body, query and path
#[derive(Debug, Clone, Copy, Default)]
pub struct XssSanitizer;

#[async_trait]
impl Stage for XssSanitizer {
    fn name(&self) -> &'static str {
        "xss_sanitize"
    }

    async fn on_request(&self, ctx: &mut RequestContext) -> StageOutcome {
        ctx.query.values_mut().for_each(clean_markup_values);
        if let Some(body) = ctx.json.as_mut() {
            clean_markup_values(body);
        }

        let cleaned = clean_path(&ctx.path);
        if cleaned != ctx.path {
            debug!(from = %ctx.path, to = %cleaned, "Escaped markup in request path");
            ctx.path = cleaned;
        }
        StageOutcome::Continue
    }
}
