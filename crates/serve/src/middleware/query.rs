//! Query string parsing with bracket notation
//!
//! `a=1&a=2` yields an array, `a[b]=1` a nested object and `a[]=1` an array
//! element. Nested objects are what make operator keys such as
//! `price[$gt]=0` visible to the sanitizers.

use serde_json::{Map, Value};

/// Maximum number of pairs read from one query string
pub const PARAMETER_LIMIT: usize = 1000;

/// Maximum bracket nesting; deeper segments stay part of the key
pub const MAX_DEPTH: usize = 5;

fn decode(component: &str) -> String {
    let spaced = component.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// Split `a[b][]` into `["a", "b", ""]`
fn split_key(key: &str) -> Vec<String> {
    let Some(open) = key.find('[') else {
        return vec![key.to_string()];
    };
    if open == 0 {
        return vec![key.to_string()];
    }

    let mut segments = vec![key[..open].to_string()];
    let mut rest = &key[open..];
    while segments.len() <= MAX_DEPTH {
        let Some(stripped) = rest.strip_prefix('[') else {
            break;
        };
        let Some(close) = stripped.find(']') else {
            break;
        };
        segments.push(stripped[..close].to_string());
        rest = &stripped[close + 1..];
    }
    if !rest.is_empty() {
        segments.push(rest.to_string());
    }
    segments
}

fn insert(target: &mut Map<String, Value>, segments: &[String], value: String) {
    let Some((head, tail)) = segments.split_first() else {
        return;
    };

    if tail.is_empty() {
        match target.get_mut(head) {
            Some(Value::Array(items)) => items.push(Value::String(value)),
            Some(existing @ Value::String(_)) => {
                let previous = existing.take();
                *existing = Value::Array(vec![previous, Value::String(value)]);
            }
            _ => {
                target.insert(head.clone(), Value::String(value));
            }
        }
        return;
    }

    // `key[]=v` appends to an array
    if tail.len() == 1 && tail[0].is_empty() {
        match target.get_mut(head) {
            Some(Value::Array(items)) => items.push(Value::String(value)),
            Some(existing @ Value::String(_)) => {
                let previous = existing.take();
                *existing = Value::Array(vec![previous, Value::String(value)]);
            }
            _ => {
                target.insert(head.clone(), Value::Array(vec![Value::String(value)]));
            }
        }
        return;
    }

    let child = target
        .entry(head.clone())
        .or_insert_with(|| Value::Object(Map::new()));
    if !child.is_object() {
        *child = Value::Object(Map::new());
    }
    if let Value::Object(map) = child {
        insert(map, tail, value);
    }
}

/// Parse a raw query string
pub fn parse(raw: &str) -> Map<String, Value> {
    let mut out = Map::new();
    for pair in raw
        .split('&')
        .filter(|p| !p.is_empty())
        .take(PARAMETER_LIMIT)
    {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode(key);
        if key.is_empty() {
            continue;
        }
        insert(&mut out, &split_key(&key), decode(value));
    }
    out
}

fn encode_into(pairs: &mut Vec<String>, key: &str, value: &Value) {
    match value {
        Value::Null => {}
        Value::Array(items) => {
            for item in items {
                encode_into(pairs, key, item);
            }
        }
        Value::Object(map) => {
            for (child, nested) in map {
                encode_into(pairs, &format!("{}[{}]", key, child), nested);
            }
        }
        Value::String(s) => pairs.push(format!(
            "{}={}",
            urlencoding::encode(key),
            urlencoding::encode(s)
        )),
        other => pairs.push(format!(
            "{}={}",
            urlencoding::encode(key),
            urlencoding::encode(&other.to_string())
        )),
    }
}

/// Serialize a parsed query back into a query string
pub fn serialize(query: &Map<String, Value>) -> String {
    let mut pairs = Vec::new();
    for (key, value) in query {
        encode_into(&mut pairs, key, value);
    }
    pairs.join("&")
}
