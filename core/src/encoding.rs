//! Body encoding and response decoding.
//!
//! Request bodies are serialised to a `serde_json::Value` first, so both the
//! JSON and the form-url-encoded representations see the same keys in the
//! same (declaration) order. Key casing is rewritten on that value rather
//! than through serde attributes, which keeps caller types free of
//! wire-format annotations.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Key naming convention applied to JSON object keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyCase {
    /// Keys are used exactly as serialised.
    #[default]
    Preserve,
    /// `apiVersion` becomes `api_version`.
    SnakeCase,
    /// `api_version` becomes `apiVersion`.
    CamelCase,
}

impl KeyCase {
    pub fn convert(&self, key: &str) -> String {
        match self {
            KeyCase::Preserve => key.to_string(),
            KeyCase::SnakeCase => to_snake_case(key),
            KeyCase::CamelCase => to_camel_case(key),
        }
    }

    /// Rewrite every object key in `value`, recursing into arrays and
    /// nested objects.
    pub fn apply(&self, value: Value) -> Value {
        if *self == KeyCase::Preserve {
            return value;
        }
        match value {
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(key, value)| (self.convert(&key), self.apply(value)))
                    .collect(),
            ),
            Value::Array(items) => Value::Array(items.into_iter().map(|v| self.apply(v)).collect()),
            other => other,
        }
    }
}

fn to_snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    let chars: Vec<char> = key.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            // Word boundary: `aB`, or the last capital of an acronym (`URLPath`).
            let boundary = match prev {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(|n| n.is_lowercase()),
                _ => false,
            };
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn to_camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper_next = false;
    for c in key.chars() {
        if c == '_' {
            upper_next = !out.is_empty();
            continue;
        }
        if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Flatten a JSON object into `key=value&...`.
///
/// Nested objects contribute their own pairs without a key prefix. Values
/// are not percent-encoded. Returns `None` for anything but an object.
pub fn form_url_encode(value: &Value) -> Option<String> {
    let pairs = form_pairs(value)?;
    Some(
        pairs
            .into_iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&"),
    )
}

/// The `(key, value)` pairs behind [`form_url_encode`], in field order.
pub fn form_pairs(value: &Value) -> Option<Vec<(String, String)>> {
    let map = value.as_object()?;
    let mut pairs = Vec::new();
    flatten_into(map, &mut pairs);
    Some(pairs)
}

fn flatten_into(map: &Map<String, Value>, pairs: &mut Vec<(String, String)>) {
    for (key, value) in map {
        match value {
            Value::Object(nested) => flatten_into(nested, pairs),
            Value::Null => {}
            other => {
                if let Some(rendered) = render_scalar(other) {
                    pairs.push((key.clone(), rendered));
                }
            }
        }
    }
}

fn render_scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(render_scalar)
                .collect::<Vec<_>>()
                .join(","),
        ),
        Value::Null | Value::Object(_) => None,
    }
}

/// Split a form-url-encoded string back into its pairs. The inverse of
/// [`form_url_encode`] for values without `&` or `=`.
pub fn form_url_decode(input: &str) -> Vec<(String, String)> {
    input
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}

/// Decodes response bodies into caller types.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseDecoder {
    pub key_case: KeyCase,
}

impl ResponseDecoder {
    pub fn new(key_case: KeyCase) -> Self {
        Self { key_case }
    }

    pub fn decode<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T, serde_json::Error> {
        match self.key_case {
            KeyCase::Preserve => serde_json::from_slice(body),
            key_case => {
                let value: Value = serde_json::from_slice(body)?;
                serde_json::from_value(key_case.apply(value))
            }
        }
    }
}
