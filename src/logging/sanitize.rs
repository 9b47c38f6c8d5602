//! Metadata redaction

use super::Metadata;
use serde_json::Value;

/// Replacement for values under sensitive keys
pub const REDACTED: &str = "***REDACTED***";

/// Lowercase substrings that mark a metadata key as sensitive
pub const SENSITIVE_KEYS: &[&str] = &[
    "password",
    "apikey",
    "token",
    "secret",
    "authorization",
    "ssn",
    "creditcard",
];

fn is_sensitive(key: &str) -> bool {
    let key = key.to_lowercase();
    SENSITIVE_KEYS.iter().any(|s| key.contains(s))
}

/// Return a copy of `metadata` with every sensitive key redacted, at any depth.
pub fn sanitize_metadata(metadata: &Metadata) -> Metadata {
    metadata
        .iter()
        .map(|(key, value)| {
            let value = if is_sensitive(key) {
                Value::String(REDACTED.to_string())
            } else {
                sanitize_value(value)
            };
            (key.clone(), value)
        })
        .collect()
}

fn sanitize_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(sanitize_metadata(map)),
        Value::Array(items) => Value::Array(items.iter().map(sanitize_value).collect()),
        leaf => leaf.clone(),
    }
}
