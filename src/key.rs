//! Cache and dedupe key generation
//!
//! Key derivation is pure and deterministic: the same descriptor always
//! produces the same string, object keys are serialized in sorted order so
//! semantically identical requests cannot diverge on caller-side field
//! ordering, and absent fields default to the empty string.

use serde_json::Value;

use crate::request::RequestDescriptor;

/// Serializes a JSON value with object keys sorted recursively.
///
/// Plain `serde_json::to_string` preserves insertion order for objects,
/// which would make two semantically identical descriptors produce
/// different keys.
pub fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            let fields: Vec<String> = keys
                .into_iter()
                .map(|k| {
                    format!(
                        "{}:{}",
                        serde_json::to_string(k).unwrap_or_default(),
                        canonical_json(&map[k])
                    )
                })
                .collect();

            format!("{{{}}}", fields.join(","))
        }
        Value::Array(items) => {
            let rendered: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", rendered.join(","))
        }
        scalar => scalar.to_string(),
    }
}

fn serialize_params(params: &[(String, String)]) -> String {
    let mut pairs: Vec<&(String, String)> = params.iter().collect();
    pairs.sort();

    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// Default cache key: `method:url:params:body`.
pub fn default_cache_key(descriptor: &RequestDescriptor) -> String {
    format!(
        "{}:{}:{}:{}",
        descriptor.method,
        descriptor.url,
        serialize_params(&descriptor.params),
        descriptor.body.as_ref().map(canonical_json).unwrap_or_default()
    )
}

/// Default dedupe key. Same composition as the cache key; the registry and
/// the cache store are separate structures, so sharing the derivation is
/// safe.
pub fn default_dedupe_key(descriptor: &RequestDescriptor) -> String {
    default_cache_key(descriptor)
}

/// Derives a stable cache key from a structured query descriptor plus
/// optional query settings.
///
/// Standalone helper for higher-level data-fetching code; it does not go
/// through the HTTP interception path.
pub fn query_cache_key(parts: &[Value], options: Option<&Value>) -> String {
    let rendered: Vec<String> = parts.iter().map(canonical_json).collect();
    let base = rendered.join(":");

    match options {
        Some(opts) => format!("{}::{}", base, canonical_json(opts)),
        None => base,
    }
}
