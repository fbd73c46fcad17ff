// Canonical hashing of JSON arguments, used to derive deterministic cache keys.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Recursively sorts object keys so equal arguments always serialize identically.
fn sort_json_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted_map: BTreeMap<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), sort_json_value(v)))
                .collect();
            Value::Object(sorted_map.into_iter().collect())
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_json_value).collect()),
        _ => value.clone(),
    }
}

/// Canonical text form of a JSON value: sorted keys, no insignificant whitespace.
pub fn canonical_json(value: &Value) -> String {
    // Serializing a `Value` cannot fail: every key is already a string.
    serde_json::to_string(&sort_json_value(value)).unwrap_or_default()
}

/// Hex SHA-256 digest of the canonical form of `value`.
pub fn hash_value(value: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_json(value).as_bytes());
    hex::encode(hasher.finalize())
}

/// `"<operation>:<digest of args>"`. Identical arguments in any key order map to the same key.
pub fn cache_key(operation: &str, args: &Value) -> String {
    format!("{}:{}", operation, hash_value(args))
}
