//! Idempotency-key derivation shared by the cron and poller loops (§4.5).
//!
//! Grounded on `original_source/.../common/utils.py::make_idempotency_key`:
//! canonical (sorted-key, compact) JSON of the parts, SHA-256, truncated to
//! 40 hex chars. `acct-config`'s `load_layered_yaml` hashes a whole document
//! the same way; this is the same recipe applied to a handful of call-site
//! values instead of a config tree.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// `H(parts...)` — JSON-encode `parts` as a canonical array (keys sorted,
/// no extra whitespace) and return the first 40 hex chars of its SHA-256.
pub fn make_idempotency_key(parts: &[Value]) -> String {
    let canonical = canonical_json(&Value::Array(parts.to_vec()));
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..40].to_string()
}

fn canonical_json(v: &Value) -> String {
    serde_json::to_string(&sort_keys(v)).expect("json serialization must not fail")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut new = serde_json::Map::new();
            for k in keys {
                new.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn same_parts_yield_same_key_regardless_of_object_key_order() {
        let a = make_idempotency_key(&[json!("schedule"), json!("job1"), json!({"a": 1, "b": 2})]);
        let b = make_idempotency_key(&[json!("schedule"), json!("job1"), json!({"b": 2, "a": 1})]);
        assert_eq!(a, b);
    }

    #[test]
    fn different_parts_yield_different_keys() {
        let a = make_idempotency_key(&[json!("schedule"), json!("job1"), json!({})]);
        let b = make_idempotency_key(&[json!("schedule"), json!("job2"), json!({})]);
        assert_ne!(a, b);
    }

    #[test]
    fn key_is_forty_hex_chars() {
        let k = make_idempotency_key(&[json!("x")]);
        assert_eq!(k.len(), 40);
        assert!(k.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
