use sha2::{Digest, Sha256};

/// Serialize `value` to canonical JSON (object keys sorted) and return its
/// SHA-256 hex digest. Used to compare idempotent scheduling payloads without
/// diffing the full struct.
pub fn canonical_fingerprint<T: serde::Serialize>(value: &T) -> String {
    let v = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
    let canonical = sort_json_keys(v);
    let bytes = serde_json::to_vec(&canonical).unwrap_or_default();
    let digest = Sha256::digest(&bytes);
    format!("{:x}", digest)
}

/// Recursively sort JSON object keys so HashMap field ordering doesn't affect
/// the hash.
fn sort_json_keys(v: serde_json::Value) -> serde_json::Value {
    match v {
        serde_json::Value::Object(map) => {
            let sorted: std::collections::BTreeMap<String, serde_json::Value> = map
                .into_iter()
                .map(|(k, v)| (k, sort_json_keys(v)))
                .collect();
            serde_json::Value::Object(sorted.into_iter().collect())
        }
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(sort_json_keys).collect())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stable_across_key_order() {
        let a = json!({ "b": 1, "a": { "y": 2, "x": 3 } });
        let b = json!({ "a": { "x": 3, "y": 2 }, "b": 1 });
        assert_eq!(canonical_fingerprint(&a), canonical_fingerprint(&b));
    }

    #[test]
    fn differs_on_value_change() {
        let a = json!({ "k": 1 });
        let b = json!({ "k": 2 });
        assert_ne!(canonical_fingerprint(&a), canonical_fingerprint(&b));
    }
}
