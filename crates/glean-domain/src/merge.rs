use serde_json::Value;

/// Merge `incoming` into `existing`, never overwriting a present value with
/// an absent one: `null` (and missing) incoming keys leave the existing value
/// untouched. Nested objects merge recursively; everything else replaces.
///
/// Used for partial entity updates and for folding newly-extracted enrichment
/// fields into a stored listing.
pub fn merge_update(existing: &mut Value, incoming: &Value) {
    match (existing, incoming) {
        (Value::Object(existing_map), Value::Object(incoming_map)) => {
            for (key, incoming_val) in incoming_map {
                if incoming_val.is_null() {
                    continue;
                }
                match existing_map.get_mut(key) {
                    Some(existing_val) if existing_val.is_object() && incoming_val.is_object() => {
                        merge_update(existing_val, incoming_val);
                    }
                    _ => {
                        existing_map.insert(key.clone(), incoming_val.clone());
                    }
                }
            }
        }
        (existing_slot, incoming_val) => {
            if !incoming_val.is_null() {
                *existing_slot = incoming_val.clone();
            }
        }
    }
}
