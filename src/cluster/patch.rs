//! JSON merge patch (RFC 7386) computation

use serde_json::{Map, Value};

/// Compute the merge patch that turns `original` into `updated`
///
/// Returns `None` when the two documents are equal. Keys removed in
/// `updated` are emitted as `null`; nested objects are diffed recursively
/// and any other changed value is replaced wholesale.
pub fn merge_patch(original: &Value, updated: &Value) -> Option<Value> {
    if original == updated {
        return None;
    }

    match (original, updated) {
        (Value::Object(before), Value::Object(after)) => {
            let mut patch = Map::new();
            for (key, old) in before {
                match after.get(key) {
                    None => {
                        patch.insert(key.clone(), Value::Null);
                    }
                    Some(new) => {
                        if let Some(change) = merge_patch(old, new) {
                            patch.insert(key.clone(), change);
                        }
                    }
                }
            }
            for (key, new) in after {
                if !before.contains_key(key) {
                    patch.insert(key.clone(), new.clone());
                }
            }
            Some(Value::Object(patch))
        }
        _ => Some(updated.clone()),
    }
}
