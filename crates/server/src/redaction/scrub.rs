use super::patterns::{contains_storage_path, looks_like_uuid, strip_uuids};
use serde_json::Value;
use std::borrow::Cow;

/// Keys that address objects in the backing store.
const STORAGE_KEY_FIELDS: [&str; 8] = [
    "object_key",
    "storage_key",
    "s3_key",
    "blob_key",
    "key_path",
    "storage_path",
    "object_path",
    "bucket",
];

/// Keys naming the agent behind a record.
const AGENT_IDENTITY_FIELDS: [&str; 5] = [
    "agent",
    "agent_name",
    "agent_handle",
    "agent_identity",
    "author_agent",
];

/// Correlation ids that only order events within a conversation.
const BENIGN_ID_FIELDS: [&str; 5] = ["turn_id", "round_id", "slot_id", "role_id", "beat_id"];

fn is_redacted_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    let key = key.as_str();
    if STORAGE_KEY_FIELDS.contains(&key) || AGENT_IDENTITY_FIELDS.contains(&key) {
        return true;
    }
    key.ends_with("_id") && !BENIGN_ID_FIELDS.contains(&key)
}

/// Blank id-only strings and storage paths; cut embedded ids out of the rest.
fn scrub_string(s: &mut String) {
    if looks_like_uuid(s) {
        s.clear();
        return;
    }
    // paths are checked after stripping so a removed id cannot splice one together
    let replacement = match strip_uuids(s) {
        stripped if contains_storage_path(&stripped) => Some(String::new()),
        Cow::Owned(stripped) => Some(stripped),
        Cow::Borrowed(_) => None,
    };
    if let Some(replacement) = replacement {
        *s = replacement;
    }
}

/// Structurally scrub a decoded JSON value.
///
/// Output never contains a UUID-shaped substring, a storage path, or a key
/// flagged by the key rules. Applying it twice yields the same value.
pub fn scrub(mut value: Value) -> Value {
    scrub_in_place(&mut value);
    value
}

pub fn scrub_in_place(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|key, _| !is_redacted_key(key));
            for child in map.values_mut() {
                scrub_in_place(child);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                scrub_in_place(item);
            }
        }
        Value::String(s) => scrub_string(s),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}
