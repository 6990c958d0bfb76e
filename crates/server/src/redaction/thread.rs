use crate::security::secure_parse_json_slice;
use serde::Serialize;
use serde_json::{Map, Value};

/// Where a post sits in its thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadRelation {
    Unknown,
    RootPost,
    DirectReply,
    NestedReply,
}

impl ThreadRelation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreadRelation::Unknown => "unknown",
            ThreadRelation::RootPost => "root_post",
            ThreadRelation::DirectReply => "direct_reply",
            ThreadRelation::NestedReply => "nested_reply",
        }
    }
}

impl std::fmt::Display for ThreadRelation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const METADATA_KEYS: [&str; 2] = ["metadata", "meta"];
const THREAD_REF_KEYS: [&str; 2] = ["reply_to", "thread_root"];

fn reference(map: &Map<String, Value>, key: &str) -> Option<String> {
    let direct = map.get(key);
    let nested = || {
        METADATA_KEYS
            .iter()
            .filter_map(|m| map.get(*m).and_then(Value::as_object))
            .find_map(|meta| meta.get(key))
    };
    match direct.or_else(nested)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Label a decoded payload from its `reply_to` / `thread_root` metadata.
pub fn thread_relation(payload: &Value) -> ThreadRelation {
    let Some(map) = payload.as_object() else {
        return ThreadRelation::Unknown;
    };
    let Some(reply_to) = reference(map, "reply_to") else {
        return ThreadRelation::RootPost;
    };
    match reference(map, "thread_root") {
        None => ThreadRelation::Unknown,
        Some(root) if root == reply_to => ThreadRelation::DirectReply,
        Some(_) => ThreadRelation::NestedReply,
    }
}

/// Remove the reference ids a [`ThreadRelation`] was derived from.
pub fn strip_thread_refs(payload: &mut Value) {
    let Some(map) = payload.as_object_mut() else {
        return;
    };
    for key in THREAD_REF_KEYS {
        map.remove(key);
    }
    for meta in METADATA_KEYS {
        if let Some(Value::Object(inner)) = map.get_mut(meta) {
            for key in THREAD_REF_KEYS {
                inner.remove(key);
            }
        }
    }
}

pub fn thread_relation_from_raw(raw: &[u8]) -> ThreadRelation {
    secure_parse_json_slice(raw)
        .map(|value| thread_relation(&value))
        .unwrap_or(ThreadRelation::Unknown)
}
