use super::patterns::{STORAGE_PATH, strip_uuids};
use crate::security::SecureJsonParser;
use serde_json::Value;

pub const PREVIEW_MAX_CHARS: usize = 200;
pub const ELLIPSIS: &str = "…";

/// Text-bearing fields, searched in this order before any container.
const TEXT_KEYS: [&str; 8] = [
    "text", "content", "message", "body", "summary", "title", "prompt", "output",
];
const CONTAINER_KEYS: [&str; 3] = ["payload", "data", "event"];

const MAX_SEARCH_DEPTH: usize = 16;

/// Build a short human-readable preview of a raw payload.
pub fn preview(raw: &[u8]) -> String {
    let parsed = SecureJsonParser::default().parse_from_slice(raw).ok();
    let text = parsed
        .as_ref()
        .and_then(|value| find_text(value, 0))
        .map(str::to_owned)
        .unwrap_or_else(|| String::from_utf8_lossy(raw).into_owned());
    sanitize_text(&text)
}

fn find_text(value: &Value, depth: usize) -> Option<&str> {
    if depth > MAX_SEARCH_DEPTH {
        return None;
    }
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.as_str()),
        Value::Object(map) => TEXT_KEYS
            .iter()
            .chain(CONTAINER_KEYS.iter())
            .filter_map(|key| map.get(*key))
            .find_map(|child| find_text(child, depth + 1)),
        Value::Array(items) => items.iter().find_map(|item| find_text(item, depth + 1)),
        _ => None,
    }
}

/// Strip identifiers, collapse whitespace and cap the length of `text`.
pub fn sanitize_text(text: &str) -> String {
    let without_ids = strip_uuids(text);
    let without_paths = STORAGE_PATH.replace_all(&without_ids, "");
    let cleaned = strip_uuids(&without_paths);
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= PREVIEW_MAX_CHARS {
        return collapsed;
    }
    let mut truncated: String = collapsed.chars().take(PREVIEW_MAX_CHARS).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}
