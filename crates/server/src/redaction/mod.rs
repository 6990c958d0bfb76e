//! Redaction of internal identifiers before stored payloads reach public or
//! cross-tenant responses.
//!
//! - [`scrub`] removes identifier-bearing keys and blanks identifier-shaped strings.
//! - [`preview`] derives a short, sanitized text snippet from a raw payload.
//! - [`thread_relation`] labels a post's position in its thread without
//!   exposing the reference ids it was derived from.
//!
//! None of these fail: unparseable input degrades to a raw-text preview, an
//! `unknown` label or a `null` body.

mod patterns;
mod preview;
mod scrub;
mod thread;

pub use preview::{ELLIPSIS, PREVIEW_MAX_CHARS, preview, sanitize_text};
pub use scrub::{scrub, scrub_in_place};
pub use thread::{ThreadRelation, strip_thread_refs, thread_relation, thread_relation_from_raw};

use crate::security::secure_parse_json_slice;
use serde::Serialize;
use serde_json::Value;

/// A stored payload in the shape that may leave the trust boundary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicPayload {
    pub preview: String,
    pub relation: ThreadRelation,
    /// Scrubbed body, `null` when the payload was not valid JSON.
    pub body: Value,
}

/// Run every redaction step over one raw payload blob.
pub fn redact_public(raw: &[u8]) -> PublicPayload {
    let parsed = secure_parse_json_slice(raw).ok();
    let relation = parsed
        .as_ref()
        .map(thread_relation)
        .unwrap_or(ThreadRelation::Unknown);
    let body = match parsed {
        Some(mut value) => {
            strip_thread_refs(&mut value);
            scrub(value)
        }
        None => Value::Null,
    };
    PublicPayload {
        preview: preview(raw),
        relation,
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn public_payload_carries_no_identifiers() {
        let raw = br#"{
            "text": "posted to topics/9f1c/entries by 0b6f7c1e-3c7e-4b1f-9a51-2d1e6f0a9b42",
            "agent_id": "0b6f7c1e-3c7e-4b1f-9a51-2d1e6f0a9b42",
            "turn_id": 4,
            "metadata": {"reply_to": "m-2", "thread_root": "m-1"}
        }"#;
        let public = redact_public(raw);
        assert_eq!(public.preview, "posted to by");
        assert_eq!(public.relation, ThreadRelation::NestedReply);
        assert!(public.body.get("agent_id").is_none());
        assert_eq!(public.body["turn_id"], 4);
        assert_eq!(public.body["text"], "");

        let serialized = serde_json::to_string(&public).unwrap();
        assert!(!serialized.contains("0b6f7c1e"));
        assert!(!serialized.contains("m-2"));
    }

    #[test]
    fn embedded_ids_are_cut_from_public_body() {
        let raw = br#"{"text": "reviewed by 0b6f7c1e-3c7e-4b1f-9a51-2d1e6f0a9b42 today"}"#;
        let public = redact_public(raw);
        assert_eq!(public.body["text"], "reviewed by  today");
        assert_eq!(public.preview, "reviewed by today");
        let serialized = serde_json::to_string(&public).unwrap();
        assert!(!serialized.contains("0b6f7c1e"));
    }

    #[test]
    fn invalid_json_degrades_instead_of_failing() {
        let public = redact_public(b"plain text, not json");
        assert_eq!(public.preview, "plain text, not json");
        assert_eq!(public.relation, ThreadRelation::Unknown);
        assert_eq!(public.body, Value::Null);
    }

    #[test]
    fn body_is_scrubbed_recursively() {
        let public = redact_public(
            serde_json::to_vec(&json!({"data": {"items": [{"object_key": "x", "ok": true}]}}))
                .unwrap()
                .as_slice(),
        );
        assert_eq!(public.body, json!({"data": {"items": [{"ok": true}]}}));
    }
}
