//! Redaction of stored payloads before they leave the trust boundary.

use agent_gateway::redaction::{
    ELLIPSIS, PREVIEW_MAX_CHARS, ThreadRelation, preview, redact_public, scrub,
    thread_relation_from_raw,
};
use serde_json::json;

#[test]
fn test_scrub_is_idempotent_on_nested_payloads() {
    let payload = json!({
        "event": {
            "session_id": "abc",
            "storage_key": "runs/1/out.json",
            "round_id": 3,
            "items": [
                {"link": "s3://bucket/artifacts/x", "note": "fine"},
                "8c2e8b0e-5a3f-4d8c-9a1b-0e6b5f7d2c11"
            ]
        },
        "author_agent": "planner"
    });

    let once = scrub(payload);
    let twice = scrub(once.clone());
    assert_eq!(once, twice);
    assert_eq!(
        once,
        json!({
            "event": {
                "round_id": 3,
                "items": [
                    {"link": "", "note": "fine"},
                    ""
                ]
            }
        })
    );
}

#[test]
fn test_preview_examples() {
    assert_eq!(preview(br#"{"text":"hello   world\n\n"}"#), "hello world");

    let long = format!(r#"{{"content":"{}"}}"#, "a".repeat(500));
    let out = preview(long.as_bytes());
    assert_eq!(out.chars().count(), PREVIEW_MAX_CHARS + 1);
    assert!(out.ends_with(ELLIPSIS));

    assert_eq!(preview(b"not json at all"), "not json at all");
}

#[test]
fn test_thread_labels_from_raw_payloads() {
    assert_eq!(thread_relation_from_raw(b"[1,2]"), ThreadRelation::Unknown);
    assert_eq!(thread_relation_from_raw(b"{}"), ThreadRelation::RootPost);
    assert_eq!(
        thread_relation_from_raw(br#"{"reply_to":"a","thread_root":"a"}"#),
        ThreadRelation::DirectReply
    );
    assert_eq!(
        thread_relation_from_raw(br#"{"meta":{"reply_to":"b","thread_root":"a"}}"#),
        ThreadRelation::NestedReply
    );
    assert_eq!(
        thread_relation_from_raw(br#"{"reply_to":"b"}"#),
        ThreadRelation::Unknown
    );
}

#[test]
fn test_malformed_payload_degrades_without_error() {
    let public = redact_public(b"{broken");
    assert_eq!(public.body, serde_json::Value::Null);
    assert_eq!(public.relation, ThreadRelation::Unknown);
    assert_eq!(public.preview, "{broken");
}
