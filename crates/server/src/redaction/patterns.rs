use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

/// Internal resource namespaces whose storage paths must never be shown.
pub(crate) const INTERNAL_NAMESPACES: [&str; 6] =
    ["topics", "manifests", "agents", "runs", "sessions", "artifacts"];

const UUID: &str = r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}";

pub(crate) static UUID_EXACT: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^\s*{UUID}\s*$")).expect("static regex"));

// Unanchored: ids glued to words (`job_<uuid>`, `<uuid>_log`) must still match.
pub(crate) static UUID_ANYWHERE: Lazy<Regex> =
    Lazy::new(|| Regex::new(UUID).expect("static regex"));

pub(crate) static STORAGE_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)(?:s3://\S+|\b(?:{})/[\w.\-/]*)",
        INTERNAL_NAMESPACES.join("|")
    ))
    .expect("static regex")
});

pub(crate) fn looks_like_uuid(s: &str) -> bool {
    UUID_EXACT.is_match(s)
}

pub(crate) fn contains_storage_path(s: &str) -> bool {
    STORAGE_PATH.is_match(s)
}

/// Remove every UUID-shaped substring, including ones formed by joining the
/// text around a removed id.
pub(crate) fn strip_uuids(s: &str) -> Cow<'_, str> {
    let mut out = UUID_ANYWHERE.replace_all(s, "");
    while UUID_ANYWHERE.is_match(&out) {
        out = Cow::Owned(UUID_ANYWHERE.replace_all(&out, "").into_owned());
    }
    out
}
