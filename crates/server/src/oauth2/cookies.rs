//! Handshake cookies.
//!
//! Both cookies are short-lived, HTTP-only and `SameSite=Lax` so they survive
//! the top-level redirect back from the provider.

use axum::http::{HeaderMap, HeaderValue, header::COOKIE};

pub const STATE_COOKIE: &str = "agw_oauth_state";
pub const PKCE_COOKIE: &str = "agw_oauth_pkce";
pub const HANDSHAKE_MAX_AGE_SECS: u32 = 600;

/// Find a cookie value by name across every `Cookie` header.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| k.trim() == name)
        .map(|(_, v)| v.trim().trim_matches('"').to_string())
        .filter(|v| !v.is_empty())
}

fn build(name: &str, value: &str, max_age: u32, secure: bool) -> Option<HeaderValue> {
    let mut cookie =
        format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).ok()
}

/// `Set-Cookie` value storing a handshake secret.
pub fn set_cookie(name: &str, value: &str, secure: bool) -> Option<HeaderValue> {
    build(name, value, HANDSHAKE_MAX_AGE_SECS, secure)
}

/// `Set-Cookie` value deleting a handshake cookie.
pub fn clear_cookie(name: &str, secure: bool) -> Option<HeaderValue> {
    build(name, "", 0, secure)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_named_cookie_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; agw_oauth_state=abc123; agw_oauth_pkce=v"),
        );
        assert_eq!(read_cookie(&headers, STATE_COOKIE).as_deref(), Some("abc123"));
        assert_eq!(read_cookie(&headers, PKCE_COOKIE).as_deref(), Some("v"));
        assert_eq!(read_cookie(&headers, "missing"), None);
    }

    #[test]
    fn empty_values_count_as_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("agw_oauth_state="));
        assert_eq!(read_cookie(&headers, STATE_COOKIE), None);
    }

    #[test]
    fn cookie_attributes() {
        let set = set_cookie(STATE_COOKIE, "tok", true).unwrap();
        assert_eq!(
            set.to_str().unwrap(),
            "agw_oauth_state=tok; Path=/; HttpOnly; SameSite=Lax; Max-Age=600; Secure"
        );
        let clear = clear_cookie(PKCE_COOKIE, false).unwrap();
        assert_eq!(
            clear.to_str().unwrap(),
            "agw_oauth_pkce=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"
        );
    }
}
