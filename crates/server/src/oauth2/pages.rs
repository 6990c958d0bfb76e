//! HTML pages rendered at the end of a sign-in attempt.

use axum::{
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, REFERRER_POLICY},
    },
    response::{Html, IntoResponse, Response},
};

/// `localStorage` key the web app reads the API key from.
pub const STORAGE_KEY: &str = "agentGatewayApiKey";

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Encode `value` as a JSON string literal safe to place inside `<script>`.
pub fn script_string_literal(value: &str) -> String {
    let json = serde_json::Value::String(value.to_string()).to_string();
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            _ => out.push(c),
        }
    }
    out
}

fn with_sensitive_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(REFERRER_POLICY, HeaderValue::from_static("no-referrer"));
    response
}

pub fn render_error(status: StatusCode, message: &str) -> Response {
    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Sign-in failed - Agent Gateway</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
</head>
<body>
    <main>
        <h1>Sign-in failed</h1>
        <p>{}</p>
        <p><a href="/">Return to homepage</a></p>
    </main>
</body>
</html>"#,
        escape_html(message)
    );
    with_sensitive_headers((status, Html(html)).into_response())
}

/// Page that stores the freshly issued key in the browser and moves on.
///
/// The key appears only in this response body; it is never placed in a URL.
pub fn render_success(api_key: &str, redirect_to: &str) -> Response {
    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Signed in - Agent Gateway</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
</head>
<body>
    <main>
        <h1>Signed in</h1>
        <p>Redirecting&hellip;</p>
    </main>
    <script>
        (function () {{
            var key = {key};
            var next = {next};
            try {{ window.localStorage.setItem({storage}, key); }} catch (e) {{}}
            window.location.replace(next);
        }})();
    </script>
</body>
</html>"#,
        key = script_string_literal(api_key),
        next = script_string_literal(redirect_to),
        storage = script_string_literal(STORAGE_KEY),
    );
    with_sensitive_headers((StatusCode::OK, Html(html)).into_response())
}
