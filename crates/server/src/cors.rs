//! Origin admission control for cross-origin browser callers.
//!
//! The decision is a pure function of the `Origin` header and the host the
//! request was addressed to. Only preflights are answered here; for simple
//! requests a denied origin merely receives no CORS headers and the browser
//! withholds the response from the calling page.

use axum::{
    extract::Request,
    http::{
        HeaderMap, HeaderValue, Method, StatusCode,
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE, ACCESS_CONTROL_REQUEST_HEADERS,
            HOST, ORIGIN, VARY,
        },
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use url::{Host, Url};

pub const ALLOWED_METHODS: &str = "GET, POST, PUT, PATCH, DELETE, OPTIONS";
pub const DEFAULT_ALLOWED_HEADERS: &str = "Authorization, Content-Type";
pub const MAX_AGE_SECS: &str = "600";
const VARY_VALUE: &str = "Origin, Access-Control-Request-Method, Access-Control-Request-Headers";

const LOOPBACK_HOSTS: [&str; 3] = ["localhost", "127.0.0.1", "::1"];

/// Decide whether `origin` may read responses served for `request_host`.
///
/// Rules, first match wins:
/// 1. the origin's hostname equals the request hostname (scheme and port ignored);
/// 2. `http`/`https` origins on a loopback hostname;
/// 3. `capacitor`/`ionic` webview origins on `localhost`.
pub fn decide(origin: &str, request_host: &str) -> bool {
    let Ok(url) = Url::parse(origin.trim()) else {
        return false;
    };
    let Some(origin_host) = normalized_host(&url) else {
        return false;
    };

    if hostname_of(request_host).is_some_and(|own| own == origin_host) {
        return true;
    }

    match url.scheme() {
        "http" | "https" => LOOPBACK_HOSTS.contains(&origin_host.as_str()),
        "capacitor" | "ionic" => origin_host == "localhost",
        _ => false,
    }
}

fn normalized_host(url: &Url) -> Option<String> {
    match url.host()? {
        Host::Domain(domain) if !domain.is_empty() => Some(domain.to_ascii_lowercase()),
        Host::Domain(_) => None,
        Host::Ipv4(addr) => Some(addr.to_string()),
        Host::Ipv6(addr) => Some(addr.to_string()),
    }
}

/// Strip the port (and IPv6 brackets) from a `Host` header value.
pub fn hostname_of(host: &str) -> Option<String> {
    let host = host.trim();
    if host.is_empty() {
        return None;
    }
    let url = Url::parse(&format!("http://{host}")).ok()?;
    normalized_host(&url)
}

fn request_host(request: &Request) -> Option<String> {
    request
        .headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| request.uri().authority().map(|a| a.to_string()))
}

fn apply_allow_headers(
    headers: &mut HeaderMap,
    origin: HeaderValue,
    requested_headers: Option<HeaderValue>,
) {
    headers.insert(VARY, HeaderValue::from_static(VARY_VALUE));
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static(MAX_AGE_SECS));
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        requested_headers
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_ALLOWED_HEADERS)),
    );
}

/// Axum middleware applying [`decide`] to every request carrying an `Origin`.
pub async fn origin_guard(request: Request, next: Next) -> Response {
    let Some(origin) = request.headers().get(ORIGIN).cloned() else {
        return next.run(request).await;
    };

    let host = request_host(&request).unwrap_or_default();
    let allowed = origin
        .to_str()
        .map(|o| decide(o, &host))
        .unwrap_or(false);
    let requested_headers = request.headers().get(ACCESS_CONTROL_REQUEST_HEADERS).cloned();

    if request.method() == Method::OPTIONS {
        if !allowed {
            tracing::debug!(origin = ?origin, host = %host, "rejected CORS preflight");
            return (StatusCode::FORBIDDEN, "origin not allowed").into_response();
        }
        let mut response = StatusCode::NO_CONTENT.into_response();
        apply_allow_headers(response.headers_mut(), origin, requested_headers);
        return response;
    }

    let mut response = next.run(request).await;
    if allowed {
        apply_allow_headers(response.headers_mut(), origin, requested_headers);
    }
    response
}
