//! Origin guard behaviour through the full router.

mod common;

use axum::http::{
    HeaderName, HeaderValue, Method, StatusCode,
    header::{
        ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
        ACCESS_CONTROL_MAX_AGE, ACCESS_CONTROL_REQUEST_HEADERS, ACCESS_CONTROL_REQUEST_METHOD,
        HOST, ORIGIN, VARY,
    },
};
use common::{spawn_app, test_config};

fn api_host() -> HeaderValue {
    HeaderValue::from_static("api.example.com")
}

#[tokio::test]
async fn preflight_from_same_host_is_answered() {
    let app = spawn_app(test_config("http://127.0.0.1:9")).await;
    let response = app
        .server
        .method(Method::OPTIONS, "/v1/me")
        .add_header(HOST, api_host())
        .add_header(ORIGIN, HeaderValue::from_static("https://api.example.com"))
        .add_header(
            ACCESS_CONTROL_REQUEST_METHOD,
            HeaderValue::from_static("GET"),
        )
        .add_header(
            ACCESS_CONTROL_REQUEST_HEADERS,
            HeaderValue::from_static("authorization, x-trace"),
        )
        .await;

    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);
    let headers = response.headers();
    assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "https://api.example.com");
    assert_eq!(
        headers[ACCESS_CONTROL_ALLOW_METHODS],
        "GET, POST, PUT, PATCH, DELETE, OPTIONS"
    );
    assert_eq!(headers[ACCESS_CONTROL_ALLOW_HEADERS], "authorization, x-trace");
    assert_eq!(headers[ACCESS_CONTROL_MAX_AGE], "600");
    assert_eq!(
        headers[VARY],
        "Origin, Access-Control-Request-Method, Access-Control-Request-Headers"
    );
}

#[tokio::test]
async fn preflight_from_foreign_origin_is_forbidden() {
    let app = spawn_app(test_config("http://127.0.0.1:9")).await;
    let response = app
        .server
        .method(Method::OPTIONS, "/v1/me")
        .add_header(HOST, api_host())
        .add_header(ORIGIN, HeaderValue::from_static("https://evil.example"))
        .await;

    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    assert_eq!(response.text(), "origin not allowed");
    assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}

#[tokio::test]
async fn loopback_dev_server_gets_default_allow_headers() {
    let app = spawn_app(test_config("http://127.0.0.1:9")).await;
    let response = app
        .server
        .method(Method::OPTIONS, "/healthz")
        .add_header(HOST, api_host())
        .add_header(ORIGIN, HeaderValue::from_static("http://localhost:5173"))
        .await;

    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);
    assert_eq!(
        response.headers()[ACCESS_CONTROL_ALLOW_HEADERS],
        "Authorization, Content-Type"
    );
}

#[tokio::test]
async fn simple_request_from_foreign_origin_still_reaches_handler() {
    let app = spawn_app(test_config("http://127.0.0.1:9")).await;
    let response = app
        .server
        .get("/healthz")
        .add_header(HOST, api_host())
        .add_header(ORIGIN, HeaderValue::from_static("https://evil.example"))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.text(), "ok");
    assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}

#[tokio::test]
async fn simple_request_from_allowed_origin_gets_headers() {
    let app = spawn_app(test_config("http://127.0.0.1:9")).await;
    let response = app
        .server
        .get("/healthz")
        .add_header(HOST, api_host())
        .add_header(ORIGIN, HeaderValue::from_static("capacitor://localhost"))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(
        response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN],
        "capacitor://localhost"
    );
}

#[tokio::test]
async fn requests_without_origin_are_untouched() {
    let app = spawn_app(test_config("http://127.0.0.1:9")).await;
    let response = app
        .server
        .get("/healthz")
        .add_header(HOST, api_host())
        .add_header(
            HeaderName::from_static("x-unrelated"),
            HeaderValue::from_static("1"),
        )
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert!(response.headers().get(VARY).is_none());
    assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}
