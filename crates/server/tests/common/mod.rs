//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use agent_gateway::{
    AppResources,
    api::build_router,
    audit::MemoryAuditSink,
    config::{AppConfig, OAuthConfig, ProviderConfig, RateLimitConfig},
    oauth2::provider::build_http_client,
    rate_limit::RateGate,
};
use axum::{Router, extract::connect_info::MockConnectInfo};
use axum_test::TestServer;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbBackend, Statement};
use std::net::SocketAddr;
use std::sync::Arc;

pub const PEPPER: &str = "integration-test-pepper-0123456789abcdef";

/// In-memory database with the gateway tables.
pub async fn create_gateway_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.expect("connect");

    db.execute(Statement::from_string(
        DbBackend::Sqlite,
        r#"CREATE TABLE gateway_user (
            id TEXT PRIMARY KEY,
            created_at TEXT NOT NULL,
            last_login_at TEXT NULL
        );"#,
    ))
    .await
    .expect("create gateway_user table");

    db.execute(Statement::from_string(
        DbBackend::Sqlite,
        r#"CREATE TABLE gateway_identity (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES gateway_user(id) ON DELETE CASCADE,
            provider TEXT NOT NULL,
            subject TEXT NOT NULL,
            login TEXT NOT NULL,
            display_name TEXT NULL,
            avatar_url TEXT NULL,
            profile_url TEXT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(provider, subject)
        );"#,
    ))
    .await
    .expect("create gateway_identity table");

    db.execute(Statement::from_string(
        DbBackend::Sqlite,
        r#"CREATE TABLE gateway_api_key (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES gateway_user(id) ON DELETE CASCADE,
            key_prefix TEXT NOT NULL,
            key_hash TEXT NOT NULL,
            created_at TEXT NOT NULL,
            last_used_at TEXT NULL
        );"#,
    ))
    .await
    .expect("create gateway_api_key table");

    db
}

/// Configuration pointing the GitHub provider at `provider_base` (a wiremock URI).
pub fn test_config(provider_base: &str) -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        bind_address: "127.0.0.1:0".into(),
        public_base_url: None,
        settings_path: "/settings".into(),
        api_key_pepper: PEPPER.into(),
        oauth: OAuthConfig {
            require_pkce: false,
            provider_timeout_ms: 10_000,
            callback_timeout_ms: 15_000,
            github: ProviderConfig {
                client_id: "test-client".into(),
                client_secret: "test-secret".into(),
                authorize_url: format!("{provider_base}/login/oauth/authorize"),
                token_url: format!("{provider_base}/login/oauth/access_token"),
                user_url: format!("{provider_base}/user"),
                scope: "read:user".into(),
            },
        },
        rate_limit: RateLimitConfig::default(),
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub audit: Arc<MemoryAuditSink>,
    pub resources: AppResources,
}

pub async fn spawn_app(config: AppConfig) -> TestApp {
    spawn_app_with_gate(config.clone(), Arc::new(RateGate::new(&config.rate_limit))).await
}

pub async fn spawn_app_with_gate(config: AppConfig, gate: Arc<RateGate>) -> TestApp {
    let db = Arc::new(create_gateway_test_db().await);
    let audit = Arc::new(MemoryAuditSink::default());
    let resources = AppResources::new(db, Arc::new(config), audit.clone());
    let oauth = resources.oauth_state(build_http_client().expect("http client"));

    let router: Router = build_router(resources.clone(), oauth, gate)
        .layer(MockConnectInfo(SocketAddr::from(([203, 0, 113, 7], 40000))));
    let server = TestServer::new(router).expect("test server");

    TestApp {
        server,
        audit,
        resources,
    }
}
