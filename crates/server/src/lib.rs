//! Trust and access boundary of the agent platform API.
//!
//! Browser sign-in through external OAuth providers, API key issuance and
//! verification, cross-origin admission, per-peer throttling, and redaction
//! of stored payloads before they reach public surfaces.

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::audit::AuditSink;
use crate::config::AppConfig;
use crate::oauth2::IdentityFederationStore;

pub mod api;
pub mod audit;
pub mod config;
pub mod cors;
pub mod entity;
pub mod error;
pub mod oauth2;
pub mod rate_limit;
pub mod redaction;
pub mod security;

#[derive(Clone, Debug)]
pub struct AppResources {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub identity: IdentityFederationStore,
    pub audit: Arc<dyn AuditSink>,
}

impl AppResources {
    pub fn new(db: Arc<DatabaseConnection>, config: Arc<AppConfig>, audit: Arc<dyn AuditSink>) -> Self {
        let identity = IdentityFederationStore::new(db.clone(), &config.api_key_pepper);
        Self {
            db,
            config,
            identity,
            audit,
        }
    }

    /// State for the sign-in handlers, sharing this store and audit sink.
    pub fn oauth_state(&self, http: reqwest::Client) -> oauth2::OAuth2State {
        oauth2::OAuth2State::new(
            self.identity.clone(),
            http,
            self.config.clone(),
            self.audit.clone(),
        )
    }
}
