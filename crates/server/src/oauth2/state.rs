//! Shared state for the sign-in handlers.

use crate::audit::AuditSink;
use crate::config::AppConfig;
use crate::oauth2::identity::IdentityFederationStore;
use crate::oauth2::provider::ProviderClient;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct OAuth2State {
    pub store: IdentityFederationStore,
    pub github: ProviderClient,
    pub config: Arc<AppConfig>,
    pub audit: Arc<dyn AuditSink>,
}

impl OAuth2State {
    pub fn new(
        store: IdentityFederationStore,
        http: reqwest::Client,
        config: Arc<AppConfig>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            store,
            github: ProviderClient::new(
                http,
                config.oauth.github.clone(),
                config.oauth.provider_timeout(),
            ),
            config,
            audit,
        }
    }
}
