use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Largest accepted rate-limit window (one week).
pub const MAX_WINDOW_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Credentials and endpoints for the GitHub-compatible identity provider.
#[derive(Clone, Debug, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_github_authorize_url")]
    pub authorize_url: String,
    #[serde(default = "default_github_token_url")]
    pub token_url: String,
    #[serde(default = "default_github_user_url")]
    pub user_url: String,
    #[serde(default = "default_github_scope")]
    pub scope: String,
}

impl ProviderConfig {
    /// Both halves of the client credential must be present before a handshake can start.
    pub fn is_configured(&self) -> bool {
        !self.client_id.trim().is_empty() && !self.client_secret.trim().is_empty()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            authorize_url: default_github_authorize_url(),
            token_url: default_github_token_url(),
            user_url: default_github_user_url(),
            scope: default_github_scope(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct OAuthConfig {
    /// Fail the callback when the PKCE verifier cookie is missing instead of
    /// exchanging the code without it.
    #[serde(default)]
    pub require_pkce: bool,
    /// Timeout for each call to the provider.
    #[serde(default = "default_provider_timeout_ms")]
    pub provider_timeout_ms: u64,
    /// Budget for the whole callback, provider calls and store included.
    #[serde(default = "default_callback_timeout_ms")]
    pub callback_timeout_ms: u64,
    #[serde(default)]
    pub github: ProviderConfig,
}

impl OAuthConfig {
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }

    pub fn callback_timeout(&self) -> Duration {
        Duration::from_millis(self.callback_timeout_ms)
    }
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            require_pkce: false,
            provider_timeout_ms: default_provider_timeout_ms(),
            callback_timeout_ms: default_callback_timeout_ms(),
            github: ProviderConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_requests_per_window")]
    pub requests_per_window: u32,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Upper bound on tracked sources.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Requests whose path contains one of these fragments skip throttling.
    #[serde(default = "default_exempt_path_fragments")]
    pub exempt_path_fragments: Vec<String>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: default_requests_per_window(),
            window_secs: default_window_secs(),
            max_entries: default_max_entries(),
            sweep_interval_secs: default_sweep_interval_secs(),
            exempt_path_fragments: default_exempt_path_fragments(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Externally visible origin (e.g. `https://api.example.com`). When set it
    /// takes precedence over forwarded headers for building callback URLs.
    #[serde(default)]
    pub public_base_url: Option<String>,
    /// Where the success page sends the browser after storing the key.
    #[serde(default = "default_settings_path")]
    pub settings_path: String,
    /// Server-side secret mixed into every API key hash.
    pub api_key_pepper: String,
    #[serde(default)]
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_settings_path() -> String {
    "/settings".to_string()
}

fn default_github_authorize_url() -> String {
    "https://github.com/login/oauth/authorize".to_string()
}

fn default_github_token_url() -> String {
    "https://github.com/login/oauth/access_token".to_string()
}

fn default_github_user_url() -> String {
    "https://api.github.com/user".to_string()
}

fn default_github_scope() -> String {
    "read:user".to_string()
}

fn default_provider_timeout_ms() -> u64 {
    10_000
}

fn default_callback_timeout_ms() -> u64 {
    15_000
}

fn default_requests_per_window() -> u32 {
    120
}

fn default_window_secs() -> u64 {
    60
}

fn default_max_entries() -> usize {
    100_000
}

fn default_sweep_interval_secs() -> u64 {
    300
}

fn default_exempt_path_fragments() -> Vec<String> {
    vec!["/stream".to_string()]
}

impl AppConfig {
    /// Check invariants that serde defaults cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key_pepper.len() < 32 {
            return Err(ConfigError::Validation(
                "api_key_pepper must be at least 32 characters".into(),
            ));
        }
        if self.rate_limit.requests_per_window == 0 {
            return Err(ConfigError::Validation(
                "rate_limit.requests_per_window must be > 0".into(),
            ));
        }
        if self.rate_limit.window_secs == 0 || self.rate_limit.window_secs > MAX_WINDOW_SECS {
            return Err(ConfigError::Validation(format!(
                "rate_limit.window_secs must be between 1 and {MAX_WINDOW_SECS}"
            )));
        }
        if self.oauth.provider_timeout_ms == 0 || self.oauth.callback_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "oauth timeouts must be > 0".into(),
            ));
        }
        if self.rate_limit.max_entries == 0 {
            return Err(ConfigError::Validation(
                "rate_limit.max_entries must be > 0".into(),
            ));
        }
        if !self.settings_path.starts_with('/') || self.settings_path.starts_with("//") {
            return Err(ConfigError::Validation(
                "settings_path must be a same-origin absolute path".into(),
            ));
        }
        if let Some(base) = &self.public_base_url {
            let parsed = url::Url::parse(base)
                .map_err(|e| ConfigError::Validation(format!("public_base_url: {e}")))?;
            if parsed.host_str().is_none() {
                return Err(ConfigError::Validation(
                    "public_base_url must include a host".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Load application configuration from `config.yaml` + environment overrides.
///
/// Environment variables use double underscores as the key path separator,
/// e.g. `OAUTH__GITHUB__CLIENT_SECRET` or `RATE_LIMIT__WINDOW_SECS`.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    use config::{Config, Environment, File};
    let cfg = Config::builder()
        .add_source(File::with_name("config.yaml").required(false))
        .add_source(Environment::default().separator("__"))
        .build()?;

    let app: AppConfig = cfg.try_deserialize()?;
    app.validate()?;
    Ok(app)
}

/// Convenience helper for binaries wanting panic-on-error behaviour.
pub fn load_config_or_panic() -> AppConfig {
    match load_config() {
        Ok(c) => c,
        Err(e) => panic!("Failed to load configuration: {e}"),
    }
}
