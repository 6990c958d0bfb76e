//! Client for the GitHub-compatible identity provider.
//!
//! Two calls per sign-in: the authorization-code exchange and the profile
//! fetch. Bodies are parsed with size and depth limits and validated before
//! anything reaches the identity store.

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::oauth2::identity::ProfileFields;
use crate::security::SecureJsonParser;
use reqwest::header::ACCEPT;
use serde_json::Value;
use std::time::Duration;

/// Client-wide default; each request overrides it with the configured provider timeout.
pub const PROVIDER_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_PROVIDER_BODY: usize = 64 * 1024;
const MAX_PROVIDER_DEPTH: usize = 16;

const TOKEN_ENDPOINT: &str = "token";
const PROFILE_ENDPOINT: &str = "profile";

/// Shared outbound client. Cloning is cheap.
pub fn build_http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(concat!("agent-gateway/", env!("CARGO_PKG_VERSION")))
        .timeout(PROVIDER_REQUEST_TIMEOUT)
        .build()
}

/// Profile as returned by the provider, already validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    /// Immutable numeric account id, as a string.
    pub subject: String,
    pub fields: ProfileFields,
}

pub struct TokenExchange<'a> {
    pub code: &'a str,
    pub redirect_uri: &'a str,
    pub code_verifier: Option<&'a str>,
}

#[derive(Clone)]
pub struct ProviderClient {
    http: reqwest::Client,
    config: ProviderConfig,
    timeout: Duration,
}

impl std::fmt::Debug for ProviderClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderClient")
            .field("token_url", &self.config.token_url)
            .field("user_url", &self.config.user_url)
            .finish_non_exhaustive()
    }
}

fn map_send_error(endpoint: &'static str, err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout { endpoint }
    } else {
        ProviderError::Transport {
            endpoint,
            source: err,
        }
    }
}

async fn read_json(
    endpoint: &'static str,
    response: reqwest::Response,
) -> Result<Value, ProviderError> {
    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::Status {
            endpoint,
            status: status.as_u16(),
        });
    }
    let body = response
        .bytes()
        .await
        .map_err(|e| map_send_error(endpoint, e))?;
    SecureJsonParser::new(MAX_PROVIDER_BODY, MAX_PROVIDER_DEPTH)
        .parse_from_slice(&body)
        .map_err(|e| ProviderError::Malformed {
            endpoint,
            reason: e.to_string(),
        })
}

/// Pull the access token out of a token endpoint body.
///
/// The provider reports failures such as `bad_verification_code` with HTTP 200
/// and an `error` field, so the field is checked before the token.
pub fn access_token_from(body: &Value) -> Result<String, ProviderError> {
    if let Some(code) = body.get("error").and_then(Value::as_str) {
        return Err(ProviderError::Rejected {
            endpoint: TOKEN_ENDPOINT,
            code: code.to_string(),
        });
    }
    body.get("access_token")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ProviderError::Malformed {
            endpoint: TOKEN_ENDPOINT,
            reason: "missing access_token".into(),
        })
}

fn optional_string(body: &Value, key: &str) -> Option<String> {
    body.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Validate a profile body: a non-zero numeric `id` and a non-empty `login`.
pub fn profile_from(body: &Value) -> Result<ProviderProfile, ProviderError> {
    let malformed = |reason: &str| ProviderError::Malformed {
        endpoint: PROFILE_ENDPOINT,
        reason: reason.to_string(),
    };
    let id = body
        .get("id")
        .and_then(Value::as_u64)
        .filter(|id| *id != 0)
        .ok_or_else(|| malformed("missing or zero id"))?;
    let login = optional_string(body, "login").ok_or_else(|| malformed("missing login"))?;

    Ok(ProviderProfile {
        subject: id.to_string(),
        fields: ProfileFields {
            login,
            display_name: optional_string(body, "name"),
            avatar_url: optional_string(body, "avatar_url"),
            profile_url: optional_string(body, "html_url"),
        },
    })
}

impl ProviderClient {
    pub fn new(http: reqwest::Client, config: ProviderConfig, timeout: Duration) -> Self {
        Self {
            http,
            config,
            timeout,
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Trade an authorization code for an access token.
    #[tracing::instrument(skip_all, fields(pkce = exchange.code_verifier.is_some()))]
    pub async fn exchange_code(&self, exchange: TokenExchange<'_>) -> Result<String, ProviderError> {
        let mut form = vec![
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code", exchange.code),
            ("redirect_uri", exchange.redirect_uri),
        ];
        if let Some(verifier) = exchange.code_verifier {
            form.push(("code_verifier", verifier));
        }

        let response = self
            .http
            .post(&self.config.token_url)
            .header(ACCEPT, "application/json")
            .form(&form)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| map_send_error(TOKEN_ENDPOINT, e))?;

        let body = read_json(TOKEN_ENDPOINT, response).await?;
        access_token_from(&body)
    }

    /// Fetch and validate the signed-in account's profile.
    #[tracing::instrument(skip_all)]
    pub async fn fetch_profile(&self, access_token: &str) -> Result<ProviderProfile, ProviderError> {
        let response = self
            .http
            .get(&self.config.user_url)
            .bearer_auth(access_token)
            .header(ACCEPT, "application/json")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| map_send_error(PROFILE_ENDPOINT, e))?;

        let body = read_json(PROFILE_ENDPOINT, response).await?;
        profile_from(&body)
    }
}
