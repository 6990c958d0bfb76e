//! Browser sign-in through an external OAuth provider.
//!
//! `start` sends the browser to the provider with a fresh CSRF state and PKCE
//! challenge, both remembered in short-lived cookies. `callback` checks the
//! echoed state, exchanges the code, fetches the profile, links the identity
//! and hands the newly issued API key to the browser. Any failure ends on an
//! HTML page with a fixed message; details only go to the log.

use crate::audit::{ACTION_LOGIN, AuditEvent};
use crate::cors::hostname_of;
use crate::entity::gateway_identity::IdentityProvider;
use crate::error::HandshakeError;
use crate::oauth2::OAUTH2_TAG;
use crate::oauth2::cookies::{PKCE_COOKIE, STATE_COOKIE, clear_cookie, read_cookie, set_cookie};
use crate::oauth2::identity::IssuedCredential;
use crate::oauth2::pages::{render_error, render_success};
use crate::oauth2::pkce::{CHALLENGE_METHOD, PkcePair};
use crate::oauth2::provider::{ProviderClient, TokenExchange};
use crate::oauth2::state::OAuth2State;
use crate::security::{constant_time_eq, generate_token};
use axum::{
    extract::{Path, Query, State},
    http::{
        HeaderMap, HeaderValue, StatusCode, Uri,
        header::{CACHE_CONTROL, HOST, LOCATION, SET_COOKIE},
    },
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use utoipa::IntoParams;

/// Prefix the handshake routes are mounted under.
pub const AUTH_BASE_PATH: &str = "/v1/auth";

const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
const X_FORWARDED_HOST: &str = "x-forwarded-host";

/// Query parameters the provider appends when redirecting back.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackQuery {
    /// Authorization code
    pub code: Option<String>,
    /// Echo of the state sent with the authorization request
    pub state: Option<String>,
    /// Set when the user denied access or the provider refused the request
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Externally visible origin used to build the callback URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicOrigin {
    /// `scheme://host[:port]` without a trailing slash
    pub origin: String,
    /// Whether handshake cookies get the `Secure` attribute
    pub secure: bool,
}

impl PublicOrigin {
    pub fn callback_url(&self, provider: IdentityProvider) -> String {
        format!("{}{AUTH_BASE_PATH}/{provider}/callback", self.origin)
    }
}

fn first_header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Work out where the provider should send the browser back to.
///
/// A configured public base URL wins and always implies HTTPS cookie
/// semantics. Otherwise the forwarded headers, then `Host`, then the request
/// URI decide.
pub fn public_origin(
    public_base_url: Option<&str>,
    headers: &HeaderMap,
    uri: &Uri,
) -> Result<PublicOrigin, HandshakeError> {
    if let Some(base) = public_base_url {
        let parsed = url::Url::parse(base).map_err(|_| HandshakeError::MissingHost)?;
        if parsed.host_str().is_none() {
            return Err(HandshakeError::MissingHost);
        }
        return Ok(PublicOrigin {
            origin: parsed.origin().ascii_serialization(),
            secure: true,
        });
    }

    let scheme = first_header_value(headers, X_FORWARDED_PROTO)
        .map(|s| s.to_ascii_lowercase())
        .or_else(|| uri.scheme_str().map(str::to_string))
        .unwrap_or_else(|| "http".to_string());
    if scheme != "http" && scheme != "https" {
        return Err(HandshakeError::MissingHost);
    }

    let host = first_header_value(headers, X_FORWARDED_HOST)
        .or_else(|| first_header_value(headers, HOST.as_str()))
        .or_else(|| uri.authority().map(|a| a.to_string()))
        .ok_or(HandshakeError::MissingHost)?;

    // Reject anything that is not a bare host[:port] before it ends up in a URL.
    if hostname_of(&host).is_none()
        || host
            .chars()
            .any(|c| c == '/' || c == '@' || c == '?' || c == '#' || c.is_whitespace())
    {
        return Err(HandshakeError::MissingHost);
    }

    Ok(PublicOrigin {
        secure: scheme == "https",
        origin: format!("{scheme}://{host}"),
    })
}

fn resolve_provider<'a>(
    state: &'a OAuth2State,
    segment: &str,
) -> Result<(IdentityProvider, &'a ProviderClient), HandshakeError> {
    let provider = IdentityProvider::from_path(segment).ok_or(HandshakeError::UnknownProvider)?;
    let client = match provider {
        IdentityProvider::GitHub => &state.github,
    };
    if !client.config().is_configured() {
        return Err(HandshakeError::NotConfigured);
    }
    Ok((provider, client))
}

fn failure_page(err: &HandshakeError) -> Response {
    match err.status() {
        status if status.is_server_error() => {
            tracing::error!(error = %err, status = status.as_u16(), "sign-in failed")
        }
        status => tracing::warn!(error = %err, status = status.as_u16(), "sign-in failed"),
    }
    render_error(err.status(), err.public_message())
}

fn build_start_response(
    state: &OAuth2State,
    segment: &str,
    headers: &HeaderMap,
    uri: &Uri,
) -> Result<Response, HandshakeError> {
    let (provider, client) = resolve_provider(state, segment)?;
    let origin = public_origin(state.config.public_base_url.as_deref(), headers, uri)?;
    let redirect_uri = origin.callback_url(provider);

    let csrf_state = generate_token().map_err(|e| HandshakeError::Random(e.to_string()))?;
    let pkce = PkcePair::generate().map_err(|e| HandshakeError::Random(e.to_string()))?;

    let config = client.config();
    let authorize_url = url::Url::parse_with_params(
        &config.authorize_url,
        &[
            ("client_id", config.client_id.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("scope", config.scope.as_str()),
            ("state", csrf_state.as_str()),
            ("code_challenge", pkce.challenge.as_str()),
            ("code_challenge_method", CHALLENGE_METHOD),
            ("allow_signup", "true"),
        ],
    )
    .map_err(|e| {
        tracing::error!(error = %e, "invalid provider authorize_url");
        HandshakeError::NotConfigured
    })?;
    let location = HeaderValue::from_str(authorize_url.as_str()).map_err(|e| {
        tracing::error!(error = %e, "authorize URL is not a valid header value");
        HandshakeError::NotConfigured
    })?;

    let mut response = (StatusCode::FOUND, [(LOCATION, location)]).into_response();
    let headers = response.headers_mut();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    for (name, value) in [(STATE_COOKIE, &csrf_state), (PKCE_COOKIE, &pkce.verifier)] {
        if let Some(cookie) = set_cookie(name, value, origin.secure) {
            headers.append(SET_COOKIE, cookie);
        }
    }

    tracing::info!(%provider, %redirect_uri, "redirecting to identity provider");
    Ok(response)
}

/// Begin sign-in with an external provider.
#[tracing::instrument(skip(state, headers, uri))]
#[utoipa::path(
    get,
    path = "/{provider}/start",
    tag = OAUTH2_TAG,
    operation_id = "Start Sign-in",
    summary = "Redirect the browser to the identity provider",
    description = "Sets short-lived state and PKCE cookies and redirects to the provider's \
                   authorization page. No account is created at this point.",
    params(
        ("provider" = String, Path, description = "Identity provider, e.g. `github`")
    ),
    responses(
        (status = 302, description = "Redirect to the provider"),
        (status = 400, description = "Public host could not be determined", content_type = "text/html"),
        (status = 404, description = "Unknown provider", content_type = "text/html"),
        (status = 503, description = "Provider credentials not configured", content_type = "text/html")
    )
)]
pub async fn start(
    State(state): State<OAuth2State>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    match build_start_response(&state, &provider, &headers, &uri) {
        Ok(response) => response,
        Err(err) => failure_page(&err),
    }
}

async fn complete_sign_in(
    state: &OAuth2State,
    segment: &str,
    query: &CallbackQuery,
    headers: &HeaderMap,
    uri: &Uri,
) -> Result<(IssuedCredential, String), HandshakeError> {
    let (provider, client) = resolve_provider(state, segment)?;

    if let Some(code) = query.error.as_deref() {
        return Err(HandshakeError::Denied {
            code: code.chars().take(64).collect(),
        });
    }

    let (Some(code), Some(echoed_state)) = (
        query.code.as_deref().filter(|c| !c.is_empty()),
        query.state.as_deref().filter(|s| !s.is_empty()),
    ) else {
        return Err(HandshakeError::MissingParams);
    };

    let expected_state = read_cookie(headers, STATE_COOKIE).ok_or(HandshakeError::StateMismatch)?;
    if !constant_time_eq(&expected_state, echoed_state) {
        return Err(HandshakeError::StateMismatch);
    }

    let verifier = read_cookie(headers, PKCE_COOKIE);
    if verifier.is_none() {
        if state.config.oauth.require_pkce {
            return Err(HandshakeError::MissingVerifier);
        }
        tracing::warn!("PKCE verifier cookie missing, exchanging code without it");
    }

    let origin = public_origin(state.config.public_base_url.as_deref(), headers, uri)?;
    let redirect_uri = origin.callback_url(provider);

    let access_token = client
        .exchange_code(TokenExchange {
            code,
            redirect_uri: &redirect_uri,
            code_verifier: verifier.as_deref(),
        })
        .await?;
    let profile = client.fetch_profile(&access_token).await?;

    let issued = state
        .store
        .upsert(provider, &profile.subject, &profile.fields)
        .await?;

    state.audit.record(AuditEvent::user(
        issued.user_id.clone(),
        ACTION_LOGIN,
        json!({ "provider": provider.as_str(), "login": profile.fields.login }),
    ));

    Ok((issued, profile.fields.login))
}

/// Finish sign-in and hand a new API key to the browser.
#[tracing::instrument(skip(state, query, headers, uri))]
#[utoipa::path(
    get,
    path = "/{provider}/callback",
    tag = OAUTH2_TAG,
    operation_id = "Sign-in Callback",
    summary = "Provider redirect target",
    description = "Validates the returned state against the state cookie, exchanges the code \
                   (with the PKCE verifier), links the provider identity to a gateway user and \
                   issues a new API key. The key is delivered only in the HTML body of the \
                   success page, which stores it in `localStorage` and navigates to the settings \
                   page. Both handshake cookies are cleared on every outcome.",
    params(
        ("provider" = String, Path, description = "Identity provider, e.g. `github`"),
        CallbackQuery
    ),
    responses(
        (status = 200, description = "Signed in", content_type = "text/html"),
        (status = 400, description = "Cancelled, expired or rejected sign-in", content_type = "text/html"),
        (status = 404, description = "Unknown provider", content_type = "text/html"),
        (status = 500, description = "Account could not be stored", content_type = "text/html"),
        (status = 503, description = "Provider credentials not configured", content_type = "text/html")
    )
)]
pub async fn callback(
    State(state): State<OAuth2State>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    let outcome = tokio::time::timeout(
        state.config.oauth.callback_timeout(),
        complete_sign_in(&state, &provider, &query, &headers, &uri),
    )
    .await
    .unwrap_or(Err(HandshakeError::Timeout));

    let mut response = match outcome {
        Ok((issued, login)) => {
            tracing::info!(
                user_id = %issued.user_id,
                key_id = %issued.key_id,
                %login,
                created_user = issued.created_user,
                "sign-in completed"
            );
            render_success(&issued.plaintext_key, &state.config.settings_path)
        }
        Err(err) => failure_page(&err),
    };

    let secure = public_origin(state.config.public_base_url.as_deref(), &headers, &uri)
        .map(|o| o.secure)
        .unwrap_or(false);
    for name in [STATE_COOKIE, PKCE_COOKIE] {
        if let Some(cookie) = clear_cookie(name, secure) {
            response.headers_mut().append(SET_COOKIE, cookie);
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(*v));
        }
        map
    }

    #[test]
    fn configured_base_url_wins() {
        let origin = public_origin(
            Some("https://api.example.com/ignored/path"),
            &headers(&[("host", "internal:8080")]),
            &Uri::from_static("/v1/auth/github/start"),
        )
        .unwrap();
        assert_eq!(origin.origin, "https://api.example.com");
        assert!(origin.secure);
        assert_eq!(
            origin.callback_url(IdentityProvider::GitHub),
            "https://api.example.com/v1/auth/github/callback"
        );
    }

    #[test]
    fn forwarded_headers_use_first_value() {
        let origin = public_origin(
            None,
            &headers(&[
                ("x-forwarded-proto", "https, http"),
                ("x-forwarded-host", "gw.example.com, proxy.local"),
                ("host", "internal:8080"),
            ]),
            &Uri::from_static("/"),
        )
        .unwrap();
        assert_eq!(origin.origin, "https://gw.example.com");
        assert!(origin.secure);
    }

    #[test]
    fn host_header_without_forwarding_is_plain_http() {
        let origin =
            public_origin(None, &headers(&[("host", "localhost:8080")]), &Uri::from_static("/"))
                .unwrap();
        assert_eq!(origin.origin, "http://localhost:8080");
        assert!(!origin.secure);
    }

    #[test]
    fn missing_or_hostile_host_is_rejected() {
        assert!(matches!(
            public_origin(None, &HeaderMap::new(), &Uri::from_static("/")),
            Err(HandshakeError::MissingHost)
        ));
        assert!(
            public_origin(
                None,
                &headers(&[("host", "evil.example/path")]),
                &Uri::from_static("/")
            )
            .is_err()
        );
        assert!(
            public_origin(
                None,
                &headers(&[("x-forwarded-proto", "javascript"), ("host", "a.example")]),
                &Uri::from_static("/")
            )
            .is_err()
        );
    }
}
