//! Sign-in through external OAuth providers and API key issuance.
//!
//! ## Endpoints
//!
//! - `GET /v1/auth/{provider}/start` - Redirect to the provider
//! - `GET /v1/auth/{provider}/callback` - Complete sign-in, issue an API key

pub mod cookies;
pub mod credentials;
pub mod handshake;
pub mod identity;
pub mod pages;
pub mod pkce;
pub mod provider;
mod state;

pub use handshake::AUTH_BASE_PATH;
pub use identity::{AuthenticatedKey, IdentityFederationStore, IssuedCredential, ProfileFields};
pub use state::OAuth2State;

use utoipa_axum::{router::OpenApiRouter, routes};

/// OpenAPI tag for sign-in endpoints
pub const OAUTH2_TAG: &str = "Authentication";

pub fn router(state: OAuth2State) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(handshake::start))
        .routes(routes!(handshake::callback))
        .with_state(state)
}
