//! Identity of the calling API key.

use crate::AppResources;
use crate::api::auth::{ApiKeyAuth, AuthError};
use axum::{Extension, Json};
use serde::Serialize;
use utoipa::ToSchema;

/// Tag for OpenAPI documentation.
pub const ACCOUNT_TAG: &str = "Account";

/// Public view of the signed-in account.
#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub user_id: String,
    pub provider: String,
    pub login: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub profile_url: Option<String>,
}

#[tracing::instrument(skip_all)]
#[utoipa::path(
    get,
    path = "/v1/me",
    tag = ACCOUNT_TAG,
    operation_id = "Current Account",
    summary = "Return the account owning the presented API key",
    security(("ApiKey" = [])),
    responses(
        (status = 200, description = "Account details", body = MeResponse),
        (status = 401, description = "Missing, unknown or malformed API key", body = AuthError)
    )
)]
pub async fn me(
    Extension(resources): Extension<AppResources>,
    ApiKeyAuth(key): ApiKeyAuth,
) -> Result<Json<MeResponse>, AuthError> {
    let identity = resources
        .identity
        .primary_identity(&key.user_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "identity lookup failed");
            AuthError::server_error()
        })?
        .ok_or_else(|| {
            tracing::error!("API key belongs to a user without an identity");
            AuthError::unauthorized()
        })?;

    Ok(Json(MeResponse {
        user_id: key.user_id,
        provider: identity.provider,
        login: identity.login,
        display_name: identity.display_name,
        avatar_url: identity.avatar_url,
        profile_url: identity.profile_url,
    }))
}
