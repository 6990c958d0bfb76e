//! API key authentication for machine clients.

use crate::AppResources;
use crate::oauth2::AuthenticatedKey;
use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Error body for authentication failures
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthError {
    /// Error code (`unauthorized` or `server_error`)
    pub error: String,
}

impl AuthError {
    pub fn unauthorized() -> Self {
        Self {
            error: "unauthorized".to_string(),
        }
    }

    pub fn server_error() -> Self {
        Self {
            error: "server_error".to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self.error.as_str() {
            "unauthorized" => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

/// Axum extractor that validates `Authorization: Bearer <api key>`.
///
/// Every failure looks the same to the caller so the response does not reveal
/// whether a prefix exists.
///
/// ```ignore
/// async fn handler(ApiKeyAuth(key): ApiKeyAuth) -> impl IntoResponse {
///     key.user_id
/// }
/// ```
pub struct ApiKeyAuth(pub AuthenticatedKey);

impl<S> FromRequestParts<S> for ApiKeyAuth
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let resources = parts
            .extensions
            .get::<AppResources>()
            .cloned()
            .ok_or_else(|| {
                tracing::error!("AppResources not found in extensions");
                AuthError::server_error()
            })?;

        let presented = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(AuthError::unauthorized)?;

        match resources.identity.authenticate(presented).await {
            Ok(Some(key)) => Ok(ApiKeyAuth(key)),
            Ok(None) => Err(AuthError::unauthorized()),
            Err(e) => {
                tracing::error!(error = %e, "API key lookup failed");
                Err(AuthError::server_error())
            }
        }
    }
}
