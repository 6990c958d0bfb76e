//! HTTP surface of the gateway.
//!
//! - `health` - Liveness probe (/healthz)
//! - `me` - Account behind an API key (/v1/me)
//! - `auth` - API key extractor
//! - `openapi` - OpenAPI/Utoipa configuration
//!
//! Every request passes the origin guard first, then the rate gate.

pub mod auth;
pub mod health;
pub mod me;
pub mod openapi;

pub use health::MISC_TAG;
pub use me::ACCOUNT_TAG;

use crate::AppResources;
use crate::cors::origin_guard;
use crate::oauth2::{self, AUTH_BASE_PATH, OAuth2State};
use crate::rate_limit::{RateGate, rate_gate};
use axum::{Router, middleware};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa_redoc::{Redoc, Servable};

/// Assemble the application router without binding a socket.
pub fn build_router(resources: AppResources, oauth: OAuth2State, gate: Arc<RateGate>) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(openapi::ApiDoc::openapi())
        .nest(AUTH_BASE_PATH, oauth2::router(oauth))
        .routes(routes!(me::me))
        .routes(routes!(health::health))
        .split_for_parts();

    // Outermost layer last: trace, origin guard, then throttling see each request in that order.
    router
        .merge(Redoc::with_url("/api-docs", api))
        .layer(axum::Extension(resources))
        .layer(middleware::from_fn_with_state(gate, rate_gate))
        .layer(middleware::from_fn(origin_guard))
        .layer(TraceLayer::new_for_http())
}

/// Bind the configured address and serve until the process stops.
#[tracing::instrument(skip_all)]
pub async fn start_webserver(
    resources: AppResources,
    oauth: OAuth2State,
    gate: Arc<RateGate>,
) -> color_eyre::Result<()> {
    let bind_address = resources.config.bind_address.clone();
    let router = build_router(resources, oauth, gate);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!(addr = %bind_address, "server running");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| color_eyre::Report::msg(format!("Failed to start server: {e}")))?;

    Ok(())
}
