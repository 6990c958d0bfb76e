use agent_gateway::AppResources;
use agent_gateway::api::start_webserver;
use agent_gateway::audit::TracingAuditSink;
use agent_gateway::config::load_config_or_panic;
use agent_gateway::oauth2::provider::build_http_client;
use agent_gateway::rate_limit::{RateGate, spawn_sweeper};
use sea_orm::Database;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn initialize_standard_tracing() {
    let default_directives = "agent_gateway=info,tower_http=info,sea_orm=warn";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer().with_target(true).with_level(true);

    registry.with(layer).init();
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    initialize_standard_tracing();

    let config = Arc::new(load_config_or_panic());
    if !config.oauth.github.is_configured() {
        tracing::warn!("GitHub OAuth credentials missing; sign-in will answer 503");
    }

    let db = Arc::new(Database::connect(&config.database_url).await?);

    let gate = Arc::new(RateGate::new(&config.rate_limit));
    spawn_sweeper(
        gate.clone(),
        Duration::from_secs(config.rate_limit.sweep_interval_secs),
    );
    tracing::info!(
        requests_per_window = config.rate_limit.requests_per_window,
        window_secs = config.rate_limit.window_secs,
        max_entries = config.rate_limit.max_entries,
        "rate limit configuration"
    );

    let resources = AppResources::new(db, config, Arc::new(TracingAuditSink));
    let oauth = resources.oauth_state(build_http_client()?);

    start_webserver(resources, oauth, gate).await?;
    Ok(())
}
