//! StakeWatch API server binary entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use stakewatch_chain::ProtonRpcClient;
use stakewatch_common::config::AppConfig;
use stakewatch_common::db;
use stakewatch_engine::{
    DispatchSettings, EligibilityResolver, PgSubscriptionRegistry, RewardDispatcher,
};

use stakewatch_api::routes::create_router;
use stakewatch_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(
                "stakewatch_api=debug,stakewatch_engine=info,stakewatch_chain=info,stakewatch_notifier=info,tower_http=debug",
            )
        }))
        .init();

    tracing::info!("Starting StakeWatch API server...");

    let config = AppConfig::from_env()?;

    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;
    db::run_migrations(&pool).await?;

    let http = reqwest::Client::builder()
        .timeout(config.http_timeout())
        .build()?;

    let provider = stakewatch_notifier::provider_from_config(&config, http.clone())?;
    tracing::info!(provider = %config.push_provider, "Push provider ready");

    let registry = Arc::new(PgSubscriptionRegistry::new(pool));
    let chain = ProtonRpcClient::with_client(http, &config.proton_rpc_endpoint);

    let dispatcher = RewardDispatcher::new(
        registry.clone(),
        EligibilityResolver::new(Arc::new(chain)),
        provider.clone(),
        DispatchSettings::from_config(&config),
    );

    if config.cron_secret.is_none() {
        tracing::warn!("CRON_SECRET is not set, /api/check-rewards is open to anyone");
    }

    let state = AppState::new(
        registry,
        Arc::new(dispatcher),
        provider,
        config.cron_secret.clone(),
    );

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.api_port));
    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
