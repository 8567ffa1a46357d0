use std::sync::Arc;

use stakewatch_chain::ProtonRpcClient;
use stakewatch_common::config::AppConfig;
use stakewatch_common::db;
use stakewatch_engine::{DispatchSettings, EligibilityResolver, PgSubscriptionRegistry, RewardDispatcher};

/// One dispatcher run, meant to be scheduled by cron.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "stakewatch_engine=info,stakewatch_chain=info,stakewatch_notifier=info".into()
            }),
        )
        .json()
        .init();

    let config = AppConfig::from_env()?;

    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;
    db::run_migrations(&pool).await?;

    let http = reqwest::Client::builder()
        .timeout(config.http_timeout())
        .build()?;

    let chain = ProtonRpcClient::with_client(http.clone(), &config.proton_rpc_endpoint);
    let provider = stakewatch_notifier::provider_from_config(&config, http)?;

    let dispatcher = RewardDispatcher::new(
        Arc::new(PgSubscriptionRegistry::new(pool)),
        EligibilityResolver::new(Arc::new(chain)),
        provider,
        DispatchSettings::from_config(&config),
    );

    let summary = dispatcher.run().await?;
    tracing::info!(summary = %serde_json::to_string(&summary)?, "Reward check complete");

    Ok(())
}
