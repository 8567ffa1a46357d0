//! Shared application state for the Axum API server.

use std::sync::Arc;

use stakewatch_engine::{RewardDispatcher, SubscriptionRegistry};
use stakewatch_notifier::PushProvider;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<dyn SubscriptionRegistry>,
    pub dispatcher: Arc<RewardDispatcher>,
    pub provider: Arc<dyn PushProvider>,
    /// Shared secret the scheduler must present to trigger a run.
    pub cron_secret: Option<String>,
}

impl AppState {
    pub fn new(
        registry: Arc<dyn SubscriptionRegistry>,
        dispatcher: Arc<RewardDispatcher>,
        provider: Arc<dyn PushProvider>,
        cron_secret: Option<String>,
    ) -> Self {
        Self {
            registry,
            dispatcher,
            provider,
            cron_secret,
        }
    }
}
