//! Reward notification dispatcher.
//!
//! One run:
//! 1. Reads a snapshot of every subscription (the only step that can fail the run)
//! 2. For each subscription, concurrently: resolve claim status (once per
//!    account), decide, deliver
//! 3. Deletes subscriptions whose destination the provider reports as gone
//! 4. Returns a [`RunSummary`] once every work unit has settled

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{OnceCell, Semaphore};
use tokio::task::JoinSet;

use stakewatch_common::config::AppConfig;
use stakewatch_common::error::AppError;
use stakewatch_common::types::{ClaimStatus, DeliveryOutcome, NotificationPayload, Subscription};
use stakewatch_notifier::PushProvider;

use crate::eligibility::EligibilityResolver;
use crate::payload::PayloadBuilder;
use crate::policy;
use crate::subscription::SubscriptionRegistry;

/// Deadline of a work unit's lookup and push, as a multiple of the HTTP timeout.
/// A compensating delete runs under a deadline of its own.
const UNIT_DEADLINE_FACTOR: u32 = 3;

/// Tunables of a dispatcher run.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub max_in_flight: usize,
    pub unit_timeout: Duration,
    pub app_base_url: String,
}

impl DispatchSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_in_flight: config.dispatch_max_in_flight,
            unit_timeout: config.http_timeout() * UNIT_DEADLINE_FACTOR,
            app_base_url: config.app_base_url.clone(),
        }
    }
}

/// Aggregate result of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub delivered: usize,
    pub skipped: usize,
    pub transient_failures: usize,
    pub permanent_failures: usize,
    pub deleted: usize,
    /// Work units lost at the join boundary (panicked or cancelled).
    pub aborted: usize,
}

impl RunSummary {
    fn record(&mut self, delivery: &Delivery) {
        match delivery.outcome {
            DeliveryOutcome::Delivered => self.delivered += 1,
            DeliveryOutcome::Skipped => self.skipped += 1,
            DeliveryOutcome::TransientFailure => self.transient_failures += 1,
            DeliveryOutcome::PermanentFailure => self.permanent_failures += 1,
        }
        if delivery.deleted {
            self.deleted += 1;
        }
    }
}

/// Result of handling one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub outcome: DeliveryOutcome,
    /// The subscription was removed from the registry.
    pub deleted: bool,
}

impl Delivery {
    fn without_deletion(outcome: DeliveryOutcome) -> Self {
        Self {
            outcome,
            deleted: false,
        }
    }
}

/// Send `payload` to one subscription and reconcile the registry with the result.
///
/// A permanent failure deletes the subscription by id; if that deletion fails
/// it is logged and the outcome stays `PermanentFailure`.
pub async fn deliver(
    provider: &dyn PushProvider,
    registry: &dyn SubscriptionRegistry,
    subscription: &Subscription,
    payload: &NotificationPayload,
) -> Delivery {
    match send(provider, subscription, payload).await {
        DeliveryOutcome::PermanentFailure => Delivery {
            outcome: DeliveryOutcome::PermanentFailure,
            deleted: retire(registry, subscription).await,
        },
        outcome => Delivery::without_deletion(outcome),
    }
}

/// Send and classify, without touching the registry.
async fn send(
    provider: &dyn PushProvider,
    subscription: &Subscription,
    payload: &NotificationPayload,
) -> DeliveryOutcome {
    let error = match provider.send(&subscription.destination, payload).await {
        Ok(()) => {
            tracing::info!(
                subscription_id = %subscription.id,
                account = %subscription.account,
                provider = provider.name(),
                title = %payload.title,
                "Notification delivered"
            );
            return DeliveryOutcome::Delivered;
        }
        Err(e) => e,
    };

    match provider.classify(&error) {
        DeliveryOutcome::PermanentFailure => {
            tracing::info!(
                subscription_id = %subscription.id,
                account = %subscription.account,
                error = %error,
                "Destination is gone, removing subscription"
            );
            DeliveryOutcome::PermanentFailure
        }
        _ => {
            tracing::warn!(
                subscription_id = %subscription.id,
                account = %subscription.account,
                error = %error,
                "Delivery failed, will retry next run"
            );
            DeliveryOutcome::TransientFailure
        }
    }
}

/// Delete a subscription whose destination is gone. Errors are logged and swallowed.
async fn retire(registry: &dyn SubscriptionRegistry, subscription: &Subscription) -> bool {
    match registry.delete_by_key(subscription.id).await {
        Ok(deleted) => deleted,
        Err(e) => {
            tracing::error!(
                subscription_id = %subscription.id,
                error = %e,
                "Failed to delete expired subscription"
            );
            false
        }
    }
}

/// Claim status of one account, resolved at most once per run and shared by
/// all of that account's subscriptions.
type SharedClaim = Arc<OnceCell<ClaimStatus>>;

/// Everything a work unit needs, cheap to clone into a task.
#[derive(Clone)]
struct WorkUnit {
    registry: Arc<dyn SubscriptionRegistry>,
    resolver: EligibilityResolver,
    provider: Arc<dyn PushProvider>,
    payloads: PayloadBuilder,
    deadline: Duration,
}

impl WorkUnit {
    /// Lookup and send run under the deadline; a compensating delete gets a
    /// fresh one so a slow send cannot cancel it.
    async fn process(
        &self,
        subscription: &Subscription,
        claim: &OnceCell<ClaimStatus>,
        now: DateTime<Utc>,
    ) -> Delivery {
        let attempt = self.attempt(subscription, claim, now);
        let outcome = match tokio::time::timeout(self.deadline, attempt).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!(
                    subscription_id = %subscription.id,
                    account = %subscription.account,
                    timeout_secs = self.deadline.as_secs(),
                    "Work unit timed out"
                );
                return Delivery::without_deletion(DeliveryOutcome::TransientFailure);
            }
        };

        if outcome != DeliveryOutcome::PermanentFailure {
            return Delivery::without_deletion(outcome);
        }

        let retired = retire(self.registry.as_ref(), subscription);
        let deleted = match tokio::time::timeout(self.deadline, retired).await {
            Ok(deleted) => deleted,
            Err(_) => {
                tracing::error!(
                    subscription_id = %subscription.id,
                    timeout_secs = self.deadline.as_secs(),
                    "Deleting expired subscription timed out"
                );
                false
            }
        };

        Delivery {
            outcome: DeliveryOutcome::PermanentFailure,
            deleted,
        }
    }

    async fn attempt(
        &self,
        subscription: &Subscription,
        claim: &OnceCell<ClaimStatus>,
        now: DateTime<Utc>,
    ) -> DeliveryOutcome {
        let status = *claim
            .get_or_init(|| self.resolver.resolve(&subscription.account))
            .await;
        let decision = policy::decide(status.next_claim(), now);

        let Some(payload) = self.payloads.for_decision(decision) else {
            tracing::debug!(
                subscription_id = %subscription.id,
                account = %subscription.account,
                "Nothing to notify"
            );
            return DeliveryOutcome::Skipped;
        };

        tracing::debug!(
            subscription_id = %subscription.id,
            decision = %decision,
            "Sending reward notification"
        );

        send(self.provider.as_ref(), subscription, &payload).await
    }
}

/// Batch job notifying every subscriber whose reward is (nearly) claimable.
pub struct RewardDispatcher {
    unit: WorkUnit,
    max_in_flight: usize,
}

impl RewardDispatcher {
    pub fn new(
        registry: Arc<dyn SubscriptionRegistry>,
        resolver: EligibilityResolver,
        provider: Arc<dyn PushProvider>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            unit: WorkUnit {
                registry,
                resolver,
                provider,
                payloads: PayloadBuilder::new(settings.app_base_url),
                deadline: settings.unit_timeout,
            },
            max_in_flight: settings.max_in_flight.max(1),
        }
    }

    /// Run once against the current time.
    pub async fn run(&self) -> Result<RunSummary, AppError> {
        self.run_at(Utc::now()).await
    }

    /// Run once as if the current time were `now`.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<RunSummary, AppError> {
        let subscriptions = self.unit.registry.list_all().await?;

        let mut summary = RunSummary {
            total: subscriptions.len(),
            ..RunSummary::default()
        };

        tracing::info!(
            total = summary.total,
            provider = self.unit.provider.name(),
            max_in_flight = self.max_in_flight,
            "Dispatcher run started"
        );

        let mut claims: HashMap<String, SharedClaim> = HashMap::new();
        let semaphore = Arc::new(Semaphore::new(self.max_in_flight));
        let mut tasks = JoinSet::new();

        for subscription in subscriptions {
            let claim = claims
                .entry(subscription.account.clone())
                .or_default()
                .clone();
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| AppError::Internal(format!("dispatch semaphore closed: {}", e)))?;
            let unit = self.unit.clone();

            tasks.spawn(async move {
                let _permit = permit;
                unit.process(&subscription, &claim, now).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(delivery) => summary.record(&delivery),
                Err(e) => {
                    tracing::error!(error = %e, "Work unit aborted");
                    summary.aborted += 1;
                }
            }
        }

        tracing::info!(
            total = summary.total,
            delivered = summary.delivered,
            skipped = summary.skipped,
            transient_failures = summary.transient_failures,
            permanent_failures = summary.permanent_failures,
            deleted = summary.deleted,
            aborted = summary.aborted,
            "Dispatcher run finished"
        );

        Ok(summary)
    }
}
