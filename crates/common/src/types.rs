use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Time between two reward claims on XPR Network, in seconds.
pub const COOLDOWN_PERIOD_SECS: i64 = 24 * 60 * 60;

/// Time between two reward claims on XPR Network.
pub fn cooldown_period() -> Duration {
    Duration::seconds(COOLDOWN_PERIOD_SECS)
}

/// A registered (account, destination) pair eligible for reward notifications.
///
/// `destination` is opaque to everything except the push provider: a Web Push
/// subscription object or an FCM registration token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Subscription {
    pub id: Uuid,
    #[sqlx(rename = "xpr_account")]
    pub account: String,
    #[sqlx(rename = "subscription_data")]
    pub destination: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Claim state of a staking account, derived fresh on every run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimStatus {
    /// Time of the last reward claim, `None` when the account has no staking record.
    pub last_claim: Option<DateTime<Utc>>,
}

impl ClaimStatus {
    pub fn absent() -> Self {
        Self { last_claim: None }
    }

    pub fn claimed_at(last_claim: DateTime<Utc>) -> Self {
        Self {
            last_claim: Some(last_claim),
        }
    }

    /// Earliest time the next claim becomes available.
    pub fn next_claim(&self) -> Option<DateTime<Utc>> {
        self.last_claim.map(|t| t + cooldown_period())
    }
}

/// What, if anything, to tell the subscriber on this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "hours_remaining", rename_all = "snake_case")]
pub enum NotificationDecision {
    /// Nothing to send.
    None,
    /// The reward becomes claimable in the given number of (rounded-up) hours.
    Upcoming(u32),
    /// The reward can be claimed now.
    Available,
}

impl std::fmt::Display for NotificationDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationDecision::None => write!(f, "none"),
            NotificationDecision::Upcoming(hours) => write!(f, "upcoming({}h)", hours),
            NotificationDecision::Available => write!(f, "available"),
        }
    }
}

/// Per-subscription result of one dispatcher run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Delivered,
    Skipped,
    TransientFailure,
    PermanentFailure,
}

impl std::fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryOutcome::Delivered => write!(f, "delivered"),
            DeliveryOutcome::Skipped => write!(f, "skipped"),
            DeliveryOutcome::TransientFailure => write!(f, "transient_failure"),
            DeliveryOutcome::PermanentFailure => write!(f, "permanent_failure"),
        }
    }
}

/// Human-readable notification payload ready for delivery.
///
/// Serialized as-is for Web Push; the service worker reads `title`, `body`
/// and opens `url` on click.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    pub url: String,
}
