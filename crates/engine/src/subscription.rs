//! Subscription registry: where (account, destination) pairs live.
//!
//! The dispatcher only needs `list_all` and `delete_by_key`; the HTTP surface
//! also registers and removes destinations on behalf of browsers and devices.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use stakewatch_common::error::AppError;
use stakewatch_common::types::Subscription;

/// Identifies a stored destination without knowing its subscription id.
///
/// Browsers unsubscribe by endpoint; native clients by FCM token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestinationRef {
    /// Web Push endpoint URL.
    Endpoint(String),
    /// FCM registration token.
    FcmToken(String),
}

impl DestinationRef {
    /// Whether a stored destination blob refers to this destination.
    pub fn matches(&self, destination: &serde_json::Value) -> bool {
        match self {
            DestinationRef::Endpoint(endpoint) => {
                destination.get("endpoint").and_then(|v| v.as_str()) == Some(endpoint.as_str())
            }
            DestinationRef::FcmToken(token) => match destination {
                serde_json::Value::String(stored) => stored == token,
                serde_json::Value::Object(map) => map
                    .get("token")
                    .or_else(|| map.get("fcmToken"))
                    .and_then(|v| v.as_str())
                    == Some(token.as_str()),
                _ => false,
            },
        }
    }
}

/// Storage of subscriptions.
#[async_trait]
pub trait SubscriptionRegistry: Send + Sync {
    /// Snapshot of every registered subscription.
    async fn list_all(&self) -> Result<Vec<Subscription>, AppError>;

    /// Delete one subscription by its id. Returns true if a row was removed.
    async fn delete_by_key(&self, id: Uuid) -> Result<bool, AppError>;

    /// Register a destination for an account.
    async fn insert(
        &self,
        account: &str,
        destination: serde_json::Value,
    ) -> Result<Subscription, AppError>;

    /// All subscriptions registered for one account.
    async fn list_by_account(&self, account: &str) -> Result<Vec<Subscription>, AppError>;

    /// Delete every subscription pointing at a destination. Returns the number removed.
    async fn delete_by_destination(&self, destination: &DestinationRef) -> Result<u64, AppError>;
}

/// Postgres-backed registry over the `subscriptions` table.
#[derive(Clone)]
pub struct PgSubscriptionRegistry {
    pool: PgPool,
}

impl PgSubscriptionRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionRegistry for PgSubscriptionRegistry {
    async fn list_all(&self) -> Result<Vec<Subscription>, AppError> {
        let subs: Vec<Subscription> = sqlx::query_as(
            "SELECT id, xpr_account, subscription_data, created_at FROM subscriptions ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(subs)
    }

    async fn delete_by_key(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            tracing::info!(subscription_id = %id, "Subscription deleted");
        }

        Ok(deleted)
    }

    async fn insert(
        &self,
        account: &str,
        destination: serde_json::Value,
    ) -> Result<Subscription, AppError> {
        let sub: Subscription = sqlx::query_as(
            r#"
            INSERT INTO subscriptions (id, xpr_account, subscription_data)
            VALUES ($1, $2, $3)
            RETURNING id, xpr_account, subscription_data, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(account)
        .bind(&destination)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(subscription_id = %sub.id, account = %account, "Subscription created");

        Ok(sub)
    }

    async fn list_by_account(&self, account: &str) -> Result<Vec<Subscription>, AppError> {
        let subs: Vec<Subscription> = sqlx::query_as(
            r#"
            SELECT id, xpr_account, subscription_data, created_at
            FROM subscriptions
            WHERE xpr_account = $1
            ORDER BY created_at
            "#,
        )
        .bind(account)
        .fetch_all(&self.pool)
        .await?;

        Ok(subs)
    }

    async fn delete_by_destination(&self, destination: &DestinationRef) -> Result<u64, AppError> {
        let result = match destination {
            DestinationRef::Endpoint(endpoint) => {
                sqlx::query("DELETE FROM subscriptions WHERE subscription_data->>'endpoint' = $1")
                    .bind(endpoint)
                    .execute(&self.pool)
                    .await?
            }
            DestinationRef::FcmToken(token) => {
                sqlx::query(
                    r#"
                    DELETE FROM subscriptions
                    WHERE subscription_data = to_jsonb($1::text)
                       OR subscription_data->>'token' = $1
                       OR subscription_data->>'fcmToken' = $1
                    "#,
                )
                .bind(token)
                .execute(&self.pool)
                .await?
            }
        };

        let removed = result.rows_affected();
        tracing::info!(removed, "Subscriptions removed by destination");

        Ok(removed)
    }
}
