//! In-process registry, used by tests and local runs without Postgres.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use stakewatch_common::error::AppError;
use stakewatch_common::types::Subscription;

use crate::subscription::{DestinationRef, SubscriptionRegistry};

#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    subs: Mutex<Vec<Subscription>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the registry with existing subscriptions.
    pub fn with_subscriptions(subs: Vec<Subscription>) -> Self {
        Self {
            subs: Mutex::new(subs),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a subscription with this id is still registered.
    pub fn contains(&self, id: Uuid) -> bool {
        self.lock().iter().any(|s| s.id == id)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Subscription>> {
        // A panic while holding the lock cannot leave the Vec half-updated.
        self.subs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl SubscriptionRegistry for InMemoryRegistry {
    async fn list_all(&self) -> Result<Vec<Subscription>, AppError> {
        Ok(self.lock().clone())
    }

    async fn delete_by_key(&self, id: Uuid) -> Result<bool, AppError> {
        let mut subs = self.lock();
        let before = subs.len();
        subs.retain(|s| s.id != id);
        Ok(subs.len() < before)
    }

    async fn insert(
        &self,
        account: &str,
        destination: serde_json::Value,
    ) -> Result<Subscription, AppError> {
        let sub = Subscription {
            id: Uuid::new_v4(),
            account: account.to_string(),
            destination,
            created_at: Utc::now(),
        };
        self.lock().push(sub.clone());
        Ok(sub)
    }

    async fn list_by_account(&self, account: &str) -> Result<Vec<Subscription>, AppError> {
        Ok(self
            .lock()
            .iter()
            .filter(|s| s.account == account)
            .cloned()
            .collect())
    }

    async fn delete_by_destination(&self, destination: &DestinationRef) -> Result<u64, AppError> {
        let mut subs = self.lock();
        let before = subs.len();
        subs.retain(|s| !destination.matches(&s.destination));
        Ok((before - subs.len()) as u64)
    }
}
