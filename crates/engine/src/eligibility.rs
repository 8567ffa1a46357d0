//! Claim eligibility resolution.

use std::sync::Arc;

use stakewatch_chain::ClaimSource;
use stakewatch_common::types::ClaimStatus;

/// Resolves an account's [`ClaimStatus`] from the chain.
///
/// Lookup failures never escape: they are logged and the account is treated as
/// having no staking record for this run.
#[derive(Clone)]
pub struct EligibilityResolver {
    source: Arc<dyn ClaimSource>,
}

impl EligibilityResolver {
    pub fn new(source: Arc<dyn ClaimSource>) -> Self {
        Self { source }
    }

    pub async fn resolve(&self, account: &str) -> ClaimStatus {
        if account.trim().is_empty() {
            tracing::warn!("Subscription has an empty account, skipping lookup");
            return ClaimStatus::absent();
        }

        match self.source.last_claim(account).await {
            Ok(Some(last_claim)) => ClaimStatus::claimed_at(last_claim),
            Ok(None) => {
                tracing::debug!(account = %account, "No staking record");
                ClaimStatus::absent()
            }
            Err(e) => {
                tracing::warn!(
                    account = %account,
                    source = self.source.name(),
                    error = %e,
                    "Claim lookup failed, treating as absent"
                );
                ClaimStatus::absent()
            }
        }
    }
}
