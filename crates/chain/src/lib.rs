//! Read-only access to XPR Network (Proton) staking state.
//!
//! The only question the notifier ever asks the chain is "when did this
//! account last claim its staking reward?". That lookup sits behind the
//! [`ClaimSource`] trait so the dispatcher can be exercised without a node.

pub mod proton;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub use proton::ProtonRpcClient;

/// Errors raised while querying the chain.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("RPC transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("RPC returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed table row: {0}")]
    Malformed(String),

    #[error("Invalid account name: {0:?}")]
    InvalidAccount(String),
}

/// Source of per-account claim timestamps.
#[async_trait]
pub trait ClaimSource: Send + Sync {
    /// Time of the account's last reward claim.
    ///
    /// Returns `Ok(None)` when the account has no staking record, which is the
    /// normal state for new or unstaked accounts.
    async fn last_claim(&self, account: &str) -> Result<Option<DateTime<Utc>>, ChainError>;

    /// Human-readable name for logs.
    fn name(&self) -> &'static str;
}
