//! Push-delivery providers.
//!
//! The dispatcher only knows the [`PushProvider`] capability: send a payload to
//! an opaque destination, and classify a failure as permanent (the destination
//! is gone and should be forgotten) or transient (try again next run).
//!
//! Two implementations are selectable at startup:
//! - [`WebPushProvider`]: standard Web Push (RFC 8030) with `aes128gcm`
//!   payload encryption (RFC 8291) and VAPID authentication (RFC 8292)
//! - [`FcmProvider`]: Firebase Cloud Messaging HTTP v1 API

pub mod ece;
pub mod fcm;
pub mod vapid;
pub mod webpush;

use std::sync::Arc;

use async_trait::async_trait;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use thiserror::Error;

use stakewatch_common::config::{AppConfig, PushProviderKind};
use stakewatch_common::types::{DeliveryOutcome, NotificationPayload};

pub use fcm::{FcmProvider, ServiceAccount};
pub use vapid::VapidKeys;
pub use webpush::{WebPushProvider, WebPushSubscription};

/// base64url that accepts input with or without `=` padding and emits none.
pub(crate) const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Errors raised while delivering a push notification.
#[derive(Debug, Error)]
pub enum PushError {
    #[error("Invalid destination: {0}")]
    InvalidDestination(String),

    #[error("Push service rejected delivery with HTTP {status}: {message}")]
    Rejected {
        status: u16,
        /// Provider-specific error code, when the provider reports one.
        code: Option<String>,
        message: String,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Authorization error: {0}")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PushError {
    /// HTTP status reported by the push service, if the request got that far.
    pub fn status(&self) -> Option<u16> {
        match self {
            PushError::Rejected { status, .. } => Some(*status),
            PushError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// A push-delivery provider.
#[async_trait]
pub trait PushProvider: Send + Sync {
    /// Deliver `payload` to `destination`.
    async fn send(
        &self,
        destination: &serde_json::Value,
        payload: &NotificationPayload,
    ) -> Result<(), PushError>;

    /// Map a delivery error to [`DeliveryOutcome::PermanentFailure`] when the
    /// destination is expired or revoked, [`DeliveryOutcome::TransientFailure`]
    /// otherwise.
    fn classify(&self, error: &PushError) -> DeliveryOutcome;

    /// Human-readable name for logs.
    fn name(&self) -> &'static str;
}

/// Build the provider selected by `PUSH_PROVIDER`, validating its credentials.
pub fn provider_from_config(
    config: &AppConfig,
    http: reqwest::Client,
) -> Result<Arc<dyn PushProvider>, PushError> {
    match config.push_provider {
        PushProviderKind::WebPush => {
            let (Some(public_key), Some(private_key)) = (
                config.vapid_public_key.as_deref(),
                config.vapid_private_key.as_deref(),
            ) else {
                return Err(PushError::Config(
                    "VAPID keys are required for the webpush provider".to_string(),
                ));
            };
            let vapid = VapidKeys::from_base64(public_key, private_key, &config.vapid_subject)?;
            tracing::info!(public_key = vapid.public_key(), "VAPID keys loaded");
            Ok(Arc::new(WebPushProvider::new(http, vapid)))
        }
        PushProviderKind::Fcm => {
            let json = config
                .firebase_service_account_json
                .as_deref()
                .ok_or_else(|| {
                    PushError::Config(
                        "a Firebase service account is required for the fcm provider".to_string(),
                    )
                })?;
            let account = ServiceAccount::from_json(json)?;
            Ok(Arc::new(FcmProvider::new(http, account)?))
        }
    }
}
