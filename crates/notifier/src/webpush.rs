//! Standard Web Push delivery.

use async_trait::async_trait;
use base64::Engine;
use chrono::Utc;
use reqwest::header::{AUTHORIZATION, CONTENT_ENCODING, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use stakewatch_common::types::{DeliveryOutcome, NotificationPayload};

use crate::vapid::VapidKeys;
use crate::{PushError, PushProvider, URL_SAFE_LENIENT, ece};

/// How long the push service should hold an undelivered message.
/// A reward reminder older than a day is stale.
const DEFAULT_TTL_SECS: u32 = 24 * 60 * 60;

/// Longest error body kept in a [`PushError::Rejected`] message.
const MAX_ERROR_BODY: usize = 512;

/// Browser `PushSubscription.toJSON()` shape stored as the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebPushSubscription {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

impl WebPushSubscription {
    /// Parse a stored destination. Accepts the subscription object itself or a
    /// JSON string containing it.
    pub fn from_destination(destination: &serde_json::Value) -> Result<Self, PushError> {
        let parsed = match destination {
            serde_json::Value::String(raw) => serde_json::from_str(raw),
            other => serde_json::from_value(other.clone()),
        };
        parsed.map_err(|e| {
            PushError::InvalidDestination(format!("not a Web Push subscription: {}", e))
        })
    }
}

/// Web Push provider using VAPID and `aes128gcm` payload encryption.
pub struct WebPushProvider {
    http: reqwest::Client,
    vapid: VapidKeys,
    ttl_secs: u32,
}

impl WebPushProvider {
    pub fn new(http: reqwest::Client, vapid: VapidKeys) -> Self {
        Self {
            http,
            vapid,
            ttl_secs: DEFAULT_TTL_SECS,
        }
    }

    pub fn with_ttl(mut self, ttl_secs: u32) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }
}

#[async_trait]
impl PushProvider for WebPushProvider {
    async fn send(
        &self,
        destination: &serde_json::Value,
        payload: &NotificationPayload,
    ) -> Result<(), PushError> {
        let subscription = WebPushSubscription::from_destination(destination)?;

        let endpoint = reqwest::Url::parse(&subscription.endpoint)
            .map_err(|e| PushError::InvalidDestination(format!("bad endpoint URL: {}", e)))?;
        if !matches!(endpoint.scheme(), "https" | "http") {
            return Err(PushError::InvalidDestination(format!(
                "unsupported endpoint scheme `{}`",
                endpoint.scheme()
            )));
        }

        let ua_public = URL_SAFE_LENIENT
            .decode(subscription.keys.p256dh.trim())
            .map_err(|e| PushError::InvalidDestination(format!("p256dh is not base64url: {}", e)))?;
        let auth_secret = URL_SAFE_LENIENT
            .decode(subscription.keys.auth.trim())
            .map_err(|e| PushError::InvalidDestination(format!("auth is not base64url: {}", e)))?;

        let plaintext = serde_json::to_vec(payload)
            .map_err(|e| PushError::Encryption(format!("cannot serialize payload: {}", e)))?;
        let body = ece::encrypt(&ua_public, &auth_secret, &plaintext)?;
        let authorization = self.vapid.authorization(&endpoint, Utc::now())?;

        let response = self
            .http
            .post(endpoint)
            .header("TTL", self.ttl_secs.to_string())
            .header("Urgency", "normal")
            .header(CONTENT_ENCODING, "aes128gcm")
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(AUTHORIZATION, authorization)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let mut message = response.text().await.unwrap_or_default();
        if message.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !message.is_char_boundary(cut) {
                cut -= 1;
            }
            message.truncate(cut);
        }

        Err(PushError::Rejected {
            status: status.as_u16(),
            code: status.canonical_reason().map(str::to_string),
            message,
        })
    }

    fn classify(&self, error: &PushError) -> DeliveryOutcome {
        match error.status() {
            Some(404 | 410) => DeliveryOutcome::PermanentFailure,
            _ => DeliveryOutcome::TransientFailure,
        }
    }

    fn name(&self) -> &'static str {
        "webpush"
    }
}
