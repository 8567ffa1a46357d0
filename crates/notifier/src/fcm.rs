//! Firebase Cloud Messaging (HTTP v1) delivery.
//!
//! Authenticates with a service account: a short-lived RS256 assertion is
//! exchanged for an OAuth2 access token, which is cached and shared by all
//! concurrent sends until shortly before it expires.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;

use stakewatch_common::types::{DeliveryOutcome, NotificationPayload};

use crate::{PushError, PushProvider};

const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";
const DEFAULT_API_BASE: &str = "https://fcm.googleapis.com";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for the signed assertion (Google's maximum).
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Refresh the access token this long before it actually expires.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// FCM error code for a registration token that is no longer valid.
const UNREGISTERED: &str = "UNREGISTERED";

/// The subset of a Google service-account key file FCM needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccount {
    pub project_id: String,
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccount {
    pub fn from_json(json: &str) -> Result<Self, PushError> {
        serde_json::from_str(json)
            .map_err(|e| PushError::Config(format!("invalid Firebase service account: {}", e)))
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct FcmErrorEnvelope {
    error: FcmErrorBody,
}

#[derive(Debug, Deserialize)]
struct FcmErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    details: Vec<FcmErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct FcmErrorDetail {
    #[serde(rename = "errorCode")]
    error_code: Option<String>,
}

/// Firebase Cloud Messaging provider.
pub struct FcmProvider {
    http: reqwest::Client,
    account: ServiceAccount,
    signing_key: EncodingKey,
    api_base: String,
    token: Mutex<Option<CachedToken>>,
}

impl FcmProvider {
    /// Create a provider, parsing the service account's RSA key up front.
    pub fn new(http: reqwest::Client, account: ServiceAccount) -> Result<Self, PushError> {
        let signing_key = EncodingKey::from_rsa_pem(account.private_key.as_bytes())
            .map_err(|e| PushError::Config(format!("invalid service account private key: {}", e)))?;

        Ok(Self {
            http,
            account,
            signing_key,
            api_base: DEFAULT_API_BASE.to_string(),
            token: Mutex::new(None),
        })
    }

    /// Point the provider at a different FCM API host.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn send_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/messages:send",
            self.api_base, self.account.project_id
        )
    }

    /// Return a valid access token, exchanging a fresh assertion if needed.
    async fn access_token(&self) -> Result<String, PushError> {
        let mut cached = self.token.lock().await;
        let now = Utc::now();

        if let Some(token) = cached.as_ref()
            && token.expires_at - Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) > now
        {
            return Ok(token.access_token.clone());
        }

        let claims = AssertionClaims {
            iss: &self.account.client_email,
            scope: FCM_SCOPE,
            aud: &self.account.token_uri,
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
        };
        let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)
            .map_err(|e| PushError::Auth(format!("failed to sign assertion: {}", e)))?;

        let response = self
            .http
            .post(&self.account.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PushError::Auth(format!(
                "token exchange failed with HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| PushError::Auth(format!("invalid token response: {}", e)))?;

        tracing::debug!(expires_in = token.expires_in, "Obtained FCM access token");

        *cached = Some(CachedToken {
            access_token: token.access_token.clone(),
            expires_at: now + Duration::seconds(token.expires_in),
        });

        Ok(token.access_token)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }
}

/// Extract the registration token from a stored destination.
///
/// Tokens are normally stored as a bare JSON string; objects with a `token`
/// or `fcmToken` field are accepted too.
pub fn registration_token(destination: &serde_json::Value) -> Result<&str, PushError> {
    let token = match destination {
        serde_json::Value::String(token) => Some(token.as_str()),
        serde_json::Value::Object(map) => map
            .get("token")
            .or_else(|| map.get("fcmToken"))
            .and_then(|v| v.as_str()),
        _ => None,
    };

    token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            PushError::InvalidDestination("destination holds no FCM registration token".to_string())
        })
}

/// Build the `messages:send` request body.
pub fn build_message(token: &str, payload: &NotificationPayload) -> serde_json::Value {
    let mut webpush = json!({
        "notification": { "title": payload.title, "body": payload.body },
    });
    // FCM rejects non-HTTPS links.
    if payload.url.starts_with("https://") {
        webpush["fcm_options"] = json!({ "link": payload.url });
    }

    json!({
        "message": {
            "token": token,
            "notification": { "title": payload.title, "body": payload.body },
            "data": { "url": payload.url },
            "webpush": webpush,
        }
    })
}

#[async_trait]
impl PushProvider for FcmProvider {
    async fn send(
        &self,
        destination: &serde_json::Value,
        payload: &NotificationPayload,
    ) -> Result<(), PushError> {
        let token = registration_token(destination)?;
        let access_token = self.access_token().await?;

        let response = self
            .http
            .post(self.send_url())
            .bearer_auth(access_token)
            .json(&build_message(token, payload))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.invalidate_token().await;
        }

        let raw = response.text().await.unwrap_or_default();
        let (code, message) = match serde_json::from_str::<FcmErrorEnvelope>(&raw) {
            Ok(envelope) => {
                let code = envelope
                    .error
                    .details
                    .iter()
                    .find_map(|d| d.error_code.clone())
                    .or(envelope.error.status);
                (code, envelope.error.message)
            }
            Err(_) => (None, raw),
        };

        Err(PushError::Rejected {
            status: status.as_u16(),
            code,
            message,
        })
    }

    fn classify(&self, error: &PushError) -> DeliveryOutcome {
        match error {
            PushError::Rejected { status: 404, .. } => DeliveryOutcome::PermanentFailure,
            PushError::Rejected {
                code: Some(code), ..
            } if code == UNREGISTERED => DeliveryOutcome::PermanentFailure,
            _ => DeliveryOutcome::TransientFailure,
        }
    }

    fn name(&self) -> &'static str {
        "fcm"
    }
}
