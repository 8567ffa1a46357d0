use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;

/// Which push-delivery provider the dispatcher talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushProviderKind {
    /// Standard Web Push with VAPID authentication.
    WebPush,
    /// Firebase Cloud Messaging HTTP v1 API.
    Fcm,
}

impl FromStr for PushProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "webpush" | "web-push" | "web_push" => Ok(PushProviderKind::WebPush),
            "fcm" | "firebase" => Ok(PushProviderKind::Fcm),
            other => Err(anyhow::anyhow!(
                "PUSH_PROVIDER must be one of `webpush`, `fcm` (got `{}`)",
                other
            )),
        }
    }
}

impl std::fmt::Display for PushProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PushProviderKind::WebPush => write!(f, "webpush"),
            PushProviderKind::Fcm => write!(f, "fcm"),
        }
    }
}

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string for the subscription registry
    pub database_url: String,

    /// Maximum number of PostgreSQL connections in the pool (default: 5)
    pub db_max_connections: u32,

    /// XPR Network (Proton) chain API endpoint
    pub proton_rpc_endpoint: String,

    /// Base URL of the PWA, used for notification deep links
    pub app_base_url: String,

    /// Push-delivery provider selected for this deployment
    pub push_provider: PushProviderKind,

    /// VAPID public key (base64url, uncompressed P-256 point)
    pub vapid_public_key: Option<String>,

    /// VAPID private key (base64url, raw 32-byte scalar)
    pub vapid_private_key: Option<String>,

    /// VAPID `sub` claim, a `mailto:` or `https:` contact
    pub vapid_subject: String,

    /// Decoded Firebase service-account JSON
    pub firebase_service_account_json: Option<String>,

    /// Maximum number of subscriptions processed concurrently (default: 16)
    pub dispatch_max_in_flight: usize,

    /// Timeout applied to every outbound HTTP call, in seconds (default: 10)
    pub http_timeout_secs: u64,

    /// Shared secret the scheduler must present to trigger a run
    pub cron_secret: Option<String>,

    /// HTTP port for the API server (default: 3000)
    pub api_port: u16,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build and validate configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let firebase_service_account_json = match var("FIREBASE_SERVICE_ACCOUNT_JSON_BASE64") {
            Some(encoded) => Some(decode_service_account(&encoded)?),
            None => None,
        };

        let config = Self {
            database_url: var("DATABASE_URL")
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            db_max_connections: var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|| "5".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_MAX_CONNECTIONS must be a valid u32"))?,
            proton_rpc_endpoint: var("PROTON_RPC_ENDPOINT")
                .unwrap_or_else(|| "https://rpc.api.mainnet.metalx.com".to_string()),
            app_base_url: var("APP_BASE_URL")
                .unwrap_or_else(|| "https://xpr-stake-pwa.vercel.app".to_string()),
            push_provider: var("PUSH_PROVIDER")
                .unwrap_or_else(|| "webpush".to_string())
                .parse()?,
            vapid_public_key: var("VAPID_PUBLIC_KEY"),
            vapid_private_key: var("VAPID_PRIVATE_KEY"),
            vapid_subject: var("VAPID_SUBJECT")
                .unwrap_or_else(|| "mailto:admin@example.com".to_string()),
            firebase_service_account_json,
            dispatch_max_in_flight: var("DISPATCH_MAX_IN_FLIGHT")
                .unwrap_or_else(|| "16".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DISPATCH_MAX_IN_FLIGHT must be a valid usize"))?,
            http_timeout_secs: var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|| "10".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("HTTP_TIMEOUT_SECS must be a valid u64"))?,
            cron_secret: var("CRON_SECRET"),
            api_port: var("API_PORT")
                .unwrap_or_else(|| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("API_PORT must be a valid u16"))?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the dispatcher cannot run with.
    ///
    /// Provider credentials are only required for the provider actually selected.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.dispatch_max_in_flight == 0 {
            anyhow::bail!("DISPATCH_MAX_IN_FLIGHT must be at least 1");
        }
        if self.http_timeout_secs == 0 {
            anyhow::bail!("HTTP_TIMEOUT_SECS must be at least 1");
        }
        if !self.proton_rpc_endpoint.starts_with("http://")
            && !self.proton_rpc_endpoint.starts_with("https://")
        {
            anyhow::bail!("PROTON_RPC_ENDPOINT must be an http(s) URL");
        }

        match self.push_provider {
            PushProviderKind::WebPush => {
                if self.vapid_public_key.is_none() || self.vapid_private_key.is_none() {
                    anyhow::bail!(
                        "VAPID_PUBLIC_KEY and VAPID_PRIVATE_KEY are required when PUSH_PROVIDER=webpush"
                    );
                }
                if !self.vapid_subject.starts_with("mailto:")
                    && !self.vapid_subject.starts_with("https://")
                {
                    anyhow::bail!("VAPID_SUBJECT must be a mailto: or https: URI");
                }
            }
            PushProviderKind::Fcm => {
                if self.firebase_service_account_json.is_none() {
                    anyhow::bail!(
                        "FIREBASE_SERVICE_ACCOUNT_JSON_BASE64 is required when PUSH_PROVIDER=fcm"
                    );
                }
            }
        }

        Ok(())
    }

    /// Per-request timeout for outbound HTTP calls.
    pub fn http_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.http_timeout_secs)
    }
}

/// Decode the base64 service-account blob and make sure it is a JSON object.
fn decode_service_account(encoded: &str) -> anyhow::Result<String> {
    let bytes = STANDARD.decode(encoded.trim()).map_err(|e| {
        anyhow::anyhow!("FIREBASE_SERVICE_ACCOUNT_JSON_BASE64 is not valid base64: {}", e)
    })?;
    let json = String::from_utf8(bytes)
        .map_err(|_| anyhow::anyhow!("FIREBASE_SERVICE_ACCOUNT_JSON_BASE64 is not UTF-8"))?;

    let value: serde_json::Value = serde_json::from_str(&json).map_err(|e| {
        anyhow::anyhow!("FIREBASE_SERVICE_ACCOUNT_JSON_BASE64 is not valid JSON: {}", e)
    })?;
    if !value.is_object() {
        anyhow::bail!("FIREBASE_SERVICE_ACCOUNT_JSON_BASE64 must decode to a JSON object");
    }

    Ok(json)
}
