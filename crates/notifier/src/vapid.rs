//! VAPID (RFC 8292) application-server identification for Web Push.

use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use p256::SecretKey;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::EncodePrivateKey;
use serde::Serialize;

use crate::{PushError, URL_SAFE_LENIENT};

/// Lifetime of a VAPID JWT. Push services reject anything beyond 24h.
const TOKEN_LIFETIME_HOURS: i64 = 12;

#[derive(Debug, Serialize)]
struct VapidClaims<'a> {
    aud: String,
    exp: i64,
    sub: &'a str,
}

/// Validated VAPID key pair plus contact subject.
pub struct VapidKeys {
    signing_key: EncodingKey,
    /// Uncompressed public key, base64url without padding (the `k=` parameter).
    public_key: String,
    subject: String,
}

impl std::fmt::Debug for VapidKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VapidKeys")
            .field("public_key", &self.public_key)
            .field("subject", &self.subject)
            .finish_non_exhaustive()
    }
}

impl VapidKeys {
    /// Load keys in the format produced by `web-push generate-vapid-keys`:
    /// a base64url 65-byte public point and a base64url 32-byte private scalar.
    ///
    /// Fails if the public key does not belong to the private key.
    pub fn from_base64(
        public_key: &str,
        private_key: &str,
        subject: impl Into<String>,
    ) -> Result<Self, PushError> {
        let private_bytes = URL_SAFE_LENIENT
            .decode(private_key.trim())
            .map_err(|e| PushError::Config(format!("VAPID private key is not base64url: {}", e)))?;
        let secret = SecretKey::from_slice(&private_bytes)
            .map_err(|_| PushError::Config("VAPID private key is not a P-256 scalar".to_string()))?;

        let public_bytes = URL_SAFE_LENIENT
            .decode(public_key.trim())
            .map_err(|e| PushError::Config(format!("VAPID public key is not base64url: {}", e)))?;
        let derived = secret.public_key().to_encoded_point(false);
        if derived.as_bytes() != public_bytes.as_slice() {
            return Err(PushError::Config(
                "VAPID public key does not match the private key".to_string(),
            ));
        }

        let der = secret
            .to_pkcs8_der()
            .map_err(|e| PushError::Config(format!("cannot encode VAPID key: {}", e)))?;

        Ok(Self {
            signing_key: EncodingKey::from_ec_der(der.as_bytes()),
            public_key: URL_SAFE_LENIENT.encode(derived.as_bytes()),
            subject: subject.into(),
        })
    }

    /// Public key as sent in the `k=` parameter.
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// Build the `Authorization: vapid t=..., k=...` header value for a push endpoint.
    pub fn authorization(
        &self,
        endpoint: &reqwest::Url,
        now: DateTime<Utc>,
    ) -> Result<String, PushError> {
        let claims = VapidClaims {
            aud: endpoint.origin().ascii_serialization(),
            exp: (now + Duration::hours(TOKEN_LIFETIME_HOURS)).timestamp(),
            sub: &self.subject,
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::ES256), &claims, &self.signing_key)
            .map_err(|e| PushError::Auth(format!("failed to sign VAPID token: {}", e)))?;

        Ok(format!("vapid t={}, k={}", token, self.public_key))
    }
}
