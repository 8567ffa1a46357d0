//! Scheduler authentication for the dispatcher trigger.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use stakewatch_common::error::AppError;

use crate::state::AppState;

/// Proof that the caller may trigger a dispatcher run.
///
/// When `CRON_SECRET` is configured the request must carry
/// `Authorization: Bearer <secret>`; without a secret every caller passes.
#[derive(Debug, Clone, Copy)]
pub struct CronAuth;

impl FromRequestParts<AppState> for CronAuth {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(secret) = state.cron_secret.as_deref() else {
            return Ok(CronAuth);
        };

        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        match token {
            Some(token) if constant_time_eq(token.as_bytes(), secret.as_bytes()) => Ok(CronAuth),
            Some(_) => {
                tracing::warn!("Rejected trigger with wrong cron secret");
                Err(AppError::Auth("Unauthorized".to_string()))
            }
            None => Err(AppError::Auth("Unauthorized".to_string())),
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
