//! Manual test notification for one account.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use stakewatch_common::error::AppError;
use stakewatch_common::types::DeliveryOutcome;
use stakewatch_engine::dispatcher::deliver;
use stakewatch_engine::payload::PayloadBuilder;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/test-push", post(test_push))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestPushRequest {
    pub xpr_account: Option<String>,
}

/// POST /api/test-push: Send the test payload to every destination of an account.
async fn test_push(
    State(state): State<AppState>,
    Json(req): Json<TestPushRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let account = req
        .xpr_account
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .ok_or_else(|| AppError::Validation("Missing XPR account.".to_string()))?;

    let subscriptions = state.registry.list_by_account(account).await?;
    if subscriptions.is_empty() {
        return Err(AppError::NotFound(format!(
            "No subscriptions found for {}",
            account
        )));
    }

    let payload = PayloadBuilder::test_payload();
    let (mut sent, mut failed, mut removed) = (0usize, 0usize, 0usize);

    for subscription in &subscriptions {
        let delivery = deliver(
            state.provider.as_ref(),
            state.registry.as_ref(),
            subscription,
            &payload,
        )
        .await;

        match delivery.outcome {
            DeliveryOutcome::Delivered => sent += 1,
            _ => failed += 1,
        }
        if delivery.deleted {
            removed += 1;
        }
    }

    tracing::info!(account = %account, sent, failed, removed, "Test push finished");

    if sent == 0 {
        return Err(AppError::Delivery(format!(
            "Failed to send test notification to any of {} subscription(s)",
            subscriptions.len()
        )));
    }

    Ok(Json(json!({
        "message": "Test notification sent.",
        "sent": sent,
        "failed": failed,
        "removed": removed,
    })))
}
