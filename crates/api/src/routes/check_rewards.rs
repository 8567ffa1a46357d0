//! Dispatcher trigger, called by the scheduler.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use stakewatch_common::error::AppError;

use crate::middleware::cron::CronAuth;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/check-rewards", get(check_rewards).post(check_rewards))
}

/// GET|POST /api/check-rewards: Run the dispatcher once and report the summary.
async fn check_rewards(
    State(state): State<AppState>,
    _auth: CronAuth,
) -> Result<Json<serde_json::Value>, AppError> {
    let summary = state.dispatcher.run().await?;

    Ok(Json(json!({
        "message": "Reward check complete.",
        "summary": summary,
    })))
}
