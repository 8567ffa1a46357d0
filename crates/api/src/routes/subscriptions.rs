//! Subscribe / unsubscribe routes used by the PWA.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use stakewatch_common::error::AppError;
use stakewatch_engine::DestinationRef;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/subscribe", post(subscribe))
        .route("/api/unsubscribe", post(unsubscribe))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    pub xpr_account: Option<String>,
    /// Browser `PushSubscription.toJSON()`.
    pub subscription: Option<serde_json::Value>,
    pub fcm_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsubscribeRequest {
    pub subscription: Option<serde_json::Value>,
    pub fcm_token: Option<String>,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn endpoint_of(subscription: Option<&serde_json::Value>) -> Option<&str> {
    non_empty(subscription.and_then(|s| s.get("endpoint")).and_then(|v| v.as_str()))
}

/// POST /api/subscribe: Register a Web Push subscription or FCM token for an account.
async fn subscribe(
    State(state): State<AppState>,
    Json(req): Json<SubscribeRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let account = non_empty(req.xpr_account.as_deref())
        .ok_or_else(|| AppError::Validation("Missing XPR account.".to_string()))?;

    let destination = if let Some(subscription) = req.subscription.as_ref()
        && endpoint_of(Some(subscription)).is_some()
    {
        subscription.clone()
    } else if let Some(token) = non_empty(req.fcm_token.as_deref()) {
        json!(token)
    } else {
        return Err(AppError::Validation(
            "Missing subscription endpoint or fcmToken.".to_string(),
        ));
    };

    let sub = state.registry.insert(account, destination).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Subscription saved successfully.",
            "id": sub.id,
        })),
    ))
}

/// POST /api/unsubscribe: Forget a destination, by endpoint or FCM token.
async fn unsubscribe(
    State(state): State<AppState>,
    Json(req): Json<UnsubscribeRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let destination = if let Some(endpoint) = endpoint_of(req.subscription.as_ref()) {
        DestinationRef::Endpoint(endpoint.to_string())
    } else if let Some(token) = non_empty(req.fcm_token.as_deref()) {
        DestinationRef::FcmToken(token.to_string())
    } else {
        return Err(AppError::Validation(
            "Missing subscription endpoint or fcmToken.".to_string(),
        ));
    };

    let removed = state.registry.delete_by_destination(&destination).await?;

    Ok(Json(json!({
        "message": "Subscription deleted successfully.",
        "removed": removed,
    })))
}
