pub mod check_rewards;
pub mod health;
pub mod subscriptions;
pub mod test_push;

use axum::Router;

use crate::state::AppState;

/// Build the complete API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(check_rewards::router())
        .merge(subscriptions::router())
        .merge(test_push::router())
        .with_state(state)
}
