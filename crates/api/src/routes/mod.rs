pub mod admin;
pub mod health;
pub mod notifications;
pub mod presence;

use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the complete API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(notifications::router())
        .merge(admin::router())
        .merge(presence::router())
        .merge(ws::router())
        .with_state(state)
}
