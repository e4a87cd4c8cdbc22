//! Presence query route.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/presence/online", get(online_users))
}

/// GET /api/presence/online — Users with an open notification socket.
async fn online_users(State(state): State<AppState>, _auth: AuthUser) -> Json<serde_json::Value> {
    let users = state.hub.online_users();
    Json(json!({
        "count": users.len(),
        "users": users
    }))
}
