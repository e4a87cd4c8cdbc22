//! Notification inbox routes for the authenticated user.
//!
//! These are the polling side of delivery: anything pushed while the user was
//! offline (or dropped on a full socket) is read back from here.

use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, patch};
use axum::{Json, Router};
use serde_json::json;
use uuid::Uuid;

use agrihub_common::error::AppError;
use agrihub_common::types::{Notification, NotificationPreferences};
use agrihub_engine::notifications::{ListParams, NotificationPage, NotificationService};
use agrihub_engine::preferences::{PreferenceService, PreferencesPatch};

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/unread-count", get(unread_count))
        .route("/api/notifications/read-all", patch(mark_all_read))
        .route(
            "/api/notifications/preferences",
            get(get_preferences).put(update_preferences),
        )
        .route("/api/notifications/{id}/read", patch(mark_read))
        .route("/api/notifications/{id}", delete(delete_notification))
}

/// GET /api/notifications — Page through the user's notifications, newest first.
async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<ListParams>,
) -> Result<Json<NotificationPage>, AppError> {
    let page = NotificationService::list(&state.pool, auth.user_id, &params).await?;
    Ok(Json(page))
}

/// GET /api/notifications/unread-count
async fn unread_count(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<serde_json::Value>, AppError> {
    let count = NotificationService::unread_count(&state.pool, auth.user_id).await?;
    Ok(Json(json!({ "count": count })))
}

/// PATCH /api/notifications/read-all
async fn mark_all_read(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<serde_json::Value>, AppError> {
    let updated = NotificationService::mark_all_read(&state.pool, auth.user_id).await?;
    Ok(Json(json!({
        "message": "All notifications marked as read",
        "updated": updated
    })))
}

/// PATCH /api/notifications/:id/read
async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>, AppError> {
    let notification = NotificationService::mark_read(&state.pool, auth.user_id, id).await?;
    Ok(Json(notification))
}

/// DELETE /api/notifications/:id
async fn delete_notification(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let deleted = NotificationService::delete(&state.pool, auth.user_id, id).await?;
    if deleted {
        Ok(Json(json!({ "message": "Notification deleted" })))
    } else {
        Err(AppError::NotFound(format!("Notification {} not found", id)))
    }
}

async fn get_preferences(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<NotificationPreferences>, AppError> {
    let preferences = PreferenceService::get(&state.pool, auth.user_id).await?;
    Ok(Json(preferences))
}

async fn update_preferences(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(patch): Json<PreferencesPatch>,
) -> Result<Json<NotificationPreferences>, AppError> {
    let preferences = PreferenceService::update(&state.pool, auth.user_id, &patch).await?;
    Ok(Json(preferences))
}
