//! Admin notification routes: direct sends, broadcasts and price alerts.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;
use uuid::Uuid;

use agrihub_common::error::AppError;
use agrihub_common::types::{NewNotification, NotificationType};
use agrihub_engine::notifications::{BroadcastParams, NotificationService};
use agrihub_engine::triggers::{NotificationTriggers, PriceChange};

use crate::middleware::auth::AdminUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/admin/notifications", post(create_notification))
        .route("/api/admin/notifications/broadcast", post(broadcast))
        .route("/api/admin/notifications/offer", post(broadcast_offer))
        .route("/api/admin/products/{id}/price-alert", post(price_alert))
}

/// POST /api/admin/notifications — Send one notification to one user.
///
/// 201 when stored, 200 with `created: false` when the recipient muted the
/// type, 404 when the recipient does not exist.
async fn create_notification(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(new): Json<NewNotification>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let created = NotificationService::create_and_emit(&state.pool, &state.hub, &new).await?;

    tracing::info!(
        admin_id = %admin.user_id,
        user_id = %new.user_id,
        created = created.is_some(),
        "Admin notification requested"
    );

    match created {
        Some(notification) => Ok((
            StatusCode::CREATED,
            Json(json!({
                "message": "Notification created",
                "created": true,
                "notification": notification
            })),
        )),
        None if !NotificationService::recipient_exists(&state.pool, new.user_id).await? => {
            Err(AppError::NotFound(format!("User {} not found", new.user_id)))
        }
        None => Ok((
            StatusCode::OK,
            Json(json!({
                "message": format!("Recipient has muted {} notifications", new.kind),
                "created": false,
                "notification": null
            })),
        )),
    }
}

/// POST /api/admin/notifications/broadcast — Notify every user, or one role.
async fn broadcast(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(params): Json<BroadcastParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    send_broadcast(&state, admin.user_id, &params).await
}

/// POST /api/admin/notifications/offer — Broadcast with the `offer` type.
async fn broadcast_offer(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(mut params): Json<BroadcastParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    params.kind = Some(NotificationType::Offer);
    send_broadcast(&state, admin.user_id, &params).await
}

async fn send_broadcast(
    state: &AppState,
    admin_id: Uuid,
    params: &BroadcastParams,
) -> Result<Json<serde_json::Value>, AppError> {
    let sent = NotificationService::broadcast(&state.pool, &state.hub, params).await?;
    tracing::info!(admin_id = %admin_id, sent, "Admin broadcast");

    Ok(Json(json!({
        "message": format!("Notification sent to {} users", sent),
        "sent": sent
    })))
}

/// POST /api/admin/products/:id/price-alert — Alert past buyers of a price change.
async fn price_alert(
    State(mut state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(product_id): Path<Uuid>,
    Json(change): Json<PriceChange>,
) -> Result<Json<serde_json::Value>, AppError> {
    let notified = NotificationTriggers::notify_price_change(
        &state.pool,
        &mut state.redis,
        &state.hub,
        &state.cooldown,
        product_id,
        change,
    )
    .await?;

    Ok(Json(json!({
        "product_id": product_id,
        "notified": notified
    })))
}
