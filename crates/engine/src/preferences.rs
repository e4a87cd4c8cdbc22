//! Per-user notification preferences.

use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use agrihub_common::error::AppError;
use agrihub_common::types::NotificationPreferences;

pub struct PreferenceService;

/// Partial update; omitted fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreferencesPatch {
    pub price_change: Option<bool>,
    pub offer: Option<bool>,
    pub admin_update: Option<bool>,
    pub warning: Option<bool>,
}

impl PreferencesPatch {
    pub fn apply(&self, current: NotificationPreferences) -> NotificationPreferences {
        NotificationPreferences {
            price_change: self.price_change.unwrap_or(current.price_change),
            offer: self.offer.unwrap_or(current.offer),
            admin_update: self.admin_update.unwrap_or(current.admin_update),
            warning: self.warning.unwrap_or(current.warning),
        }
    }
}

impl PreferenceService {
    pub async fn get(pool: &PgPool, user_id: Uuid) -> Result<NotificationPreferences, AppError> {
        let stored: serde_json::Value =
            sqlx::query_scalar("SELECT notification_preferences FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(pool)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

        Ok(NotificationPreferences::from_json(&stored))
    }

    pub async fn update(
        pool: &PgPool,
        user_id: Uuid,
        patch: &PreferencesPatch,
    ) -> Result<NotificationPreferences, AppError> {
        let current = Self::get(pool, user_id).await?;
        let updated = patch.apply(current);

        let document = serde_json::to_value(updated)
            .map_err(|e| AppError::Internal(format!("Failed to encode preferences: {}", e)))?;

        sqlx::query("UPDATE users SET notification_preferences = $1 WHERE id = $2")
            .bind(&document)
            .bind(user_id)
            .execute(pool)
            .await?;

        tracing::info!(user_id = %user_id, preferences = %document, "Notification preferences updated");

        Ok(updated)
    }
}
