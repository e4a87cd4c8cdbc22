//! Notification service — persistence plus live push.
//!
//! Every write goes to PostgreSQL first; only a committed row is pushed to the
//! recipient's socket. A failed or skipped push is never retried: offline
//! users pick the record up on their next poll of the list endpoints.

use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use agrihub_common::error::AppError;
use agrihub_common::types::{NewNotification, Notification, NotificationType, User, UserRole};
use agrihub_notifier::{Delivery, NotificationHub, ServerEvent};

/// Default page size for notification listing.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Largest page a client may request.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Service layer for notification persistence and delivery.
pub struct NotificationService;

/// Parameters for a role-wide (or everyone) broadcast.
#[derive(Debug, Clone, Deserialize)]
pub struct BroadcastParams {
    pub title: String,
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: Option<NotificationType>,
    #[serde(default)]
    pub target_role: Option<UserRole>,
}

/// Query parameters for listing notifications.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// One page of a user's notifications, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationPage {
    pub notifications: Vec<Notification>,
    pub total: i64,
    pub total_pages: i64,
    pub current_page: i64,
    pub limit: i64,
}

impl ListParams {
    /// Resolve to `(page, limit)` with page >= 1 and limit in `1..=MAX_PAGE_SIZE`.
    pub fn normalized(&self) -> (i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        (page, limit)
    }

    /// Rows to skip for the resolved page. Saturates so an absurd page reads as empty.
    pub fn offset(&self) -> i64 {
        let (page, limit) = self.normalized();
        (page - 1).saturating_mul(limit)
    }
}

fn total_pages(total: i64, limit: i64) -> i64 {
    (total + limit - 1) / limit
}

fn validate_text(title: &str, message: &str) -> Result<(), AppError> {
    if title.trim().is_empty() {
        return Err(AppError::Validation("title must not be empty".to_string()));
    }
    if message.trim().is_empty() {
        return Err(AppError::Validation("message must not be empty".to_string()));
    }
    Ok(())
}

impl NotificationService {
    /// Persist a notification for one user and push it if they are online.
    ///
    /// Returns `None` when the recipient does not exist or has muted this
    /// notification type; nothing is stored or sent in that case.
    pub async fn create_and_emit(
        pool: &PgPool,
        hub: &NotificationHub,
        new: &NewNotification,
    ) -> Result<Option<Notification>, AppError> {
        validate_text(&new.title, &new.message)?;

        let Some(user) = Self::find_recipient(pool, new.user_id).await? else {
            tracing::debug!(user_id = %new.user_id, "Recipient not found, notification skipped");
            return Ok(None);
        };

        if !user.preferences().allows(new.kind) {
            tracing::debug!(
                user_id = %user.id,
                kind = %new.kind,
                "Recipient muted this notification type"
            );
            return Ok(None);
        }

        let notification = Self::insert(pool, new).await?;
        let delivery = hub.push(
            notification.user_id,
            &ServerEvent::NewNotification(notification.clone()),
        );

        tracing::info!(
            notification_id = %notification.id,
            user_id = %notification.user_id,
            kind = %notification.kind,
            ?delivery,
            "Notification created"
        );

        Ok(Some(notification))
    }

    /// Send the same notification to every user (optionally only one role).
    ///
    /// All rows are inserted in one transaction; pushes start after commit.
    /// Returns the number of notifications created.
    pub async fn broadcast(
        pool: &PgPool,
        hub: &NotificationHub,
        params: &BroadcastParams,
    ) -> Result<usize, AppError> {
        validate_text(&params.title, &params.message)?;
        let kind = params.kind.unwrap_or(NotificationType::AdminUpdate);

        let users: Vec<User> = sqlx::query_as(
            r#"
            SELECT * FROM users
            WHERE ($1::text IS NULL OR role = $1)
            ORDER BY created_at
            "#,
        )
        .bind(params.target_role.map(|r| r.to_string()))
        .fetch_all(pool)
        .await?;

        let recipients: Vec<&User> = users
            .iter()
            .filter(|u| u.preferences().allows(kind))
            .collect();

        if recipients.is_empty() {
            tracing::info!(kind = %kind, "Broadcast matched no recipients");
            return Ok(0);
        }

        let mut tx = pool.begin().await?;
        let mut created = Vec::with_capacity(recipients.len());
        for user in &recipients {
            let new = NewNotification {
                user_id: user.id,
                kind,
                title: params.title.clone(),
                message: params.message.clone(),
                related_product: None,
                metadata: None,
            };
            created.push(Self::insert(&mut *tx, &new).await?);
        }
        tx.commit().await?;

        let delivered = created
            .iter()
            .filter(|n| {
                hub.push(n.user_id, &ServerEvent::NewNotification((*n).clone()))
                    == Delivery::Delivered
            })
            .count();

        tracing::info!(
            kind = %kind,
            target_role = ?params.target_role,
            created = created.len(),
            delivered,
            "Broadcast sent"
        );

        Ok(created.len())
    }

    /// List a user's notifications, newest first.
    pub async fn list(
        pool: &PgPool,
        user_id: Uuid,
        params: &ListParams,
    ) -> Result<NotificationPage, AppError> {
        let (page, limit) = params.normalized();
        let offset = params.offset();

        let notifications: Vec<Notification> = sqlx::query_as(
            r#"
            SELECT * FROM notifications
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await?;

        Ok(NotificationPage {
            notifications,
            total,
            total_pages: total_pages(total, limit),
            current_page: page,
            limit,
        })
    }

    /// Number of unread notifications for a user.
    pub async fn unread_count(pool: &PgPool, user_id: Uuid) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        Ok(count)
    }

    /// Mark one of the user's notifications as read.
    pub async fn mark_read(
        pool: &PgPool,
        user_id: Uuid,
        notification_id: Uuid,
    ) -> Result<Notification, AppError> {
        let notification: Notification = sqlx::query_as(
            r#"
            UPDATE notifications
            SET is_read = TRUE, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(notification_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Notification {} not found", notification_id)))?;

        Ok(notification)
    }

    /// Mark every unread notification of the user as read. Returns rows updated.
    pub async fn mark_all_read(pool: &PgPool, user_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = TRUE, updated_at = NOW()
            WHERE user_id = $1 AND is_read = FALSE
            "#,
        )
        .bind(user_id)
        .execute(pool)
        .await?;

        tracing::debug!(user_id = %user_id, updated = result.rows_affected(), "Marked all read");
        Ok(result.rows_affected())
    }

    /// Delete one of the user's notifications. Returns true if it was deleted.
    pub async fn delete(
        pool: &PgPool,
        user_id: Uuid,
        notification_id: Uuid,
    ) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
            .bind(notification_id)
            .bind(user_id)
            .execute(pool)
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            tracing::info!(notification_id = %notification_id, "Notification deleted");
        }

        Ok(deleted)
    }

    /// Whether a user with this id exists.
    pub async fn recipient_exists(pool: &PgPool, user_id: Uuid) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(pool)
            .await?;
        Ok(exists)
    }

    async fn find_recipient(pool: &PgPool, user_id: Uuid) -> Result<Option<User>, AppError> {
        let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
        Ok(user)
    }

    async fn insert<'e, E: PgExecutor<'e>>(
        executor: E,
        new: &NewNotification,
    ) -> Result<Notification, AppError> {
        let metadata = new.metadata.clone().unwrap_or(serde_json::json!({}));

        let notification: Notification = sqlx::query_as(
            r#"
            INSERT INTO notifications (id, user_id, type, title, message, related_product, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.user_id)
        .bind(new.kind.to_string())
        .bind(&new.title)
        .bind(&new.message)
        .bind(new.related_product)
        .bind(&metadata)
        .fetch_one(executor)
        .await?;

        Ok(notification)
    }
}
