//! Marketplace events that fan out into notifications.

use redis::aio::ConnectionManager;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use agrihub_common::error::AppError;
use agrihub_common::types::{NewNotification, NotificationType, Product};
use agrihub_notifier::NotificationHub;

use crate::cooldown::CooldownEngine;
use crate::notifications::NotificationService;

/// A committed price change on a product listing.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PriceChange {
    pub old_price: f64,
    pub new_price: f64,
}

impl PriceChange {
    pub fn validate(&self) -> Result<(), AppError> {
        for (name, value) in [("old_price", self.old_price), ("new_price", self.new_price)] {
            if !value.is_finite() || value < 0.0 {
                return Err(AppError::Validation(format!(
                    "{} must be a non-negative number",
                    name
                )));
            }
        }
        Ok(())
    }

    pub fn is_change(&self) -> bool {
        self.old_price != self.new_price
    }
}

pub struct NotificationTriggers;

impl NotificationTriggers {
    /// Notify every past buyer of `product_id` that its price changed.
    ///
    /// Buyers inside the cooldown window for this product are skipped, as are
    /// buyers who muted price alerts. A failure for one buyer is logged and the
    /// fan-out moves on. Returns the number of notifications created.
    pub async fn notify_price_change(
        pool: &PgPool,
        redis: &mut ConnectionManager,
        hub: &NotificationHub,
        cooldown: &CooldownEngine,
        product_id: Uuid,
        change: PriceChange,
    ) -> Result<u32, AppError> {
        change.validate()?;
        let product = Self::find_product(pool, product_id).await?;

        if !change.is_change() {
            tracing::debug!(product_id = %product.id, "Price unchanged, no alerts");
            return Ok(0);
        }

        let buyers = Self::past_buyers(pool, product.id).await?;
        tracing::info!(
            product_id = %product.id,
            old_price = change.old_price,
            new_price = change.new_price,
            buyers = buyers.len(),
            "Price change detected"
        );

        let mut created = 0u32;
        for buyer in buyers {
            let key = CooldownEngine::price_alert_key(product.id, buyer);
            match cooldown.check_and_set(redis, &key).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    tracing::warn!(
                        product_id = %product.id,
                        user_id = %buyer,
                        error = %e,
                        "Cooldown check failed, skipping buyer"
                    );
                    continue;
                }
            }

            let new = Self::price_change_notification(buyer, &product, change);
            match NotificationService::create_and_emit(pool, hub, &new).await {
                Ok(Some(_)) => created += 1,
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(
                        product_id = %product.id,
                        user_id = %buyer,
                        error = %e,
                        "Failed to create price alert"
                    );
                    // Nothing was stored; release the cooldown.
                    if let Err(e) = cooldown.clear(redis, &key).await {
                        tracing::warn!(key = %key, error = %e, "Failed to clear cooldown");
                    }
                }
            }
        }

        Ok(created)
    }

    /// Build the alert a past buyer receives for a price change.
    pub fn price_change_notification(
        user_id: Uuid,
        product: &Product,
        change: PriceChange,
    ) -> NewNotification {
        NewNotification {
            user_id,
            kind: NotificationType::PriceChange,
            title: "Price Change Alert".to_string(),
            message: format!(
                "The price of {} has changed from ${} to ${}",
                product.name, change.old_price, change.new_price
            ),
            related_product: Some(product.id),
            metadata: Some(serde_json::json!({
                "oldPrice": change.old_price,
                "newPrice": change.new_price,
            })),
        }
    }

    pub async fn find_product(pool: &PgPool, product_id: Uuid) -> Result<Product, AppError> {
        let product: Product = sqlx::query_as(
            "SELECT id, owner_id, name, price_per_kg FROM products WHERE id = $1",
        )
        .bind(product_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Product {} not found", product_id)))?;

        Ok(product)
    }

    /// Distinct users who have ordered the product.
    async fn past_buyers(pool: &PgPool, product_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        let buyers: Vec<Uuid> = sqlx::query_scalar(
            "SELECT DISTINCT buyer_id FROM orders WHERE product_id = $1 ORDER BY buyer_id",
        )
        .bind(product_id)
        .fetch_all(pool)
        .await?;

        Ok(buyers)
    }
}
