//! Cooldown engine — Redis-backed suppression windows for repeated alerts.
//!
//! A listing whose price is edited several times in a row would otherwise send
//! every past buyer one alert per edit. After an alert goes out for a
//! product/buyer pair, further alerts for that pair are suppressed until the
//! key expires.
//!
//! Uses Redis `SET NX EX` for atomic check-and-set with automatic TTL expiry.

use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use uuid::Uuid;

use agrihub_common::error::AppError;

/// Default cooldown duration in seconds (5 minutes).
pub const DEFAULT_COOLDOWN_SECONDS: u64 = 300;

/// Redis-backed cooldown engine.
#[derive(Debug, Clone, Copy)]
pub struct CooldownEngine {
    ttl_seconds: u64,
}

impl CooldownEngine {
    /// A `ttl_seconds` of zero disables suppression.
    pub fn new(ttl_seconds: u64) -> Self {
        Self { ttl_seconds }
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    pub fn price_alert_key(product_id: Uuid, user_id: Uuid) -> String {
        format!("price_alert:cooldown:{}:{}", product_id, user_id)
    }

    /// Check whether `key` is in cooldown, and if not, start the cooldown.
    ///
    /// Returns `true` if the alert should proceed, `false` if it is suppressed.
    pub async fn check_and_set(
        &self,
        redis: &mut ConnectionManager,
        key: &str,
    ) -> Result<bool, AppError> {
        if self.ttl_seconds == 0 {
            return Ok(true);
        }

        // Some("OK") when the key was set, None when it already exists
        let result: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(self.ttl_seconds)
            .query_async(redis)
            .await?;

        let allowed = result.is_some();

        if !allowed {
            tracing::debug!(key, ttl_seconds = self.ttl_seconds, "Alert suppressed by cooldown");
        }

        Ok(allowed)
    }

    /// Clear a cooldown early.
    pub async fn clear(&self, redis: &mut ConnectionManager, key: &str) -> Result<(), AppError> {
        redis.del::<_, ()>(key).await?;
        Ok(())
    }
}

impl Default for CooldownEngine {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN_SECONDS)
    }
}
