//! Shared application state for the Axum API server.

use agrihub_common::config::AppConfig;
use agrihub_engine::cooldown::CooldownEngine;
use agrihub_notifier::NotificationHub;
use redis::aio::ConnectionManager;
use sqlx::PgPool;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub redis: ConnectionManager,
    pub config: AppConfig,
    pub hub: NotificationHub,
    pub cooldown: CooldownEngine,
}

impl AppState {
    pub fn new(pool: PgPool, redis: ConnectionManager, config: AppConfig) -> Self {
        let hub = NotificationHub::new(config.ws_outbound_buffer);
        let cooldown = CooldownEngine::new(config.price_alert_cooldown_seconds);
        Self {
            pool,
            redis,
            config,
            hub,
            cooldown,
        }
    }
}
