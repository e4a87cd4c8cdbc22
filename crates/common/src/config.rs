use serde::Deserialize;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Redis connection string
    pub redis_url: String,

    /// HS256 secret shared with the auth service that issues user tokens
    pub jwt_secret: String,

    /// Port the HTTP + WebSocket server binds to (default: 5000)
    pub server_port: u16,

    /// Allowed browser origin for CORS (default: the Vite dev server)
    pub cors_origin: String,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,

    /// Capacity of each socket's outbound queue. Pushes beyond it are dropped.
    pub ws_outbound_buffer: usize,

    /// Suppression window for repeated price alerts on the same product/buyer pair
    pub price_alert_cooldown_seconds: u64,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            jwt_secret: std::env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?,
            server_port: std::env::var("SERVER_PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SERVER_PORT must be a valid u16"))?,
            cors_origin: std::env::var("CORS_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            db_max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_MAX_CONNECTIONS must be a valid u32"))?,
            ws_outbound_buffer: std::env::var("WS_OUTBOUND_BUFFER")
                .unwrap_or_else(|_| "32".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("WS_OUTBOUND_BUFFER must be a valid usize"))?,
            price_alert_cooldown_seconds: std::env::var("PRICE_ALERT_COOLDOWN_SECONDS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .map_err(|_| {
                    anyhow::anyhow!("PRICE_ALERT_COOLDOWN_SECONDS must be a valid u64")
                })?,
        })
    }
}
