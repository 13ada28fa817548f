//! Application configuration loaded from environment variables.

use gateway::GatewayKind;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `DATABASE_URL` — PostgreSQL connection string; the in-memory store
///   is used when unset
/// - `PAYMENT_PROVIDER` — `"card"` or `"wallet_redirect"` (default: `"card"`)
/// - `RECONCILE_GRACE_SECS` — age before a pending order is swept (default: `300`)
/// - `RECONCILE_INTERVAL_SECS` — delay between sweep passes (default: `60`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub payment_provider: GatewayKind,
    pub reconcile_grace_secs: u64,
    pub reconcile_interval_secs: u64,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            database_url: std::env::var("DATABASE_URL").ok(),
            payment_provider: std::env::var("PAYMENT_PROVIDER")
                .ok()
                .and_then(|p| GatewayKind::parse(&p))
                .unwrap_or(GatewayKind::Card),
            reconcile_grace_secs: std::env::var("RECONCILE_GRACE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            reconcile_interval_secs: std::env::var("RECONCILE_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            payment_provider: GatewayKind::Card,
            reconcile_grace_secs: 300,
            reconcile_interval_secs: 60,
        }
    }
}
