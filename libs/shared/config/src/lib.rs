use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_host: String,
    pub bind_port: u16,
    /// Default lifetime of a waitlist offer before it expires.
    pub offer_ttl_minutes: i64,
    /// How often the background sweeper checks for stale offers.
    pub offer_sweep_interval_seconds: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            bind_host: env::var("BIND_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            bind_port: env::var("BIND_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            offer_ttl_minutes: env::var("OFFER_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(|| {
                    warn!("OFFER_TTL_MINUTES not set, using default of 120");
                    120
                }),
            offer_sweep_interval_seconds: env::var("OFFER_SWEEP_INTERVAL_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            bind_port: 3000,
            offer_ttl_minutes: 120,
            offer_sweep_interval_seconds: 60,
        }
    }
}
