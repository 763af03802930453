use crate::error::{AppError, Result};

pub const DEFAULT_PORT: u16 = 3001;

/// How often the staleness monitor wakes up (seconds).
pub const STALENESS_CHECK_INTERVAL_SECS: u64 = 30;

/// Silence longer than this demotes the overall status to `unknown`.
pub const STALE_THRESHOLD_MS: u64 = 60_000;

/// Alerts retained in the status ring, newest first.
pub const MAX_ALERTS: usize = 50;

/// Per-subscriber outbound frame queue. A subscriber that falls this far
/// behind starts losing frames; the others are unaffected.
pub const SUBSCRIBER_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_host: String,
    pub port: u16,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            bind_host: std::env::var("BIND_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| DEFAULT_PORT.to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("PORT must be a valid port number".to_string()))?,
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            log_level: "info".to_string(),
        }
    }
}
