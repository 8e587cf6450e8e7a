use crate::error::{AppError, Result};

pub const API_URL: &str = "http://localhost:5000";
pub const DEFAULT_LOTTERY: &str = "LOTTO ACTIVO";

/// Request timeout for the results API (seconds). Pattern searches scan the
/// whole history server-side, so this is generous.
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// Auto-scraping status poll interval (seconds).
pub const STATUS_POLL_INTERVAL_SECS: u64 = 30;

/// Minimum similarity (percent) sent with pattern searches when none is given.
pub const DEFAULT_MIN_SIMILARITY: u32 = 30;

/// Widest frequency matrix the dashboard renders.
pub const MAX_TOP_N: usize = 10;

/// Default look-back window for searches started without an explicit range.
pub const DEFAULT_RANGE_DAYS: i64 = 90;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub log_level: String,
    pub http_timeout_secs: u64,
    pub status_poll_interval_secs: u64,
    /// Lottery preselected by the CLI and TUI (DEFAULT_LOTTERY)
    pub default_lottery: String,
    /// Minimum similarity percent for pattern searches (MIN_SIMILARITY)
    pub min_similarity: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let min_similarity = std::env::var("MIN_SIMILARITY")
            .unwrap_or_else(|_| DEFAULT_MIN_SIMILARITY.to_string())
            .parse::<u32>()
            .map_err(|_| AppError::Config("MIN_SIMILARITY must be a whole percent".to_string()))?;
        if min_similarity > 100 {
            return Err(AppError::Config("MIN_SIMILARITY must be between 0 and 100".to_string()));
        }

        Ok(Self {
            api_url: std::env::var("API_URL")
                .unwrap_or_else(|_| API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            http_timeout_secs: std::env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| HTTP_TIMEOUT_SECS.to_string())
                .parse::<u64>()
                .map_err(|_| AppError::Config("HTTP_TIMEOUT_SECS must be a number of seconds".to_string()))?,
            status_poll_interval_secs: std::env::var("STATUS_POLL_INTERVAL_SECS")
                .unwrap_or_else(|_| STATUS_POLL_INTERVAL_SECS.to_string())
                .parse::<u64>()
                .unwrap_or(STATUS_POLL_INTERVAL_SECS)
                .max(1),
            default_lottery: std::env::var("DEFAULT_LOTTERY")
                .unwrap_or_else(|_| DEFAULT_LOTTERY.to_string()),
            min_similarity,
        })
    }
}
