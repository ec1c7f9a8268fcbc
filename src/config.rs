use crate::error::{AppError, Result};

pub const LINE_PUSH_URL: &str = "https://api.line.me/v2/bot/message/push";

/// Reserved id for the run-lock row. Never a valid item id.
pub const UPDATE_LOCK_ID: &str = "__UPDATE_LOCK__";

/// Reschedule delay bounds (minutes). The next run fires at a uniformly
/// sampled point in [RESCHEDULE_MIN_MINUTES, RESCHEDULE_MAX_MINUTES).
pub const RESCHEDULE_MIN_MINUTES: u64 = 600;
pub const RESCHEDULE_MAX_MINUTES: u64 = 840;

/// Inter-item fetch delay bounds (milliseconds) — jitter so the source site
/// never sees a fixed scrape rhythm.
pub const FETCH_DELAY_MIN_MS: u64 = 300;
pub const FETCH_DELAY_MAX_MS: u64 = 1000;

/// User agents, one picked at random per cycle.
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:123.0) Gecko/20100101 Firefox/123.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.3 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36 Edg/122.0.0.0",
];

pub const ACCEPT_LANGUAGE: &str = "ja-JP,ja;q=0.9,en-US;q=0.8,en;q=0.7";

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// Job identity used for the lock record and trigger names (JOB_NAME).
    pub job_name: String,
    /// Discount percentage at or above which an item qualifies as a sale (SALE_PERCENTAGE).
    pub sale_percentage: f64,
    /// Absolute price at or below which an item qualifies as a sale (SALE_PRICE).
    pub sale_price: f64,
    /// Minimum days between two notifications for the same item (NOTIFICATION_INTERVAL_DAYS).
    pub notification_interval_days: i64,
    /// Run-lock time-to-live in minutes (LOCK_TTL_MINUTES).
    pub lock_ttl_minutes: i64,
    /// LINE Messaging API credential (LINE_CHANNEL_ACCESS_TOKEN).
    pub line_channel_access_token: String,
    /// Push recipient (LINE_USER_ID).
    pub line_user_id: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "watcher.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            job_name: std::env::var("JOB_NAME").unwrap_or_else(|_| "kindle-watcher".to_string()),
            sale_percentage: std::env::var("SALE_PERCENTAGE")
                .unwrap_or_else(|_| "20".to_string())
                .parse::<f64>()
                .unwrap_or(20.0),
            sale_price: std::env::var("SALE_PRICE")
                .unwrap_or_else(|_| "500".to_string())
                .parse::<f64>()
                .unwrap_or(500.0),
            notification_interval_days: std::env::var("NOTIFICATION_INTERVAL_DAYS")
                .unwrap_or_else(|_| "7".to_string())
                .parse::<i64>()
                .unwrap_or(7),
            lock_ttl_minutes: std::env::var("LOCK_TTL_MINUTES")
                .unwrap_or_else(|_| "60".to_string())
                .parse::<i64>()
                .unwrap_or(60),
            line_channel_access_token: std::env::var("LINE_CHANNEL_ACCESS_TOKEN")
                .unwrap_or_default(),
            line_user_id: std::env::var("LINE_USER_ID").unwrap_or_default(),
        })
    }
}
