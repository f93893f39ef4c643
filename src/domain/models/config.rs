//! Engine configuration model.

use serde::{Deserialize, Serialize};

/// Main configuration structure for the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub queue: QueueConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            execution: ExecutionConfig::default(),
            queue: QueueConfig::default(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// `SQLite` database URL.
    #[serde(default = "default_database_url")]
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_url() -> String {
    "sqlite:.reclaim/reclaim.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Action execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ExecutionConfig {
    /// Attempt cap per action before it is considered terminally failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    500
}

const fn default_max_backoff_ms() -> u64 {
    30_000
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Work queue projection thresholds and scheduler cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct QueueConfig {
    /// Potential value above which a pending item counts as high-value.
    #[serde(default = "default_high_value_threshold")]
    pub high_value_threshold: f64,

    /// Hours after which a pending item counts as stale.
    #[serde(default = "default_stale_after_hours")]
    pub stale_after_hours: u32,

    /// Trailing window for the Recently Acted view.
    #[serde(default = "default_recent_window_hours")]
    pub recent_window_hours: u32,

    /// Poll cadence for re-queueing expired snoozes.
    #[serde(default = "default_snooze_poll_interval_secs")]
    pub snooze_poll_interval_secs: u64,
}

const fn default_stale_after_hours() -> u32 {
    48
}

const fn default_recent_window_hours() -> u32 {
    24
}

fn default_high_value_threshold() -> f64 {
    1000.0
}

const fn default_snooze_poll_interval_secs() -> u64 {
    30
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            high_value_threshold: default_high_value_threshold(),
            stale_after_hours: default_stale_after_hours(),
            recent_window_hours: default_recent_window_hours(),
            snooze_poll_interval_secs: default_snooze_poll_interval_secs(),
        }
    }
}
