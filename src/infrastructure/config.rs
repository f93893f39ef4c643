//! Hierarchical configuration loading.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::EngineConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Database URL cannot be empty")]
    EmptyDatabaseUrl,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid max_attempts: {0}. Cannot be 0")]
    InvalidMaxAttempts(u32),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Invalid snooze_poll_interval_secs: {0}. Cannot be 0")]
    InvalidPollInterval(u64),
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .reclaim/config.yaml (project config)
    /// 3. .reclaim/local.yaml (local overrides, optional)
    /// 4. Environment variables (RECLAIM_* prefix, highest priority)
    pub fn load() -> Result<EngineConfig> {
        let config: EngineConfig = Figment::new()
            .merge(Serialized::defaults(EngineConfig::default()))
            .merge(Yaml::file(".reclaim/config.yaml"))
            .merge(Yaml::file(".reclaim/local.yaml"))
            .merge(Env::prefixed("RECLAIM_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<EngineConfig> {
        let config: EngineConfig = Figment::new()
            .merge(Serialized::defaults(EngineConfig::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    pub fn validate(config: &EngineConfig) -> Result<(), ConfigError> {
        if config.database.url.is_empty() {
            return Err(ConfigError::EmptyDatabaseUrl);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        if config.execution.max_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts(config.execution.max_attempts));
        }
        if config.execution.initial_backoff_ms >= config.execution.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.execution.initial_backoff_ms,
                config.execution.max_backoff_ms,
            ));
        }

        if config.queue.snooze_poll_interval_secs == 0 {
            return Err(ConfigError::InvalidPollInterval(config.queue.snooze_poll_interval_secs));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert_eq!(config.database.url, "sqlite:.reclaim/reclaim.db");
        assert_eq!(config.execution.max_attempts, 3);
        assert_eq!(config.queue.stale_after_hours, 48);
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
database:
  url: sqlite:/custom/engine.db
  max_connections: 10
execution:
  max_attempts: 5
  initial_backoff_ms: 250
queue:
  high_value_threshold: 5000.0
  recent_window_hours: 12
logging:
  level: debug
  format: json
";

        let config: EngineConfig = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.database.url, "sqlite:/custom/engine.db");
        assert_eq!(config.execution.max_attempts, 5);
        assert_eq!(config.execution.initial_backoff_ms, 250);
        assert!((config.queue.high_value_threshold - 5000.0).abs() < f64::EPSILON);
        assert_eq!(config.queue.recent_window_hours, 12);
        assert_eq!(config.logging.level, "debug");

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = EngineConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidLogLevel(_)
        ));
    }

    #[test]
    fn test_validate_zero_max_attempts() {
        let mut config = EngineConfig::default();
        config.execution.max_attempts = 0;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidMaxAttempts(0)
        ));
    }

    #[test]
    fn test_validate_inverted_backoff() {
        let mut config = EngineConfig::default();
        config.execution.initial_backoff_ms = 60_000;
        config.execution.max_backoff_ms = 1_000;
        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidBackoff(60_000, 1_000)
        ));
    }

    #[test]
    fn test_hierarchical_merging() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut base_file = NamedTempFile::new().unwrap();
        writeln!(
            base_file,
            "execution:\n  max_attempts: 2\nlogging:\n  level: info\n  format: json"
        )
        .unwrap();
        base_file.flush().unwrap();

        let mut override_file = NamedTempFile::new().unwrap();
        writeln!(override_file, "execution:\n  max_attempts: 7\nlogging:\n  level: debug").unwrap();
        override_file.flush().unwrap();

        let config: EngineConfig = Figment::new()
            .merge(Serialized::defaults(EngineConfig::default()))
            .merge(Yaml::file(base_file.path()))
            .merge(Yaml::file(override_file.path()))
            .extract()
            .unwrap();

        assert_eq!(config.execution.max_attempts, 7, "Override should win");
        assert_eq!(config.logging.level, "debug", "Override should win for nested fields");
        assert_eq!(config.logging.format, "json", "Base value should persist when not overridden");
    }
}
