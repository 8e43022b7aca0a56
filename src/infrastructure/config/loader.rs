//! Layered configuration loading and validation.

use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Project-local config directory
pub const CONFIG_DIR: &str = ".autoreply";

/// Prefix for environment overrides; `__` separates nested keys.
pub const ENV_PREFIX: &str = "AUTOREPLY_";

/// Configuration error types
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    /// Unknown `logging.level`.
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    /// Unknown `logging.format`.
    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    /// Unknown `logging.rotation`.
    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    /// `database.path` is empty.
    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    /// `database.max_connections` is zero.
    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    /// Scheduler poll bounds are zero or inverted.
    #[error("Invalid poll bounds: min_poll_interval_ms ({0}) must be positive and not above max_poll_interval_ms ({1})")]
    InvalidPollBounds(u64, u64),

    /// A required interval is zero.
    #[error("Invalid {0}: must be positive")]
    ZeroInterval(&'static str),

    /// A skip threshold confidence lies outside `[0, 1]`.
    #[error("Invalid skip threshold confidence: {0}. Must be within [0, 1]")]
    InvalidThreshold(f64),

    /// `agent.history_limit` is zero.
    #[error("Invalid history_limit: must be at least 1")]
    InvalidHistoryLimit,

    /// `slack.requests_per_second` is zero.
    #[error("Invalid requests_per_second: must be at least 1")]
    InvalidRateLimit,

    #[error(
        "Invalid {0} backoff configuration: initial_backoff_ms ({1}) must be less than max_backoff_ms ({2})"
    )]
    /// Initial backoff is not below the maximum.
    InvalidBackoff(&'static str, u64, u64),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .autoreply/config.yaml
    /// 3. .autoreply/local.yaml (optional local overrides)
    /// 4. Environment variables (AUTOREPLY_* prefix)
    pub fn load() -> Result<Config> {
        let config: Config = Self::figment(Path::new(CONFIG_DIR))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file; environment overrides still apply.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn figment(dir: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(0));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        if !["json", "pretty"].contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }
        if !["daily", "hourly", "never"].contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        let scheduler = &config.scheduler;
        if scheduler.min_poll_interval_ms == 0 || scheduler.min_poll_interval_ms > scheduler.max_poll_interval_ms {
            return Err(ConfigError::InvalidPollBounds(
                scheduler.min_poll_interval_ms,
                scheduler.max_poll_interval_ms,
            ));
        }
        if config.event_loop.dequeue_timeout_ms == 0 {
            return Err(ConfigError::ZeroInterval("event_loop.dequeue_timeout_ms"));
        }
        // Scheduler timers may be zero (disabled); the standalone loops may not.
        if config.mode.uses_periodic() {
            if config.periodic.check_interval_secs == 0 {
                return Err(ConfigError::ZeroInterval("periodic.check_interval_secs"));
            }
            if config.periodic.memory_interval_secs == 0 {
                return Err(ConfigError::ZeroInterval("periodic.memory_interval_secs"));
            }
        }

        if let Some(bad) = config
            .judgment
            .thresholds
            .iter()
            .map(|t| t.min_confidence)
            .find(|c| !(0.0..=1.0).contains(c))
        {
            return Err(ConfigError::InvalidThreshold(bad));
        }

        if config.agent.history_limit == 0 {
            return Err(ConfigError::InvalidHistoryLimit);
        }

        if config.slack.requests_per_second == 0 {
            return Err(ConfigError::InvalidRateLimit);
        }
        if config.slack.initial_backoff_ms >= config.slack.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                "slack",
                config.slack.initial_backoff_ms,
                config.slack.max_backoff_ms,
            ));
        }
        if config.llm.initial_backoff_ms >= config.llm.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                "llm",
                config.llm.initial_backoff_ms,
                config.llm.max_backoff_ms,
            ));
        }

        Ok(())
    }
}
