// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Engine configuration.
//!
//! Supports both programmatic and file-based configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Reconciliation period (seconds).
    #[serde(default = "default_update_interval")]
    pub update_interval_secs: u64,

    /// Delay before the first reconciliation tick (seconds).
    #[serde(default = "default_initial_delay")]
    pub initial_delay_secs: u64,

    /// Advisory lifetime for live-location messages (seconds), passed
    /// through to channel implementations.
    #[serde(default = "default_live_period")]
    pub live_period_secs: u32,

    /// How long `track_off` waits for the loops to join before giving up.
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_ms: u64,

    /// Feed reconnect policy.
    #[serde(default)]
    pub reconnect: ReconnectConfig,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_update_interval() -> u64 {
    30
}

fn default_initial_delay() -> u64 {
    30
}

fn default_live_period() -> u32 {
    86400
}

fn default_stop_timeout() -> u64 {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: default_update_interval(),
            initial_delay_secs: default_initial_delay(),
            live_period_secs: default_live_period(),
            stop_timeout_ms: default_stop_timeout(),
            reconnect: ReconnectConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl TrackerConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.update_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "update_interval_secs must be positive".into(),
            ));
        }
        if self.stop_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "stop_timeout_ms must be positive".into(),
            ));
        }
        self.reconnect.validate()
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

/// Bounded reconnect policy for the feed link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Consecutive feed failures (connect or read) before the ingestion
    /// loop gives up; a received record resets the count.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff before the first retry (milliseconds); doubles per attempt.
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Backoff ceiling (milliseconds).
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff() -> u64 {
    1000
}

fn default_max_backoff() -> u64 {
    30_000
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

impl ReconnectConfig {
    /// Backoff before retry number `attempt` (1-based): exponential,
    /// capped at `max_backoff_ms`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(20);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "reconnect.max_attempts must be positive".into(),
            ));
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(ConfigError::Invalid(
                "reconnect.initial_backoff_ms exceeds max_backoff_ms".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_valid() {
        let config = TrackerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.update_interval(), Duration::from_secs(30));
        assert_eq!(config.initial_delay(), Duration::from_secs(30));
    }

    #[test]
    fn test_validation_rejects_zero_interval() {
        let config = TrackerConfig {
            update_interval_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_backoff() {
        let config = TrackerConfig {
            reconnect: ReconnectConfig {
                max_attempts: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = TrackerConfig {
            reconnect: ReconnectConfig {
                initial_backoff_ms: 60_000,
                max_backoff_ms: 1000,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let reconnect = ReconnectConfig {
            max_attempts: 10,
            initial_backoff_ms: 1000,
            max_backoff_ms: 5000,
        };
        assert_eq!(reconnect.backoff(1), Duration::from_millis(1000));
        assert_eq!(reconnect.backoff(2), Duration::from_millis(2000));
        assert_eq!(reconnect.backoff(3), Duration::from_millis(4000));
        assert_eq!(reconnect.backoff(4), Duration::from_millis(5000));
        assert_eq!(reconnect.backoff(30), Duration::from_millis(5000));
    }

    #[test]
    fn test_from_file_roundtrip() {
        let config = TrackerConfig {
            update_interval_secs: 15,
            ..Default::default()
        };
        let toml_str = toml::to_string_pretty(&config).expect("serialize");

        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(toml_str.as_bytes()).expect("write");

        let loaded = TrackerConfig::from_file(file.path()).expect("load");
        assert_eq!(loaded.update_interval_secs, 15);
        assert_eq!(loaded.live_period_secs, 86400);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(b"update_interval_secs = 10\n").expect("write");

        let loaded = TrackerConfig::from_file(file.path()).expect("load");
        assert_eq!(loaded.update_interval_secs, 10);
        assert_eq!(loaded.initial_delay_secs, 30);
        assert_eq!(loaded.reconnect.max_attempts, 5);
    }
}
