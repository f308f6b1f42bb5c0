//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_parallelism` is 0 or exceeds 1024
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `min_improvement` is negative or not finite
    /// - `min_samples` or `ttl_days` is 0, or `ttl_days` exceeds 36500
    /// - `max_retries` exceeds 10
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_parallelism == 0 {
            return Err(ConfigError::Invalid {
                field: "max_parallelism".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.max_parallelism > 1024 {
            return Err(ConfigError::Invalid { field: "max_parallelism".into(), reason: "must not exceed 1024".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if !self.min_improvement.is_finite() || self.min_improvement < 0.0 {
            return Err(ConfigError::Invalid {
                field: "min_improvement".into(),
                reason: "must be a finite, non-negative fraction".into(),
            });
        }

        if self.min_samples == 0 {
            return Err(ConfigError::Invalid { field: "min_samples".into(), reason: "must be greater than 0".into() });
        }

        if self.ttl_days == 0 {
            return Err(ConfigError::Invalid { field: "ttl_days".into(), reason: "must be greater than 0".into() });
        }
        if self.ttl_days > 36_500 {
            return Err(ConfigError::Invalid { field: "ttl_days".into(), reason: "must not exceed 36500".into() });
        }

        if self.max_retries > 10 {
            return Err(ConfigError::Invalid { field: "max_retries".into(), reason: "must not exceed 10".into() });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.max_parallelism > 64 && self.min_improvement < 0.1 {
            tracing::warn!(
                max_parallelism = self.max_parallelism,
                min_improvement = self.min_improvement,
                "High parallelism ceiling with a low improvement threshold; \
                 scaling may keep doubling against a saturated server"
            );
        }

        Ok(())
    }
}
