//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (OYEZ_*)
//! 2. TOML config file (if OYEZ_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (OYEZ_*)
/// 2. TOML config file (if OYEZ_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Root directory of the response cache.
    ///
    /// Set via OYEZ_CACHE_DIR environment variable.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Cache TTL in days. Only consulted by the expiry sweep.
    ///
    /// Set via OYEZ_TTL_DAYS environment variable.
    #[serde(default = "default_ttl_days")]
    pub ttl_days: u32,

    /// Ceiling on the number of concurrent fetch workers.
    ///
    /// Set via OYEZ_MAX_PARALLELISM environment variable.
    #[serde(default = "default_max_parallelism")]
    pub max_parallelism: usize,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via OYEZ_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Retries for transient failures before a request is reported failed.
    ///
    /// Set via OYEZ_MAX_RETRIES environment variable.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Minimum relative throughput gain required to keep doubling workers.
    ///
    /// Set via OYEZ_MIN_IMPROVEMENT environment variable.
    #[serde(default = "default_min_improvement")]
    pub min_improvement: f64,

    /// Results required in a measurement window before the rate is trusted.
    ///
    /// Set via OYEZ_MIN_SAMPLES environment variable.
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via OYEZ_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".cache")
}

fn default_ttl_days() -> u32 {
    30
}

fn default_max_parallelism() -> usize {
    10
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_min_improvement() -> f64 {
    0.5
}

fn default_min_samples() -> usize {
    10
}

fn default_user_agent() -> String {
    "oyez-sa-asr/0.1".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            ttl_days: default_ttl_days(),
            max_parallelism: default_max_parallelism(),
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            min_improvement: default_min_improvement(),
            min_samples: default_min_samples(),
            user_agent: default_user_agent(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `OYEZ_`
    /// 2. TOML file from `OYEZ_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("OYEZ_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("OYEZ_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
