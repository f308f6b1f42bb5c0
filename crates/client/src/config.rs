//! Construction parameters for the adaptive fetcher.

use std::time::Duration;

use oyez_core::AppConfig;

/// Configuration for [`AdaptiveFetcher`](crate::AdaptiveFetcher).
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Cache TTL in days (default: 30). Only the expiry sweep consults it.
    pub ttl_days: u32,

    /// Ceiling on concurrent workers (default: 10).
    pub max_parallelism: usize,

    /// Per-request network timeout (default: 30s)
    pub timeout: Duration,

    /// Retries for transient failures (default: 3)
    pub max_retries: u32,

    /// Relative throughput gain needed to keep doubling (default: 0.5)
    pub min_improvement: f64,

    /// Results per measurement window before the rate is trusted (default: 10)
    pub min_samples: usize,

    /// Base backoff between retries; attempt `n` sleeps `n * retry_backoff` (default: 100ms)
    pub retry_backoff: Duration,

    /// User agent string (default: "oyez-sa-asr/0.1")
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            ttl_days: 30,
            max_parallelism: 10,
            timeout: Duration::from_secs(30),
            max_retries: 3,
            min_improvement: 0.5,
            min_samples: 10,
            retry_backoff: Duration::from_millis(100),
            user_agent: "oyez-sa-asr/0.1".to_string(),
        }
    }
}

impl From<&AppConfig> for FetcherConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            ttl_days: config.ttl_days,
            max_parallelism: config.max_parallelism,
            timeout: config.timeout(),
            max_retries: config.max_retries,
            min_improvement: config.min_improvement,
            min_samples: config.min_samples,
            user_agent: config.user_agent.clone(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_app_config_defaults() {
        let from_app = FetcherConfig::from(&AppConfig::default());
        let default = FetcherConfig::default();
        assert_eq!(from_app.ttl_days, default.ttl_days);
        assert_eq!(from_app.max_parallelism, default.max_parallelism);
        assert_eq!(from_app.timeout, default.timeout);
        assert_eq!(from_app.max_retries, default.max_retries);
        assert_eq!(from_app.min_improvement, default.min_improvement);
        assert_eq!(from_app.min_samples, default.min_samples);
        assert_eq!(from_app.user_agent, default.user_agent);
    }

    #[test]
    fn test_from_app_config_overrides() {
        let app = AppConfig { max_parallelism: 64, min_improvement: 0.25, timeout_ms: 5_000, ..Default::default() };
        let config = FetcherConfig::from(&app);
        assert_eq!(config.max_parallelism, 64);
        assert_eq!(config.min_improvement, 0.25);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.retry_backoff, Duration::from_millis(100));
    }
}
