//! Transport abstraction used by the worker pool.
//!
//! A downloader knows how to read its cache, hit the network and classify
//! failures. The pool only ever talks to this trait, so scaling logic is
//! independent of the backend.

mod http;

pub use http::HttpDownloader;

use oyez_core::{Error, FetchResult, Request};

/// Status codes that indicate a retryable server-side condition.
pub const TRANSIENT_STATUS_CODES: [u16; 4] = [429, 502, 503, 504];

/// Fetch backend capability set.
#[async_trait::async_trait]
pub trait Downloader: Send + Sync + 'static {
    /// Shared network handle, opened once per batch.
    type Client: Clone + Send + Sync + 'static;

    /// Open the shared client. Only called when a batch has cache misses.
    fn open_client(&self) -> Result<Self::Client, Error>;

    /// Cache-only lookup. Never touches the network.
    async fn check_cache(&self, request: &Request) -> Option<FetchResult>;

    /// Always hits the network and records non-transient outcomes in the cache.
    async fn fetch_network(&self, client: &Self::Client, request: &Request) -> FetchResult;

    /// Whether a failed result is worth retrying.
    fn is_transient_failure(&self, result: &FetchResult) -> bool {
        is_transient_failure(result)
    }
}

/// Default classification: connection-level failures and 429/502/503/504.
pub fn is_transient_failure(result: &FetchResult) -> bool {
    if result.success {
        return false;
    }
    match result.status_code {
        None => true,
        Some(status) => TRANSIENT_STATUS_CODES.contains(&status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://api.oyez.org/cases";

    #[test]
    fn test_success_is_never_transient() {
        let result = FetchResult::success(URL, 200, "application/json", b"[]".to_vec(), None);
        assert!(!is_transient_failure(&result));
    }

    #[test]
    fn test_connection_failure_is_transient() {
        assert!(is_transient_failure(&FetchResult::failure(URL, None, "connection refused")));
    }

    #[test]
    fn test_retryable_statuses() {
        for status in [429, 502, 503, 504] {
            assert!(is_transient_failure(&FetchResult::failure(URL, Some(status), "retry")), "{status}");
        }
    }

    #[test]
    fn test_permanent_statuses() {
        for status in [200, 400, 401, 403, 404, 500, 501] {
            assert!(!is_transient_failure(&FetchResult::failure(URL, Some(status), "nope")), "{status}");
        }
    }
}
