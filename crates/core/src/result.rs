//! Outcome of a single fetch attempt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Content type assumed when a response does not declare one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Result of a fetch, whether served from cache or network.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResult {
    pub url: String,
    pub success: bool,
    pub status_code: Option<u16>,
    /// Decoded body for JSON content types.
    pub data: Option<serde_json::Value>,
    /// Raw response bytes exactly as received.
    pub raw: Option<Vec<u8>>,
    pub content_type: String,
    pub error: Option<String>,
    pub from_cache: bool,
}

impl FetchResult {
    /// A successful network response.
    pub fn success(
        url: impl Into<String>, status_code: u16, content_type: impl Into<String>, raw: Vec<u8>,
        data: Option<serde_json::Value>,
    ) -> Self {
        Self {
            url: url.into(),
            success: true,
            status_code: Some(status_code),
            data,
            raw: Some(raw),
            content_type: content_type.into(),
            error: None,
            from_cache: false,
        }
    }

    /// A failed attempt. `status_code` is `None` for connection-level failures.
    pub fn failure(url: impl Into<String>, status_code: Option<u16>, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            success: false,
            status_code,
            data: None,
            raw: None,
            content_type: DEFAULT_CONTENT_TYPE.into(),
            error: Some(error.into()),
            from_cache: false,
        }
    }

    /// Whether a content type denotes a JSON body (`application/json`, `+json` suffixes).
    pub fn is_json(&self) -> bool {
        self.content_type.to_ascii_lowercase().contains("json")
    }
}

/// The persisted record of the most recent failure for a cache key.
///
/// Body content is never kept; only the fact of failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedRecord {
    pub url: String,
    pub success: bool,
    pub status_code: Option<u16>,
    pub error: Option<String>,
    pub from_cache: bool,
    pub content_type: String,
    pub recorded_at: DateTime<Utc>,
}

impl FailedRecord {
    pub fn from_result(result: &FetchResult, recorded_at: DateTime<Utc>) -> Self {
        Self {
            url: result.url.clone(),
            success: result.success,
            status_code: result.status_code,
            error: result.error.clone(),
            from_cache: result.from_cache,
            content_type: result.content_type.clone(),
            recorded_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_fields() {
        let result = FetchResult::success(
            "https://api.oyez.org/cases",
            200,
            "application/json; charset=utf-8",
            b"[]".to_vec(),
            Some(serde_json::json!([])),
        );
        assert!(result.success);
        assert_eq!(result.status_code, Some(200));
        assert!(!result.from_cache);
        assert!(result.error.is_none());
        assert!(result.is_json());
    }

    #[test]
    fn test_failure_fields() {
        let result = FetchResult::failure("https://api.oyez.org/cases", None, "connection refused");
        assert!(!result.success);
        assert!(result.status_code.is_none());
        assert!(result.raw.is_none());
        assert_eq!(result.error.as_deref(), Some("connection refused"));
    }

    #[test]
    fn test_is_json_vendor_type() {
        let mut result = FetchResult::failure("https://x.test", Some(404), "nope");
        result.content_type = "application/vnd.api+json".into();
        assert!(result.is_json());
        result.content_type = "audio/mpeg".into();
        assert!(!result.is_json());
    }

    #[test]
    fn test_failed_record_serialization() {
        let result = FetchResult::failure("https://api.oyez.org/cases/x", Some(404), "HTTP status 404 Not Found");
        let record = FailedRecord::from_result(&result, Utc::now());
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"status_code\":404"));
        let restored: FailedRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, record);
    }
}
