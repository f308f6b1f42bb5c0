//! Unified error types for the fetch engine.
//!
//! Per-request network failures are not errors: they travel as
//! [`FetchResult`](crate::FetchResult) values with `success == false`.
//! These variants cover the cases where an operation itself cannot proceed.

use std::path::PathBuf;

/// Unified error type shared by the cache, the downloader and the CLI.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid request URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Invalid input parameters (e.g., an empty HTTP method).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Filesystem operation on the cache failed.
    #[error("CACHE_ERROR: {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A cache record could not be encoded or decoded.
    #[error("CACHE_ERROR: serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The shared network client could not be built.
    #[error("HTTP_ERROR: {0}")]
    HttpClient(String),
}

impl Error {
    /// Attach the offending path to an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidUrl("ftp://example.com".to_string());
        assert!(err.to_string().contains("INVALID_URL"));
        assert!(err.to_string().contains("ftp://example.com"));
    }

    #[test]
    fn test_io_error_includes_path() {
        let err = Error::io("/tmp/cache/meta/abc.json", std::io::Error::other("disk full"));
        let msg = err.to_string();
        assert!(msg.starts_with("CACHE_ERROR"));
        assert!(msg.contains("/tmp/cache/meta/abc.json"));
        assert!(msg.contains("disk full"));
    }

    #[test]
    fn test_serialization_error_from() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: Error = parse_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
