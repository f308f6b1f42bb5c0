//! Persisted cache records: per-key metadata, content versions and change events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::result::DEFAULT_CONTENT_TYPE;

/// One distinct body observed for a cache key, identified by its content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentVersion {
    pub content_hash: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Blob path relative to the domain directory, e.g. `raw/<hash>.json`.
    pub raw_path: String,
}

/// Metadata for a cached endpoint with its full version history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMeta {
    pub url: String,
    pub fetched_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status_code: u16,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    /// Points at the latest version's blob for quick access.
    #[serde(default)]
    pub raw_path: String,
    #[serde(default)]
    pub versions: Vec<ContentVersion>,
}

fn default_content_type() -> String {
    DEFAULT_CONTENT_TYPE.into()
}

impl CacheMeta {
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// The version with the most recent `last_seen`.
    pub fn latest_version(&self) -> Option<&ContentVersion> {
        self.versions.iter().max_by_key(|v| v.last_seen)
    }

    /// Every blob path this record references, latest pointer included.
    pub fn blob_paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.versions.iter().map(|v| v.raw_path.as_str()).collect();
        if !self.raw_path.is_empty() && !paths.contains(&self.raw_path.as_str()) {
            paths.push(&self.raw_path);
        }
        paths
    }
}

/// A cached response: metadata plus the latest version's bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub meta: CacheMeta,
    pub response: Vec<u8>,
}

impl CacheEntry {
    pub fn url(&self) -> &str {
        &self.meta.url
    }

    pub fn status_code(&self) -> u16 {
        self.meta.status_code
    }

    pub fn content_type(&self) -> &str {
        &self.meta.content_type
    }
}

/// One line of the append-only `changes.log`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub url: String,
    pub cache_key: String,
    pub old_hash: String,
    pub new_hash: String,
    pub detected_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn version(hash: &str, last_seen: DateTime<Utc>) -> ContentVersion {
        ContentVersion {
            content_hash: hash.into(),
            first_seen: last_seen,
            last_seen,
            raw_path: format!("raw/{hash}.json"),
        }
    }

    fn meta(versions: Vec<ContentVersion>) -> CacheMeta {
        let now = Utc::now();
        CacheMeta {
            url: "https://api.oyez.org/cases".into(),
            fetched_at: now,
            expires_at: now + Duration::days(30),
            status_code: 200,
            content_type: "application/json".into(),
            raw_path: String::new(),
            versions,
        }
    }

    #[test]
    fn test_latest_version_none_when_empty() {
        assert!(meta(vec![]).latest_version().is_none());
    }

    #[test]
    fn test_latest_version_by_last_seen() {
        let now = Utc::now();
        let m = meta(vec![version("new", now), version("old", now - Duration::hours(1))]);
        assert_eq!(m.latest_version().unwrap().content_hash, "new");
    }

    #[test]
    fn test_is_expired_at() {
        let m = meta(vec![]);
        assert!(!m.is_expired());
        assert!(m.is_expired_at(m.expires_at + Duration::seconds(1)));
    }

    #[test]
    fn test_legacy_record_without_versions_parses() {
        let json = r#"{
            "url": "https://api.oyez.org/cases",
            "fetched_at": "2024-01-01T00:00:00+00:00",
            "expires_at": "2024-01-31T00:00:00+00:00",
            "status_code": 200
        }"#;
        let m: CacheMeta = serde_json::from_str(json).unwrap();
        assert!(m.versions.is_empty());
        assert_eq!(m.content_type, "application/json");
        assert!(m.raw_path.is_empty());
    }

    #[test]
    fn test_blob_paths_deduplicates_pointer() {
        let now = Utc::now();
        let mut m = meta(vec![version("a", now)]);
        m.raw_path = "raw/a.json".into();
        assert_eq!(m.blob_paths(), vec!["raw/a.json"]);
        m.raw_path = "raw/legacy.json".into();
        assert_eq!(m.blob_paths(), vec!["raw/a.json", "raw/legacy.json"]);
    }
}
