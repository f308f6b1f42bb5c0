//! Versioned file cache operations.
//!
//! Directory structure:
//!
//! ```text
//! <root>/
//!     <domain>/
//!         meta/<cache_key>.json        CacheMeta with embedded version list
//!         raw/<content_hash><ext>      one blob per distinct observed body
//!     failed/<cache_key>.json          last failure only, overwritten
//!     changes.log                      newline-delimited ChangeEvent records
//! ```
//!
//! Reads never fail: missing, unreadable or corrupt records degrade to a
//! miss. Writes go through a temporary sibling and a rename.

use std::borrow::Cow;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration, Utc};
use tokio::fs;

use super::changes;
use super::extension::extension_for_content_type;
use super::hash::compute_content_hash;
use super::meta::{CacheEntry, CacheMeta, ChangeEvent, ContentVersion};
use crate::result::{FailedRecord, FetchResult};
use crate::{Error, Request};

const META_DIR: &str = "meta";
const RAW_DIR: &str = "raw";
const FAILED_DIR: &str = "failed";
const CHANGES_LOG: &str = "changes.log";

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// File-backed cache that keeps every distinct response body per endpoint.
#[derive(Debug, Clone)]
pub struct FileCache {
    root: PathBuf,
    ttl: Duration,
}

impl FileCache {
    /// Open (creating if needed) a cache rooted at `root`.
    ///
    /// `ttl_days` only sets `expires_at` on written records; entries are
    /// evicted solely by [`FileCache::clear_expired`].
    pub async fn open(root: impl Into<PathBuf>, ttl_days: u32) -> Result<Self, Error> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|e| Error::io(&root, e))?;
        Ok(Self { root, ttl: Duration::days(i64::from(ttl_days)) })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn domain_dir(&self, request: &Request) -> PathBuf {
        self.root.join(request.domain())
    }

    /// Path of the metadata record for `request`.
    pub fn meta_path(&self, request: &Request) -> PathBuf {
        self.domain_dir(request)
            .join(META_DIR)
            .join(format!("{}.json", request.cache_key()))
    }

    /// Path of the last-failure record for `request`.
    pub fn failed_path(&self, request: &Request) -> PathBuf {
        self.root
            .join(FAILED_DIR)
            .join(format!("{}.json", request.cache_key()))
    }

    pub fn changes_log_path(&self) -> PathBuf {
        self.root.join(CHANGES_LOG)
    }

    /// Blob path derived from the cache key, used by records that predate versioning.
    fn legacy_raw_path(request: &Request, content_type: &str) -> String {
        format!("{RAW_DIR}/{}{}", request.cache_key(), extension_for_content_type(content_type))
    }

    /// Look up the latest cached body for `request`.
    ///
    /// Expiry is not checked here. A missing blob is a miss; corrupt metadata
    /// is deleted and reported as a miss.
    pub async fn get(&self, request: &Request) -> Option<CacheEntry> {
        let meta = self.meta(request).await?;

        let raw_path = match meta.latest_version() {
            Some(version) => version.raw_path.clone(),
            None if !meta.raw_path.is_empty() => meta.raw_path.clone(),
            None => Self::legacy_raw_path(request, &meta.content_type),
        };
        let blob = self.domain_dir(request).join(&raw_path);

        match fs::read(&blob).await {
            Ok(response) => Some(CacheEntry { meta, response }),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(url = request.url(), blob = %blob.display(), "cached blob missing, treating as miss");
                None
            }
            Err(e) => {
                tracing::warn!(url = request.url(), blob = %blob.display(), error = %e, "failed to read cached blob");
                None
            }
        }
    }

    /// Parsed metadata for `request`, if present and well-formed.
    pub async fn meta(&self, request: &Request) -> Option<CacheMeta> {
        read_meta(&self.meta_path(request)).await
    }

    /// Bytes of a specific historical version.
    pub async fn read_version(&self, request: &Request, version: &ContentVersion) -> Option<Vec<u8>> {
        fs::read(self.domain_dir(request).join(&version.raw_path)).await.ok()
    }

    /// The last recorded failure for `request`.
    pub async fn failed(&self, request: &Request) -> Option<FailedRecord> {
        let bytes = fs::read(self.failed_path(request)).await.ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// All recorded content changes, oldest first.
    pub async fn changes(&self) -> Result<Vec<ChangeEvent>, Error> {
        changes::read_all(&self.changes_log_path()).await
    }

    /// Store a fetch result.
    ///
    /// Failures overwrite the unversioned failed record. Successes are hashed;
    /// a known hash only refreshes `last_seen`, a new hash adds a blob and a
    /// version, and logs a change when an earlier version existed.
    pub async fn set(&self, request: &Request, result: &FetchResult) -> Result<(), Error> {
        if !result.success {
            return self.store_failed(request, result).await;
        }

        let bytes: Cow<'_, [u8]> = match (&result.raw, &result.data) {
            (Some(raw), _) => Cow::Borrowed(raw.as_slice()),
            (None, Some(data)) => Cow::Owned(serde_json::to_vec(data)?),
            (None, None) => Cow::Borrowed(&[]),
        };

        let now = Utc::now();
        let content_hash = compute_content_hash(&bytes);
        let domain_dir = self.domain_dir(request);
        let meta_path = self.meta_path(request);

        let existing = read_meta(&meta_path).await;
        let previous_hash = existing
            .as_ref()
            .and_then(CacheMeta::latest_version)
            .map(|v| v.content_hash.clone());
        let mut versions = existing.map(|m| m.versions).unwrap_or_default();

        let raw_path = match versions.iter().position(|v| v.content_hash == content_hash) {
            Some(idx) => {
                let version = &mut versions[idx];
                version.last_seen = now;
                let blob = domain_dir.join(&version.raw_path);
                if !fs::try_exists(&blob).await.unwrap_or(false) {
                    tracing::warn!(url = request.url(), blob = %blob.display(), "rewriting missing blob");
                    write_atomic(&blob, &bytes).await?;
                }
                version.raw_path.clone()
            }
            None => {
                let raw_path = format!("{RAW_DIR}/{content_hash}{}", extension_for_content_type(&result.content_type));
                write_atomic(&domain_dir.join(&raw_path), &bytes).await?;
                versions.push(ContentVersion {
                    content_hash: content_hash.clone(),
                    first_seen: now,
                    last_seen: now,
                    raw_path: raw_path.clone(),
                });

                if let Some(old_hash) = previous_hash {
                    tracing::info!(url = request.url(), %old_hash, new_hash = %content_hash, "content changed");
                    let event = ChangeEvent {
                        url: request.url().to_string(),
                        cache_key: request.cache_key(),
                        old_hash,
                        new_hash: content_hash.clone(),
                        detected_at: now,
                    };
                    changes::append(&self.changes_log_path(), &event).await?;
                }
                raw_path
            }
        };

        let meta = CacheMeta {
            url: request.url().to_string(),
            fetched_at: now,
            expires_at: now.checked_add_signed(self.ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
            status_code: result.status_code.unwrap_or(200),
            content_type: result.content_type.clone(),
            raw_path,
            versions,
        };
        write_atomic(&meta_path, &serde_json::to_vec_pretty(&meta)?).await
    }

    async fn store_failed(&self, request: &Request, result: &FetchResult) -> Result<(), Error> {
        let record = FailedRecord::from_result(result, Utc::now());
        write_atomic(&self.failed_path(request), &serde_json::to_vec_pretty(&record)?).await
    }

    /// Remove the metadata and every blob it references that no other
    /// record in the same domain still points to.
    ///
    /// Returns whether a record existed.
    pub async fn delete(&self, request: &Request) -> Result<bool, Error> {
        let meta_path = self.meta_path(request);
        let bytes = match fs::read(&meta_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(Error::io(&meta_path, e)),
        };

        if let Ok(meta) = serde_json::from_slice::<CacheMeta>(&bytes) {
            let domain_dir = self.domain_dir(request);
            let live = referenced_blobs(&domain_dir.join(META_DIR), &meta_path).await?;
            remove_blobs(&domain_dir, &meta, &live).await;
        }
        remove_if_exists(&meta_path).await?;
        Ok(true)
    }

    /// Delete every record whose `expires_at` has passed, plus corrupt ones.
    ///
    /// Returns the number of records removed.
    pub async fn clear_expired(&self) -> Result<usize, Error> {
        self.clear_expired_at(Utc::now()).await
    }

    async fn clear_expired_at(&self, now: DateTime<Utc>) -> Result<usize, Error> {
        let mut cleared = 0;
        let mut domains = fs::read_dir(&self.root).await.map_err(|e| Error::io(&self.root, e))?;

        while let Some(domain) = domains.next_entry().await.map_err(|e| Error::io(&self.root, e))? {
            let domain_dir = domain.path();
            let is_dir = domain.file_type().await.is_ok_and(|t| t.is_dir());
            if !is_dir || domain.file_name() == FAILED_DIR {
                continue;
            }

            let meta_dir = domain_dir.join(META_DIR);
            let mut entries = match fs::read_dir(&meta_dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(Error::io(&meta_dir, e)),
            };

            // Blobs are shared by content hash; unlink only those no surviving record references.
            let mut expired = Vec::new();
            let mut live = HashSet::new();
            while let Some(entry) = entries.next_entry().await.map_err(|e| Error::io(&meta_dir, e))? {
                let path = entry.path();
                if path.extension().is_none_or(|ext| ext != "json") {
                    continue;
                }

                let bytes = match fs::read(&path).await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "skipping unreadable metadata");
                        continue;
                    }
                };

                match serde_json::from_slice::<CacheMeta>(&bytes) {
                    Ok(meta) if !meta.is_expired_at(now) => {
                        live.extend(meta.blob_paths().into_iter().map(String::from));
                    }
                    Ok(meta) => expired.push((path, Some(meta))),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "removing corrupt metadata");
                        expired.push((path, None));
                    }
                }
            }

            for (path, meta) in expired {
                if let Some(meta) = meta {
                    remove_blobs(&domain_dir, &meta, &live).await;
                }
                remove_if_exists(&path).await?;
                cleared += 1;
            }
        }

        tracing::info!(cleared, root = %self.root.display(), "expired cache entries cleared");
        Ok(cleared)
    }
}

/// Read metadata, deleting the file if it does not parse.
async fn read_meta(path: &Path) -> Option<CacheMeta> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read cache metadata");
            return None;
        }
    };

    match serde_json::from_slice(&bytes) {
        Ok(meta) => Some(meta),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "corrupt cache metadata, removing");
            if let Err(e) = fs::remove_file(path).await {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove corrupt metadata");
            }
            None
        }
    }
}

/// Blob paths referenced by every well-formed record in `meta_dir` except `except`.
async fn referenced_blobs(meta_dir: &Path, except: &Path) -> Result<HashSet<String>, Error> {
    let mut live = HashSet::new();
    let mut entries = match fs::read_dir(meta_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(live),
        Err(e) => return Err(Error::io(meta_dir, e)),
    };

    while let Some(entry) = entries.next_entry().await.map_err(|e| Error::io(meta_dir, e))? {
        let path = entry.path();
        if path == except || path.extension().is_none_or(|ext| ext != "json") {
            continue;
        }
        let Ok(bytes) = fs::read(&path).await else {
            continue;
        };
        if let Ok(meta) = serde_json::from_slice::<CacheMeta>(&bytes) {
            live.extend(meta.blob_paths().into_iter().map(String::from));
        }
    }
    Ok(live)
}

/// Remove the blobs of `meta` that are not in `keep`.
async fn remove_blobs(domain_dir: &Path, meta: &CacheMeta, keep: &HashSet<String>) {
    for raw_path in meta.blob_paths() {
        if keep.contains(raw_path) {
            tracing::debug!(raw_path, "blob still referenced, keeping");
            continue;
        }
        let blob = domain_dir.join(raw_path);
        if let Err(e) = remove_if_exists(&blob).await {
            tracing::warn!(error = %e, "failed to remove cached blob");
        }
    }
}

async fn remove_if_exists(path: &Path) -> Result<(), Error> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(path, e)),
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(|e| Error::io(parent, e))?;
    }

    let seq = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(format!(".tmp-{}-{seq}", std::process::id()));
    let tmp = path.with_file_name(tmp_name);

    fs::write(&tmp, bytes).await.map_err(|e| Error::io(&tmp, e))?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(Error::io(path, e));
    }
    Ok(())
}
