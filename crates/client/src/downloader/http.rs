//! HTTP backend backed by a shared `reqwest` client and the file cache.

use std::time::{Duration, Instant};

use bytes::Bytes;
use reqwest::{Client, Method, header};

use oyez_core::{CacheEntry, DEFAULT_CONTENT_TYPE, Error, FetchResult, FileCache, Request};

use super::Downloader;
use crate::FetcherConfig;

/// Downloader that fetches over HTTP(S) and persists outcomes to a [`FileCache`].
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    cache: FileCache,
    user_agent: String,
    timeout: Duration,
}

impl HttpDownloader {
    pub fn new(cache: FileCache, config: &FetcherConfig) -> Self {
        Self { cache, user_agent: config.user_agent.clone(), timeout: config.timeout }
    }

    pub fn cache(&self) -> &FileCache {
        &self.cache
    }

    async fn store(&self, request: &Request, result: &FetchResult) {
        if let Err(e) = self.cache.set(request, result).await {
            tracing::warn!(url = request.url(), error = %e, "failed to write cache record");
        }
    }
}

#[async_trait::async_trait]
impl Downloader for HttpDownloader {
    type Client = Client;

    fn open_client(&self) -> Result<Client, Error> {
        Client::builder()
            .user_agent(&self.user_agent)
            .timeout(self.timeout)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpClient(format!("failed to build HTTP client: {e}")))
    }

    async fn check_cache(&self, request: &Request) -> Option<FetchResult> {
        let CacheEntry { meta, response } = self.cache.get(request).await?;

        let mut result = FetchResult::success(meta.url, meta.status_code, meta.content_type, response, None);
        result.from_cache = true;

        if result.is_json()
            && let Some(raw) = result.raw.as_deref()
            && !raw.is_empty()
        {
            match serde_json::from_slice(raw) {
                Ok(data) => result.data = Some(data),
                Err(e) => {
                    tracing::debug!(url = request.url(), error = %e, "cached JSON does not parse, refetching");
                    return None;
                }
            }
        }

        tracing::debug!(url = request.url(), "cache hit");
        Some(result)
    }

    async fn fetch_network(&self, client: &Client, request: &Request) -> FetchResult {
        let Ok(method) = Method::from_bytes(request.method().as_bytes()) else {
            return FetchResult::failure(request.url(), None, format!("invalid HTTP method: {}", request.method()));
        };

        let mut builder = client.request(method, request.url());
        for (name, value) in request.headers() {
            builder = builder.header(name, value);
        }

        let start = Instant::now();
        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(url = request.url(), error = %e, "request failed");
                return FetchResult::failure(request.url(), None, format!("network error: {e}"));
            }
        };

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        if !status.is_success() {
            let result = FetchResult::failure(request.url(), Some(status.as_u16()), format!("HTTP status {status}"));
            if !self.is_transient_failure(&result) {
                self.store(request, &result).await;
            }
            return result;
        }

        let body: Bytes = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                return FetchResult::failure(request.url(), None, format!("failed to read response: {e}"));
            }
        };

        let mut result = FetchResult::success(request.url(), status.as_u16(), content_type, body.to_vec(), None);
        if result.is_json() && !body.is_empty() {
            match serde_json::from_slice(&body) {
                Ok(data) => result.data = Some(data),
                Err(e) => {
                    let failed =
                        FetchResult::failure(request.url(), Some(status.as_u16()), format!("malformed JSON response: {e}"));
                    self.store(request, &failed).await;
                    return failed;
                }
            }
        }

        tracing::debug!(
            url = request.url(),
            status = status.as_u16(),
            bytes = body.len(),
            fetch_ms = start.elapsed().as_millis() as u64,
            "fetched"
        );

        self.store(request, &result).await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use tempfile::TempDir;

    async fn downloader() -> (TempDir, HttpDownloader) {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::open(dir.path(), 30).await.unwrap();
        (dir, HttpDownloader::new(cache, &FetcherConfig::default()))
    }

    #[tokio::test]
    async fn test_success_is_cached_and_decoded() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/cases/1");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"docket_number": "98-1234"}"#);
            })
            .await;

        let (_dir, dl) = downloader().await;
        let client = dl.open_client().unwrap();
        let req = Request::new(server.url("/cases/1")).unwrap();

        let result = dl.fetch_network(&client, &req).await;
        assert!(result.success);
        assert!(!result.from_cache);
        assert_eq!(result.status_code, Some(200));
        assert_eq!(result.data.as_ref().unwrap()["docket_number"], "98-1234");

        let cached = dl.check_cache(&req).await.unwrap();
        assert!(cached.from_cache);
        assert_eq!(cached.data, result.data);
        assert_eq!(cached.raw, result.raw);
    }

    #[tokio::test]
    async fn test_headers_are_sent() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/cases").header("accept", "application/json");
                then.status(200).header("content-type", "application/json").body("[]");
            })
            .await;

        let (_dir, dl) = downloader().await;
        let client = dl.open_client().unwrap();
        let req = Request::new(server.url("/cases")).unwrap().with_header("accept", "application/json");

        assert!(dl.fetch_network(&client, &req).await.success);
        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_permanent_failure_goes_to_failed_store() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/cases/missing");
                then.status(404).body("<html>not found</html>");
            })
            .await;

        let (_dir, dl) = downloader().await;
        let client = dl.open_client().unwrap();
        let req = Request::new(server.url("/cases/missing")).unwrap();

        let result = dl.fetch_network(&client, &req).await;
        assert!(!result.success);
        assert_eq!(result.status_code, Some(404));
        assert!(result.raw.is_none());
        assert!(!dl.is_transient_failure(&result));

        let record = dl.cache().failed(&req).await.unwrap();
        assert_eq!(record.status_code, Some(404));
        assert!(dl.check_cache(&req).await.is_none());
    }

    #[tokio::test]
    async fn test_transient_failure_not_stored() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/cases/busy");
                then.status(503);
            })
            .await;

        let (_dir, dl) = downloader().await;
        let client = dl.open_client().unwrap();
        let req = Request::new(server.url("/cases/busy")).unwrap();

        let result = dl.fetch_network(&client, &req).await;
        assert_eq!(result.status_code, Some(503));
        assert!(dl.is_transient_failure(&result));
        assert!(!dl.cache().failed_path(&req).exists());
    }

    #[tokio::test]
    async fn test_malformed_json_is_permanent_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/cases/broken");
                then.status(200).header("content-type", "application/json").body("{not json");
            })
            .await;

        let (_dir, dl) = downloader().await;
        let client = dl.open_client().unwrap();
        let req = Request::new(server.url("/cases/broken")).unwrap();

        let result = dl.fetch_network(&client, &req).await;
        assert!(!result.success);
        assert_eq!(result.status_code, Some(200));
        assert!(!dl.is_transient_failure(&result));
        assert!(dl.cache().failed(&req).await.is_some());
        assert!(dl.check_cache(&req).await.is_none());
    }

    #[tokio::test]
    async fn test_binary_body_kept_raw() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/audio/1.mp3");
                then.status(200).header("content-type", "audio/mpeg").body(vec![0xff_u8, 0xfb, 0x90, 0x00]);
            })
            .await;

        let (_dir, dl) = downloader().await;
        let client = dl.open_client().unwrap();
        let req = Request::new(server.url("/audio/1.mp3")).unwrap();

        let result = dl.fetch_network(&client, &req).await;
        assert!(result.success);
        assert!(result.data.is_none());
        assert_eq!(result.raw.as_deref(), Some(&[0xff_u8, 0xfb, 0x90, 0x00][..]));

        let cached = dl.check_cache(&req).await.unwrap();
        assert_eq!(cached.content_type, "audio/mpeg");
        assert_eq!(cached.raw, result.raw);
    }

    #[tokio::test]
    async fn test_connection_refused_is_transient() {
        let (_dir, dl) = downloader().await;
        let client = dl.open_client().unwrap();
        let req = Request::new("http://127.0.0.1:1/cases").unwrap();

        let result = dl.fetch_network(&client, &req).await;
        assert!(!result.success);
        assert!(result.status_code.is_none());
        assert!(dl.is_transient_failure(&result));
        assert!(!dl.cache().failed_path(&req).exists());
    }
}
