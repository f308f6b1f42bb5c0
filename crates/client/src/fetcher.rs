//! Batch orchestration over the cache and the adaptive worker pool.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use rand::seq::SliceRandom;

use oyez_core::{Error, FetchResult, FileCache, Request};

use crate::FetcherConfig;
use crate::downloader::{Downloader, HttpDownloader};
use crate::pool::{PoolConfig, ScalingDecision, WorkerPool};

/// One progress event, emitted after each network result.
#[derive(Debug, Clone, Copy)]
pub struct Progress<'a> {
    /// 1-based, increases by exactly one per event.
    pub completed: usize,
    /// Number of requests that went to the network (cache misses).
    pub total: usize,
    pub result: &'a FetchResult,
    /// Worker count after this result's scaling check.
    pub workers: usize,
}

/// Progress callback accepted by [`AdaptiveFetcher::fetch_batch_adaptive`].
pub type ProgressCallback<'a> = &'a mut (dyn FnMut(Progress<'_>) + Send);

/// Fetches batches of requests, serving cache hits directly and sending
/// misses through a self-sizing worker pool.
pub struct AdaptiveFetcher<D: Downloader = HttpDownloader> {
    downloader: Arc<D>,
    config: FetcherConfig,
}

impl AdaptiveFetcher<HttpDownloader> {
    /// Create an HTTP fetcher with a cache rooted at `cache_dir`.
    pub async fn create(cache_dir: impl Into<PathBuf>, config: FetcherConfig) -> Result<Self, Error> {
        let cache = FileCache::open(cache_dir, config.ttl_days).await?;
        let downloader = HttpDownloader::new(cache, &config);
        Ok(Self::new(downloader, config))
    }

    pub fn cache(&self) -> &FileCache {
        self.downloader.cache()
    }
}

impl<D: Downloader> AdaptiveFetcher<D> {
    pub fn new(downloader: D, config: FetcherConfig) -> Self {
        Self { downloader: Arc::new(downloader), config }
    }

    pub fn downloader(&self) -> &D {
        &self.downloader
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// Fetch a batch with adaptive parallelism.
    ///
    /// Request order is shuffled first. Cache hits (skipped when `force`) come
    /// back without a network client being opened. Misses go through a pool
    /// that starts with one worker. The output holds hits followed by fetched
    /// results in completion order; correlate by URL, not position.
    pub async fn fetch_batch_adaptive(
        &self, mut requests: Vec<Request>, mut on_progress: Option<ProgressCallback<'_>>, force: bool,
    ) -> Vec<FetchResult> {
        if requests.is_empty() {
            return Vec::new();
        }
        requests.shuffle(&mut rand::rng());

        let mut results = Vec::with_capacity(requests.len());
        let mut uncached = Vec::new();
        for request in requests {
            if !force
                && let Some(hit) = self.downloader.check_cache(&request).await
            {
                results.push(hit);
            } else {
                uncached.push(request);
            }
        }

        let total = uncached.len();
        tracing::info!(cached = results.len(), uncached = total, force, "batch partitioned");
        if total == 0 {
            return results;
        }

        let client = match self.downloader.open_client() {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!(error = %e, "failed to open network client");
                let reason = e.to_string();
                results.extend(uncached.iter().map(|r| FetchResult::failure(r.url(), None, reason.clone())));
                return results;
            }
        };

        let mut pool = WorkerPool::new(Arc::clone(&self.downloader), client, PoolConfig::from(&self.config));
        pool.spawn_workers(1);
        let mut outstanding: HashMap<String, usize> = HashMap::new();
        for request in uncached {
            *outstanding.entry(request.url().to_string()).or_default() += 1;
            pool.add_request(request);
        }

        for completed in 1..=total {
            let Some(completion) = pool.get_result().await else {
                tracing::warn!(completed, total, "result channel closed early");
                break;
            };
            if let Some(count) = outstanding.get_mut(&completion.result.url) {
                *count = count.saturating_sub(1);
            }

            if let ScalingDecision::Locked { rate } = pool.check_scaling() {
                tracing::debug!(rate, workers = pool.worker_count(), "worker count frozen");
            }

            if let Some(callback) = on_progress.as_deref_mut() {
                callback(Progress {
                    completed,
                    total,
                    result: &completion.result,
                    workers: pool.worker_count(),
                });
            }
            results.push(completion.result);
        }

        results.extend(stranded_failures(outstanding));

        let workers = pool.worker_count();
        pool.shutdown().await;
        tracing::info!(total, workers, locked = pool.is_scaling_locked(), "batch finished");

        results
    }

    /// [`AdaptiveFetcher::fetch_batch_adaptive`] without progress reporting.
    pub async fn fetch_batch(&self, requests: Vec<Request>, force: bool) -> Vec<FetchResult> {
        self.fetch_batch_adaptive(requests, None, force).await
    }

    /// Fetch a single request.
    pub async fn fetch_one(&self, request: Request, force: bool) -> FetchResult {
        let url = request.url().to_string();
        self.fetch_batch(vec![request], force)
            .await
            .into_iter()
            .next()
            .unwrap_or_else(|| FetchResult::failure(url, None, "no result produced"))
    }
}

/// A failed result for every request that never came back from the pool.
fn stranded_failures(outstanding: HashMap<String, usize>) -> Vec<FetchResult> {
    outstanding
        .into_iter()
        .flat_map(|(url, count)| std::iter::repeat_n(url, count))
        .map(|url| FetchResult::failure(url, None, "worker pool stopped"))
        .collect()
}
