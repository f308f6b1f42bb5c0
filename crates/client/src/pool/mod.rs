//! Adaptive worker pool.
//!
//! ### Scaling
//! - Starts from whatever `spawn_workers` is given (the fetcher uses 1).
//! - After `min_samples` results in a window, measures `count / elapsed`.
//! - First measurement is a baseline: double the workers.
//! - Later measurements double again only if the rate improved by at least
//!   `min_improvement`; otherwise scaling is locked for the pool's lifetime.
//! - Failures never shrink the pool; they are absorbed by per-request retries.
//!
//! ### Single writer
//! Rate-window state is only touched through `&mut self` by the orchestrating
//! task (`get_result` / `record_result` / `check_scaling`). Workers share
//! nothing but the two queues.
//!
//! ### Shutdown
//! Flag every worker, push one sentinel per worker, join each with a bounded
//! wait, abort stragglers. Aborting a worker also aborts its in-flight fetch.
//! Dropping the pool aborts anything still running.

mod worker;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use oyez_core::{FetchResult, Request};

use crate::FetcherConfig;
use crate::downloader::Downloader;
use worker::Worker;

/// Bounded wait for each worker during shutdown before it is aborted.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Pool sizing and retry parameters.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_workers: usize,
    pub min_samples: usize,
    pub min_improvement: f64,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::from(&FetcherConfig::default())
    }
}

impl From<&FetcherConfig> for PoolConfig {
    fn from(config: &FetcherConfig) -> Self {
        Self {
            max_workers: config.max_parallelism.max(1),
            min_samples: config.min_samples.max(1),
            min_improvement: config.min_improvement,
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff,
        }
    }
}

/// Outcome of a [`WorkerPool::check_scaling`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalingDecision {
    /// Locked, too few samples, no elapsed time, or already at the ceiling.
    Skipped,
    /// Worker count grew.
    Scaled { from: usize, to: usize },
    /// Improvement fell below the threshold; growth is frozen.
    Locked { rate: f64 },
}

/// One finished request as reported by a worker.
#[derive(Debug, Clone)]
pub struct Completion {
    pub worker_id: usize,
    pub result: FetchResult,
    /// Transient-failure retries spent on this request.
    pub retries: u32,
}

pub(crate) enum WorkItem {
    Fetch(Request),
    Shutdown,
}

struct WorkerHandle {
    handle: JoinHandle<()>,
    shutdown: Arc<AtomicBool>,
}

/// Dynamically sized set of fetch loops draining a shared queue.
pub struct WorkerPool<D: Downloader> {
    downloader: Arc<D>,
    client: D::Client,
    config: PoolConfig,
    request_tx: mpsc::UnboundedSender<WorkItem>,
    request_rx: Arc<Mutex<mpsc::UnboundedReceiver<WorkItem>>>,
    result_tx: Option<mpsc::UnboundedSender<Completion>>,
    result_rx: mpsc::UnboundedReceiver<Completion>,
    workers: BTreeMap<usize, WorkerHandle>,
    next_worker_id: usize,
    window_start: Instant,
    window_count: usize,
    last_rate: f64,
    scaling_locked: bool,
}

impl<D: Downloader> WorkerPool<D> {
    /// Create an empty pool. No workers run until [`WorkerPool::spawn_workers`].
    pub fn new(downloader: Arc<D>, client: D::Client, config: PoolConfig) -> Self {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (result_tx, result_rx) = mpsc::unbounded_channel();

        Self {
            downloader,
            client,
            config,
            request_tx,
            request_rx: Arc::new(Mutex::new(request_rx)),
            result_tx: Some(result_tx),
            result_rx,
            workers: BTreeMap::new(),
            next_worker_id: 0,
            window_start: Instant::now(),
            window_count: 0,
            last_rate: 0.0,
            scaling_locked: false,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn is_scaling_locked(&self) -> bool {
        self.scaling_locked
    }

    /// Best throughput observed so far, in results per second.
    pub fn last_rate(&self) -> f64 {
        self.last_rate
    }

    /// Spawn up to `count` workers without exceeding `max_workers`.
    ///
    /// Returns how many were started. Does nothing after shutdown.
    pub fn spawn_workers(&mut self, count: usize) -> usize {
        let Some(result_tx) = self.result_tx.as_ref() else {
            return 0;
        };
        let to_spawn = count.min(self.config.max_workers.saturating_sub(self.workers.len()));

        for _ in 0..to_spawn {
            let id = self.next_worker_id;
            self.next_worker_id += 1;

            let shutdown = Arc::new(AtomicBool::new(false));
            let worker = Worker {
                id,
                downloader: Arc::clone(&self.downloader),
                client: self.client.clone(),
                queue: Arc::clone(&self.request_rx),
                results: result_tx.clone(),
                shutdown: Arc::clone(&shutdown),
                max_retries: self.config.max_retries,
                retry_backoff: self.config.retry_backoff,
            };
            let handle = tokio::spawn(worker.run());
            self.workers.insert(id, WorkerHandle { handle, shutdown });
        }

        to_spawn
    }

    pub fn add_request(&self, request: Request) {
        let sent = self.request_tx.send(WorkItem::Fetch(request));
        debug_assert!(sent.is_ok(), "request receiver is owned by the pool");
    }

    /// Await the next completed request and count it toward the rate window.
    ///
    /// Returns `None` once the pool is shut down and every buffered result is drained.
    pub async fn get_result(&mut self) -> Option<Completion> {
        let completion = self.result_rx.recv().await?;
        self.record_result(&completion);
        Some(completion)
    }

    /// Count a completion toward the current window. Success and failure weigh the same.
    pub fn record_result(&mut self, completion: &Completion) {
        if completion.retries > 0 {
            tracing::debug!(worker_id = completion.worker_id, retries = completion.retries, "request needed retries");
        }
        self.window_count += 1;
    }

    fn reset_window(&mut self) {
        self.window_start = Instant::now();
        self.window_count = 0;
    }

    /// Re-evaluate the worker count against the observed rate.
    pub fn check_scaling(&mut self) -> ScalingDecision {
        if self.scaling_locked || self.window_count < self.config.min_samples {
            return ScalingDecision::Skipped;
        }

        let elapsed = self.window_start.elapsed().as_secs_f64();
        if elapsed <= 0.0 {
            return ScalingDecision::Skipped;
        }
        let current_rate = self.window_count as f64 / elapsed;

        if self.last_rate > 0.0 {
            let improvement = (current_rate - self.last_rate) / self.last_rate;
            if improvement < self.config.min_improvement {
                self.scaling_locked = true;
                tracing::info!(
                    rate = current_rate,
                    last_rate = self.last_rate,
                    improvement,
                    workers = self.worker_count(),
                    "diminishing returns, scaling locked"
                );
                return ScalingDecision::Locked { rate: current_rate };
            }
        }

        let from = self.worker_count();
        if from >= self.config.max_workers {
            return ScalingDecision::Skipped;
        }

        self.last_rate = current_rate;
        self.spawn_workers(from.max(1));
        self.reset_window();

        let to = self.worker_count();
        tracing::info!(rate = current_rate, from, to, "scaled workers");
        ScalingDecision::Scaled { from, to }
    }

    /// Stop every worker. Idempotent; leaves the pool with zero workers.
    pub async fn shutdown(&mut self) {
        if self.workers.is_empty() {
            self.result_tx = None;
            return;
        }

        let workers = std::mem::take(&mut self.workers);
        for worker in workers.values() {
            worker.shutdown.store(true, Ordering::Release);
            let _ = self.request_tx.send(WorkItem::Shutdown);
        }

        for (id, worker) in workers {
            let WorkerHandle { mut handle, .. } = worker;
            if tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut handle).await.is_err() {
                tracing::warn!(worker_id = id, "worker did not stop in time, aborting");
                handle.abort();
                let _ = handle.await;
            }
        }

        self.result_tx = None;
        tracing::debug!("worker pool shut down");
    }
}

impl<D: Downloader> Drop for WorkerPool<D> {
    fn drop(&mut self) {
        for worker in self.workers.values() {
            worker.shutdown.store(true, Ordering::Release);
            worker.handle.abort();
        }
    }
}
