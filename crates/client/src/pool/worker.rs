//! Worker loop: pull a request, fetch with retries, report the outcome.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use oyez_core::{FetchResult, Request};

use super::{Completion, WorkItem};
use crate::downloader::Downloader;

/// How long a worker waits on an empty queue before re-checking its shutdown flag.
pub(super) const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub(super) struct Worker<D: Downloader> {
    pub id: usize,
    pub downloader: Arc<D>,
    pub client: D::Client,
    pub queue: Arc<Mutex<mpsc::UnboundedReceiver<WorkItem>>>,
    pub results: mpsc::UnboundedSender<Completion>,
    pub shutdown: Arc<AtomicBool>,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl<D: Downloader> Worker<D> {
    pub async fn run(self) {
        tracing::debug!(worker_id = self.id, "worker started");

        while !self.shutdown.load(Ordering::Acquire) {
            let next = tokio::time::timeout(POLL_INTERVAL, async { self.queue.lock().await.recv().await }).await;
            let request = match next {
                Err(_) => continue,
                Ok(None | Some(WorkItem::Shutdown)) => break,
                Ok(Some(WorkItem::Fetch(request))) => request,
            };

            let (result, retries) = self.process(request).await;
            if self.results.send(Completion { worker_id: self.id, result, retries }).is_err() {
                break;
            }
        }

        tracing::debug!(worker_id = self.id, "worker stopped");
    }

    /// Runs the fetch in its own task; a panic becomes a failed result.
    ///
    /// The task is aborted if this worker is cancelled mid-fetch.
    async fn process(&self, request: Request) -> (FetchResult, u32) {
        let url = request.url().to_string();
        let mut task = AbortOnDrop(tokio::spawn(fetch_with_retry(
            Arc::clone(&self.downloader),
            self.client.clone(),
            request,
            self.max_retries,
            self.retry_backoff,
        )));

        match (&mut task.0).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(worker_id = self.id, %url, error = %e, "fetch task failed");
                (FetchResult::failure(url, None, format!("fetch task failed: {e}")), 0)
            }
        }
    }
}

/// Owns a spawned task and aborts it when dropped.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Fetch once, then retry transient failures with linear backoff.
pub(super) async fn fetch_with_retry<D: Downloader>(
    downloader: Arc<D>, client: D::Client, request: Request, max_retries: u32, retry_backoff: Duration,
) -> (FetchResult, u32) {
    let mut result = downloader.fetch_network(&client, &request).await;
    let mut retries = 0;

    while downloader.is_transient_failure(&result) && retries < max_retries {
        retries += 1;
        tracing::debug!(
            url = request.url(),
            status = ?result.status_code,
            attempt = retries,
            "transient failure, retrying"
        );
        tokio::time::sleep(retry_backoff * retries).await;
        result = downloader.fetch_network(&client, &request).await;
    }

    (result, retries)
}
