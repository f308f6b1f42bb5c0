//! Adaptive-parallelism fetch engine.
//!
//! This crate provides the downloader abstraction with its HTTP backend, the
//! self-sizing worker pool, and the batch fetch API built on top of them.

pub mod config;
pub mod downloader;
pub mod fetcher;
pub mod pool;

pub use config::FetcherConfig;
pub use downloader::{Downloader, HttpDownloader, is_transient_failure};
pub use fetcher::{AdaptiveFetcher, Progress, ProgressCallback};
pub use pool::{Completion, PoolConfig, ScalingDecision, WorkerPool};
