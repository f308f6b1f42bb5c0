//! Core types and shared functionality for the oyez fetch engine.
//!
//! This crate provides:
//! - Request and result value types
//! - The versioned file cache
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod request;
pub mod result;

pub use cache::{CacheEntry, CacheMeta, ChangeEvent, ContentVersion, FileCache};
pub use config::AppConfig;
pub use error::Error;
pub use request::Request;
pub use result::{DEFAULT_CONTENT_TYPE, FailedRecord, FetchResult};
