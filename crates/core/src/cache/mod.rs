//! Versioned on-disk response cache.
//!
//! Every distinct body observed for a cache key is kept as its own
//! content-addressed blob. Metadata tracks the version history and points at
//! the latest one; content transitions are appended to a change log.

mod changes;
pub mod extension;
pub mod hash;
pub mod meta;
mod store;

pub use crate::Error;

pub use extension::extension_for_content_type;
pub use hash::{compute_cache_key, compute_content_hash};
pub use meta::{CacheEntry, CacheMeta, ChangeEvent, ContentVersion};
pub use store::FileCache;
