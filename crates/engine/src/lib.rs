//! Search result cache engine for SearchCache
//!
//! This crate ties the lower layers together:
//! - SearchResultCache: append / fetchRange / fetchAll over any RowStore
//! - CacheStore: the result table plus the batch log and its replay
//! - CacheConfig: `searchcache.toml` in the data directory
//! - CacheObserver / CacheMetrics: per-operation hooks and counters
//!
//! The engine is the only component that knows about:
//! - The range consistency rule against search totals
//! - Order assignment for appended batches
//! - Cross-layer commits (table + batch log)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod metrics;
pub mod observer;
pub mod store;

use std::path::Path;
use std::sync::Arc;

use searchcache_core::Result;

pub use cache::{SearchResultCache, DEFAULT_APPEND_RETRIES};
pub use metrics::{CacheMetrics, CacheMetricsSnapshot};
pub use observer::{CacheObserver, NoopObserver};
pub use store::{CacheConfig, CacheStore, CONFIG_FILE_NAME, LOG_FILE_NAME};

/// Open a durable cache in `dir`
///
/// Uses the `searchcache.toml` found in (or written to) `dir`, including its
/// `append_retries` setting.
pub fn open_cache(dir: impl AsRef<Path>) -> Result<SearchResultCache<CacheStore>> {
    let store = CacheStore::open(dir)?;
    let retries = store.config().append_retries;
    Ok(SearchResultCache::new(Arc::new(store)).with_append_retries(retries))
}

/// In-memory cache with default settings
pub fn ephemeral_cache() -> SearchResultCache<CacheStore> {
    SearchResultCache::new(Arc::new(CacheStore::ephemeral()))
}
