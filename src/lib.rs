//! SearchCache - persistent, paginated cache of search result identifiers
//!
//! A search producer appends the identifiers of matched records in
//! batches; consumers page through them by position. Each range fetch is
//! checked against the totals the search reports, so a cache that lost
//! rows fails loudly instead of serving short pages.
//!
//! # Quick Start
//!
//! ```ignore
//! use searchcache::{open_cache, ResourceId, SearchId, SearchSummary};
//!
//! let cache = open_cache("/var/lib/searchcache")?;
//! let search = SearchSummary::with_totals(SearchId::new(), 3, 0);
//!
//! cache.append(&search, 0, &[ResourceId(7), ResourceId(8), ResourceId(9)])?;
//! let page = cache.fetch_range(&search, 0, 2)?;
//! ```
//!
//! # Architecture
//!
//! - `searchcache-core`: identifiers, errors, paging, row store traits
//! - `searchcache-storage`: in-memory ordered table with snapshots
//! - `searchcache-durability`: checksummed batch log
//! - `searchcache-engine`: the cache facade, config, and metrics

pub use searchcache_core::{
    to_page, Error, Inconsistency, Order, PageRequest, ResourceId, Result, ResultEntry, RowKey,
    RowSink, RowSource, RowStore, SearchId, SearchSummary, SearchTotals,
};
pub use searchcache_durability::DurabilityMode;
pub use searchcache_engine::{
    ephemeral_cache, open_cache, CacheConfig, CacheMetrics, CacheMetricsSnapshot, CacheObserver,
    CacheStore, NoopObserver, SearchResultCache, DEFAULT_APPEND_RETRIES,
};
pub use searchcache_storage::{ResultTable, TableSnapshot, TableTransaction};
