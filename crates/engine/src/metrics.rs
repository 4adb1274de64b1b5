//! Built-in cache counters
//!
//! # Memory Ordering
//!
//! All counters use Relaxed ordering. They are observational only and do
//! not synchronize any other memory; `fetch_add` still guarantees no torn
//! or lost increments.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use searchcache_core::{Inconsistency, PageRequest, SearchId};

use crate::observer::CacheObserver;

/// Operation counters for a cache instance
#[derive(Debug, Default)]
pub struct CacheMetrics {
    appends: AtomicU64,
    appended_entries: AtomicU64,
    range_fetches: AtomicU64,
    empty_ranges: AtomicU64,
    fetched_entries: AtomicU64,
    fetch_nanos: AtomicU64,
    full_fetches: AtomicU64,
    inconsistencies: AtomicU64,
}

impl CacheMetrics {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Current counter values
    pub fn snapshot(&self) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            appends: self.appends.load(Ordering::Relaxed),
            appended_entries: self.appended_entries.load(Ordering::Relaxed),
            range_fetches: self.range_fetches.load(Ordering::Relaxed),
            empty_ranges: self.empty_ranges.load(Ordering::Relaxed),
            fetched_entries: self.fetched_entries.load(Ordering::Relaxed),
            total_fetch_time: Duration::from_nanos(self.fetch_nanos.load(Ordering::Relaxed)),
            full_fetches: self.full_fetches.load(Ordering::Relaxed),
            inconsistencies: self.inconsistencies.load(Ordering::Relaxed),
        }
    }
}

impl CacheObserver for CacheMetrics {
    fn on_append(&self, _search_id: &SearchId, count: usize) {
        self.appends.fetch_add(1, Ordering::Relaxed);
        self.appended_entries
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    fn on_fetch_range(
        &self,
        _search_id: &SearchId,
        page: Option<PageRequest>,
        returned: usize,
        elapsed: Duration,
    ) {
        if page.is_none() {
            self.empty_ranges.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.range_fetches.fetch_add(1, Ordering::Relaxed);
        self.fetched_entries
            .fetch_add(returned as u64, Ordering::Relaxed);
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.fetch_nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    fn on_fetch_all(&self, _search_id: &SearchId, _returned: usize) {
        self.full_fetches.fetch_add(1, Ordering::Relaxed);
    }

    fn on_inconsistency(&self, _details: &Inconsistency) {
        self.inconsistencies.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time copy of [`CacheMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheMetricsSnapshot {
    /// Batches appended (committed, or staged in a caller's transaction)
    pub appends: u64,
    /// Identifiers across all counted appends
    pub appended_entries: u64,
    /// Range fetches that queried storage
    pub range_fetches: u64,
    /// Range fetches answered by the empty-range fast path
    pub empty_ranges: u64,
    /// Identifiers returned by range fetches
    pub fetched_entries: u64,
    /// Time spent in storage-backed range fetches
    pub total_fetch_time: Duration,
    /// Bulk fetches
    pub full_fetches: u64,
    /// Range fetches rejected as inconsistent
    pub inconsistencies: u64,
}

impl CacheMetricsSnapshot {
    /// Mean latency of storage-backed range fetches
    pub fn mean_fetch_time(&self) -> Duration {
        if self.range_fetches == 0 {
            return Duration::ZERO;
        }
        let total = u64::try_from(self.total_fetch_time.as_nanos()).unwrap_or(u64::MAX);
        Duration::from_nanos(total / self.range_fetches)
    }
}
