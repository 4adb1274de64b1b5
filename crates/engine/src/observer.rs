//! Observability hooks for the search result cache
//!
//! The cache reports every operation to a [`CacheObserver`]. Callers inject
//! their own observer to feed counters, traces or alerts; the default does
//! nothing. The cache always feeds its built-in
//! [`CacheMetrics`](crate::metrics::CacheMetrics) as well.

use std::time::Duration;

use searchcache_core::{Inconsistency, PageRequest, SearchId};

/// Receives a callback for each cache operation
///
/// All methods default to no-ops. Implementations must be cheap: they run
/// inline on the caller's thread.
pub trait CacheObserver: Send + Sync {
    /// A batch of `count` identifiers was appended for `search_id`
    ///
    /// Fires after commit for `append` and `append_next`, and at staging time
    /// for `append_in`, whose commit belongs to the caller.
    fn on_append(&self, search_id: &SearchId, count: usize) {
        let _ = (search_id, count);
    }

    /// A range fetch finished
    ///
    /// `page` is None when the requested range was empty and no storage
    /// query ran.
    fn on_fetch_range(
        &self,
        search_id: &SearchId,
        page: Option<PageRequest>,
        returned: usize,
        elapsed: Duration,
    ) {
        let _ = (search_id, page, returned, elapsed);
    }

    /// A bulk fetch finished
    fn on_fetch_all(&self, search_id: &SearchId, returned: usize) {
        let _ = (search_id, returned);
    }

    /// A range fetch came back short of the search totals
    fn on_inconsistency(&self, details: &Inconsistency) {
        let _ = details;
    }
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl CacheObserver for NoopObserver {}
