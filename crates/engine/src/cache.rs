//! SearchResultCache: ordered, paginated cache of search result identifiers
//!
//! ## Design
//!
//! The cache is a stateless facade over a [`RowStore`]. It holds no rows of
//! its own; every operation is one transaction against the store.
//!
//! ## Order Assignment
//!
//! `append` takes the number of entries the producer already stored and
//! hands out orders `previously_stored, previously_stored + 1, ...`. The
//! count is not re-read, so at most one producer may append to a search at
//! a time. `append_next` lifts that restriction by reading the count in the
//! same transaction as the insert and retrying when another producer won
//! the race for the same orders.
//!
//! ## Range Fetch Consistency
//!
//! A range `[from, to)` that lies within `num_found - num_blocked` must come
//! back complete. A short page there means rows are missing and the fetch
//! fails with `CacheInconsistency` instead of returning the short page.
//!
//! ## API
//!
//! - **Own transaction**: `append`, `append_next`, `fetch_range`,
//!   `fetch_all`, `stored_count`
//! - **Caller's transaction**: `append_in`, `fetch_range_in`, `fetch_all_in`,
//!   combined through `transaction`

use std::sync::Arc;
use std::time::Instant;

use searchcache_core::{
    to_page, Error, Inconsistency, Order, ResourceId, Result, ResultEntry, RowSink, RowSource,
    RowStore, SearchId, SearchTotals,
};
use tracing::{debug, trace, warn};

use crate::metrics::{CacheMetrics, CacheMetricsSnapshot};
use crate::observer::{CacheObserver, NoopObserver};

/// Default number of retries for [`SearchResultCache::append_next`]
pub const DEFAULT_APPEND_RETRIES: u32 = 8;

/// Cache of ordered search results over a transactional row store
///
/// # Example
///
/// ```ignore
/// use searchcache_engine::{CacheStore, SearchResultCache};
/// use searchcache_core::{ResourceId, SearchId, SearchSummary};
/// use std::sync::Arc;
///
/// let cache = SearchResultCache::new(Arc::new(CacheStore::ephemeral()));
/// let search = SearchSummary::with_totals(SearchId::new(), 3, 0);
///
/// cache.append(&search, 0, &[ResourceId(7), ResourceId(8), ResourceId(9)])?;
/// let page = cache.fetch_range(&search, 1, 3)?;
/// assert_eq!(page, vec![ResourceId(8), ResourceId(9)]);
/// ```
pub struct SearchResultCache<S: RowStore> {
    store: Arc<S>,
    metrics: CacheMetrics,
    observer: Arc<dyn CacheObserver>,
    append_retries: u32,
}

impl<S: RowStore> SearchResultCache<S> {
    /// Create a cache with no external observer
    pub fn new(store: Arc<S>) -> Self {
        Self::with_observer(store, Arc::new(NoopObserver))
    }

    /// Create a cache reporting to `observer`
    pub fn with_observer(store: Arc<S>, observer: Arc<dyn CacheObserver>) -> Self {
        Self {
            store,
            metrics: CacheMetrics::new(),
            observer,
            append_retries: DEFAULT_APPEND_RETRIES,
        }
    }

    /// Set how often `append_next` retries after losing an order race
    pub fn with_append_retries(mut self, retries: u32) -> Self {
        self.append_retries = retries;
        self
    }

    /// The underlying row store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Current operation counters
    pub fn metrics(&self) -> CacheMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Run `f` in a new transaction
    ///
    /// Commits if `f` returns `Ok`, discards everything `f` staged otherwise.
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut S::Txn) -> Result<T>,
    {
        let mut txn = self.store.begin();
        match f(&mut txn) {
            Ok(value) => {
                self.store.commit(txn)?;
                Ok(value)
            }
            Err(e) => {
                self.store.abort(txn);
                Err(e)
            }
        }
    }

    // ========== Producer API ==========

    /// Append the next slice of matches for a search
    ///
    /// `previously_stored` must be the number of entries already stored for
    /// the search. The new entries get orders `previously_stored..` in the
    /// iteration order of `new_ids`. The batch becomes visible all at once.
    ///
    /// # Errors
    ///
    /// - `ConstraintViolation` if an assigned order is already taken
    ///   (inaccurate `previously_stored` or a concurrent producer)
    /// - `InvalidInput` if the orders would not fit in an [`Order`]
    pub fn append<T>(&self, search: &T, previously_stored: usize, new_ids: &[ResourceId]) -> Result<()>
    where
        T: SearchTotals + ?Sized,
    {
        self.transaction(|txn| self.stage_append(txn, search, previously_stored, new_ids))?;
        self.report_append(&search.search_id(), new_ids.len());
        Ok(())
    }

    /// [`append`](Self::append) inside the caller's transaction
    ///
    /// Observers hear about the batch once it is staged, since the commit
    /// belongs to the caller.
    pub fn append_in<T>(
        &self,
        txn: &mut S::Txn,
        search: &T,
        previously_stored: usize,
        new_ids: &[ResourceId],
    ) -> Result<()>
    where
        T: SearchTotals + ?Sized,
    {
        self.stage_append(txn, search, previously_stored, new_ids)?;
        self.report_append(&search.search_id(), new_ids.len());
        Ok(())
    }

    fn stage_append<T>(
        &self,
        txn: &mut S::Txn,
        search: &T,
        previously_stored: usize,
        new_ids: &[ResourceId],
    ) -> Result<()>
    where
        T: SearchTotals + ?Sized,
    {
        let search_id = search.search_id();
        trace!(
            target: "searchcache::cache",
            search_id = %search_id,
            "Storing {} results with {} previous for search",
            new_ids.len(),
            previously_stored
        );
        if new_ids.is_empty() {
            return Ok(());
        }

        let first = order_at(previously_stored, 0)?;
        order_at(previously_stored, new_ids.len() - 1)?;

        // Bounds checked above, so no offset can overflow
        let rows: Vec<ResultEntry> = new_ids
            .iter()
            .enumerate()
            .map(|(offset, resource_id)| {
                let order = first + offset as Order;
                trace!(
                    target: "searchcache::cache",
                    "Saving ORDER[{}] Resource {}",
                    order,
                    resource_id
                );
                ResultEntry::new(search_id, order, *resource_id)
            })
            .collect();

        txn.insert_batch(rows)
    }

    fn report_append(&self, search_id: &SearchId, count: usize) {
        if count == 0 {
            return;
        }
        self.metrics.on_append(search_id, count);
        self.observer.on_append(search_id, count);
    }

    /// Append after whatever is currently stored for the search
    ///
    /// The stored count is read inside the same transaction as the insert.
    /// When another producer commits the same orders first, the append is
    /// retried against a fresh snapshot. Returns the order given to the
    /// first new identifier.
    pub fn append_next<T>(&self, search: &T, new_ids: &[ResourceId]) -> Result<usize>
    where
        T: SearchTotals + ?Sized,
    {
        let search_id = search.search_id();
        let mut attempt = 0;
        loop {
            let result = self.transaction(|txn| {
                let stored = txn.count(&search_id)?;
                self.stage_append(txn, search, stored, new_ids)?;
                Ok(stored)
            });
            match result {
                Ok(stored) => {
                    self.report_append(&search_id, new_ids.len());
                    return Ok(stored);
                }
                Err(Error::ConstraintViolation { order, .. }) if attempt < self.append_retries => {
                    attempt += 1;
                    debug!(
                        target: "searchcache::cache",
                        search_id = %search_id,
                        order,
                        attempt,
                        "Lost order race, retrying append"
                    );
                }
                other => return other,
            }
        }
    }

    // ========== Consumer API ==========

    /// Fetch the identifiers at positions `[from, to)`
    ///
    /// An empty or inverted range returns an empty `Vec` without querying
    /// storage. A range past the end of the stored results returns what
    /// exists, as long as the search totals agree that nothing is missing.
    ///
    /// # Errors
    ///
    /// `CacheInconsistency` if `to <= num_found - num_blocked` and fewer
    /// than `to - from` identifiers were found.
    pub fn fetch_range<T>(&self, search: &T, from: usize, to: usize) -> Result<Vec<ResourceId>>
    where
        T: SearchTotals + ?Sized,
    {
        if to_page(from, to).is_none() {
            return Ok(self.empty_range(search, from, to));
        }
        self.transaction(|txn| self.fetch_range_in(txn, search, from, to))
    }

    /// [`fetch_range`](Self::fetch_range) inside the caller's transaction
    pub fn fetch_range_in<T>(
        &self,
        txn: &mut S::Txn,
        search: &T,
        from: usize,
        to: usize,
    ) -> Result<Vec<ResourceId>>
    where
        T: SearchTotals + ?Sized,
    {
        let page = match to_page(from, to) {
            Some(page) => page,
            None => return Ok(self.empty_range(search, from, to)),
        };
        let search_id = search.search_id();

        let start = Instant::now();
        let ids = txn.find_range(&search_id, page)?;
        let elapsed = start.elapsed();

        debug!(
            target: "searchcache::cache",
            search_id = %search_id,
            "Fetched result ids for range {}-{}: {} returned",
            from,
            to,
            ids.len()
        );

        self.check_consistency(search, from, to, ids.len())?;

        self.metrics
            .on_fetch_range(&search_id, Some(page), ids.len(), elapsed);
        self.observer
            .on_fetch_range(&search_id, Some(page), ids.len(), elapsed);
        Ok(ids)
    }

    /// Fetch every stored identifier of a search, in no particular order
    pub fn fetch_all<T>(&self, search: &T) -> Result<Vec<ResourceId>>
    where
        T: SearchTotals + ?Sized,
    {
        self.transaction(|txn| self.fetch_all_in(txn, search))
    }

    /// [`fetch_all`](Self::fetch_all) inside the caller's transaction
    pub fn fetch_all_in<T>(&self, txn: &mut S::Txn, search: &T) -> Result<Vec<ResourceId>>
    where
        T: SearchTotals + ?Sized,
    {
        let search_id = search.search_id();
        let ids = txn.find_all(&search_id)?;
        trace!(
            target: "searchcache::cache",
            search_id = %search_id,
            "Fetched all result ids: {} returned",
            ids.len()
        );
        self.metrics.on_fetch_all(&search_id, ids.len());
        self.observer.on_fetch_all(&search_id, ids.len());
        Ok(ids)
    }

    /// Number of identifiers stored for a search
    pub fn stored_count<T>(&self, search: &T) -> Result<usize>
    where
        T: SearchTotals + ?Sized,
    {
        let search_id = search.search_id();
        self.transaction(|txn| txn.count(&search_id))
    }

    fn empty_range<T>(&self, search: &T, from: usize, to: usize) -> Vec<ResourceId>
    where
        T: SearchTotals + ?Sized,
    {
        let search_id = search.search_id();
        trace!(
            target: "searchcache::cache",
            search_id = %search_id,
            "Empty range {}-{}, skipping storage",
            from,
            to
        );
        let elapsed = std::time::Duration::ZERO;
        self.metrics.on_fetch_range(&search_id, None, 0, elapsed);
        self.observer.on_fetch_range(&search_id, None, 0, elapsed);
        Vec::new()
    }

    /// A short page is only legitimate when the range reaches past what the
    /// search says is available
    fn check_consistency<T>(&self, search: &T, from: usize, to: usize, returned: usize) -> Result<()>
    where
        T: SearchTotals + ?Sized,
    {
        let expected_available = search.expected_available();
        if expected_available < to as u64 || returned == to - from {
            return Ok(());
        }

        let details = Inconsistency {
            search_id: search.search_id(),
            from,
            to,
            returned,
            num_found: search.num_found(),
            num_blocked: search.num_blocked(),
        };
        warn!(
            target: "searchcache::cache",
            search_id = %details.search_id,
            from,
            to,
            returned,
            num_found = details.num_found,
            num_blocked = details.num_blocked,
            "Cache holds fewer results than the search reports"
        );
        self.metrics.on_inconsistency(&details);
        self.observer.on_inconsistency(&details);
        Err(Error::CacheInconsistency(details))
    }
}

/// Order of the `index`-th new entry after `previously_stored` existing ones
fn order_at(previously_stored: usize, index: usize) -> Result<Order> {
    previously_stored
        .checked_add(index)
        .and_then(|position| Order::try_from(position).ok())
        .ok_or_else(|| {
            Error::invalid_input(format!(
                "result position {} + {} exceeds the maximum order {}",
                previously_stored,
                index,
                Order::MAX
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CacheStore;
    use searchcache_core::{SearchId, SearchSummary};
    use searchcache_storage::ResultTable;

    fn ids(range: std::ops::Range<u64>) -> Vec<ResourceId> {
        range.map(ResourceId).collect()
    }

    fn cache() -> SearchResultCache<ResultTable> {
        SearchResultCache::new(Arc::new(ResultTable::new()))
    }

    #[test]
    fn test_append_then_fetch_in_order() {
        let cache = cache();
        let search = SearchSummary::with_totals(SearchId::new(), 5, 0);
        let appended = vec![
            ResourceId(50),
            ResourceId(10),
            ResourceId(40),
            ResourceId(20),
            ResourceId(30),
        ];

        cache.append(&search, 0, &appended).unwrap();
        assert_eq!(cache.fetch_range(&search, 0, 5).unwrap(), appended);
    }

    #[test]
    fn test_empty_range_skips_storage() {
        let cache = cache();
        let search = SearchSummary::with_totals(SearchId::new(), 100, 0);

        assert!(cache.fetch_range(&search, 5, 5).unwrap().is_empty());
        assert!(cache.fetch_range(&search, 9, 2).unwrap().is_empty());
        assert!(cache.fetch_range(&search, 0, 0).unwrap().is_empty());

        let metrics = cache.metrics();
        assert_eq!(metrics.empty_ranges, 3);
        assert_eq!(metrics.range_fetches, 0);
        assert_eq!(metrics.inconsistencies, 0);
    }

    #[test]
    fn test_blocked_results_tolerated_past_expected() {
        let cache = cache();
        let id = SearchId::new();
        let search = SearchSummary::with_totals(id, 10, 2);
        cache.append(&search, 0, &ids(0..8)).unwrap();

        assert_eq!(cache.fetch_range(&search, 0, 8).unwrap(), ids(0..8));
        assert_eq!(cache.fetch_range(&search, 0, 20).unwrap(), ids(0..8));
    }

    #[test]
    fn test_short_store_is_inconsistent() {
        let cache = cache();
        let id = SearchId::new();
        let search = SearchSummary::with_totals(id, 10, 2);
        cache.append(&search, 0, &ids(0..5)).unwrap();

        let err = cache.fetch_range(&search, 0, 8).unwrap_err();
        let details = err.inconsistency().copied().unwrap();
        assert_eq!(details.search_id, id);
        assert_eq!((details.from, details.to), (0, 8));
        assert_eq!(details.returned, 5);
        assert_eq!(details.expected_available(), 8);
        assert_eq!(cache.metrics().inconsistencies, 1);
    }

    #[test]
    fn test_boundary_equal_to_expected_is_checked() {
        let cache = cache();
        let search = SearchSummary::with_totals(SearchId::new(), 8, 0);
        cache.append(&search, 0, &ids(0..7)).unwrap();

        // to == expected_available: the range is fully claimed, so short is an error
        assert!(cache.fetch_range(&search, 4, 8).unwrap_err().is_inconsistency());
        // to > expected_available: short is fine
        assert_eq!(cache.fetch_range(&search, 4, 9).unwrap(), ids(4..7));
    }

    #[test]
    fn test_batches_concatenate() {
        let cache = cache();
        let search = SearchSummary::with_totals(SearchId::new(), 7, 0);

        cache.append(&search, 0, &ids(100..104)).unwrap();
        cache.append(&search, 4, &ids(200..203)).unwrap();

        let mut expected = ids(100..104);
        expected.extend(ids(200..203));
        assert_eq!(cache.fetch_range(&search, 0, 7).unwrap(), expected);
        assert_eq!(cache.fetch_range(&search, 3, 5).unwrap(), vec![ResourceId(103), ResourceId(200)]);
    }

    #[test]
    fn test_stale_previous_count_rejected() {
        let cache = cache();
        let search = SearchSummary::with_totals(SearchId::new(), 6, 0);
        cache.append(&search, 0, &ids(0..4)).unwrap();

        let err = cache.append(&search, 2, &ids(10..12)).unwrap_err();
        assert!(matches!(err, Error::ConstraintViolation { order: 2, .. }));
        assert_eq!(cache.stored_count(&search).unwrap(), 4);
        // Only the committed batch is counted
        assert_eq!(cache.metrics().appends, 1);
        assert_eq!(cache.metrics().appended_entries, 4);
        assert_eq!(cache.fetch_range(&search, 0, 4).unwrap(), ids(0..4));
    }

    #[test]
    fn test_empty_append_is_noop() {
        let cache = cache();
        let search = SearchSummary::new(SearchId::new());
        cache.append(&search, 0, &[]).unwrap();
        assert_eq!(cache.stored_count(&search).unwrap(), 0);
        assert_eq!(cache.metrics().appends, 0);
    }

    #[test]
    fn test_order_overflow_rejected() {
        let cache = cache();
        let search = SearchSummary::new(SearchId::new());
        let err = cache
            .append(&search, Order::MAX as usize, &ids(0..2))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(cache.stored_count(&search).unwrap(), 0);

        // The last representable order is still usable
        cache.append(&search, Order::MAX as usize, &ids(0..1)).unwrap();
        assert_eq!(cache.stored_count(&search).unwrap(), 1);
    }

    #[test]
    fn test_fetch_all_returns_every_entry() {
        let cache = cache();
        let search = SearchSummary::with_totals(SearchId::new(), 9, 0);
        cache.append(&search, 0, &ids(0..3)).unwrap();
        cache.append(&search, 3, &ids(3..9)).unwrap();

        let mut all = cache.fetch_all(&search).unwrap();
        all.sort();
        assert_eq!(all, ids(0..9));
    }

    #[test]
    fn test_caller_transaction_is_all_or_nothing() {
        let cache = cache();
        let search = SearchSummary::with_totals(SearchId::new(), 6, 0);

        let result: Result<()> = cache.transaction(|txn| {
            cache.append_in(txn, &search, 0, &ids(0..3))?;
            // Read-your-writes inside the transaction
            assert_eq!(cache.fetch_range_in(txn, &search, 0, 3)?, ids(0..3));
            cache.append_in(txn, &search, 3, &ids(3..6))?;
            Err(Error::storage("coordinator aborted the page"))
        });
        assert!(result.is_err());
        assert_eq!(cache.stored_count(&search).unwrap(), 0);

        cache
            .transaction(|txn| {
                cache.append_in(txn, &search, 0, &ids(0..3))?;
                cache.append_in(txn, &search, 3, &ids(3..6))
            })
            .unwrap();
        assert_eq!(cache.fetch_range(&search, 0, 6).unwrap(), ids(0..6));
    }

    #[test]
    fn test_append_next_continues_sequence() {
        let cache = cache();
        let search = SearchSummary::with_totals(SearchId::new(), 5, 0);

        assert_eq!(cache.append_next(&search, &ids(0..2)).unwrap(), 0);
        assert_eq!(cache.append_next(&search, &ids(2..5)).unwrap(), 2);
        assert_eq!(cache.fetch_range(&search, 0, 5).unwrap(), ids(0..5));
    }

    #[test]
    fn test_works_over_cache_store() {
        let cache = SearchResultCache::new(Arc::new(CacheStore::ephemeral()));
        let search = SearchSummary::with_totals(SearchId::new(), 3, 0);
        cache.append(&search, 0, &ids(1..4)).unwrap();
        assert_eq!(cache.fetch_range(&search, 1, 3).unwrap(), ids(2..4));
    }
}
