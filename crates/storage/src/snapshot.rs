//! TableSnapshot: point-in-time view of the result table
//!
//! A snapshot shares the table's row map through an `Arc`, so taking one is
//! O(1). The table copies its map on the next write only while a snapshot is
//! still alive (copy-on-write via `Arc::make_mut`).
//!
//! # Design Notes
//!
//! - **Immutable**: Once created, the snapshot never changes
//! - **Thread-safe**: Can be shared across threads (Arc-wrapped data)
//! - **Positional paging**: `find_range` skips `offset` rows of the search,
//!   it does not seek to `order == offset`

use std::collections::BTreeMap;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use searchcache_core::{PageRequest, ResourceId, Result, RowKey, RowSource, SearchId};

/// Rows and per-search counts, shared between the table and its snapshots
#[derive(Debug, Clone, Default)]
pub(crate) struct TableState {
    /// Ordered rows: all rows of a search are adjacent, ascending by order
    pub(crate) rows: BTreeMap<RowKey, ResourceId>,
    /// Secondary index: SearchId → number of rows
    pub(crate) counts: FxHashMap<SearchId, usize>,
}

impl TableState {
    /// Iterate the rows of one search in ascending order
    pub(crate) fn search_rows(
        &self,
        search_id: SearchId,
    ) -> impl Iterator<Item = (&RowKey, &ResourceId)> + '_ {
        self.rows
            .range(RowKey::search_start(search_id)..=RowKey::search_end(search_id))
    }

    pub(crate) fn count(&self, search_id: &SearchId) -> usize {
        self.counts.get(search_id).copied().unwrap_or(0)
    }
}

/// Immutable point-in-time view of the result table
///
/// # Example
///
/// ```ignore
/// let table = ResultTable::new();
/// let snapshot = table.snapshot();
///
/// // Rows committed after the snapshot was taken are not visible in it
/// table.commit(txn)?;
/// assert_eq!(snapshot.count(&search_id)?, 0);
/// ```
#[derive(Debug, Clone)]
pub struct TableSnapshot {
    /// The table version at which this snapshot was taken
    version: u64,
    state: Arc<TableState>,
}

impl TableSnapshot {
    pub(crate) fn new(version: u64, state: Arc<TableState>) -> Self {
        Self { version, state }
    }

    /// Version of the table when this snapshot was taken
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Whether the snapshot holds a row with this key
    pub fn contains(&self, key: &RowKey) -> bool {
        self.state.rows.contains_key(key)
    }

    /// Total rows across all searches
    pub fn len(&self) -> usize {
        self.state.rows.len()
    }

    /// Whether the snapshot holds no rows at all
    pub fn is_empty(&self) -> bool {
        self.state.rows.is_empty()
    }

    pub(crate) fn state(&self) -> &TableState {
        &self.state
    }
}

impl RowSource for TableSnapshot {
    fn find_range(&self, search_id: &SearchId, page: PageRequest) -> Result<Vec<ResourceId>> {
        Ok(self
            .state
            .search_rows(*search_id)
            .skip(page.offset())
            .take(page.limit())
            .map(|(_, resource_id)| *resource_id)
            .collect())
    }

    fn find_all(&self, search_id: &SearchId) -> Result<Vec<ResourceId>> {
        Ok(self
            .state
            .search_rows(*search_id)
            .map(|(_, resource_id)| *resource_id)
            .collect())
    }

    fn count(&self, search_id: &SearchId) -> Result<usize> {
        Ok(self.state.count(search_id))
    }
}
