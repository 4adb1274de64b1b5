//! ResultTable: ordered in-memory store of cached search results
//!
//! This module implements the row store using:
//! - `BTreeMap<RowKey, ResourceId>` for rows ordered by (search, order)
//! - `parking_lot::RwLock<Arc<..>>` so snapshots are an `Arc` clone
//! - `AtomicU64` for monotonically increasing commit versions
//! - A per-search row count index, updated in the same write as the rows
//!
//! # Commit Protocol
//!
//! Commits are serialized by a table-wide commit lock:
//! 1. Validate staged rows against the current rows (read lock only)
//! 2. Run the caller's pre-apply hook (e.g. append to the batch log)
//! 3. Install all rows under a single write lock acquisition
//!
//! Readers keep running during steps 1 and 2 and can never observe a
//! partially applied batch.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use searchcache_core::{Error, Result, ResultEntry, RowKey, RowStore, SearchId};

use crate::snapshot::{TableSnapshot, TableState};
use crate::transaction::TableTransaction;

/// Ordered, snapshot-isolated table of result rows
///
/// Thread-safe through `parking_lot` locks and `AtomicU64`.
#[derive(Debug, Default)]
pub struct ResultTable {
    state: RwLock<Arc<TableState>>,
    /// Serializes writers; held from validation to apply
    commit_lock: Mutex<()>,
    /// Highest version applied so far
    version: AtomicU64,
}

impl ResultTable {
    /// Create a new empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a point-in-time snapshot
    pub fn snapshot(&self) -> TableSnapshot {
        // Read the version under the same lock as the data so the snapshot
        // never claims a version whose rows it does not contain
        let state = self.state.read();
        TableSnapshot::new(self.current_version(), Arc::clone(&state))
    }

    /// Start a transaction reading from a fresh snapshot
    pub fn begin(&self) -> TableTransaction {
        TableTransaction::new(self.snapshot())
    }

    /// Highest committed version
    pub fn current_version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Total rows across all searches
    pub fn len(&self) -> usize {
        self.state.read().rows.len()
    }

    /// Whether the table holds no rows
    pub fn is_empty(&self) -> bool {
        self.state.read().rows.is_empty()
    }

    /// Searches that currently have at least one row
    pub fn searches(&self) -> Vec<SearchId> {
        let mut searches: Vec<SearchId> = self.state.read().counts.keys().copied().collect();
        searches.sort();
        searches
    }

    /// Commit a transaction with no pre-apply hook
    pub fn commit(&self, txn: TableTransaction) -> Result<u64> {
        self.commit_with(txn, |_, _| Ok(()))
    }

    /// Commit a transaction, running `before_apply` once validation passed
    ///
    /// `before_apply` receives the commit version and the rows about to be
    /// installed. If it fails, nothing is applied and its error is returned.
    /// A transaction that staged nothing skips the hook and returns the
    /// current version.
    pub fn commit_with<F>(&self, txn: TableTransaction, before_apply: F) -> Result<u64>
    where
        F: FnOnce(u64, &[ResultEntry]) -> Result<()>,
    {
        if txn.is_read_only() {
            return Ok(self.current_version());
        }
        let rows = txn.into_staged();

        let _guard = self.commit_lock.lock();
        self.validate(&rows)?;
        let version = self.current_version() + 1;
        before_apply(version, &rows)?;
        self.apply_batch(&rows, version);
        Ok(version)
    }

    /// Check that none of `rows` collides with a stored row
    pub fn validate(&self, rows: &[ResultEntry]) -> Result<()> {
        let state = self.state.read();
        match rows.iter().find(|row| state.rows.contains_key(&row.key())) {
            Some(row) => Err(Error::ConstraintViolation {
                search_id: row.search_id,
                order: row.order,
            }),
            None => Ok(()),
        }
    }

    /// Install rows at `version` without validation
    ///
    /// Used by commit after validation and by log replay, whose records were
    /// validated when first committed.
    pub fn apply_batch(&self, rows: &[ResultEntry], version: u64) {
        let mut guard = self.state.write();
        let state = Arc::make_mut(&mut guard);
        for row in rows {
            if state.rows.insert(row.key(), row.resource_id).is_none() {
                *state.counts.entry(row.search_id).or_insert(0) += 1;
            }
        }
        self.version.fetch_max(version, Ordering::AcqRel);
    }

    /// Remove every row of a search (whole-search teardown)
    ///
    /// Returns the number of rows removed.
    pub fn remove_search(&self, search_id: &SearchId) -> Result<usize> {
        self.remove_search_with(search_id, |_| Ok(()))
    }

    /// Remove every row of a search, running `before_apply` first
    pub fn remove_search_with<F>(&self, search_id: &SearchId, before_apply: F) -> Result<usize>
    where
        F: FnOnce(u64) -> Result<()>,
    {
        let _guard = self.commit_lock.lock();
        if self.state.read().count(search_id) == 0 {
            return Ok(0);
        }
        let version = self.current_version() + 1;
        before_apply(version)?;
        Ok(self.apply_remove(search_id, version))
    }

    /// Remove a search's rows at `version` (also used by log replay)
    pub fn apply_remove(&self, search_id: &SearchId, version: u64) -> usize {
        let mut guard = self.state.write();
        let state = Arc::make_mut(&mut guard);
        let keys: Vec<RowKey> = state.search_rows(*search_id).map(|(key, _)| *key).collect();
        for key in &keys {
            state.rows.remove(key);
        }
        state.counts.remove(search_id);
        self.version.fetch_max(version, Ordering::AcqRel);
        keys.len()
    }
}

impl RowStore for ResultTable {
    type Txn = TableTransaction;

    fn begin(&self) -> TableTransaction {
        ResultTable::begin(self)
    }

    fn commit(&self, txn: TableTransaction) -> Result<u64> {
        ResultTable::commit(self, txn)
    }
}
