//! Storage layer for SearchCache
//!
//! This crate implements the in-memory row store:
//! - ResultTable: BTreeMap of rows ordered by (search, order) behind an RwLock
//! - TableSnapshot: O(1) copy-on-write point-in-time view
//! - TableTransaction: snapshot reads plus staged rows, committed atomically
//! - Per-search row counts maintained alongside the rows
//!
//! Durability is layered on top by `searchcache-engine`, which logs each
//! batch through the pre-apply hook of [`ResultTable::commit_with`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod snapshot;
pub mod table;
pub mod transaction;

pub use snapshot::TableSnapshot;
pub use table::ResultTable;
pub use transaction::TableTransaction;
