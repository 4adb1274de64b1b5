//! Row store traits
//!
//! These traits are the only way the cache touches storage, so the in-memory
//! table, the durable store, or any other ordered-row backend can sit under
//! it without changing upper layers.
//!
//! Thread safety: a [`RowStore`] is shared across threads; the transactions
//! it hands out are owned by a single caller at a time.

use crate::error::Result;
use crate::page::PageRequest;
use crate::types::{ResourceId, ResultEntry, SearchId};

/// Read primitives over cached rows
pub trait RowSource {
    /// Rows of `search_id` in ascending order, skipping `page.offset()` rows
    /// and returning at most `page.limit()`
    fn find_range(&self, search_id: &SearchId, page: PageRequest) -> Result<Vec<ResourceId>>;

    /// Every row of `search_id`, in no particular order
    fn find_all(&self, search_id: &SearchId) -> Result<Vec<ResourceId>>;

    /// Number of rows stored for `search_id`
    fn count(&self, search_id: &SearchId) -> Result<usize>;
}

/// Write primitive over cached rows
pub trait RowSink {
    /// Stage a batch of new rows
    ///
    /// # Errors
    ///
    /// Returns `ConstraintViolation` if any row's (search, order) key is
    /// already taken, either in the store or earlier in the same batch.
    fn insert_batch(&mut self, rows: Vec<ResultEntry>) -> Result<()>;
}

/// Transactional ordered-row store
///
/// Every transaction reads from a consistent snapshot taken at [`begin`]
/// and its staged rows become visible to others all at once on [`commit`].
///
/// [`begin`]: RowStore::begin
/// [`commit`]: RowStore::commit
pub trait RowStore: Send + Sync {
    /// Transaction handle
    type Txn: RowSource + RowSink + Send;

    /// Start a transaction
    fn begin(&self) -> Self::Txn;

    /// Commit a transaction and return the version it was applied at
    ///
    /// A transaction that staged nothing returns the current version and
    /// changes nothing.
    fn commit(&self, txn: Self::Txn) -> Result<u64>;

    /// Discard a transaction and everything it staged
    fn abort(&self, txn: Self::Txn) {
        drop(txn);
    }
}
