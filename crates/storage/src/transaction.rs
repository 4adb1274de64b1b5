//! TableTransaction: snapshot reads plus staged rows
//!
//! A transaction reads from the snapshot taken when it began, merged with
//! the rows it has staged itself (read-your-writes). Nothing becomes visible
//! to other readers until the owning store commits it. Dropping a
//! transaction discards everything it staged.

use std::collections::BTreeMap;
use std::iter::Peekable;

use rustc_hash::{FxHashMap, FxHashSet};
use searchcache_core::{
    Error, PageRequest, ResourceId, Result, ResultEntry, RowKey, RowSink, RowSource, SearchId,
};

use crate::snapshot::TableSnapshot;

/// An open transaction against a [`ResultTable`](crate::ResultTable)
#[derive(Debug)]
pub struct TableTransaction {
    snapshot: TableSnapshot,
    staged: BTreeMap<RowKey, ResourceId>,
    staged_counts: FxHashMap<SearchId, usize>,
}

impl TableTransaction {
    pub(crate) fn new(snapshot: TableSnapshot) -> Self {
        Self {
            snapshot,
            staged: BTreeMap::new(),
            staged_counts: FxHashMap::default(),
        }
    }

    /// Version of the snapshot this transaction reads from
    pub fn start_version(&self) -> u64 {
        self.snapshot.version()
    }

    /// Whether nothing has been staged
    pub fn is_read_only(&self) -> bool {
        self.staged.is_empty()
    }

    /// Number of staged rows
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    /// Take the staged rows out of the transaction, in key order
    pub fn into_staged(self) -> Vec<ResultEntry> {
        self.staged
            .into_iter()
            .map(|(key, resource_id)| ResultEntry::new(key.search_id, key.order, resource_id))
            .collect()
    }

    fn staged_rows(&self, search_id: SearchId) -> impl Iterator<Item = (&RowKey, &ResourceId)> + '_ {
        self.staged
            .range(RowKey::search_start(search_id)..=RowKey::search_end(search_id))
    }

    fn merged_rows(&self, search_id: SearchId) -> impl Iterator<Item = ResourceId> + '_ {
        MergeByKey {
            left: self.snapshot.state().search_rows(search_id).peekable(),
            right: self.staged_rows(search_id).peekable(),
        }
    }
}

impl RowSource for TableTransaction {
    fn find_range(&self, search_id: &SearchId, page: PageRequest) -> Result<Vec<ResourceId>> {
        Ok(self
            .merged_rows(*search_id)
            .skip(page.offset())
            .take(page.limit())
            .collect())
    }

    fn find_all(&self, search_id: &SearchId) -> Result<Vec<ResourceId>> {
        let mut all = self.snapshot.find_all(search_id)?;
        all.extend(self.staged_rows(*search_id).map(|(_, resource_id)| *resource_id));
        Ok(all)
    }

    fn count(&self, search_id: &SearchId) -> Result<usize> {
        let staged = self.staged_counts.get(search_id).copied().unwrap_or(0);
        Ok(self.snapshot.count(search_id)? + staged)
    }
}

impl RowSink for TableTransaction {
    fn insert_batch(&mut self, rows: Vec<ResultEntry>) -> Result<()> {
        // Check the whole batch first so a rejected batch stages nothing
        let mut seen = FxHashSet::default();
        for row in &rows {
            let key = row.key();
            if !seen.insert(key) || self.staged.contains_key(&key) || self.snapshot.contains(&key) {
                return Err(Error::ConstraintViolation {
                    search_id: key.search_id,
                    order: key.order,
                });
            }
        }

        for row in rows {
            self.staged.insert(row.key(), row.resource_id);
            *self.staged_counts.entry(row.search_id).or_insert(0) += 1;
        }
        Ok(())
    }
}

/// Two-way merge of key-ordered row iterators with disjoint keys
struct MergeByKey<'a, L, R>
where
    L: Iterator<Item = (&'a RowKey, &'a ResourceId)>,
    R: Iterator<Item = (&'a RowKey, &'a ResourceId)>,
{
    left: Peekable<L>,
    right: Peekable<R>,
}

impl<'a, L, R> Iterator for MergeByKey<'a, L, R>
where
    L: Iterator<Item = (&'a RowKey, &'a ResourceId)>,
    R: Iterator<Item = (&'a RowKey, &'a ResourceId)>,
{
    type Item = ResourceId;

    fn next(&mut self) -> Option<ResourceId> {
        let take_left = match (self.left.peek(), self.right.peek()) {
            (Some((l, _)), Some((r, _))) => l <= r,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => return None,
        };
        let next = if take_left {
            self.left.next()
        } else {
            self.right.next()
        };
        next.map(|(_, resource_id)| *resource_id)
    }
}
