//! Range translation
//!
//! Callers address results by half-open position ranges `[from, to)`.
//! Row stores are queried by offset/limit. [`to_page`] converts one into the
//! other and filters out degenerate ranges so the store only ever sees a
//! page with `limit >= 1`.

use serde::{Deserialize, Serialize};

/// Offset/limit request against a search's ordered rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageRequest {
    offset: usize,
    limit: usize,
}

impl PageRequest {
    /// Build a page request
    ///
    /// Returns None when `limit` is zero.
    pub fn new(offset: usize, limit: usize) -> Option<Self> {
        if limit == 0 {
            return None;
        }
        Some(Self { offset, limit })
    }

    /// Translate raw signed bounds
    ///
    /// Negative bounds and `to <= from` yield None, the same as an empty range.
    pub fn from_signed(from: i64, to: i64) -> Option<Self> {
        if from < 0 || to <= from {
            return None;
        }
        let from = usize::try_from(from).ok()?;
        let to = usize::try_from(to).ok()?;
        to_page(from, to)
    }

    /// Number of rows to skip
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Maximum number of rows to return (always at least one)
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// End of the covered range (exclusive)
    pub fn end(&self) -> usize {
        self.offset.saturating_add(self.limit)
    }

    /// Page number when the result set is cut into `limit`-sized pages
    pub fn page_index(&self) -> usize {
        self.offset / self.limit
    }
}

/// Convert a half-open range `[from, to)` to an offset/limit page
///
/// Returns None for empty or inverted ranges.
pub fn to_page(from: usize, to: usize) -> Option<PageRequest> {
    if to <= from {
        return None;
    }
    PageRequest::new(from, to - from)
}
