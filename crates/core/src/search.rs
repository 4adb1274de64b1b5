//! Search totals
//!
//! The cache never owns a search. It only reads the identity and the two
//! counts the search engine reports, through [`SearchTotals`].

use crate::types::SearchId;
use serde::{Deserialize, Serialize};

/// Read-only view of a search, as consumed by the cache
pub trait SearchTotals {
    /// Identity of the search
    fn search_id(&self) -> SearchId;

    /// Total matches the search engine believes exist
    ///
    /// May grow while an asynchronous search is running.
    fn num_found(&self) -> u64;

    /// Matches withheld for authorization or policy reasons
    ///
    /// These are never stored in the cache. Expected to be `<= num_found`.
    fn num_blocked(&self) -> u64;

    /// Number of entries the cache is expected to hold once the search settles
    fn expected_available(&self) -> u64 {
        self.num_found().saturating_sub(self.num_blocked())
    }
}

/// Plain search totals for callers without their own search entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSummary {
    /// Search identity
    pub id: SearchId,
    /// Total matches found
    pub num_found: u64,
    /// Matches withheld by policy
    pub num_blocked: u64,
}

impl SearchSummary {
    /// Create a summary for a fresh search with no matches yet
    pub fn new(id: SearchId) -> Self {
        Self {
            id,
            num_found: 0,
            num_blocked: 0,
        }
    }

    /// Create a summary with known totals
    pub fn with_totals(id: SearchId, num_found: u64, num_blocked: u64) -> Self {
        Self {
            id,
            num_found,
            num_blocked,
        }
    }
}

impl SearchTotals for SearchSummary {
    fn search_id(&self) -> SearchId {
        self.id
    }

    fn num_found(&self) -> u64 {
        self.num_found
    }

    fn num_blocked(&self) -> u64 {
        self.num_blocked
    }
}

impl<T: SearchTotals + ?Sized> SearchTotals for &T {
    fn search_id(&self) -> SearchId {
        (**self).search_id()
    }

    fn num_found(&self) -> u64 {
        (**self).num_found()
    }

    fn num_blocked(&self) -> u64 {
        (**self).num_blocked()
    }
}
