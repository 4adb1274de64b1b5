//! Core types and traits for SearchCache
//!
//! This crate defines the foundational types used throughout the system:
//! - SearchId / ResourceId: identities of searches and matched records
//! - ResultEntry / RowKey: one cached match and its ordering key
//! - PageRequest: offset/limit translation of `[from, to)` ranges
//! - SearchTotals: the read-only totals a search reports
//! - Error: Error type hierarchy, including the structured inconsistency
//! - Traits: row store abstraction (RowSource, RowSink, RowStore)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod page;
pub mod search;
pub mod traits;
pub mod types;

pub use error::{Error, Inconsistency, Result};
pub use page::{to_page, PageRequest};
pub use search::{SearchSummary, SearchTotals};
pub use traits::{RowSink, RowSource, RowStore};
pub use types::{Order, ResourceId, ResultEntry, RowKey, SearchId};
