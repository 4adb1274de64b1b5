//! Core types for the search result cache
//!
//! This module defines the foundational types:
//! - SearchId: Unique identifier for a logical search
//! - ResourceId: Opaque identifier of a matched record
//! - ResultEntry: One cached match with its position in the search
//! - RowKey: Ordering key of the result table (search, then order)

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a logical search
///
/// A SearchId is a wrapper around a UUID v4. All cached rows are scoped
/// to exactly one SearchId.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SearchId(Uuid);

impl SearchId {
    /// Create a new random SearchId using UUID v4
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a SearchId from raw bytes
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Parse a SearchId from a string representation
    ///
    /// Accepts standard UUID format (with or without hyphens).
    /// Returns None if the string is not a valid UUID.
    pub fn from_string(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }

    /// Get the raw bytes of this SearchId
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for SearchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SearchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a matched record
///
/// The cache never interprets this value; it only preserves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId(pub u64);

impl ResourceId {
    /// Raw numeric value
    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for ResourceId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of an entry within its search's result sequence (zero-based)
pub type Order = u32;

/// Ordering key of a cached row
///
/// Derived `Ord` compares `search_id` first, so all rows of one search are
/// adjacent in an ordered map and ascend by `order`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowKey {
    /// Search the row belongs to
    pub search_id: SearchId,
    /// Position within the search
    pub order: Order,
}

impl RowKey {
    /// Create a row key
    pub fn new(search_id: SearchId, order: Order) -> Self {
        Self { search_id, order }
    }

    /// First possible key of a search
    pub fn search_start(search_id: SearchId) -> Self {
        Self::new(search_id, 0)
    }

    /// Last possible key of a search (inclusive bound)
    pub fn search_end(search_id: SearchId) -> Self {
        Self::new(search_id, Order::MAX)
    }
}

/// One cached match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResultEntry {
    /// Search this entry belongs to
    pub search_id: SearchId,
    /// Zero-based position within the search's result sequence
    pub order: Order,
    /// Matched record
    pub resource_id: ResourceId,
}

impl ResultEntry {
    /// Create a new entry
    pub fn new(search_id: SearchId, order: Order, resource_id: ResourceId) -> Self {
        Self {
            search_id,
            order,
            resource_id,
        }
    }

    /// Storage key of this entry
    pub fn key(&self) -> RowKey {
        RowKey::new(self.search_id, self.order)
    }
}
