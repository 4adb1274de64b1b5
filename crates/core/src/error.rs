//! Error types for the search result cache
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use crate::types::{Order, SearchId};
use std::fmt;
use std::io;
use thiserror::Error;

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, Error>;

/// Details of a range fetch that came back shorter than the search totals allow
///
/// Carried by [`Error::CacheInconsistency`] so callers can log or alert on
/// the individual numbers instead of parsing a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inconsistency {
    /// Search the range was requested for
    pub search_id: SearchId,
    /// First requested position (inclusive)
    pub from: usize,
    /// End of the requested range (exclusive)
    pub to: usize,
    /// Number of identifiers the store actually returned
    pub returned: usize,
    /// Total matches reported by the search
    pub num_found: u64,
    /// Matches withheld by policy
    pub num_blocked: u64,
}

impl Inconsistency {
    /// Number of entries the search claims the cache should hold
    pub fn expected_available(&self) -> u64 {
        self.num_found.saturating_sub(self.num_blocked)
    }

    /// Number of entries the caller asked for
    pub fn requested(&self) -> usize {
        self.to.saturating_sub(self.from)
    }
}

impl fmt::Display for Inconsistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "search {}: requested {} - {} and got {} with total found={} and blocked={}",
            self.search_id, self.from, self.to, self.returned, self.num_found, self.num_blocked
        )
    }
}

/// Error types for the search result cache
#[derive(Debug, Error)]
pub enum Error {
    /// The store holds fewer rows than the search totals say it must
    #[error("Failed to find results in cache: {0}")]
    CacheInconsistency(Inconsistency),

    /// A row with the same (search, order) key already exists
    #[error("Constraint violation: search {search_id} already has a result at order {order}")]
    ConstraintViolation {
        /// Search of the conflicting row
        search_id: SearchId,
        /// Order of the conflicting row
        order: Order,
    },

    /// I/O error (log file operations)
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Data corruption detected
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// Invalid input (configuration, arguments)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Storage layer error
    #[error("Storage error: {0}")]
    StorageError(String),
}

impl Error {
    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Error::StorageError(msg.into())
    }

    /// Create a corruption error
    pub fn corruption(msg: impl Into<String>) -> Self {
        Error::Corruption(msg.into())
    }

    /// Whether this error reports a cache/search inconsistency
    pub fn is_inconsistency(&self) -> bool {
        matches!(self, Error::CacheInconsistency(_))
    }

    /// The inconsistency payload, if this is a cache inconsistency
    pub fn inconsistency(&self) -> Option<&Inconsistency> {
        match self {
            Error::CacheInconsistency(details) => Some(details),
            _ => None,
        }
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::SerializationError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Inconsistency {
        Inconsistency {
            search_id: SearchId::from_bytes([7; 16]),
            from: 0,
            to: 8,
            returned: 5,
            num_found: 10,
            num_blocked: 2,
        }
    }

    #[test]
    fn test_inconsistency_numbers() {
        let details = sample();
        assert_eq!(details.expected_available(), 8);
        assert_eq!(details.requested(), 8);
    }

    #[test]
    fn test_expected_available_saturates() {
        let details = Inconsistency {
            num_found: 1,
            num_blocked: 3,
            ..sample()
        };
        assert_eq!(details.expected_available(), 0);
    }

    #[test]
    fn test_error_display_inconsistency() {
        let err = Error::CacheInconsistency(sample());
        let msg = err.to_string();
        assert!(msg.contains("Failed to find results in cache"));
        assert!(msg.contains("requested 0 - 8 and got 5"));
        assert!(msg.contains("total found=10"));
        assert!(msg.contains("blocked=2"));
        assert!(err.is_inconsistency());
        assert_eq!(err.inconsistency(), Some(&sample()));
    }

    #[test]
    fn test_error_display_constraint_violation() {
        let err = Error::ConstraintViolation {
            search_id: SearchId::from_bytes([1; 16]),
            order: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("Constraint violation"));
        assert!(msg.contains("order 3"));
        assert!(!err.is_inconsistency());
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::IoError(_)));
    }

    #[test]
    fn test_error_from_bincode() {
        let invalid_data = vec![0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
        let result: Result<String> = bincode::deserialize(&invalid_data).map_err(|e| e.into());
        assert!(matches!(result, Err(Error::SerializationError(_))));
    }

    #[test]
    fn test_error_constructors() {
        assert!(matches!(Error::invalid_input("x"), Error::InvalidInput(_)));
        assert!(matches!(Error::storage("x"), Error::StorageError(_)));
        assert!(matches!(Error::corruption("x"), Error::Corruption(_)));
    }
}
