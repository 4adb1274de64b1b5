//! Durability layer for SearchCache
//!
//! This crate makes the in-memory result table persistent:
//! - BatchRecord: one committed insert batch or search removal
//! - Encoding: `[len][type][bincode payload][crc32]` framing
//! - BatchLog: append-only log with torn-tail recovery
//! - DurabilityMode: Ephemeral, Always, Buffered

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod encoding;
pub mod log;
pub mod mode;

pub use encoding::{decode_record, encode_record, BatchRecord};
pub use log::BatchLog;
pub use mode::DurabilityMode;
