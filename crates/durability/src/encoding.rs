//! Batch log record encoding and decoding
//!
//! ## Record Format
//!
//! ```text
//! [length: u32][type: u8][payload: bytes][crc32: u32]
//! ```
//!
//! - **length**: Size of type + payload + crc (NOT including length itself)
//! - **type**: Record type tag (1=Insert, 2=RemoveSearch)
//! - **payload**: bincode-serialized BatchRecord
//! - **crc32**: CRC32 over \[type\]\[payload\]
//!
//! All integers are little-endian.

use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher;
use searchcache_core::{Error, Result, ResultEntry, SearchId};
use serde::{Deserialize, Serialize};

const TYPE_INSERT: u8 = 1;
const TYPE_REMOVE_SEARCH: u8 = 2;

/// Minimum value of the length field: type(1) + crc(4)
const MIN_RECORD_LEN: usize = 5;

/// One committed change to the result table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchRecord {
    /// Rows inserted by one committed transaction
    Insert {
        /// Commit version
        version: u64,
        /// Inserted rows
        rows: Vec<ResultEntry>,
    },

    /// Every row of a search removed
    RemoveSearch {
        /// Commit version
        version: u64,
        /// Search whose rows were removed
        search_id: SearchId,
    },
}

impl BatchRecord {
    /// Commit version of this record
    pub fn version(&self) -> u64 {
        match self {
            BatchRecord::Insert { version, .. } => *version,
            BatchRecord::RemoveSearch { version, .. } => *version,
        }
    }

    fn type_tag(&self) -> u8 {
        match self {
            BatchRecord::Insert { .. } => TYPE_INSERT,
            BatchRecord::RemoveSearch { .. } => TYPE_REMOVE_SEARCH,
        }
    }
}

/// Encode a record to bytes ready for appending to the log
pub fn encode_record(record: &BatchRecord) -> Result<Vec<u8>> {
    let type_tag = record.type_tag();
    let payload = bincode::serialize(record)?;
    let total_len = 1 + payload.len() + 4;
    let total_len_u32 = u32::try_from(total_len)
        .map_err(|_| Error::storage(format!("Record of {} bytes is too large", total_len)))?;

    let mut hasher = Hasher::new();
    hasher.update(&[type_tag]);
    hasher.update(&payload);
    let crc = hasher.finalize();

    let mut buf = Vec::with_capacity(4 + total_len);
    buf.write_u32::<LittleEndian>(total_len_u32)?;
    buf.write_u8(type_tag)?;
    buf.extend_from_slice(&payload);
    buf.write_u32::<LittleEndian>(crc)?;
    Ok(buf)
}

/// Decode one record from the start of `buf`
///
/// Returns `Ok(None)` when `buf` ends before the record does (a torn tail),
/// otherwise the record and the number of bytes it occupied.
///
/// # Errors
///
/// Returns `Error::Corruption` with the file offset when the length field is
/// impossible, the CRC does not match, the payload does not deserialize, or
/// the type tag disagrees with the payload.
pub fn decode_record(buf: &[u8], offset: u64) -> Result<Option<(BatchRecord, usize)>> {
    let mut cursor = Cursor::new(buf);

    let total_len = match cursor.read_u32::<LittleEndian>() {
        Ok(len) => len as usize,
        Err(_) => return Ok(None),
    };
    if total_len < MIN_RECORD_LEN {
        return Err(Error::corruption(format!(
            "offset {}: Invalid record length {} (minimum is {})",
            offset, total_len, MIN_RECORD_LEN
        )));
    }
    if buf.len() < 4 + total_len {
        return Ok(None);
    }

    let type_tag = cursor.read_u8()?;
    let mut payload = vec![0u8; total_len - 1 - 4];
    cursor.read_exact(&mut payload)?;
    let expected_crc = cursor.read_u32::<LittleEndian>()?;

    let mut hasher = Hasher::new();
    hasher.update(&[type_tag]);
    hasher.update(&payload);
    let actual_crc = hasher.finalize();
    if actual_crc != expected_crc {
        return Err(Error::corruption(format!(
            "offset {}: CRC mismatch: expected {:08x}, got {:08x}",
            offset, expected_crc, actual_crc
        )));
    }

    let record: BatchRecord = bincode::deserialize(&payload).map_err(|e| {
        Error::corruption(format!("offset {}: Deserialization failed: {}", offset, e))
    })?;
    if record.type_tag() != type_tag {
        return Err(Error::corruption(format!(
            "offset {}: Type tag {} does not match record type {}",
            offset,
            type_tag,
            record.type_tag()
        )));
    }

    Ok(Some((record, 4 + total_len)))
}
