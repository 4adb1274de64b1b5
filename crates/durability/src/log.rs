//! BatchLog: append-only log of committed result batches
//!
//! The log is a sequence of self-describing records (see
//! [`encoding`](crate::encoding)). Replaying it from the beginning
//! rebuilds the result table.
//!
//! ## Recovery
//!
//! - A record cut short at the end of the file (crash during append) is a
//!   torn tail: it is dropped and the file is truncated back to the last
//!   complete record.
//! - A bad record followed by more data is corruption and fails the open.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use searchcache_core::{Error, Result};
use tracing::{debug, warn};

use crate::encoding::{decode_record, encode_record, BatchRecord};
use crate::mode::DurabilityMode;

/// Append-only, checksummed log of committed batches
#[derive(Debug)]
pub struct BatchLog {
    path: PathBuf,
    writer: BufWriter<File>,
    mode: DurabilityMode,
    /// Bytes of complete records in the file
    size: u64,
}

impl BatchLog {
    /// Open or create the log at `path` and return every complete record in it
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if `mode` does not keep a log
    /// - `Corruption` if a record before the end of the file is damaged
    /// - `IoError` on file system failures
    pub fn open(path: impl AsRef<Path>, mode: DurabilityMode) -> Result<(Self, Vec<BatchRecord>)> {
        if !mode.requires_log() {
            return Err(Error::invalid_input(format!(
                "durability mode '{}' does not keep a batch log",
                mode
            )));
        }
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        let (records, valid_len) = decode_all(&buf)?;

        if (valid_len as usize) < buf.len() {
            warn!(
                target: "searchcache::log",
                path = %path.display(),
                dropped_bytes = buf.len() - valid_len as usize,
                "Truncating torn tail of batch log"
            );
            file.set_len(valid_len)?;
            file.sync_all()?;
        }
        file.seek(SeekFrom::Start(valid_len))?;

        debug!(
            target: "searchcache::log",
            path = %path.display(),
            records = records.len(),
            "Opened batch log"
        );

        let log = Self {
            path,
            writer: BufWriter::new(file),
            mode,
            size: valid_len,
        };
        Ok((log, records))
    }

    /// Append one record
    ///
    /// The record reaches the OS before this returns; in `Always` mode it is
    /// also fsynced.
    pub fn append(&mut self, record: &BatchRecord) -> Result<()> {
        let bytes = encode_record(record)?;
        self.writer.write_all(&bytes)?;
        self.writer.flush()?;
        if self.mode.requires_immediate_fsync() {
            self.writer.get_ref().sync_data()?;
        }
        self.size += bytes.len() as u64;
        Ok(())
    }

    /// Flush and fsync everything appended so far
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Size of the log in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Durability mode the log was opened with
    pub fn mode(&self) -> DurabilityMode {
        self.mode
    }
}

impl Drop for BatchLog {
    fn drop(&mut self) {
        if let Err(e) = self.sync() {
            warn!(target: "searchcache::log", error = %e, "Failed to sync batch log on close");
        }
    }
}

/// Decode every complete record; returns the records and the byte length they cover
///
/// A record that runs past the end of `buf` or fails to decode is a torn
/// tail only if no valid record follows it. Otherwise the damage is in the
/// middle of the log (for example a corrupted length field) and open fails.
fn decode_all(buf: &[u8]) -> Result<(Vec<BatchRecord>, u64)> {
    let mut records = Vec::new();
    let mut offset = 0usize;
    while offset < buf.len() {
        let damage = match decode_record(&buf[offset..], offset as u64) {
            Ok(Some((record, consumed))) => {
                records.push(record);
                offset += consumed;
                continue;
            }
            Ok(None) => None,
            Err(e) => Some(e),
        };

        if let Some(next) = next_valid_record(buf, offset + 1) {
            return Err(damage.unwrap_or_else(|| {
                Error::corruption(format!(
                    "offset {}: Record length runs past end of log but a valid record follows at offset {}",
                    offset, next
                ))
            }));
        }
        break;
    }
    Ok((records, offset as u64))
}

/// Offset of the first decodable record at or after `start`
fn next_valid_record(buf: &[u8], start: usize) -> Option<usize> {
    (start..buf.len()).find(|&candidate| {
        matches!(
            decode_record(&buf[candidate..], candidate as u64),
            Ok(Some(_))
        )
    })
}
