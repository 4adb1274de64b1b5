//! CacheStore: the result table made persistent by the batch log
//!
//! Commit protocol (serialized by the table's commit lock):
//! 1. Validate staged rows against the table
//! 2. Append an `Insert` record to the batch log (durable modes only)
//! 3. Apply the rows to the table
//!
//! A commit that fails in step 1 or 2 leaves both the log and the table
//! untouched. On open, the log is replayed into an empty table.

pub mod config;

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use searchcache_core::{Result, RowStore, SearchId};
use searchcache_durability::{BatchLog, BatchRecord, DurabilityMode};
use searchcache_storage::{ResultTable, TableTransaction};
use tracing::{debug, info};

pub use config::{CacheConfig, CONFIG_FILE_NAME, LOG_FILE_NAME};

/// Row store backing the search result cache
///
/// # Example
///
/// ```ignore
/// use searchcache_engine::CacheStore;
///
/// let store = CacheStore::open("/var/lib/searchcache")?;
/// let txn = store.begin();
/// ```
#[derive(Debug)]
pub struct CacheStore {
    table: ResultTable,
    log: Option<Mutex<BatchLog>>,
    mode: DurabilityMode,
    config: CacheConfig,
    data_dir: Option<PathBuf>,
}

impl CacheStore {
    /// In-memory store with no log
    pub fn ephemeral() -> Self {
        Self {
            table: ResultTable::new(),
            log: None,
            mode: DurabilityMode::Ephemeral,
            config: CacheConfig::ephemeral(),
            data_dir: None,
        }
    }

    /// Open a store in `dir`, creating the directory and a default
    /// `searchcache.toml` if needed
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let config_path = dir.join(CONFIG_FILE_NAME);
        CacheConfig::write_default_if_missing(&config_path)?;
        let config = CacheConfig::from_file(&config_path)?;
        Self::open_with_config(dir, config)
    }

    /// Open a store in `dir` with an explicit config
    ///
    /// The config file in `dir` is neither read nor written.
    pub fn open_with_config(dir: impl AsRef<Path>, config: CacheConfig) -> Result<Self> {
        let mode = config.durability_mode()?;
        let dir = dir.as_ref().to_path_buf();
        let table = ResultTable::new();

        let log = if mode.requires_log() {
            std::fs::create_dir_all(&dir)?;
            let (log, records) = BatchLog::open(dir.join(LOG_FILE_NAME), mode)?;
            let replayed = records.len();
            for record in records {
                match record {
                    BatchRecord::Insert { version, rows } => table.apply_batch(&rows, version),
                    BatchRecord::RemoveSearch { version, search_id } => {
                        table.apply_remove(&search_id, version);
                    }
                }
            }
            info!(
                target: "searchcache::store",
                dir = %dir.display(),
                durability = %mode,
                records = replayed,
                rows = table.len(),
                "Replayed batch log"
            );
            Some(Mutex::new(log))
        } else {
            info!(target: "searchcache::store", "Opened ephemeral result store");
            None
        };

        Ok(Self {
            table,
            log,
            mode,
            config,
            data_dir: Some(dir),
        })
    }

    /// The underlying table
    pub fn table(&self) -> &ResultTable {
        &self.table
    }

    /// Configuration the store was opened with
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Data directory, if the store was opened from one
    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    /// Effective durability mode
    pub fn durability(&self) -> DurabilityMode {
        self.mode
    }

    /// Remove every cached row of a search (whole-search teardown)
    ///
    /// Returns the number of rows removed.
    pub fn remove_search(&self, search_id: &SearchId) -> Result<usize> {
        let removed = self.table.remove_search_with(search_id, |version| {
            self.log_record(&BatchRecord::RemoveSearch {
                version,
                search_id: *search_id,
            })
        })?;
        debug!(target: "searchcache::store", search_id = %search_id, removed, "Removed search");
        Ok(removed)
    }

    /// Flush and fsync the batch log
    pub fn sync(&self) -> Result<()> {
        match &self.log {
            Some(log) => log.lock().sync(),
            None => Ok(()),
        }
    }

    fn log_record(&self, record: &BatchRecord) -> Result<()> {
        match &self.log {
            Some(log) => log.lock().append(record),
            None => Ok(()),
        }
    }
}

impl RowStore for CacheStore {
    type Txn = TableTransaction;

    fn begin(&self) -> TableTransaction {
        self.table.begin()
    }

    fn commit(&self, txn: TableTransaction) -> Result<u64> {
        let staged = txn.staged_len();
        let version = self.table.commit_with(txn, |version, rows| {
            self.log_record(&BatchRecord::Insert {
                version,
                rows: rows.to_vec(),
            })
        })?;
        if staged > 0 {
            debug!(target: "searchcache::store", version, rows = staged, "Committed batch");
        }
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use searchcache_core::{to_page, Error, ResourceId, ResultEntry, RowSink, RowSource};
    use tempfile::TempDir;

    fn insert(store: &CacheStore, search: SearchId, start: u32, ids: &[u64]) -> Result<u64> {
        let mut txn = store.begin();
        txn.insert_batch(
            ids.iter()
                .enumerate()
                .map(|(i, id)| ResultEntry::new(search, start + i as u32, ResourceId(*id)))
                .collect(),
        )?;
        store.commit(txn)
    }

    fn read_all(store: &CacheStore, search: SearchId) -> Vec<ResourceId> {
        store
            .begin()
            .find_range(&search, to_page(0, 1000).unwrap())
            .unwrap()
    }

    #[test]
    fn test_ephemeral_store() {
        let store = CacheStore::ephemeral();
        let search = SearchId::new();
        insert(&store, search, 0, &[1, 2, 3]).unwrap();
        assert_eq!(read_all(&store, search).len(), 3);
        assert_eq!(store.durability(), DurabilityMode::Ephemeral);
        assert!(store.data_dir().is_none());
    }

    #[test]
    fn test_open_writes_default_config() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::open(dir.path()).unwrap();
        assert!(dir.path().join(CONFIG_FILE_NAME).exists());
        assert_eq!(store.durability(), DurabilityMode::Always);
    }

    #[test]
    fn test_reopen_replays_rows_and_versions() {
        let dir = TempDir::new().unwrap();
        let a = SearchId::new();
        let b = SearchId::new();

        {
            let store = CacheStore::open(dir.path()).unwrap();
            insert(&store, a, 0, &[10, 11]).unwrap();
            insert(&store, b, 0, &[20]).unwrap();
            insert(&store, a, 2, &[12]).unwrap();
            assert_eq!(store.remove_search(&b).unwrap(), 1);
        }

        let store = CacheStore::open(dir.path()).unwrap();
        assert_eq!(
            read_all(&store, a),
            vec![ResourceId(10), ResourceId(11), ResourceId(12)]
        );
        assert!(read_all(&store, b).is_empty());
        assert_eq!(store.table().current_version(), 4);

        // Versions keep increasing after replay
        assert_eq!(insert(&store, a, 3, &[13]).unwrap(), 5);
    }

    #[test]
    fn test_rejected_commit_is_not_logged() {
        let dir = TempDir::new().unwrap();
        let search = SearchId::new();

        {
            let store = CacheStore::open(dir.path()).unwrap();
            insert(&store, search, 0, &[1, 2]).unwrap();

            // Two producers race for order 2; the loser must not reach the log
            let mut stale = store.table().begin();
            let mut fresh = store.table().begin();
            stale
                .insert_batch(vec![ResultEntry::new(search, 2, ResourceId(3))])
                .unwrap();
            fresh
                .insert_batch(vec![ResultEntry::new(search, 2, ResourceId(4))])
                .unwrap();
            store.commit(fresh).unwrap();
            let err = store.commit(stale).unwrap_err();
            assert!(matches!(err, Error::ConstraintViolation { order: 2, .. }));
        }

        let store = CacheStore::open(dir.path()).unwrap();
        assert_eq!(
            read_all(&store, search),
            vec![ResourceId(1), ResourceId(2), ResourceId(4)]
        );
    }

    #[test]
    fn test_explicit_ephemeral_config_creates_no_log() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::open_with_config(dir.path(), CacheConfig::ephemeral()).unwrap();
        insert(&store, SearchId::new(), 0, &[1]).unwrap();
        assert!(!dir.path().join(LOG_FILE_NAME).exists());
        assert_eq!(store.durability(), DurabilityMode::Ephemeral);
    }

    #[test]
    fn test_buffered_mode_survives_close() {
        let dir = TempDir::new().unwrap();
        let config = CacheConfig {
            durability: "buffered".to_string(),
            ..CacheConfig::default()
        };
        let search = SearchId::new();

        {
            let store = CacheStore::open_with_config(dir.path(), config.clone()).unwrap();
            insert(&store, search, 0, &[7, 8, 9]).unwrap();
            store.sync().unwrap();
        }

        let store = CacheStore::open_with_config(dir.path(), config).unwrap();
        assert_eq!(read_all(&store, search).len(), 3);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = TempDir::new().unwrap();
        let config = CacheConfig {
            durability: "never".to_string(),
            ..CacheConfig::default()
        };
        assert!(matches!(
            CacheStore::open_with_config(dir.path(), config),
            Err(Error::InvalidInput(_))
        ));
    }
}
