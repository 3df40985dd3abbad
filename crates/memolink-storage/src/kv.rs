//! Durable key-value storage
//!
//! The record store keeps its whole sequence under a single key, so all it
//! needs from durable storage is an atomic put/get/delete per key. Each
//! [`KeyValueStore::put`] is one committed transaction: after a crash the key
//! holds either the old or the new value, never a mix.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use redb::{Database, TableDefinition};
use tracing::{debug, info, instrument};

use crate::error::StorageError;

// Key: record-set name, Value: postcard-serialized record sequence
pub const RECORDS: TableDefinition<&str, &[u8]> = TableDefinition::new("records");

/// Atomic per-key durable storage
pub trait KeyValueStore: Send + Sync {
    /// Store a value, replacing any previous one
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Load a value
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Remove a value; returns whether it existed
    fn delete(&self, key: &str) -> Result<bool, StorageError>;
}

/// Configuration for the redb-backed store
#[derive(Debug, Clone)]
pub struct KvStoreConfig {
    /// Path to the database file
    pub db_path: PathBuf,
}

impl Default for KvStoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/memolink.redb"),
        }
    }
}

impl KvStoreConfig {
    /// Place the database file inside a data directory
    pub fn in_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            db_path: data_dir.into().join("memolink.redb"),
        }
    }
}

/// redb-backed [`KeyValueStore`]
pub struct RedbKvStore {
    db: Arc<Database>,
    config: KvStoreConfig,
}

impl RedbKvStore {
    /// Open or create the database
    #[instrument(skip(config), fields(path = %config.db_path.display()))]
    pub fn open(config: KvStoreConfig) -> Result<Self, StorageError> {
        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(&config.db_path).map_err(StorageError::database)?;
        info!("Opened redb database");

        let store = Self {
            db: Arc::new(db),
            config,
        };
        store.init_tables()?;
        Ok(store)
    }

    fn init_tables(&self) -> Result<(), StorageError> {
        let write_txn = self.db.begin_write().map_err(StorageError::database)?;
        write_txn
            .open_table(RECORDS)
            .map_err(StorageError::database)?;
        write_txn.commit().map_err(StorageError::database)?;

        debug!("Initialized redb tables");
        Ok(())
    }

    /// Get the configuration
    pub fn config(&self) -> &KvStoreConfig {
        &self.config
    }
}

impl KeyValueStore for RedbKvStore {
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let write_txn = self.db.begin_write().map_err(StorageError::database)?;
        {
            let mut table = write_txn
                .open_table(RECORDS)
                .map_err(StorageError::database)?;
            table.insert(key, value).map_err(StorageError::database)?;
        }
        write_txn.commit().map_err(StorageError::database)?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let read_txn = self.db.begin_read().map_err(StorageError::database)?;
        let table = read_txn
            .open_table(RECORDS)
            .map_err(StorageError::database)?;

        let value = table
            .get(key)
            .map_err(StorageError::database)?
            .map(|v| v.value().to_vec());
        Ok(value)
    }

    fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let write_txn = self.db.begin_write().map_err(StorageError::database)?;
        let removed = {
            let mut table = write_txn
                .open_table(RECORDS)
                .map_err(StorageError::database)?;
            table
                .remove(key)
                .map_err(StorageError::database)?
                .is_some()
        };
        write_txn.commit().map_err(StorageError::database)?;
        Ok(removed)
    }
}

/// In-memory [`KeyValueStore`] for testing and simulation
#[derive(Default)]
pub struct InMemoryKvStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for InMemoryKvStore {
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.entries.lock().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn delete(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.entries.lock().remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (RedbKvStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = RedbKvStore::open(KvStoreConfig::in_dir(temp_dir.path())).unwrap();
        (store, temp_dir)
    }

    #[test]
    fn test_put_get() {
        let (store, _temp) = create_test_store();

        store.put("memos", b"value").unwrap();
        assert_eq!(store.get("memos").unwrap(), Some(b"value".to_vec()));

        store.put("memos", b"replaced").unwrap();
        assert_eq!(store.get("memos").unwrap(), Some(b"replaced".to_vec()));
    }

    #[test]
    fn test_missing_key() {
        let (store, _temp) = create_test_store();
        assert!(store.get("nothing").unwrap().is_none());
        assert!(!store.delete("nothing").unwrap());
    }

    #[test]
    fn test_delete() {
        let (store, _temp) = create_test_store();

        store.put("memos", b"value").unwrap();
        assert!(store.delete("memos").unwrap());
        assert!(store.get("memos").unwrap().is_none());
    }

    #[test]
    fn test_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = RedbKvStore::open(KvStoreConfig::in_dir(temp_dir.path())).unwrap();
            store.put("memos", b"persisted").unwrap();
        }
        let store = RedbKvStore::open(KvStoreConfig::in_dir(temp_dir.path())).unwrap();
        assert_eq!(store.get("memos").unwrap(), Some(b"persisted".to_vec()));
    }

    #[test]
    fn test_in_memory_store() {
        let store = InMemoryKvStore::new();
        assert!(store.get("k").unwrap().is_none());
        store.put("k", b"v").unwrap();
        assert_eq!(store.get("k").unwrap(), Some(b"v".to_vec()));
        assert!(store.delete("k").unwrap());
        assert!(!store.delete("k").unwrap());
    }
}
