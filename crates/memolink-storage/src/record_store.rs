//! Record store
//!
//! An insertion-ordered, most-recent-first sequence of [`MemoRecord`]s held
//! in memory and mirrored to a single durable key on every mutation.
//!
//! The durable write always happens before the in-memory sequence changes.
//! If it fails, the mutation is abandoned and memory keeps matching what is
//! on disk.

use std::sync::Arc;

use memolink_core::{MemoId, MemoRecord};
use parking_lot::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::blob_store::BlobStore;
use crate::error::StorageError;
use crate::kv::KeyValueStore;

/// Durable key holding the whole record sequence
pub const MEMOS_KEY: &str = "memos";

/// Ordered memo records backed by a [`KeyValueStore`]
pub struct RecordStore {
    kv: Arc<dyn KeyValueStore>,
    records: RwLock<Vec<MemoRecord>>,
}

impl RecordStore {
    /// Load the persisted sequence
    ///
    /// Records whose payload is missing from `blobs` are dropped from the
    /// loaded view (partial writes, pruned storage). A missing key yields an
    /// empty store.
    #[instrument(skip_all)]
    pub async fn load(kv: Arc<dyn KeyValueStore>, blobs: &BlobStore) -> Result<Self, StorageError> {
        let persisted: Vec<MemoRecord> = match kv.get(MEMOS_KEY)? {
            Some(bytes) => postcard::from_bytes(&bytes)?,
            None => Vec::new(),
        };

        let mut records = Vec::with_capacity(persisted.len());
        for record in persisted {
            if blobs.exists(record.payload_ref()).await? {
                records.push(record);
            } else {
                warn!(
                    memo = %record.id().short_id(),
                    payload = %record.payload_ref(),
                    "Dropping record with missing payload"
                );
            }
        }

        info!(count = records.len(), "Record store loaded");

        Ok(Self {
            kv,
            records: RwLock::new(records),
        })
    }

    /// Insert a record at the head of the sequence
    ///
    /// Returns `Ok(false)` without touching storage if a record with the same
    /// id already exists; replayed creates are not errors.
    #[instrument(skip_all, fields(memo = %record.id().short_id()))]
    pub fn create(&self, record: MemoRecord) -> Result<bool, StorageError> {
        let mut records = self.records.write();
        if records.iter().any(|r| r.id() == record.id()) {
            debug!("Record already present");
            return Ok(false);
        }

        let mut next = Vec::with_capacity(records.len() + 1);
        next.push(record);
        next.extend(records.iter().cloned());

        self.persist(&next)?;
        *records = next;

        debug!(count = records.len(), "Record created");
        Ok(true)
    }

    /// Remove a record, returning it if it was present
    #[instrument(skip(self), fields(memo = %id.short_id()))]
    pub fn delete(&self, id: &MemoId) -> Result<Option<MemoRecord>, StorageError> {
        let mut records = self.records.write();
        let Some(position) = records.iter().position(|r| &r.id() == id) else {
            return Ok(None);
        };

        let mut next = records.clone();
        let removed = next.remove(position);

        self.persist(&next)?;
        *records = next;

        debug!(count = records.len(), "Record deleted");
        Ok(Some(removed))
    }

    /// Snapshot of all records, most recent first
    pub fn list(&self) -> Vec<MemoRecord> {
        self.records.read().clone()
    }

    /// Find a record by id
    pub fn lookup(&self, id: &MemoId) -> Option<MemoRecord> {
        self.records.read().iter().find(|r| &r.id() == id).cloned()
    }

    pub fn contains(&self, id: &MemoId) -> bool {
        self.records.read().iter().any(|r| &r.id() == id)
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn persist(&self, records: &[MemoRecord]) -> Result<(), StorageError> {
        let bytes = postcard::to_allocvec(records)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.kv.put(MEMOS_KEY, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob_store::BlobStoreConfig;
    use crate::kv::{InMemoryKvStore, KvStoreConfig, RedbKvStore};
    use memolink_core::PayloadRef;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;

    /// Key-value store that can be switched into a failing mode
    struct FlakyKv {
        inner: InMemoryKvStore,
        failing: AtomicBool,
    }

    impl FlakyKv {
        fn new() -> Self {
            Self {
                inner: InMemoryKvStore::new(),
                failing: AtomicBool::new(false),
            }
        }
    }

    impl KeyValueStore for FlakyKv {
        fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(StorageError::Io("disk full".into()));
            }
            self.inner.put(key, value)
        }

        fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
            self.inner.get(key)
        }

        fn delete(&self, key: &str) -> Result<bool, StorageError> {
            self.inner.delete(key)
        }
    }

    fn memo(title: &str, duration: f64) -> MemoRecord {
        let id = MemoId::generate();
        MemoRecord::new(
            id,
            title,
            chrono::Utc::now(),
            duration,
            PayloadRef::for_memo(&id),
        )
        .unwrap()
    }

    async fn blob_store(temp: &TempDir) -> BlobStore {
        BlobStore::new(BlobStoreConfig::in_dir(temp.path()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_orders_most_recent_first() {
        let temp = TempDir::new().unwrap();
        let blobs = blob_store(&temp).await;
        let store = RecordStore::load(Arc::new(InMemoryKvStore::new()), &blobs)
            .await
            .unwrap();
        assert!(store.is_empty());

        let first = memo("Memo 1", 1.0);
        let second = memo("Memo 2", 2.0);
        assert!(store.create(first.clone()).unwrap());
        assert!(store.create(second.clone()).unwrap());

        let listed = store.list();
        assert_eq!(listed, vec![second, first]);
    }

    #[tokio::test]
    async fn test_duplicate_create_is_noop() {
        let temp = TempDir::new().unwrap();
        let blobs = blob_store(&temp).await;
        let store = RecordStore::load(Arc::new(InMemoryKvStore::new()), &blobs)
            .await
            .unwrap();

        let record = memo("Memo 1", 1.0);
        assert!(store.create(record.clone()).unwrap());
        assert!(!store.create(record.clone()).unwrap());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_absent_is_noop() {
        let temp = TempDir::new().unwrap();
        let blobs = blob_store(&temp).await;
        let store = RecordStore::load(Arc::new(InMemoryKvStore::new()), &blobs)
            .await
            .unwrap();

        let record = memo("Memo 1", 1.0);
        store.create(record.clone()).unwrap();

        assert!(store.delete(&MemoId::generate()).unwrap().is_none());
        assert_eq!(store.len(), 1);

        assert_eq!(store.delete(&record.id()).unwrap(), Some(record.clone()));
        assert!(store.lookup(&record.id()).is_none());
        assert!(store.delete(&record.id()).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lookup() {
        let temp = TempDir::new().unwrap();
        let blobs = blob_store(&temp).await;
        let store = RecordStore::load(Arc::new(InMemoryKvStore::new()), &blobs)
            .await
            .unwrap();

        let record = memo("Memo 1", 12.3);
        store.create(record.clone()).unwrap();
        assert_eq!(store.lookup(&record.id()), Some(record.clone()));
        assert!(store.contains(&record.id()));
        assert!(store.lookup(&MemoId::generate()).is_none());
    }

    #[tokio::test]
    async fn test_reload_keeps_records_with_payloads() {
        let temp = TempDir::new().unwrap();
        let blobs = blob_store(&temp).await;
        let kv: Arc<dyn KeyValueStore> =
            Arc::new(RedbKvStore::open(KvStoreConfig::in_dir(temp.path())).unwrap());

        let record = memo("Memo 1", 12.3);
        blobs.write(record.payload_ref(), b"audio").await.unwrap();
        {
            let store = RecordStore::load(kv.clone(), &blobs).await.unwrap();
            store.create(record.clone()).unwrap();
        }

        let reloaded = RecordStore::load(kv, &blobs).await.unwrap();
        assert_eq!(reloaded.list(), vec![record]);
    }

    #[tokio::test]
    async fn test_reload_drops_records_without_payloads() {
        let temp = TempDir::new().unwrap();
        let blobs = blob_store(&temp).await;
        let kv: Arc<dyn KeyValueStore> = Arc::new(InMemoryKvStore::new());

        let kept = memo("Memo 1", 1.0);
        let lost = memo("Memo 2", 2.0);
        blobs.write(kept.payload_ref(), b"audio").await.unwrap();
        blobs.write(lost.payload_ref(), b"audio").await.unwrap();
        {
            let store = RecordStore::load(kv.clone(), &blobs).await.unwrap();
            store.create(kept.clone()).unwrap();
            store.create(lost.clone()).unwrap();
        }

        blobs.delete(lost.payload_ref()).await.unwrap();

        let reloaded = RecordStore::load(kv, &blobs).await.unwrap();
        assert_eq!(reloaded.list(), vec![kept]);
    }

    #[tokio::test]
    async fn test_corrupt_sequence_is_an_error() {
        let temp = TempDir::new().unwrap();
        let blobs = blob_store(&temp).await;
        let kv = Arc::new(InMemoryKvStore::new());
        kv.put(MEMOS_KEY, &[0xff, 0xff, 0xff]).unwrap();

        let result = RecordStore::load(kv, &blobs).await;
        assert!(matches!(result, Err(StorageError::Deserialization(_))));
    }

    #[tokio::test]
    async fn test_failed_persist_leaves_memory_unchanged() {
        let temp = TempDir::new().unwrap();
        let blobs = blob_store(&temp).await;
        let kv = Arc::new(FlakyKv::new());
        let store = RecordStore::load(kv.clone(), &blobs).await.unwrap();

        let existing = memo("Memo 1", 1.0);
        store.create(existing.clone()).unwrap();

        kv.failing.store(true, Ordering::SeqCst);

        let result = store.create(memo("Memo 2", 2.0));
        assert!(matches!(result, Err(StorageError::Io(_))));
        assert_eq!(store.list(), vec![existing.clone()]);

        let result = store.delete(&existing.id());
        assert!(result.is_err());
        assert_eq!(store.list(), vec![existing]);
    }
}
