//! Blob store for memo audio payloads
//!
//! One file per payload, named by its [`PayloadRef`], inside a single
//! directory. Writes go to a temp file that is synced and then renamed over
//! the target, so a reader never observes a half-written payload.

use std::io::ErrorKind;
use std::path::PathBuf;

use bytes::Bytes;
use memolink_core::PayloadRef;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

use crate::error::StorageError;

/// Suffix of in-progress writes
const TEMP_SUFFIX: &str = "tmp";

/// Configuration for the blob store
#[derive(Debug, Clone)]
pub struct BlobStoreConfig {
    /// Directory holding one file per payload
    pub base_dir: PathBuf,
    /// Maximum payload size (bytes)
    pub max_blob_size: u64,
}

impl Default for BlobStoreConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("./data/blobs"),
            max_blob_size: 64 * 1024 * 1024, // 64MB
        }
    }
}

impl BlobStoreConfig {
    /// Use `<data_dir>/blobs`
    pub fn in_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: data_dir.into().join("blobs"),
            ..Default::default()
        }
    }

    /// Set the maximum payload size
    pub fn with_max_blob_size(mut self, max: u64) -> Self {
        self.max_blob_size = max;
        self
    }
}

/// File-per-payload blob store
pub struct BlobStore {
    config: BlobStoreConfig,
}

impl BlobStore {
    /// Create a blob store, creating its directory if needed
    pub async fn new(config: BlobStoreConfig) -> Result<Self, StorageError> {
        fs::create_dir_all(&config.base_dir).await?;

        info!(path = %config.base_dir.display(), "Blob store initialized");

        Ok(Self { config })
    }

    /// Durably store a payload, overwriting any previous content
    #[instrument(skip(self, data), fields(payload = %payload_ref, size = data.len()))]
    pub async fn write(&self, payload_ref: &PayloadRef, data: &[u8]) -> Result<(), StorageError> {
        let size = data.len() as u64;
        if size > self.config.max_blob_size {
            return Err(StorageError::CapacityExceeded {
                size,
                max: self.config.max_blob_size,
            });
        }

        let path = self.path_for(payload_ref);
        let temp_path = self.temp_path_for(payload_ref);

        let mut file = File::create(&temp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        debug!("Stored blob");
        Ok(())
    }

    /// Load a payload
    #[instrument(skip(self), fields(payload = %payload_ref))]
    pub async fn read(&self, payload_ref: &PayloadRef) -> Result<Bytes, StorageError> {
        let path = self.path_for(payload_ref);
        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::not_found(payload_ref.as_str()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Check if a payload exists
    pub async fn exists(&self, payload_ref: &PayloadRef) -> Result<bool, StorageError> {
        let path = self.path_for(payload_ref);
        Ok(fs::try_exists(&path).await?)
    }

    /// Delete a payload; returns `false` if it was already absent
    #[instrument(skip(self), fields(payload = %payload_ref))]
    pub async fn delete(&self, payload_ref: &PayloadRef) -> Result<bool, StorageError> {
        let path = self.path_for(payload_ref);

        match fs::remove_file(&path).await {
            Ok(_) => {
                debug!("Deleted blob");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// File path of a payload, for handing to a playback collaborator
    pub fn path_for(&self, payload_ref: &PayloadRef) -> PathBuf {
        self.config.base_dir.join(payload_ref.as_str())
    }

    fn temp_path_for(&self, payload_ref: &PayloadRef) -> PathBuf {
        self.config
            .base_dir
            .join(format!("{}.{}", payload_ref.as_str(), TEMP_SUFFIX))
    }

    /// List every stored payload with its size
    pub async fn list_all(&self) -> Result<Vec<(PayloadRef, u64)>, StorageError> {
        let mut refs = Vec::new();
        let mut entries = fs::read_dir(&self.config.base_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            // Temp files are rejected here, leaving only finished payloads
            if let Ok(payload_ref) = PayloadRef::new(name) {
                refs.push((payload_ref, metadata.len()));
            }
        }

        Ok(refs)
    }

    /// Delete payloads no record refers to, plus leftover temp files
    ///
    /// A crash between a blob write and the record insert leaves an orphaned
    /// blob behind; this reclaims that space. Visibility never depends on it.
    pub async fn sweep_orphans<F>(&self, is_referenced: F) -> Result<SweepResult, StorageError>
    where
        F: Fn(&PayloadRef) -> bool,
    {
        let mut result = SweepResult::default();

        for (payload_ref, size) in self.list_all().await? {
            if is_referenced(&payload_ref) {
                result.retained_count += 1;
            } else if self.delete(&payload_ref).await? {
                result.deleted_count += 1;
                result.bytes_freed += size;
            }
        }

        let suffix = format!(".{}", TEMP_SUFFIX);
        let mut entries = fs::read_dir(&self.config.base_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let is_temp = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.ends_with(&suffix));
            if is_temp {
                let size = entry.metadata().await.map(|m| m.len()).unwrap_or(0);
                match fs::remove_file(entry.path()).await {
                    Ok(_) => {
                        result.deleted_count += 1;
                        result.bytes_freed += size;
                    }
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }

        info!(
            deleted = result.deleted_count,
            retained = result.retained_count,
            bytes_freed = result.bytes_freed,
            "Orphan sweep complete"
        );

        Ok(result)
    }

    /// Get the configuration
    pub fn config(&self) -> &BlobStoreConfig {
        &self.config
    }
}

/// Result of an orphan sweep
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepResult {
    /// Number of files deleted
    pub deleted_count: usize,
    /// Number of payloads retained
    pub retained_count: usize,
    /// Bytes freed
    pub bytes_freed: u64,
}
