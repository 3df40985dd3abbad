//! Configuration for a memo node

use std::path::PathBuf;

use memolink_core::DeviceRole;
use memolink_storage::{BlobStoreConfig, KvStoreConfig};
use memolink_sync::{SyncConfig, SyncMode};

/// Where a node keeps its records and payloads
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub kv: KvStoreConfig,
    pub blobs: BlobStoreConfig,
    /// Remove payload files no record refers to when the node opens
    pub sweep_orphans: bool,
}

impl StorageConfig {
    /// Database and blob directory under `data_dir`
    pub fn in_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            kv: KvStoreConfig::in_dir(&data_dir),
            blobs: BlobStoreConfig::in_dir(&data_dir),
            sweep_orphans: true,
        }
    }
}

/// Configuration for a [`MemoNode`](crate::MemoNode)
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Base directory for all node data
    pub data_dir: PathBuf,
    pub role: DeviceRole,
    pub storage: StorageConfig,
    pub sync: SyncConfig,
    /// Capacity of the memo event channel
    pub event_channel_capacity: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::with_data_dir("./memolink-data")
    }
}

impl NodeConfig {
    /// A phone node storing everything under `data_dir`
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            storage: StorageConfig::in_dir(&data_dir),
            data_dir,
            role: DeviceRole::Phone,
            sync: SyncConfig::default(),
            event_channel_capacity: 256,
        }
    }

    pub fn with_role(mut self, role: DeviceRole) -> Self {
        self.role = role;
        self
    }

    pub fn with_storage(mut self, storage: StorageConfig) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_sync(mut self, sync: SyncConfig) -> Self {
        self.sync = sync;
        self
    }

    pub fn with_sync_mode(mut self, mode: SyncMode) -> Self {
        self.sync.mode = mode;
        self
    }

    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_follow_data_dir() {
        let config = NodeConfig::with_data_dir("/tmp/watch");
        assert_eq!(config.storage.kv.db_path, PathBuf::from("/tmp/watch/memolink.redb"));
        assert_eq!(config.storage.blobs.base_dir, PathBuf::from("/tmp/watch/blobs"));
        assert_eq!(config.role, DeviceRole::Phone);
        assert!(config.storage.sweep_orphans);
    }

    #[test]
    fn test_builders() {
        let config = NodeConfig::default()
            .with_role(DeviceRole::Watch)
            .with_sync_mode(SyncMode::Hardened)
            .with_event_channel_capacity(8);
        assert_eq!(config.role, DeviceRole::Watch);
        assert_eq!(config.sync.mode, SyncMode::Hardened);
        assert_eq!(config.event_channel_capacity, 8);
    }
}
