//! # Memolink Node
//!
//! One device's memo collection: durable storage, the sync apply loop, and
//! the lifecycle tying them together.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use memolink_node::{MemoNode, NodeConfig};
//!
//! let node = MemoNode::new(NodeConfig::with_data_dir("./phone"), Arc::new(link)).await?;
//! node.start().await?;
//!
//! let memo = node.record_finished(audio, 12.3, None).await?;
//! assert_eq!(memo.title(), "Memo 1");
//!
//! let mut events = node.subscribe();
//! while let Ok(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! ```

pub mod config;
pub mod error;

pub use config::{NodeConfig, StorageConfig};
pub use error::{NodeError, NodeResult};

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use memolink_core::{DeviceRole, MemoEvent, MemoId, MemoRecord, PeerLink};
use memolink_storage::{BlobStore, KeyValueStore, RecordStore, RedbKvStore};
use memolink_sync::{CoordinatorHandle, SyncCoordinator, SyncEngine};
use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;
use tracing::{info, info_span, instrument};

/// A phone or watch holding memos and syncing them with its peer
///
/// Reads ([`list`](Self::list), [`get`](Self::get), payload access) work at
/// any time. Mutations go through the apply loop and need the node to be
/// [started](Self::start).
pub struct MemoNode {
    config: NodeConfig,
    records: Arc<RecordStore>,
    blobs: Arc<BlobStore>,
    link: Arc<dyn PeerLink>,
    events_tx: broadcast::Sender<MemoEvent>,
    shutdown_tx: broadcast::Sender<()>,
    coordinator: RwLock<Option<CoordinatorHandle>>,
    background_tasks: RwLock<Vec<JoinHandle<()>>>,
    started: AtomicBool,
}

impl MemoNode {
    /// Open the node's storage
    ///
    /// Records whose payload is missing are dropped from view, and payloads
    /// no record refers to are removed when `storage.sweep_orphans` is set.
    /// Call [`start`](Self::start) to begin syncing.
    #[instrument(skip_all, fields(role = %config.role, data_dir = %config.data_dir.display()))]
    pub async fn new(config: NodeConfig, link: Arc<dyn PeerLink>) -> NodeResult<Self> {
        if config.event_channel_capacity == 0 {
            return Err(NodeError::Config(
                "event channel capacity must be positive".into(),
            ));
        }

        tokio::fs::create_dir_all(&config.data_dir)
            .await
            .map_err(|e| NodeError::Io(e.to_string()))?;

        let blobs = Arc::new(BlobStore::new(config.storage.blobs.clone()).await?);
        let kv: Arc<dyn KeyValueStore> = Arc::new(RedbKvStore::open(config.storage.kv.clone())?);
        let records = Arc::new(RecordStore::load(kv, &blobs).await?);

        if config.storage.sweep_orphans {
            let referenced: Vec<_> = records
                .list()
                .iter()
                .map(|r| r.payload_ref().clone())
                .collect();
            blobs
                .sweep_orphans(|payload_ref| referenced.contains(payload_ref))
                .await?;
        }

        let (events_tx, _) = broadcast::channel(config.event_channel_capacity);
        let (shutdown_tx, _) = broadcast::channel(1);

        info!(memos = records.len(), "Node opened");

        Ok(Self {
            config,
            records,
            blobs,
            link,
            events_tx,
            shutdown_tx,
            coordinator: RwLock::new(None),
            background_tasks: RwLock::new(Vec::new()),
            started: AtomicBool::new(false),
        })
    }

    /// Start the apply loop
    #[instrument(skip(self), fields(role = %self.config.role))]
    pub async fn start(&self) -> NodeResult<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(NodeError::AlreadyStarted);
        }

        let engine = SyncEngine::new(
            self.records.clone(),
            self.blobs.clone(),
            self.link.clone(),
            self.config.sync.clone(),
            self.events_tx.clone(),
        );

        let (handle, task) = {
            let span = info_span!("memo_node", role = %self.config.role);
            let _entered = span.enter();
            SyncCoordinator::spawn(engine, self.shutdown_tx.subscribe())
        };

        *self.coordinator.write().await = Some(handle);
        self.background_tasks.write().await.push(task);

        info!(mode = ?self.config.sync.mode, "Node started");
        Ok(())
    }

    /// Stop the apply loop and wait for it to finish
    ///
    /// In-flight inbound assemblies and the deletion tombstones are dropped.
    #[instrument(skip(self), fields(role = %self.config.role))]
    pub async fn stop(&self) -> NodeResult<()> {
        if !self.started.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        let _ = self.shutdown_tx.send(());
        self.coordinator.write().await.take();

        let mut tasks = self.background_tasks.write().await;
        for task in tasks.drain(..) {
            let _ = task.await;
        }

        info!("Node stopped");
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Store a finished recording and send it to the peer
    ///
    /// Without a title the memo is named `"Memo N"`, N being one more than
    /// the number of stored memos.
    pub async fn record_finished(
        &self,
        audio: impl Into<Bytes>,
        duration_seconds: f64,
        title: Option<String>,
    ) -> NodeResult<MemoRecord> {
        let handle = self.handle().await?;
        Ok(handle.record(audio.into(), duration_seconds, title).await?)
    }

    /// Delete a memo here and on the peer
    ///
    /// Returns `false` if no such memo was stored.
    pub async fn delete(&self, id: MemoId) -> NodeResult<bool> {
        let handle = self.handle().await?;
        Ok(handle.delete(id).await?)
    }

    /// Send every stored memo to the peer again
    pub async fn resync_all(&self) -> NodeResult<usize> {
        let handle = self.handle().await?;
        Ok(handle.resync_all().await?)
    }

    /// Number of inbound memos with only metadata or only payload received
    pub async fn pending_assemblies(&self) -> NodeResult<usize> {
        let handle = self.handle().await?;
        Ok(handle.pending_assemblies().await?)
    }

    /// All memos, most recent first
    pub fn list(&self) -> Vec<MemoRecord> {
        self.records.list()
    }

    pub fn get(&self, id: &MemoId) -> Option<MemoRecord> {
        self.records.lookup(id)
    }

    /// The audio of a memo
    pub async fn read_payload(&self, id: &MemoId) -> NodeResult<Bytes> {
        let record = self.records.lookup(id).ok_or(NodeError::NotFound(*id))?;
        Ok(self.blobs.read(record.payload_ref()).await?)
    }

    /// File path of a memo's audio, for handing to a player
    pub fn payload_path(&self, id: &MemoId) -> NodeResult<PathBuf> {
        let record = self.records.lookup(id).ok_or(NodeError::NotFound(*id))?;
        Ok(self.blobs.path_for(record.payload_ref()))
    }

    /// Subscribe to memo changes
    pub fn subscribe(&self) -> broadcast::Receiver<MemoEvent> {
        self.events_tx.subscribe()
    }

    pub fn role(&self) -> DeviceRole {
        self.config.role
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    async fn handle(&self) -> NodeResult<CoordinatorHandle> {
        self.coordinator
            .read()
            .await
            .clone()
            .ok_or(NodeError::NotStarted)
    }
}
