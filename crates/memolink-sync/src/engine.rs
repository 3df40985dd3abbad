//! Sync engine
//!
//! Applies local mutations and inbound frames to the record and blob stores
//! and announces local changes to the peer. The engine is owned by a single
//! apply loop (see [`crate::coordinator`]), so every method takes `&mut self`
//! and no two mutations ever interleave.
//!
//! ## Ordering
//!
//! - Creating: the payload is written before the record is inserted, so a
//!   visible record always has its payload.
//! - Deleting: the record is removed before the payload, so a visible record
//!   never points at a missing payload. A payload that cannot be removed is
//!   left as an orphan; the delete still counts and is still announced.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use memolink_core::{
    Delivery, MemoEvent, MemoId, MemoRecord, MutationOrigin, PayloadRef, PeerLink, Transfer,
    TransportError, default_title,
};
use memolink_storage::{BlobStore, RecordStore, StorageError};
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

use crate::assembly::{AssemblyState, AssemblyTable, Offer, ReceivedPayload};
use crate::codec::{Envelope, InboundFrame, MemoMeta, PayloadHeader};
use crate::config::{SyncConfig, SyncMode};
use crate::error::{SyncError, SyncResult};

/// What applying one inbound frame did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Held until the other half of the memo arrives
    Buffered,
    /// A new record became visible
    Applied,
    /// The memo is already stored; nothing changed
    Duplicate,
    /// A stored record and its payload were removed
    Removed,
    /// An in-flight assembly was discarded before it became visible
    Retired(AssemblyState),
    /// The memo was deleted earlier; the frame was dropped
    Tombstoned,
    /// A delete for a memo this device never saw
    Ignored,
}

/// Applies memo mutations and keeps the peer informed
pub struct SyncEngine {
    records: Arc<RecordStore>,
    blobs: Arc<BlobStore>,
    link: Arc<dyn PeerLink>,
    assemblies: AssemblyTable,
    config: SyncConfig,
    events: broadcast::Sender<MemoEvent>,
}

impl SyncEngine {
    pub fn new(
        records: Arc<RecordStore>,
        blobs: Arc<BlobStore>,
        link: Arc<dyn PeerLink>,
        config: SyncConfig,
        events: broadcast::Sender<MemoEvent>,
    ) -> Self {
        Self {
            records,
            blobs,
            link,
            assemblies: AssemblyTable::new(),
            config,
            events,
        }
    }

    /// Store a finished recording and announce it to the peer
    ///
    /// The returned record is visible in the store and its payload exists on
    /// disk. Transport failures are logged and do not fail the call.
    #[instrument(skip(self, audio, title), fields(bytes = audio.len()))]
    pub async fn create_local(
        &mut self,
        audio: Bytes,
        duration_seconds: f64,
        title: Option<String>,
    ) -> SyncResult<MemoRecord> {
        let id = MemoId::generate();
        let title = title.unwrap_or_else(|| default_title(self.records.len()));
        let record = MemoRecord::new(
            id,
            title,
            Utc::now(),
            duration_seconds,
            PayloadRef::for_memo(&id),
        )?;

        self.blobs.write(record.payload_ref(), &audio).await?;
        if let Err(e) = self.records.create(record.clone()) {
            if let Err(cleanup) = self.blobs.delete(record.payload_ref()).await {
                warn!(error = %cleanup, "Failed to remove payload of abandoned record");
            }
            return Err(e.into());
        }

        info!(memo = %id.short_id(), title = %record.title(), "Recorded memo");
        self.publish(MemoEvent::Added {
            record: record.clone(),
            origin: MutationOrigin::Local,
        });

        self.announce(&record, audio).await;
        Ok(record)
    }

    /// Delete a memo on this device and tell the peer
    ///
    /// Returns `false` if no such memo was stored.
    #[instrument(skip(self), fields(memo = %id.short_id()))]
    pub async fn delete_local(&mut self, id: MemoId) -> SyncResult<bool> {
        let removed = self.records.delete(&id)?;
        self.assemblies.tombstone(id);

        let Some(record) = removed else {
            debug!("Nothing to delete");
            return Ok(false);
        };
        self.discard_payload(&record).await;

        info!("Deleted memo");
        self.publish(MemoEvent::Removed {
            id,
            origin: MutationOrigin::Local,
        });

        self.send_envelope(&Envelope::Delete { id }).await;
        Ok(true)
    }

    /// Re-announce every stored memo to the peer
    ///
    /// Memos are sent oldest first so the peer ends up with the same order.
    /// Returns the number of memos announced.
    #[instrument(skip(self))]
    pub async fn resync_all(&mut self) -> SyncResult<usize> {
        let mut count = 0;
        for record in self.records.list().into_iter().rev() {
            let audio = match self.blobs.read(record.payload_ref()).await {
                Ok(audio) => audio,
                Err(StorageError::NotFound(_)) => {
                    warn!(memo = %record.id().short_id(), "Skipping memo with missing payload");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            self.announce(&record, audio).await;
            count += 1;
        }

        info!(count, "Resynced memos");
        self.publish(MemoEvent::Resynced { count });
        Ok(count)
    }

    /// Decode and apply something the link delivered, logging any failure
    pub async fn handle_delivery(&mut self, delivery: Delivery) {
        let frame = match InboundFrame::from_delivery(delivery) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Dropping malformed frame");
                return;
            }
        };

        let id = frame.id();
        match self.apply_frame(frame).await {
            Ok(outcome) => debug!(memo = %id.short_id(), ?outcome, "Applied inbound frame"),
            Err(SyncError::InvalidPayload(reason)) => {
                warn!(memo = %id.short_id(), %reason, "Dropping invalid payload");
            }
            Err(e) => error!(memo = %id.short_id(), error = %e, "Failed to apply inbound frame"),
        }
    }

    /// Apply one decoded inbound frame
    #[instrument(skip_all, fields(memo = %frame.id().short_id()))]
    pub async fn apply_frame(&mut self, frame: InboundFrame) -> SyncResult<ApplyOutcome> {
        match frame {
            InboundFrame::Envelope(Envelope::MemoMeta(meta)) => {
                if self.records.contains(&meta.id) {
                    return Ok(ApplyOutcome::Duplicate);
                }
                let offer = self.assemblies.offer_meta(meta);
                self.settle(offer).await
            }
            InboundFrame::Envelope(Envelope::Delete { id }) => self.apply_delete(id).await,
            InboundFrame::Payload { header, body } => {
                if !header.verify(&body) {
                    return Err(SyncError::InvalidPayload(format!(
                        "checksum mismatch for {} bytes",
                        body.len()
                    )));
                }
                if self.records.contains(&header.id) {
                    return Ok(ApplyOutcome::Duplicate);
                }
                let offer = self.assemblies.offer_payload(ReceivedPayload { header, body });
                self.settle(offer).await
            }
        }
    }

    /// State of the in-flight assembly for `id`, if any
    pub fn assembly_state(&self, id: &MemoId) -> Option<AssemblyState> {
        self.assemblies.state(id)
    }

    /// Number of memos with only one half received
    pub fn pending_assemblies(&self) -> usize {
        self.assemblies.len()
    }

    pub fn records(&self) -> &Arc<RecordStore> {
        &self.records
    }

    pub fn link(&self) -> Arc<dyn PeerLink> {
        Arc::clone(&self.link)
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    async fn settle(&mut self, offer: Offer) -> SyncResult<ApplyOutcome> {
        match offer {
            Offer::Pending => Ok(ApplyOutcome::Buffered),
            Offer::Tombstoned => Ok(ApplyOutcome::Tombstoned),
            Offer::Complete { meta, payload } => self.complete(meta, payload).await,
        }
    }

    async fn complete(
        &mut self,
        meta: MemoMeta,
        payload: ReceivedPayload,
    ) -> SyncResult<ApplyOutcome> {
        let mut payload_ref = meta.payload_ref();
        if self
            .records
            .list()
            .iter()
            .any(|r| r.payload_ref() == &payload_ref)
        {
            payload_ref = PayloadRef::for_memo(&meta.id);
        }

        let record = meta.into_record(payload_ref)?;

        self.blobs.write(record.payload_ref(), &payload.body).await?;
        if !self.records.create(record.clone())? {
            return Ok(ApplyOutcome::Duplicate);
        }

        info!(title = %record.title(), "Received memo");
        self.publish(MemoEvent::Added {
            record,
            origin: MutationOrigin::Remote,
        });
        Ok(ApplyOutcome::Applied)
    }

    async fn apply_delete(&mut self, id: MemoId) -> SyncResult<ApplyOutcome> {
        let removed = self.records.delete(&id)?;
        let retired = self.assemblies.tombstone(id);

        if let Some(record) = removed {
            self.discard_payload(&record).await;
            info!("Peer deleted memo");
            self.publish(MemoEvent::Removed {
                id,
                origin: MutationOrigin::Remote,
            });
            return Ok(ApplyOutcome::Removed);
        }

        Ok(match retired {
            Some(state) => {
                debug!(?state, "Retired incomplete memo");
                ApplyOutcome::Retired(state)
            }
            None => ApplyOutcome::Ignored,
        })
    }

    /// Remove the payload of a record that is already gone
    ///
    /// The delete has happened once the record is removed, so a failure here
    /// only leaves an orphan for the next sweep.
    async fn discard_payload(&self, record: &MemoRecord) {
        if let Err(e) = self.blobs.delete(record.payload_ref()).await {
            warn!(
                payload = %record.payload_ref(),
                error = %e,
                "Failed to remove payload of deleted memo"
            );
        }
    }

    async fn announce(&self, record: &MemoRecord, audio: Bytes) {
        self.send_envelope(&Envelope::MemoMeta(MemoMeta::from_record(record)))
            .await;

        let header = PayloadHeader::for_payload(record.id(), record.payload_ref(), &audio);
        let header = match header.encode() {
            Ok(header) => header,
            Err(e) => {
                warn!(error = %e, "Failed to encode payload header");
                return;
            }
        };
        if let Err(e) = self.link.queue_transfer(Transfer::new(header, audio)).await {
            warn!(memo = %record.id().short_id(), error = %e, "Failed to queue payload");
        }
    }

    async fn send_envelope(&self, envelope: &Envelope) {
        let data = match envelope.encode() {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, "Failed to encode envelope");
                return;
            }
        };

        let result = match self.config.mode {
            SyncMode::BestEffort => {
                if !self.link.is_reachable() {
                    debug!(memo = %envelope.id().short_id(), "Peer unreachable, skipping envelope");
                    return;
                }
                self.link.send_message(data).await
            }
            SyncMode::Hardened => self.link.queue_transfer(Transfer::header_only(data)).await,
        };

        match result {
            Ok(()) => {}
            Err(TransportError::PeerUnreachable) => {
                debug!(memo = %envelope.id().short_id(), "Peer went away, envelope lost");
            }
            Err(e) => warn!(memo = %envelope.id().short_id(), error = %e, "Failed to send envelope"),
        }
    }

    fn publish(&self, event: MemoEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use memolink_core::MockLink;
    use memolink_storage::{BlobStoreConfig, InMemoryKvStore, KeyValueStore};
    use tempfile::TempDir;
    use tokio::sync::broadcast::error::TryRecvError;

    /// Key-value store whose writes can be made to fail
    #[derive(Default)]
    struct FlakyKv {
        inner: InMemoryKvStore,
        failing: AtomicBool,
    }

    impl FlakyKv {
        fn fail_writes(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
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
            if self.failing.load(Ordering::SeqCst) {
                return Err(StorageError::Io("disk full".into()));
            }
            self.inner.delete(key)
        }
    }

    struct Harness {
        engine: SyncEngine,
        kv: Arc<FlakyKv>,
        local: Arc<MockLink>,
        peer: MockLink,
        events: broadcast::Receiver<MemoEvent>,
        _temp: TempDir,
    }

    async fn harness(mode: SyncMode) -> Harness {
        let temp = TempDir::new().unwrap();
        let blobs = Arc::new(BlobStore::new(BlobStoreConfig::in_dir(temp.path())).await.unwrap());
        let kv = Arc::new(FlakyKv::default());
        let records = Arc::new(RecordStore::load(kv.clone(), &blobs).await.unwrap());
        let (local, peer) = MockLink::pair();
        let local = Arc::new(local);
        let (events_tx, events) = broadcast::channel(32);
        let engine = SyncEngine::new(
            records,
            blobs,
            local.clone(),
            SyncConfig::default().with_mode(mode),
            events_tx,
        );
        Harness {
            engine,
            kv,
            local,
            peer,
            events,
            _temp: temp,
        }
    }

    fn remote_meta(id: MemoId) -> MemoMeta {
        MemoMeta {
            id,
            title: "From watch".to_string(),
            created_at: Utc::now(),
            duration_seconds: 4.5,
            payload_file_hint: PayloadRef::for_memo(&id).as_str().to_string(),
        }
    }

    fn remote_payload(id: MemoId, body: &'static [u8]) -> InboundFrame {
        InboundFrame::Payload {
            header: PayloadHeader::for_payload(id, &PayloadRef::for_memo(&id), body),
            body: Bytes::from_static(body),
        }
    }

    async fn next_delivery(link: &MockLink) -> Delivery {
        tokio::time::timeout(std::time::Duration::from_secs(1), link.recv())
            .await
            .expect("delivery")
            .unwrap()
    }

    /// Put a non-empty directory where the payload file was, so removing it fails
    async fn wedge_payload(h: &Harness, record: &MemoRecord) {
        let path = h.engine.blobs.path_for(record.payload_ref());
        tokio::fs::remove_file(&path).await.unwrap();
        tokio::fs::create_dir(&path).await.unwrap();
        tokio::fs::write(path.join("pinned"), b"x").await.unwrap();
    }

    #[tokio::test]
    async fn test_create_local_persists_and_announces() {
        let mut h = harness(SyncMode::BestEffort).await;

        let record = h
            .engine
            .create_local(Bytes::from_static(b"audio"), 12.3, None)
            .await
            .unwrap();
        assert_eq!(record.title(), "Memo 1");
        assert_eq!(h.engine.records().list(), vec![record.clone()]);
        assert!(h.engine.blobs.exists(record.payload_ref()).await.unwrap());

        assert!(matches!(
            h.events.recv().await.unwrap(),
            MemoEvent::Added { origin: MutationOrigin::Local, .. }
        ));

        let meta = next_delivery(&h.peer).await;
        assert!(matches!(meta, Delivery::Message(_)));
        let payload = next_delivery(&h.peer).await;
        match InboundFrame::from_delivery(payload).unwrap() {
            InboundFrame::Payload { header, body } => {
                assert_eq!(header.id, record.id());
                assert_eq!(&body[..], b"audio");
            }
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_default_titles_count_up() {
        let mut h = harness(SyncMode::BestEffort).await;
        h.engine.create_local(Bytes::from_static(b"a"), 1.0, None).await.unwrap();
        let custom = h
            .engine
            .create_local(Bytes::from_static(b"b"), 1.0, Some("Groceries".into()))
            .await
            .unwrap();
        let third = h.engine.create_local(Bytes::from_static(b"c"), 1.0, None).await.unwrap();

        assert_eq!(custom.title(), "Groceries");
        assert_eq!(third.title(), "Memo 3");
    }

    #[tokio::test]
    async fn test_create_local_survives_partition() {
        let mut h = harness(SyncMode::BestEffort).await;
        h.peer.partition();

        let record = h
            .engine
            .create_local(Bytes::from_static(b"audio"), 2.0, None)
            .await
            .unwrap();
        assert!(h.engine.records().contains(&record.id()));
        assert_eq!(h.local.pending_transfers(), 1);
        assert_eq!(h.local.dropped_messages(), 0);
    }

    #[tokio::test]
    async fn test_invalid_duration_creates_nothing() {
        let mut h = harness(SyncMode::BestEffort).await;
        let result = h
            .engine
            .create_local(Bytes::from_static(b"audio"), f64::NAN, None)
            .await;
        assert!(matches!(result, Err(SyncError::Model(_))));
        assert!(h.engine.records().is_empty());
        assert!(h.engine.blobs.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_meta_then_payload_applies() {
        let mut h = harness(SyncMode::BestEffort).await;
        let id = MemoId::generate();

        let outcome = h
            .engine
            .apply_frame(InboundFrame::Envelope(Envelope::MemoMeta(remote_meta(id))))
            .await
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::Buffered);
        assert_eq!(h.engine.assembly_state(&id), Some(AssemblyState::AwaitingPayload));
        assert!(h.engine.records().is_empty());

        let outcome = h.engine.apply_frame(remote_payload(id, b"audio")).await.unwrap();
        assert_eq!(outcome, ApplyOutcome::Applied);
        assert_eq!(h.engine.pending_assemblies(), 0);

        let record = h.engine.records().lookup(&id).unwrap();
        assert_eq!(record.title(), "From watch");
        assert_eq!(&h.engine.blobs.read(record.payload_ref()).await.unwrap()[..], b"audio");
        assert!(matches!(
            h.events.recv().await.unwrap(),
            MemoEvent::Added { origin: MutationOrigin::Remote, .. }
        ));
    }

    #[tokio::test]
    async fn test_payload_then_meta_applies() {
        let mut h = harness(SyncMode::BestEffort).await;
        let id = MemoId::generate();

        assert_eq!(
            h.engine.apply_frame(remote_payload(id, b"audio")).await.unwrap(),
            ApplyOutcome::Buffered
        );
        assert_eq!(h.engine.assembly_state(&id), Some(AssemblyState::AwaitingMeta));
        assert_eq!(
            h.engine
                .apply_frame(InboundFrame::Envelope(Envelope::MemoMeta(remote_meta(id))))
                .await
                .unwrap(),
            ApplyOutcome::Applied
        );
        assert!(h.engine.records().contains(&id));
    }

    #[tokio::test]
    async fn test_replayed_memo_is_duplicate() {
        let mut h = harness(SyncMode::BestEffort).await;
        let id = MemoId::generate();
        let meta = InboundFrame::Envelope(Envelope::MemoMeta(remote_meta(id)));

        h.engine.apply_frame(meta.clone()).await.unwrap();
        h.engine.apply_frame(remote_payload(id, b"audio")).await.unwrap();

        assert_eq!(h.engine.apply_frame(meta).await.unwrap(), ApplyOutcome::Duplicate);
        assert_eq!(
            h.engine.apply_frame(remote_payload(id, b"audio")).await.unwrap(),
            ApplyOutcome::Duplicate
        );
        assert_eq!(h.engine.records().len(), 1);
        assert_eq!(h.engine.pending_assemblies(), 0);
    }

    #[tokio::test]
    async fn test_delete_retires_incomplete_memo() {
        let mut h = harness(SyncMode::BestEffort).await;
        let id = MemoId::generate();

        h.engine
            .apply_frame(InboundFrame::Envelope(Envelope::MemoMeta(remote_meta(id))))
            .await
            .unwrap();
        let outcome = h
            .engine
            .apply_frame(InboundFrame::Envelope(Envelope::Delete { id }))
            .await
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::Retired(AssemblyState::AwaitingPayload));

        let outcome = h.engine.apply_frame(remote_payload(id, b"late")).await.unwrap();
        assert_eq!(outcome, ApplyOutcome::Tombstoned);
        assert!(h.engine.records().is_empty());
        assert_eq!(h.engine.pending_assemblies(), 0);
    }

    #[tokio::test]
    async fn test_delete_unknown_is_ignored() {
        let mut h = harness(SyncMode::BestEffort).await;
        h.engine.create_local(Bytes::from_static(b"a"), 1.0, None).await.unwrap();

        let outcome = h
            .engine
            .apply_frame(InboundFrame::Envelope(Envelope::Delete { id: MemoId::generate() }))
            .await
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::Ignored);
        assert_eq!(h.engine.records().len(), 1);
    }

    #[tokio::test]
    async fn test_remote_delete_removes_record_and_payload() {
        let mut h = harness(SyncMode::BestEffort).await;
        let record = h
            .engine
            .create_local(Bytes::from_static(b"audio"), 1.0, None)
            .await
            .unwrap();

        let outcome = h
            .engine
            .apply_frame(InboundFrame::Envelope(Envelope::Delete { id: record.id() }))
            .await
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::Removed);
        assert!(h.engine.records().is_empty());
        assert!(!h.engine.blobs.exists(record.payload_ref()).await.unwrap());
    }

    #[tokio::test]
    async fn test_corrupted_payload_is_rejected() {
        let mut h = harness(SyncMode::BestEffort).await;
        let id = MemoId::generate();
        let frame = InboundFrame::Payload {
            header: PayloadHeader::for_payload(id, &PayloadRef::for_memo(&id), b"original"),
            body: Bytes::from_static(b"corrupted"),
        };

        let result = h.engine.apply_frame(frame).await;
        assert!(matches!(result, Err(SyncError::InvalidPayload(_))));
        assert_eq!(h.engine.pending_assemblies(), 0);
    }

    #[tokio::test]
    async fn test_malformed_delivery_is_dropped() {
        let mut h = harness(SyncMode::BestEffort).await;
        h.engine
            .handle_delivery(Delivery::Message(vec![0xde, 0xad, 0xbe, 0xef]))
            .await;
        assert!(h.engine.records().is_empty());
        assert_eq!(h.engine.pending_assemblies(), 0);
    }

    #[tokio::test]
    async fn test_hardened_mode_queues_envelopes() {
        let mut h = harness(SyncMode::Hardened).await;
        h.peer.partition();

        let record = h
            .engine
            .create_local(Bytes::from_static(b"audio"), 1.0, None)
            .await
            .unwrap();
        h.engine.delete_local(record.id()).await.unwrap();

        // meta, payload, delete
        assert_eq!(h.local.pending_transfers(), 3);
        assert_eq!(h.local.dropped_messages(), 0);
    }

    #[tokio::test]
    async fn test_delete_local_tombstones() {
        let mut h = harness(SyncMode::BestEffort).await;
        let record = h
            .engine
            .create_local(Bytes::from_static(b"audio"), 1.0, None)
            .await
            .unwrap();

        assert!(h.engine.delete_local(record.id()).await.unwrap());
        assert!(!h.engine.delete_local(record.id()).await.unwrap());

        let outcome = h
            .engine
            .apply_frame(InboundFrame::Envelope(Envelope::MemoMeta(
                MemoMeta::from_record(&record),
            )))
            .await
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::Tombstoned);
    }

    #[tokio::test]
    async fn test_resync_all_counts_memos() {
        let mut h = harness(SyncMode::BestEffort).await;
        h.engine.create_local(Bytes::from_static(b"a"), 1.0, None).await.unwrap();
        h.engine.create_local(Bytes::from_static(b"b"), 1.0, None).await.unwrap();

        assert_eq!(h.engine.resync_all().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_create_local_rolls_back_when_record_write_fails() {
        let mut h = harness(SyncMode::BestEffort).await;
        h.kv.fail_writes(true);

        let result = h
            .engine
            .create_local(Bytes::from_static(b"audio"), 1.0, None)
            .await;
        assert!(matches!(result, Err(SyncError::Storage(StorageError::Io(_)))));
        assert!(h.engine.records().is_empty());
        assert!(h.engine.blobs.list_all().await.unwrap().is_empty());
        assert!(matches!(h.events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_delete_local_keeps_memo_when_record_write_fails() {
        let mut h = harness(SyncMode::BestEffort).await;
        let record = h
            .engine
            .create_local(Bytes::from_static(b"audio"), 1.0, None)
            .await
            .unwrap();

        h.kv.fail_writes(true);
        let result = h.engine.delete_local(record.id()).await;
        assert!(matches!(result, Err(SyncError::Storage(_))));
        assert_eq!(h.engine.records().list(), vec![record.clone()]);
        assert!(h.engine.blobs.exists(record.payload_ref()).await.unwrap());

        // Not tombstoned: the memo can still be replayed to this device
        h.kv.fail_writes(false);
        assert!(h.engine.delete_local(record.id()).await.unwrap());
    }

    #[tokio::test]
    async fn test_remote_delete_keeps_memo_when_record_write_fails() {
        let mut h = harness(SyncMode::BestEffort).await;
        let record = h
            .engine
            .create_local(Bytes::from_static(b"audio"), 1.0, None)
            .await
            .unwrap();

        h.kv.fail_writes(true);
        let result = h
            .engine
            .apply_frame(InboundFrame::Envelope(Envelope::Delete { id: record.id() }))
            .await;
        assert!(matches!(result, Err(SyncError::Storage(_))));
        assert_eq!(h.engine.records().list(), vec![record.clone()]);
        assert!(h.engine.blobs.exists(record.payload_ref()).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_local_announces_when_payload_is_stuck() {
        let mut h = harness(SyncMode::BestEffort).await;
        let record = h
            .engine
            .create_local(Bytes::from_static(b"audio"), 1.0, None)
            .await
            .unwrap();
        next_delivery(&h.peer).await;
        next_delivery(&h.peer).await;
        h.events.recv().await.unwrap();

        wedge_payload(&h, &record).await;
        assert!(h.engine.delete_local(record.id()).await.unwrap());
        assert!(h.engine.records().is_empty());

        assert!(matches!(
            h.events.recv().await.unwrap(),
            MemoEvent::Removed { origin: MutationOrigin::Local, .. }
        ));
        match InboundFrame::from_delivery(next_delivery(&h.peer).await).unwrap() {
            InboundFrame::Envelope(Envelope::Delete { id }) => assert_eq!(id, record.id()),
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_remote_delete_applies_when_payload_is_stuck() {
        let mut h = harness(SyncMode::BestEffort).await;
        let record = h
            .engine
            .create_local(Bytes::from_static(b"audio"), 1.0, None)
            .await
            .unwrap();
        h.events.recv().await.unwrap();

        wedge_payload(&h, &record).await;
        let outcome = h
            .engine
            .apply_frame(InboundFrame::Envelope(Envelope::Delete { id: record.id() }))
            .await
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::Removed);
        assert!(h.engine.records().is_empty());
        assert!(matches!(
            h.events.recv().await.unwrap(),
            MemoEvent::Removed { origin: MutationOrigin::Remote, .. }
        ));

        // A late half for the deleted memo stays out
        let outcome = h
            .engine
            .apply_frame(InboundFrame::Envelope(Envelope::MemoMeta(
                MemoMeta::from_record(&record),
            )))
            .await
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::Tombstoned);
    }
}
