//! Pairing of inbound metadata with inbound payloads
//!
//! Metadata and payload of one memo travel on independent channels and can
//! arrive in either order. The [`AssemblyTable`] holds whichever half came
//! first, keyed by memo id, until the other half shows up.
//!
//! Ids deleted while this process runs are remembered as tombstones. Halves
//! arriving for a tombstoned id are refused, so a deleted memo never comes
//! back through a late transfer.

use std::collections::{HashMap, HashSet};

use bytes::Bytes;
use memolink_core::MemoId;

use crate::codec::{MemoMeta, PayloadHeader};

/// Which half an in-flight assembly is still waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyState {
    /// Metadata arrived, payload outstanding
    AwaitingPayload,
    /// Payload arrived, metadata outstanding
    AwaitingMeta,
}

/// A verified payload body with the header it came with
#[derive(Debug, Clone)]
pub struct ReceivedPayload {
    pub header: PayloadHeader,
    pub body: Bytes,
}

#[derive(Debug)]
enum PendingAssembly {
    Meta(MemoMeta),
    Payload(ReceivedPayload),
}

impl PendingAssembly {
    fn state(&self) -> AssemblyState {
        match self {
            PendingAssembly::Meta(_) => AssemblyState::AwaitingPayload,
            PendingAssembly::Payload(_) => AssemblyState::AwaitingMeta,
        }
    }
}

/// Result of offering one half to the table
#[derive(Debug)]
pub enum Offer {
    /// Held until the other half arrives
    Pending,
    /// Both halves present; the assembly has been removed from the table
    Complete {
        meta: MemoMeta,
        payload: ReceivedPayload,
    },
    /// The id was deleted earlier; the half was discarded
    Tombstoned,
}

/// In-flight inbound assemblies and deletion tombstones
///
/// Tombstones are kept in memory only and never expire: the set grows by one
/// id per delete for the life of the process and starts empty on restart.
#[derive(Debug, Default)]
pub struct AssemblyTable {
    pending: HashMap<MemoId, PendingAssembly>,
    tombstones: HashSet<MemoId>,
}

impl AssemblyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer the metadata half of a memo
    ///
    /// A repeated metadata half replaces the held one.
    pub fn offer_meta(&mut self, meta: MemoMeta) -> Offer {
        let id = meta.id;
        if self.tombstones.contains(&id) {
            return Offer::Tombstoned;
        }

        match self.pending.remove(&id) {
            Some(PendingAssembly::Payload(payload)) => Offer::Complete { meta, payload },
            Some(PendingAssembly::Meta(_)) | None => {
                self.pending.insert(id, PendingAssembly::Meta(meta));
                Offer::Pending
            }
        }
    }

    /// Offer the payload half of a memo
    ///
    /// A repeated payload half replaces the held one.
    pub fn offer_payload(&mut self, payload: ReceivedPayload) -> Offer {
        let id = payload.header.id;
        if self.tombstones.contains(&id) {
            return Offer::Tombstoned;
        }

        match self.pending.remove(&id) {
            Some(PendingAssembly::Meta(meta)) => Offer::Complete { meta, payload },
            Some(PendingAssembly::Payload(_)) | None => {
                self.pending.insert(id, PendingAssembly::Payload(payload));
                Offer::Pending
            }
        }
    }

    /// Drop an in-flight assembly, returning the state it was in
    fn retire(&mut self, id: &MemoId) -> Option<AssemblyState> {
        self.pending.remove(id).map(|p| p.state())
    }

    /// Retire any assembly for `id` and refuse its halves from now on
    pub fn tombstone(&mut self, id: MemoId) -> Option<AssemblyState> {
        self.tombstones.insert(id);
        self.retire(&id)
    }

    pub fn state(&self, id: &MemoId) -> Option<AssemblyState> {
        self.pending.get(id).map(|p| p.state())
    }

    /// Number of in-flight assemblies
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
