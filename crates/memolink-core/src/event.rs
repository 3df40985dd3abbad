//! Record store change events and device roles

use serde::{Deserialize, Serialize};

use crate::id::MemoId;
use crate::record::MemoRecord;

/// A change to the visible set of memos
///
/// Published by the sync coordinator after every committed mutation, local
/// or remote. UI layers subscribe to these instead of polling.
#[derive(Debug, Clone, PartialEq)]
pub enum MemoEvent {
    /// A memo became visible (local recording or completed inbound sync)
    Added {
        record: MemoRecord,
        origin: MutationOrigin,
    },

    /// A memo was removed
    Removed { id: MemoId, origin: MutationOrigin },

    /// Every stored memo was re-announced to the peer
    Resynced { count: usize },
}

impl MemoEvent {
    /// The memo this event refers to, if any
    pub fn memo_id(&self) -> Option<MemoId> {
        match self {
            Self::Added { record, .. } => Some(record.id()),
            Self::Removed { id, .. } => Some(*id),
            Self::Resynced { .. } => None,
        }
    }
}

/// Where a mutation came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationOrigin {
    /// Initiated on this device
    Local,
    /// Applied from a message sent by the paired device
    Remote,
}

/// Which side of the pairing a node runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceRole {
    #[default]
    Phone,
    Watch,
}

impl std::fmt::Display for DeviceRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceRole::Phone => write!(f, "phone"),
            DeviceRole::Watch => write!(f, "watch"),
        }
    }
}
