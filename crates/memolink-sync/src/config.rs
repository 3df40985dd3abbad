//! Sync configuration

use serde::{Deserialize, Serialize};

/// How metadata envelopes travel to the peer
///
/// Payloads always use the queued transfer channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncMode {
    /// Envelopes are sent as immediate messages and lost if the peer is away
    #[default]
    BestEffort,
    /// Envelopes are queued as header-only transfers and delivered eventually
    Hardened,
}

/// Configuration for the sync coordinator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub mode: SyncMode,
    /// Bound on queued local commands awaiting the apply loop
    pub command_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            mode: SyncMode::BestEffort,
            command_capacity: 64,
        }
    }
}

impl SyncConfig {
    pub fn hardened() -> Self {
        Self {
            mode: SyncMode::Hardened,
            ..Default::default()
        }
    }

    pub fn with_mode(mut self, mode: SyncMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_command_capacity(mut self, capacity: usize) -> Self {
        self.command_capacity = capacity.max(1);
        self
    }
}
