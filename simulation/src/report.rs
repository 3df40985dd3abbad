//! Scenario results

use std::fmt::{self, Display, Formatter};

use memolink_core::{DeviceRole, MemoRecord};
use memolink_sync::SyncMode;
use serde::Serialize;

/// One row of a device's memo list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoSummary {
    pub id: String,
    pub short_id: String,
    pub title: String,
    pub duration: String,
    pub date: String,
}

impl From<&MemoRecord> for MemoSummary {
    fn from(record: &MemoRecord) -> Self {
        Self {
            id: record.id().to_string(),
            short_id: record.id().short_id(),
            title: record.title().to_string(),
            duration: record.duration_label(),
            date: record.date_label(),
        }
    }
}

/// What a device lists at the end of a run, most recent first
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceListing {
    pub role: DeviceRole,
    pub memos: Vec<MemoSummary>,
}

impl DeviceListing {
    pub fn of(role: DeviceRole, records: &[MemoRecord]) -> Self {
        Self {
            role,
            memos: records.iter().map(MemoSummary::from).collect(),
        }
    }

    fn ids(&self) -> impl Iterator<Item = &str> {
        self.memos.iter().map(|m| m.id.as_str())
    }
}

/// Outcome of a [`PairSimulation`](crate::PairSimulation) run
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub mode: SyncMode,
    pub partitioned: bool,
    /// Messages the link discarded while partitioned
    pub dropped_messages: u64,
    pub phone: DeviceListing,
    pub watch: DeviceListing,
    /// Half-received inbound memos left on each side
    pub phone_pending: usize,
    pub watch_pending: usize,
}

impl SimulationReport {
    /// Both devices list the same memos in the same order
    pub fn converged(&self) -> bool {
        self.phone.ids().eq(self.watch.ids())
    }
}

impl Display for DeviceListing {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({} memos)", self.role, self.memos.len())?;
        for memo in &self.memos {
            writeln!(
                f,
                "  {}  {:<16} {:>6}  {}",
                memo.short_id, memo.title, memo.duration, memo.date
            )?;
        }
        Ok(())
    }
}

impl Display for SimulationReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "mode: {:?}, partitioned: {}, dropped messages: {}",
            self.mode, self.partitioned, self.dropped_messages
        )?;
        writeln!(f)?;
        write!(f, "{}", self.phone)?;
        writeln!(f)?;
        write!(f, "{}", self.watch)?;
        writeln!(f)?;
        if self.phone_pending + self.watch_pending > 0 {
            writeln!(
                f,
                "pending assemblies: phone {}, watch {}",
                self.phone_pending, self.watch_pending
            )?;
        }
        if self.converged() {
            writeln!(f, "converged")
        } else {
            writeln!(f, "DIVERGED")
        }
    }
}
