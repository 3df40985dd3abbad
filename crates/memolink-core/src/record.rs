//! Memo record model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::id::{MemoId, PayloadRef};

/// Metadata of one voice memo
///
/// Records are write-once: there are no setters, and a record is only ever
/// replaced by deleting it. The audio itself lives in the blob store under
/// [`payload_ref`](Self::payload_ref).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoRecord {
    id: MemoId,
    title: String,
    created_at: DateTime<Utc>,
    duration_seconds: f64,
    payload_ref: PayloadRef,
}

impl MemoRecord {
    /// Create a record, validating the duration
    pub fn new(
        id: MemoId,
        title: impl Into<String>,
        created_at: DateTime<Utc>,
        duration_seconds: f64,
        payload_ref: PayloadRef,
    ) -> Result<Self, ModelError> {
        if !duration_seconds.is_finite() || duration_seconds < 0.0 {
            return Err(ModelError::InvalidDuration(duration_seconds));
        }
        Ok(Self {
            id,
            title: title.into(),
            created_at,
            duration_seconds,
            payload_ref,
        })
    }

    pub fn id(&self) -> MemoId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    pub fn payload_ref(&self) -> &PayloadRef {
        &self.payload_ref
    }

    /// Duration formatted as `m:ss`
    ///
    /// Fractional seconds are truncated, so 12.9s renders as `0:12`.
    pub fn duration_label(&self) -> String {
        let total = self.duration_seconds as u64;
        format!("{}:{:02}", total / 60, total % 60)
    }

    /// Creation time formatted as `YYYY-MM-DD HH:MM` (UTC)
    pub fn date_label(&self) -> String {
        self.created_at.format("%Y-%m-%d %H:%M").to_string()
    }
}

/// Default title for the n-th memo on a device ("Memo 1", "Memo 2", ...)
pub fn default_title(existing_count: usize) -> String {
    format!("Memo {}", existing_count + 1)
}
