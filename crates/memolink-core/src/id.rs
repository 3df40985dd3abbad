//! Memo identifiers and payload references
//!
//! Identifiers are generated by whichever device records the memo, so two
//! peers never need to negotiate ids. A [`PayloadRef`] names the audio file
//! inside the blob directory and travels on the wire as a file-name hint,
//! which is why it is restricted to a single safe path component.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use derive_more::Display as DeriveDisplay;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ModelError;

/// Unique identifier of a memo (random UUID v4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoId(Uuid);

impl MemoId {
    /// Generate a new random identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parse the canonical string form
    pub fn parse(s: &str) -> Result<Self, ModelError> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| ModelError::InvalidId(s.to_string()))
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Short display form (for logging)
    pub fn short_id(&self) -> String {
        let mut s = self.0.simple().to_string();
        s.truncate(8);
        s
    }
}

impl Display for MemoId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for MemoId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Maximum length of a payload file name in bytes
pub const MAX_PAYLOAD_REF_LEN: usize = 255;

/// Name of a payload file inside the blob store
#[derive(Debug, DeriveDisplay, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PayloadRef(String);

impl PayloadRef {
    /// Extension used for recorded audio
    pub const AUDIO_EXTENSION: &'static str = "m4a";

    /// Create a payload reference, rejecting anything that is not a plain
    /// file name
    pub fn new(name: impl Into<String>) -> Result<Self, ModelError> {
        let name = name.into();
        if Self::is_valid(&name) {
            Ok(Self(name))
        } else {
            Err(ModelError::InvalidPayloadRef(name))
        }
    }

    /// The reference used for a memo recorded on this device
    pub fn for_memo(id: &MemoId) -> Self {
        Self(format!("memo_{}.{}", id.0.simple(), Self::AUDIO_EXTENSION))
    }

    /// Get the file name
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn is_valid(name: &str) -> bool {
        !name.is_empty()
            && name.len() <= MAX_PAYLOAD_REF_LEN
            && name != "."
            && name != ".."
            && !name.ends_with(".tmp")
            && !name.chars().any(|c| c == '/' || c == '\\' || c == '\0')
    }
}

impl TryFrom<String> for PayloadRef {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PayloadRef> for String {
    fn from(value: PayloadRef) -> Self {
        value.0
    }
}

impl AsRef<str> for PayloadRef {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
