//! Wire codec for sync frames
//!
//! Every frame header is a flat map from field name to a primitive
//! [`WireValue`], serialized with postcard. Three kinds exist:
//!
//! | kind      | fields                                          | carried by          |
//! |-----------|-------------------------------------------------|---------------------|
//! | `memo`    | `id`, `title`, `date`, `duration`, `fileName`   | message or transfer |
//! | `delete`  | `id`                                            | message or transfer |
//! | `payload` | `id`, `fileName`, `checksum`                    | transfer header     |
//!
//! A payload transfer always carries the memo id in its header, so the
//! receiver never has to guess which metadata a payload belongs to.

use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use memolink_core::{Delivery, MemoId, MemoRecord, PayloadRef};
use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// Field names used on the wire
pub mod fields {
    pub const KIND: &str = "kind";
    pub const ID: &str = "id";
    pub const TITLE: &str = "title";
    pub const DATE: &str = "date";
    pub const DURATION: &str = "duration";
    pub const FILE_NAME: &str = "fileName";
    pub const CHECKSUM: &str = "checksum";
}

/// Values of the `kind` field
pub mod kinds {
    pub const MEMO: &str = "memo";
    pub const DELETE: &str = "delete";
    pub const PAYLOAD: &str = "payload";
}

/// A primitive value in a frame header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WireValue {
    Text(String),
    Timestamp { secs: i64, nanos: u32 },
    Float(f64),
}

impl WireValue {
    fn type_name(&self) -> &'static str {
        match self {
            WireValue::Text(_) => "text",
            WireValue::Timestamp { .. } => "timestamp",
            WireValue::Float(_) => "float",
        }
    }
}

impl From<&str> for WireValue {
    fn from(value: &str) -> Self {
        WireValue::Text(value.to_string())
    }
}

impl From<String> for WireValue {
    fn from(value: String) -> Self {
        WireValue::Text(value)
    }
}

impl From<DateTime<Utc>> for WireValue {
    fn from(value: DateTime<Utc>) -> Self {
        WireValue::Timestamp {
            secs: value.timestamp(),
            nanos: value.timestamp_subsec_nanos(),
        }
    }
}

impl From<f64> for WireValue {
    fn from(value: f64) -> Self {
        WireValue::Float(value)
    }
}

/// A decoded frame header as a flat field map
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMap(BTreeMap<String, WireValue>);

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: &str, value: impl Into<WireValue>) -> Self {
        self.0.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&WireValue> {
        self.0.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<WireValue> {
        self.0.remove(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        postcard::to_allocvec(self).map_err(|e| CodecError::Encode(e.to_string()))
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, CodecError> {
        postcard::from_bytes(data)
            .map_err(|e| CodecError::malformed(format!("not a field map: {}", e)))
    }

    fn require(&self, name: &str) -> Result<&WireValue, CodecError> {
        self.get(name)
            .ok_or_else(|| CodecError::malformed(format!("missing field `{}`", name)))
    }

    fn text(&self, name: &str) -> Result<&str, CodecError> {
        match self.require(name)? {
            WireValue::Text(s) => Ok(s),
            other => Err(wrong_type(name, "text", other)),
        }
    }

    fn timestamp(&self, name: &str) -> Result<DateTime<Utc>, CodecError> {
        match self.require(name)? {
            WireValue::Timestamp { secs, nanos } => DateTime::from_timestamp(*secs, *nanos)
                .ok_or_else(|| CodecError::malformed(format!("field `{}` out of range", name))),
            other => Err(wrong_type(name, "timestamp", other)),
        }
    }

    fn float(&self, name: &str) -> Result<f64, CodecError> {
        match self.require(name)? {
            WireValue::Float(f) => Ok(*f),
            other => Err(wrong_type(name, "float", other)),
        }
    }

    fn memo_id(&self) -> Result<MemoId, CodecError> {
        let raw = self.text(fields::ID)?;
        MemoId::parse(raw).map_err(|e| CodecError::malformed(e.to_string()))
    }
}

fn wrong_type(name: &str, expected: &str, actual: &WireValue) -> CodecError {
    CodecError::malformed(format!(
        "field `{}` should be {}, got {}",
        name,
        expected,
        actual.type_name()
    ))
}

/// Metadata of a memo as announced to the peer
#[derive(Debug, Clone, PartialEq)]
pub struct MemoMeta {
    pub id: MemoId,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub payload_file_hint: String,
}

impl MemoMeta {
    /// Describe a stored record
    pub fn from_record(record: &MemoRecord) -> Self {
        Self {
            id: record.id(),
            title: record.title().to_string(),
            created_at: record.created_at(),
            duration_seconds: record.duration_seconds(),
            payload_file_hint: record.payload_ref().as_str().to_string(),
        }
    }

    /// The payload reference to store this memo under
    ///
    /// Uses the sender's file name when it is a safe single path component,
    /// otherwise derives one from the id.
    pub fn payload_ref(&self) -> PayloadRef {
        PayloadRef::new(self.payload_file_hint.as_str())
            .unwrap_or_else(|_| PayloadRef::for_memo(&self.id))
    }

    /// Build the record this metadata describes, stored under `payload_ref`
    pub fn into_record(
        self,
        payload_ref: PayloadRef,
    ) -> Result<MemoRecord, memolink_core::ModelError> {
        MemoRecord::new(
            self.id,
            self.title,
            self.created_at,
            self.duration_seconds,
            payload_ref,
        )
    }
}

/// A metadata message exchanged between peers
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    MemoMeta(MemoMeta),
    Delete { id: MemoId },
}

impl Envelope {
    /// The memo this envelope is about
    pub fn id(&self) -> MemoId {
        match self {
            Envelope::MemoMeta(meta) => meta.id,
            Envelope::Delete { id } => *id,
        }
    }

    pub fn to_fields(&self) -> FieldMap {
        match self {
            Envelope::MemoMeta(meta) => FieldMap::new()
                .with(fields::KIND, kinds::MEMO)
                .with(fields::ID, meta.id.to_string())
                .with(fields::TITLE, meta.title.as_str())
                .with(fields::DATE, meta.created_at)
                .with(fields::DURATION, meta.duration_seconds)
                .with(fields::FILE_NAME, meta.payload_file_hint.as_str()),
            Envelope::Delete { id } => FieldMap::new()
                .with(fields::KIND, kinds::DELETE)
                .with(fields::ID, id.to_string()),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        self.to_fields().to_bytes()
    }

    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        match Frame::decode(data)? {
            Frame::Envelope(envelope) => Ok(envelope),
            Frame::Payload(_) => Err(CodecError::malformed(
                "payload header where an envelope was expected",
            )),
        }
    }

    fn from_fields(kind: &str, map: &FieldMap) -> Result<Self, CodecError> {
        match kind {
            kinds::MEMO => {
                let duration_seconds = map.float(fields::DURATION)?;
                if !duration_seconds.is_finite() || duration_seconds < 0.0 {
                    return Err(CodecError::malformed(format!(
                        "invalid duration {}",
                        duration_seconds
                    )));
                }
                Ok(Envelope::MemoMeta(MemoMeta {
                    id: map.memo_id()?,
                    title: map.text(fields::TITLE)?.to_string(),
                    created_at: map.timestamp(fields::DATE)?,
                    duration_seconds,
                    payload_file_hint: map.text(fields::FILE_NAME)?.to_string(),
                }))
            }
            kinds::DELETE => Ok(Envelope::Delete { id: map.memo_id()? }),
            other => Err(CodecError::malformed(format!("unknown kind `{}`", other))),
        }
    }
}

/// Header attached to a payload transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadHeader {
    pub id: MemoId,
    pub file_hint: String,
    /// BLAKE3 hash of the payload body
    pub checksum: [u8; 32],
}

impl PayloadHeader {
    /// Describe a payload body for a memo
    pub fn for_payload(id: MemoId, payload_ref: &PayloadRef, body: &[u8]) -> Self {
        Self {
            id,
            file_hint: payload_ref.as_str().to_string(),
            checksum: *blake3::hash(body).as_bytes(),
        }
    }

    /// Check that a received body matches the checksum
    pub fn verify(&self, body: &[u8]) -> bool {
        blake3::hash(body).as_bytes() == &self.checksum
    }

    pub fn to_fields(&self) -> FieldMap {
        FieldMap::new()
            .with(fields::KIND, kinds::PAYLOAD)
            .with(fields::ID, self.id.to_string())
            .with(fields::FILE_NAME, self.file_hint.as_str())
            .with(fields::CHECKSUM, hex::encode(self.checksum))
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        self.to_fields().to_bytes()
    }

    fn from_fields(map: &FieldMap) -> Result<Self, CodecError> {
        let checksum_hex = map.text(fields::CHECKSUM)?;
        let mut checksum = [0u8; 32];
        hex::decode_to_slice(checksum_hex, &mut checksum)
            .map_err(|e| CodecError::malformed(format!("bad checksum: {}", e)))?;

        Ok(Self {
            id: map.memo_id()?,
            file_hint: map.text(fields::FILE_NAME)?.to_string(),
            checksum,
        })
    }
}

/// Any decoded frame header
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Envelope(Envelope),
    Payload(PayloadHeader),
}

impl Frame {
    /// Decode a frame header, rejecting anything incomplete
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        let map = FieldMap::from_bytes(data)?;
        let kind = map.text(fields::KIND)?;
        if kind == kinds::PAYLOAD {
            Ok(Frame::Payload(PayloadHeader::from_fields(&map)?))
        } else {
            Ok(Frame::Envelope(Envelope::from_fields(kind, &map)?))
        }
    }
}

/// A fully decoded inbound item, ready for the sync engine
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Envelope(Envelope),
    Payload { header: PayloadHeader, body: Bytes },
}

impl InboundFrame {
    /// Decode whatever the link delivered
    ///
    /// Envelopes may arrive as messages or as header-only transfers. A
    /// payload header is only valid on a transfer.
    pub fn from_delivery(delivery: Delivery) -> Result<Self, CodecError> {
        match delivery {
            Delivery::Message(data) => match Frame::decode(&data)? {
                Frame::Envelope(envelope) => Ok(InboundFrame::Envelope(envelope)),
                Frame::Payload(_) => Err(CodecError::malformed(
                    "payload header sent as a message",
                )),
            },
            Delivery::Transfer(transfer) => match Frame::decode(&transfer.header)? {
                Frame::Envelope(envelope) => Ok(InboundFrame::Envelope(envelope)),
                Frame::Payload(header) => Ok(InboundFrame::Payload {
                    header,
                    body: transfer.body,
                }),
            },
        }
    }

    pub fn id(&self) -> MemoId {
        match self {
            InboundFrame::Envelope(envelope) => envelope.id(),
            InboundFrame::Payload { header, .. } => header.id,
        }
    }
}
