//! Record descriptors for batched writes
//!
//! A batch is one contiguous byte stream holding several logical records back
//! to back. Each [`RecordInfo`] describes one of them. Only `size` is read by
//! the write path; the remaining fields are carried through unmodified so the
//! caller can index the records once the batch is durable.
//!
//! ```text
//! stream:  ┌──────────┬──────┬────────────────┐
//!          │ record 0 │ r. 1 │ record 2       │
//!          └──────────┴──────┴────────────────┘
//! spans:   base        base+s0  base+s0+s1
//! ```

use crate::error::{WriteSetError, WriteSetResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque identity of one stored record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StoreKey(Vec<u8>);

impl StoreKey {
    /// Wrap caller-supplied key bytes
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        StoreKey(bytes.into())
    }

    /// Mint a fresh key from a random UUID
    pub fn random() -> Self {
        StoreKey(Uuid::new_v4().as_bytes().to_vec())
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// Per-record flags. Opaque to the write path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFlags {
    /// Record is a delete tombstone
    pub deleted: bool,
    /// Record carries an expiry update for an existing key
    pub ttl_updated: bool,
}

/// Descriptor of one logical record inside a batch stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordInfo {
    /// Record identity
    pub key: StoreKey,
    /// Payload bytes this record occupies in the stream
    pub size: u64,
    /// Absolute expiry in milliseconds since the epoch (`None` = never expires)
    pub expires_at_ms: Option<u64>,
    /// Record flags
    pub flags: RecordFlags,
    /// Payload checksum, if the producer computed one
    pub crc: Option<u32>,
}

impl RecordInfo {
    /// Describe a record of `size` bytes that never expires
    pub fn new(key: StoreKey, size: u64) -> Self {
        RecordInfo {
            key,
            size,
            expires_at_ms: None,
            flags: RecordFlags::default(),
            crc: None,
        }
    }

    /// Set the expiry (builder pattern)
    pub fn with_expiry(mut self, expires_at_ms: u64) -> Self {
        self.expires_at_ms = Some(expires_at_ms);
        self
    }

    /// Set the payload checksum (builder pattern)
    pub fn with_crc(mut self, crc: u32) -> Self {
        self.crc = Some(crc);
        self
    }

    /// Mark the record as a delete tombstone (builder pattern)
    pub fn deleted(mut self) -> Self {
        self.flags.deleted = true;
        self
    }

    /// Mark the record as an expiry update (builder pattern)
    pub fn ttl_updated(mut self) -> Self {
        self.flags.ttl_updated = true;
        self
    }
}

/// Location of one record inside the sink after a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSpan {
    /// Position of the record in the batch
    pub index: usize,
    /// Sink offset of the first byte of the record
    pub offset: u64,
    /// Record size in bytes
    pub size: u64,
}

impl RecordSpan {
    /// Sink offset one past the last byte of the record
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }
}

/// Sum record sizes, rejecting totals that overflow `u64`.
pub fn total_size(records: &[RecordInfo]) -> WriteSetResult<u64> {
    records.iter().try_fold(0u64, |acc, info| {
        acc.checked_add(info.size).ok_or_else(|| {
            WriteSetError::invalid_input(format!(
                "record sizes overflow u64 at key {}",
                info.key
            ))
        })
    })
}

/// Map each record to its byte range, given the sink offset the batch starts at.
///
/// Callers only pass record lists whose sizes already passed [`total_size`],
/// so offsets cannot overflow unless `base_offset` itself is near `u64::MAX`;
/// in that case offsets saturate.
pub fn record_spans(records: &[RecordInfo], base_offset: u64) -> Vec<RecordSpan> {
    let mut offset = base_offset;
    records
        .iter()
        .enumerate()
        .map(|(index, info)| {
            let span = RecordSpan {
                index,
                offset,
                size: info.size,
            };
            offset = offset.saturating_add(info.size);
            span
        })
        .collect()
}
