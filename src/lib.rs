//! Stowage - deadline-bounded batched writes for append-only storage
//!
//! A storage node receives a batch of records as one byte stream plus a list
//! of record descriptors, and persists the batch with a single contiguous
//! append. Stowage provides that write path:
//!
//! # Quick Start
//!
//! ```ignore
//! use stowage::{MemorySink, RecordInfo, StoreKey, StreamWriteSet, WriteSet, WriteSetConfig};
//!
//! let records = vec![
//!     RecordInfo::new(StoreKey::random(), 5),
//!     RecordInfo::new(StoreKey::random(), 6),
//! ];
//! let stream = std::io::Cursor::new(b"hello world".to_vec());
//!
//! let mut write_set = StreamWriteSet::new(stream, records, &WriteSetConfig::default())?;
//! let mut sink = MemorySink::new();
//! let written = write_set.write_to(&mut sink)?;
//!
//! // Map byte ranges back to records
//! let spans = write_set.record_spans(0);
//! ```
//!
//! # Architecture
//!
//! - `stowage-core`: record descriptors, clock and deadline, errors
//! - `stowage-durability`: sinks, materializer, write sets

pub use stowage_core::*;
pub use stowage_durability::*;
