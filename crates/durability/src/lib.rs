//! Durability layer for Stowage
//!
//! This crate handles everything that moves batch bytes toward disk:
//!
//! - Sinks: append-only destinations with a short-write contract
//!   (in-memory buffer, `io::Write` adapter, segment file)
//! - Materialization: deadline-bounded copy of a source stream into memory
//! - Write sets: deadline-bounded transfer of one batch into a sink

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod materialize; // Bounded input materializer
pub mod sink; // Sink trait and implementations
pub mod write_set; // Write set transfer loop and config

// === Re-exports ===
pub use materialize::MaterializedStream;
pub use sink::{
    DurabilityMode, LogSegment, MemorySink, SegmentHeader, Sink, WriterSink,
    SEGMENT_FORMAT_VERSION, SEGMENT_HEADER_SIZE, SEGMENT_MAGIC,
};
pub use write_set::{StreamWriteSet, WriteSet, WriteSetConfig, WriteSetConfigError};
