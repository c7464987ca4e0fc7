//! Core types for Stowage
//!
//! This crate defines the foundational types shared by the write path:
//! - RecordInfo: descriptor of one logical record inside a batch stream
//! - StoreKey / RecordFlags: record identity and flags, carried through opaquely
//! - RecordSpan: where each record landed in the sink after a write
//! - Clock / Deadline: injectable time source and polled elapsed-time budget
//! - WriteSetError: error hierarchy for building and transferring write sets

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod error;
pub mod record;

pub use clock::{Clock, Deadline, ManualClock, SystemClock};
pub use error::{MaterializeFailure, WriteSetError, WriteSetResult};
pub use record::{record_spans, total_size, RecordFlags, RecordInfo, RecordSpan, StoreKey};
