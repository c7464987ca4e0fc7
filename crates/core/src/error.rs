//! Error types for the batched write path
//!
//! Every failure on the write path terminates the operation and is reported
//! to the caller immediately. Nothing is retried internally: the transfer
//! loop is the whole retry surface and it is bounded by elapsed time only.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use std::fmt;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for write set operations
pub type WriteSetResult<T> = std::result::Result<T, WriteSetError>;

/// Why materializing a source stream into memory failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterializeFailure {
    /// The elapsed-time budget ran out before the declared byte count was read
    TimedOut,
    /// The source reported end-of-stream before the declared byte count was read
    SourceEnded,
}

impl fmt::Display for MaterializeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaterializeFailure::TimedOut => write!(f, "deadline exceeded"),
            MaterializeFailure::SourceEnded => write!(f, "source ended early"),
        }
    }
}

/// Errors produced while building or transferring a write set
#[derive(Debug, Error)]
pub enum WriteSetError {
    /// Malformed record list or configuration, not retriable without fixing input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The source could not be copied into memory
    #[error("Materialization failed ({reason}): read {read} of {expected} bytes")]
    MaterializationFailed {
        /// What stopped the copy
        reason: MaterializeFailure,
        /// Bytes copied before the failure
        read: u64,
        /// Bytes the record list declared
        expected: u64,
    },

    /// The transfer loop ran past its elapsed-time budget
    ///
    /// The sink holds a partial, uncommitted prefix of the batch and must not
    /// be trusted for this byte range.
    #[error(
        "Time taken to write exceeded {max:?}: wrote {written} of {expected} bytes in {elapsed:?} \
         ({stalled_appends} appends made no progress)"
    )]
    WriteTimeout {
        /// Bytes appended before the deadline tripped
        written: u64,
        /// Bytes the record list declared
        expected: u64,
        /// Time observed since the first append
        elapsed: Duration,
        /// Configured budget
        max: Duration,
        /// Appends that returned zero bytes (a truncated source shows up here)
        stalled_appends: u64,
    },

    /// `write_to` was called on a write set that already attempted a transfer
    #[error("Write set already consumed by a previous transfer attempt")]
    AlreadyConsumed,

    /// I/O error from the source or the sink, propagated unchanged
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl WriteSetError {
    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Check whether this is a deadline failure (transfer or materialization)
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            WriteSetError::WriteTimeout { .. }
                | WriteSetError::MaterializationFailed {
                    reason: MaterializeFailure::TimedOut,
                    ..
                }
        )
    }

    /// Check whether the caller may retry with a fresh write set
    ///
    /// The failed write set itself is never reusable.
    pub fn is_retryable(&self) -> bool {
        match self {
            WriteSetError::WriteTimeout { .. } => true,
            WriteSetError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }
}
