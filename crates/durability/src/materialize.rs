//! Bounded input materialization
//!
//! Copies exactly the declared number of bytes from a source stream into a
//! freshly allocated buffer before a write begins, under the same polled
//! elapsed-time budget the transfer loop uses. Afterwards the write path reads
//! from memory only, so a slow or blocking transport can no longer stall the
//! append loop.
//!
//! ## Failure modes
//!
//! - source reports end-of-stream early: `MaterializationFailed(SourceEnded)`
//! - budget exceeded before the declared count: `MaterializationFailed(TimedOut)`
//! - any other read error: propagated unchanged as `Io`
//!
//! `Interrupted` reads are retried. `WouldBlock` reads count as zero progress
//! and fall under the deadline check.

use std::io::{self, Read};
use std::time::Duration;
use stowage_core::{Clock, Deadline, MaterializeFailure, WriteSetError, WriteSetResult};
use tracing::{debug, warn};

/// In-memory stream over a fully materialized batch.
///
/// Reads never block and never touch I/O. [`rewind`](Self::rewind) restarts
/// from the first byte.
#[derive(Debug, Clone, Default)]
pub struct MaterializedStream {
    buf: Vec<u8>,
    pos: usize,
}

impl MaterializedStream {
    /// Drain exactly `size` bytes from `source` within `max_duration`.
    pub fn materialize<R, C>(
        source: &mut R,
        size: u64,
        max_duration: Duration,
        clock: &C,
    ) -> WriteSetResult<Self>
    where
        R: Read + ?Sized,
        C: Clock + ?Sized,
    {
        let len = usize::try_from(size).map_err(|_| {
            WriteSetError::invalid_input(format!("batch of {} bytes cannot be held in memory", size))
        })?;

        let mut buf = Vec::new();
        buf.try_reserve_exact(len).map_err(|e| {
            WriteSetError::invalid_input(format!("cannot allocate {} bytes: {}", len, e))
        })?;
        buf.resize(len, 0);

        let deadline = Deadline::start(clock, max_duration);
        let mut filled = 0usize;

        while filled < len {
            match source.read(&mut buf[filled..]) {
                Ok(0) => {
                    warn!(read = filled, expected = size, "Source ended before materialization completed");
                    return Err(WriteSetError::MaterializationFailed {
                        reason: MaterializeFailure::SourceEnded,
                        read: filled as u64,
                        expected: size,
                    });
                }
                Ok(n) => filled += n,
                Err(e)
                    if e.kind() == io::ErrorKind::Interrupted
                        || e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(e.into()),
            }

            if filled < len && deadline.is_exceeded(clock) {
                warn!(
                    read = filled,
                    expected = size,
                    budget = ?max_duration,
                    "Materialization exceeded its deadline"
                );
                return Err(WriteSetError::MaterializationFailed {
                    reason: MaterializeFailure::TimedOut,
                    read: filled as u64,
                    expected: size,
                });
            }
        }

        debug!(bytes = size, elapsed = ?deadline.elapsed(clock), "Materialized source stream");
        Ok(MaterializedStream { buf, pos: 0 })
    }

    /// Wrap bytes that are already in memory
    pub fn from_bytes(buf: Vec<u8>) -> Self {
        MaterializedStream { buf, pos: 0 }
    }

    /// Total materialized bytes
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the buffer holds no bytes
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Current read position
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes not yet read
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Restart reading from the first byte
    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    /// The materialized bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Take the materialized bytes
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

impl Read for MaterializedStream {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let n = out.len().min(self.remaining());
        out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
