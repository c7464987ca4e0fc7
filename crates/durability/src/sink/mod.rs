//! Append-only sinks
//!
//! A [`Sink`] accepts bytes pulled from a readable source and appends them at
//! its end. The contract is a **partial-write** contract:
//!
//! - `append_from` may append FEWER bytes than `max_bytes`, including zero
//! - a short append is NOT an error; the caller loops
//! - only a returned `Err` is a failure
//! - the source keeps its position between calls, so the next call continues
//!   exactly where the previous one stopped
//!
//! Treating a short append as a failure (or assuming one call moves the whole
//! batch) is the classic bug on this path. The write set loop in
//! [`crate::write_set`] is the reference caller.
//!
//! # Implementations
//!
//! - `memory`: growable in-memory buffer, optional per-call chunk cap
//! - `writer`: adapter over any `io::Write`
//! - `segment`: append-only segment file with a validated header

pub mod memory;
pub mod segment;
pub mod writer;

pub use memory::MemorySink;
pub use segment::{
    DurabilityMode, LogSegment, SegmentHeader, SEGMENT_FORMAT_VERSION, SEGMENT_HEADER_SIZE,
    SEGMENT_MAGIC,
};
pub use writer::WriterSink;

use std::io::{self, Read, Write};

/// Scratch buffer size for one read/write step of a bounded copy
const COPY_CHUNK_SIZE: usize = 8 * 1024;

/// Append-only destination with a short-write contract.
pub trait Sink {
    /// Append up to `max_bytes` pulled from `source`.
    ///
    /// Returns the number of bytes actually appended, which may be anything
    /// from `0` to `max_bytes`. A return of `0` means no progress on this
    /// call (source exhausted or momentarily unavailable), not failure.
    fn append_from(&mut self, source: &mut dyn Read, max_bytes: u64) -> io::Result<u64>;

    /// Append a whole buffer, looping over short appends.
    ///
    /// Fails with `WriteZero` if a call makes no progress.
    fn append(&mut self, data: &[u8]) -> io::Result<()> {
        let mut remaining = data;
        while !remaining.is_empty() {
            let len = remaining.len() as u64;
            let appended = self.append_from(&mut remaining, len)?;
            if appended == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "sink accepted no bytes",
                ));
            }
        }
        Ok(())
    }
}

impl<S: Sink + ?Sized> Sink for &mut S {
    fn append_from(&mut self, source: &mut dyn Read, max_bytes: u64) -> io::Result<u64> {
        (**self).append_from(source, max_bytes)
    }
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn append_from(&mut self, source: &mut dyn Read, max_bytes: u64) -> io::Result<u64> {
        (**self).append_from(source, max_bytes)
    }
}

/// Copy at most `max_bytes` from `source` into `dest`.
///
/// Stops early at end-of-stream or when the source would block, returning
/// what was copied so far. `Interrupted` reads are retried. A read error after
/// some bytes were copied ends the call with the partial count; the source
/// reports it again on the next call. Bytes are written to `dest` as soon as
/// they are read, so an `Ok` count always matches what `dest` received.
///
/// A failed write to `dest` returns `Err` and may leave part of the last
/// chunk behind; destinations that track an offset must resync it.
pub(crate) fn copy_bounded<W: Write + ?Sized>(
    source: &mut dyn Read,
    max_bytes: u64,
    dest: &mut W,
) -> io::Result<u64> {
    let mut buf = [0u8; COPY_CHUNK_SIZE];
    let mut copied = 0u64;

    while copied < max_bytes {
        let want = (max_bytes - copied).min(COPY_CHUNK_SIZE as u64) as usize;
        let n = match source.read(&mut buf[..want]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(_) if copied > 0 => break,
            Err(e) => return Err(e),
        };
        dest.write_all(&buf[..n])?;
        copied += n as u64;
    }

    Ok(copied)
}
