//! Sink adapter over `io::Write`.

use super::{copy_bounded, Sink};
use std::io::{self, Read, Write};

/// Adapts any `io::Write` into an append-only [`Sink`].
///
/// The writer is flushed after every append so bytes reported as appended
/// have left this adapter. `appended` counts bytes handed to the writer, so
/// it stays accurate when the flush fails. A writer that fails partway
/// through a chunk cannot report how much of it was taken.
#[derive(Debug)]
pub struct WriterSink<W: Write> {
    inner: W,
    max_chunk: Option<u64>,
    appended: u64,
}

impl<W: Write> WriterSink<W> {
    /// Wrap a writer
    pub fn new(inner: W) -> Self {
        WriterSink {
            inner,
            max_chunk: None,
            appended: 0,
        }
    }

    /// Cap each append call to `max_chunk` bytes (builder pattern)
    pub fn with_max_chunk(mut self, max_chunk: u64) -> Self {
        self.max_chunk = Some(max_chunk);
        self
    }

    /// Total bytes appended through this adapter
    pub fn appended(&self) -> u64 {
        self.appended
    }

    /// Borrow the wrapped writer
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Unwrap the writer
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Sink for WriterSink<W> {
    fn append_from(&mut self, source: &mut dyn Read, max_bytes: u64) -> io::Result<u64> {
        let limit = match self.max_chunk {
            Some(cap) => max_bytes.min(cap),
            None => max_bytes,
        };
        let copied = copy_bounded(source, limit, &mut self.inner)?;
        self.appended += copied;
        self.inner.flush()?;
        Ok(copied)
    }
}
