//! In-memory sink.

use super::{copy_bounded, Sink};
use std::io::{self, Read};

/// Growable in-memory append buffer.
///
/// An optional chunk cap bounds how many bytes one `append_from` call takes,
/// which emulates page- or frame-bounded sinks.
#[derive(Debug, Default)]
pub struct MemorySink {
    data: Vec<u8>,
    max_chunk: Option<u64>,
    calls: u64,
}

impl MemorySink {
    /// Create an empty, uncapped sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap each append call to `max_chunk` bytes (builder pattern)
    pub fn with_max_chunk(mut self, max_chunk: u64) -> Self {
        self.max_chunk = Some(max_chunk);
        self
    }

    /// Bytes appended so far
    pub fn contents(&self) -> &[u8] {
        &self.data
    }

    /// Number of bytes appended so far
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether nothing has been appended yet
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of `append_from` calls received
    pub fn calls(&self) -> u64 {
        self.calls
    }

    /// Take the appended bytes
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl Sink for MemorySink {
    fn append_from(&mut self, source: &mut dyn Read, max_bytes: u64) -> io::Result<u64> {
        self.calls += 1;
        let limit = match self.max_chunk {
            Some(cap) => max_bytes.min(cap),
            None => max_bytes,
        };
        copy_bounded(source, limit, &mut self.data)
    }
}
