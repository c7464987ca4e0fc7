//! Deadline-bounded batched write sets
//!
//! A write set moves one batch (several records laid out back to back in a
//! single byte stream) into an append-only [`Sink`] as one contiguous append,
//! and refuses to let a slow source or sink stall the caller forever.
//!
//! ## Transfer loop
//!
//! 1. Start the deadline on the first `write_to` call
//! 2. Ask the sink to append at most the remaining byte count
//! 3. Add whatever it appended (short appends are normal)
//! 4. If still short and the budget is exceeded, fail with `WriteTimeout`
//! 5. Repeat until the declared size is reached
//!
//! The deadline is polled between appends, not enforced preemptively: one
//! pathologically slow append can overshoot it. A source that ends early is
//! not detected separately; its zero-progress appends trip the deadline and
//! are counted in `WriteTimeout::stalled_appends`.
//!
//! ## Lifecycle
//!
//! A write set owns its source from construction and is consumed by its
//! first `write_to` call, successful or not. Nothing is rolled back on
//! failure: the sink keeps a partial prefix the caller must treat as invalid.

pub mod config;

pub use config::{WriteSetConfig, WriteSetConfigError};

use crate::materialize::MaterializedStream;
use crate::sink::Sink;
use std::io::{self, Read};
use std::time::Duration;
use stowage_core::{
    record_spans, total_size, Clock, Deadline, RecordInfo, RecordSpan, SystemClock, WriteSetError,
    WriteSetResult,
};
use tracing::{debug, trace, warn};

/// A batch that can be written to a sink exactly once.
pub trait WriteSet {
    /// Transfer the whole batch into `sink`, returning the bytes written.
    fn write_to(&mut self, sink: &mut dyn Sink) -> WriteSetResult<u64>;

    /// Records in the batch, in stream order.
    fn records(&self) -> &[RecordInfo];
}

/// Where a write set reads its bytes from.
#[derive(Debug)]
enum Source<R> {
    /// The caller's stream, read lazily during transfer
    Direct(R),
    /// A copy taken at construction
    Materialized(MaterializedStream),
}

impl<R: Read> Read for Source<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Source::Direct(stream) => stream.read(buf),
            Source::Materialized(stream) => stream.read(buf),
        }
    }
}

/// Write set over a byte stream.
///
/// # Example
///
/// ```ignore
/// use stowage_durability::{MemorySink, StreamWriteSet, WriteSet, WriteSetConfig};
///
/// let mut write_set = StreamWriteSet::new(stream, records, &WriteSetConfig::default())?;
/// let mut sink = MemorySink::new();
/// let written = write_set.write_to(&mut sink)?;
/// assert_eq!(written, write_set.total_size());
/// ```
#[derive(Debug)]
pub struct StreamWriteSet<R, C = SystemClock> {
    /// Exclusively owned source
    source: Source<R>,

    /// Records in stream order
    records: Vec<RecordInfo>,

    /// Sum of record sizes, fixed at construction
    total_size: u64,

    /// Elapsed-time budget for the transfer
    max_write_time: Duration,

    /// Time source for the deadline
    clock: C,

    /// Set once a transfer has been attempted
    consumed: bool,
}

impl<R: Read> StreamWriteSet<R, SystemClock> {
    /// Build a write set timed by the system clock.
    ///
    /// Takes ownership of `stream`. When `config.materialize` is set the
    /// whole batch is read into memory here, under the same budget.
    ///
    /// Batches larger than `config.max_batch_bytes` (64 MiB by default) are
    /// rejected with `InvalidInput`, materialized or not. Raise the cap with
    /// [`WriteSetConfig::with_max_batch_bytes`] for bigger batches.
    pub fn new(stream: R, records: Vec<RecordInfo>, config: &WriteSetConfig) -> WriteSetResult<Self> {
        Self::with_clock(stream, records, config, SystemClock)
    }
}

impl<R: Read, C: Clock> StreamWriteSet<R, C> {
    /// Build a write set timed by `clock`.
    pub fn with_clock(
        mut stream: R,
        records: Vec<RecordInfo>,
        config: &WriteSetConfig,
        clock: C,
    ) -> WriteSetResult<Self> {
        config
            .validate()
            .map_err(|e| WriteSetError::invalid_input(e.to_string()))?;

        let total_size = total_size(&records)?;
        if total_size > config.max_batch_bytes {
            return Err(WriteSetError::invalid_input(format!(
                "batch of {} bytes exceeds limit of {} bytes",
                total_size, config.max_batch_bytes
            )));
        }

        let source = if config.materialize {
            Source::Materialized(MaterializedStream::materialize(
                &mut stream,
                total_size,
                config.max_write_time,
                &clock,
            )?)
        } else {
            Source::Direct(stream)
        };

        debug!(
            records = records.len(),
            total_size,
            materialized = config.materialize,
            "Built write set"
        );

        Ok(StreamWriteSet {
            source,
            records,
            total_size,
            max_write_time: config.max_write_time,
            clock,
            consumed: false,
        })
    }

    /// Sum of all record sizes
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Elapsed-time budget for the transfer
    pub fn max_write_time(&self) -> Duration {
        self.max_write_time
    }

    /// Whether the source was copied into memory at construction
    pub fn is_materialized(&self) -> bool {
        matches!(self.source, Source::Materialized(_))
    }

    /// Whether `write_to` has already been called
    pub fn is_consumed(&self) -> bool {
        self.consumed
    }

    /// Byte range of each record once the batch lands at `base_offset`.
    pub fn record_spans(&self, base_offset: u64) -> Vec<RecordSpan> {
        record_spans(&self.records, base_offset)
    }

    /// Give back the record list
    pub fn into_records(self) -> Vec<RecordInfo> {
        self.records
    }
}

impl<R: Read, C: Clock> WriteSet for StreamWriteSet<R, C> {
    fn write_to(&mut self, sink: &mut dyn Sink) -> WriteSetResult<u64> {
        if self.consumed {
            return Err(WriteSetError::AlreadyConsumed);
        }
        self.consumed = true;

        if self.total_size == 0 {
            return Ok(0);
        }

        let deadline = Deadline::start(&self.clock, self.max_write_time);
        let mut written = 0u64;
        let mut stalled_appends = 0u64;

        while written < self.total_size {
            let remaining = self.total_size - written;
            let appended = sink.append_from(&mut self.source, remaining)?;

            // A sink may append less than asked, never more.
            if appended > remaining {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "sink reported {} bytes appended, only {} were requested",
                        appended, remaining
                    ),
                )
                .into());
            }
            if appended == 0 {
                stalled_appends += 1;
            }
            written += appended;

            trace!(
                written,
                expected = self.total_size,
                appended,
                "Write set append"
            );

            if written < self.total_size && deadline.is_exceeded(&self.clock) {
                let elapsed = deadline.elapsed(&self.clock);
                warn!(
                    written,
                    expected = self.total_size,
                    elapsed = ?elapsed,
                    budget = ?self.max_write_time,
                    stalled_appends,
                    "Write set exceeded its deadline"
                );
                return Err(WriteSetError::WriteTimeout {
                    written,
                    expected: self.total_size,
                    elapsed,
                    max: self.max_write_time,
                    stalled_appends,
                });
            }
        }

        debug!(
            written,
            records = self.records.len(),
            elapsed = ?deadline.elapsed(&self.clock),
            "Write set transferred"
        );
        Ok(written)
    }

    fn records(&self) -> &[RecordInfo] {
        &self.records
    }
}
