//! Append-only segment file sink.
//!
//! Segments are named `log-NNNNNN.seg` where `NNNNNN` is a zero-padded segment number.
//!
//! # Segment Layout
//!
//! ```text
//! ┌────────────────────────────────────┐
//! │ Segment Header (32 bytes)          │
//! ├────────────────────────────────────┤
//! │ Batch 1 bytes                      │
//! ├────────────────────────────────────┤
//! │ Batch 2 bytes                      │
//! ├────────────────────────────────────┤
//! │ ...                                │
//! └────────────────────────────────────┘
//! ```
//!
//! # Header Layout
//!
//! ```text
//! ┌──────────────┬──────────────┬────────────────┬───────────────┬────────────┐
//! │ Magic (4)    │ Version (4)  │ Segment No (8) │ Reserved (12) │ CRC32 (4)  │
//! └──────────────┴──────────────┴────────────────┴───────────────┴────────────┘
//! ```
//!
//! The segment stores raw batch bytes only. Record boundaries live in the
//! caller's index (see `RecordSpan`), so a failed batch leaves an
//! unindexed tail that the caller excludes from the recoverable range.

use super::{copy_bounded, Sink};
use crc32fast::Hasher;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Magic bytes identifying a segment file: "STOW"
pub const SEGMENT_MAGIC: [u8; 4] = *b"STOW";

/// Current segment format version
pub const SEGMENT_FORMAT_VERSION: u32 = 1;

/// Size of segment header in bytes
pub const SEGMENT_HEADER_SIZE: usize = 32;

/// When appended bytes are forced to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurabilityMode {
    /// fsync after every append call that made progress
    Always,
    /// fsync only on explicit `sync()` or `close()`
    #[default]
    Standard,
}

/// Segment header (32 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    /// Magic bytes: "STOW"
    pub magic: [u8; 4],

    /// Format version for forward compatibility
    pub format_version: u32,

    /// Segment number (monotonically increasing)
    pub segment_number: u64,
}

impl SegmentHeader {
    /// Create a new segment header.
    pub fn new(segment_number: u64) -> Self {
        SegmentHeader {
            magic: SEGMENT_MAGIC,
            format_version: SEGMENT_FORMAT_VERSION,
            segment_number,
        }
    }

    /// Serialize header to bytes, CRC included.
    pub fn to_bytes(&self) -> [u8; SEGMENT_HEADER_SIZE] {
        let mut bytes = [0u8; SEGMENT_HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4..8].copy_from_slice(&self.format_version.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.segment_number.to_le_bytes());
        let crc = Self::checksum(&bytes[0..28]);
        bytes[28..32].copy_from_slice(&crc.to_le_bytes());
        bytes
    }

    /// Deserialize header from bytes.
    ///
    /// Returns `None` if the magic or the checksum does not match.
    pub fn from_bytes(bytes: &[u8; SEGMENT_HEADER_SIZE]) -> Option<Self> {
        let stored_crc = u32::from_le_bytes(bytes[28..32].try_into().ok()?);
        if stored_crc != Self::checksum(&bytes[0..28]) {
            return None;
        }

        let header = SegmentHeader {
            magic: bytes[0..4].try_into().ok()?,
            format_version: u32::from_le_bytes(bytes[4..8].try_into().ok()?),
            segment_number: u64::from_le_bytes(bytes[8..16].try_into().ok()?),
        };
        if header.magic != SEGMENT_MAGIC {
            return None;
        }
        Some(header)
    }

    fn checksum(bytes: &[u8]) -> u32 {
        let mut hasher = Hasher::new();
        hasher.update(bytes);
        hasher.finalize()
    }
}

/// Append-only segment file.
///
/// Each `append_from` call appends at most `max_append_bytes` (when set),
/// mirroring devices that accept writes in bounded units. A closed segment
/// is immutable and rejects appends.
#[derive(Debug)]
pub struct LogSegment {
    /// File handle
    file: File,

    /// Segment number
    segment_number: u64,

    /// Current write position (bytes from start, header included)
    write_position: u64,

    /// Path to segment file
    path: PathBuf,

    /// Whether this segment is closed (immutable)
    closed: bool,

    /// fsync policy
    durability: DurabilityMode,

    /// Per-call append cap
    max_append_bytes: Option<u64>,

    /// fsync calls issued
    sync_calls: u64,
}

impl LogSegment {
    /// Create a new segment.
    ///
    /// Creates the segment file and writes the header. Fails if the file exists.
    pub fn create(dir: &Path, segment_number: u64, durability: DurabilityMode) -> io::Result<Self> {
        let path = Self::segment_path(dir, segment_number);

        let mut file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .read(true)
            .open(&path)?;

        let header = SegmentHeader::new(segment_number);
        file.write_all(&header.to_bytes())?;
        file.sync_all()?;

        debug!(path = %path.display(), segment_number, "Created log segment");

        Ok(LogSegment {
            file,
            segment_number,
            write_position: SEGMENT_HEADER_SIZE as u64,
            path,
            closed: false,
            durability,
            max_append_bytes: None,
            sync_calls: 1,
        })
    }

    /// Open an existing segment for appending.
    ///
    /// Validates the header and positions at the end of the file.
    pub fn open_append(
        dir: &Path,
        segment_number: u64,
        durability: DurabilityMode,
    ) -> io::Result<Self> {
        let path = Self::segment_path(dir, segment_number);

        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;

        let mut header_bytes = [0u8; SEGMENT_HEADER_SIZE];
        file.read_exact(&mut header_bytes)?;

        let header = SegmentHeader::from_bytes(&header_bytes).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, "Invalid segment header")
        })?;

        if header.segment_number != segment_number {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Segment number mismatch: expected {}, got {}",
                    segment_number, header.segment_number
                ),
            ));
        }

        let write_position = file.seek(SeekFrom::End(0))?;

        debug!(path = %path.display(), segment_number, write_position, "Reopened log segment");

        Ok(LogSegment {
            file,
            segment_number,
            write_position,
            path,
            closed: false,
            durability,
            max_append_bytes: None,
            sync_calls: 0,
        })
    }

    /// Cap each append call to `max_bytes` (builder pattern).
    pub fn with_max_append_bytes(mut self, max_bytes: u64) -> Self {
        self.max_append_bytes = Some(max_bytes);
        self
    }

    /// Generate segment file path.
    ///
    /// Format: `log-NNNNNN.seg` where NNNNNN is zero-padded segment number.
    pub fn segment_path(dir: &Path, segment_number: u64) -> PathBuf {
        dir.join(format!("log-{:06}.seg", segment_number))
    }

    /// Get segment number.
    pub fn segment_number(&self) -> u64 {
        self.segment_number
    }

    /// Get current segment size in bytes, header included.
    pub fn size(&self) -> u64 {
        self.write_position
    }

    /// Get the number of data bytes after the header.
    ///
    /// This is the offset the next appended byte will land at, and the
    /// base offset callers use to map records of the next batch.
    pub fn data_len(&self) -> u64 {
        self.write_position - SEGMENT_HEADER_SIZE as u64
    }

    /// Get the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the durability mode.
    pub fn durability(&self) -> DurabilityMode {
        self.durability
    }

    /// Number of fsync calls issued by this handle.
    pub fn sync_calls(&self) -> u64 {
        self.sync_calls
    }

    /// Sync segment data to disk.
    pub fn sync(&mut self) -> io::Result<()> {
        self.file.sync_all()?;
        self.sync_calls += 1;
        Ok(())
    }

    /// Mark segment as closed (immutable).
    ///
    /// Syncs data to disk before closing.
    pub fn close(&mut self) -> io::Result<()> {
        if !self.closed {
            self.sync()?;
            self.closed = true;
        }
        Ok(())
    }

    /// Check if segment is closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Read back all data bytes after the header.
    pub fn read_data(&self) -> io::Result<Vec<u8>> {
        let mut bytes = std::fs::read(&self.path)?;
        let header_len = SEGMENT_HEADER_SIZE.min(bytes.len());
        Ok(bytes.split_off(header_len))
    }
}

impl Sink for LogSegment {
    fn append_from(&mut self, source: &mut dyn Read, max_bytes: u64) -> io::Result<u64> {
        if self.closed {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "Cannot write to closed segment",
            ));
        }

        let limit = match self.max_append_bytes {
            Some(cap) => max_bytes.min(cap),
            None => max_bytes,
        };

        let copied = match copy_bounded(source, limit, &mut self.file) {
            Ok(copied) => copied,
            Err(e) => {
                // A failed write may leave part of a chunk in the file.
                if let Ok(position) = self.file.stream_position() {
                    self.write_position = position;
                }
                return Err(e);
            }
        };
        self.write_position += copied;

        if copied > 0 && self.durability == DurabilityMode::Always {
            self.sync()?;
        }

        trace!(
            segment = self.segment_number,
            requested = max_bytes,
            copied,
            position = self.write_position,
            "Segment append"
        );

        Ok(copied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    #[test]
    fn test_header_roundtrip_and_corruption() {
        let header = SegmentHeader::new(7);
        let mut bytes = header.to_bytes();
        assert_eq!(SegmentHeader::from_bytes(&bytes), Some(header));

        bytes[9] ^= 0xFF;
        assert_eq!(SegmentHeader::from_bytes(&bytes), None);
    }

    #[test]
    fn test_header_bad_magic() {
        let mut header = SegmentHeader::new(1);
        header.magic = *b"NOPE";
        assert_eq!(SegmentHeader::from_bytes(&header.to_bytes()), None);
    }

    #[test]
    fn test_create_append_reopen() {
        let dir = TempDir::new().unwrap();

        {
            let mut segment = LogSegment::create(dir.path(), 1, DurabilityMode::Standard).unwrap();
            assert_eq!(segment.size(), SEGMENT_HEADER_SIZE as u64);
            assert_eq!(segment.data_len(), 0);

            let mut source = Cursor::new(b"first-batch".to_vec());
            assert_eq!(segment.append_from(&mut source, 11).unwrap(), 11);
            segment.sync().unwrap();
        }

        let mut segment = LogSegment::open_append(dir.path(), 1, DurabilityMode::Standard).unwrap();
        assert_eq!(segment.data_len(), 11);
        segment.append(b"+second").unwrap();
        assert_eq!(segment.read_data().unwrap(), b"first-batch+second".to_vec());
    }

    #[test]
    fn test_create_existing_fails() {
        let dir = TempDir::new().unwrap();
        LogSegment::create(dir.path(), 1, DurabilityMode::Standard).unwrap();
        let err = LogSegment::create(dir.path(), 1, DurabilityMode::Standard).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
    }

    #[test]
    fn test_open_wrong_segment_number() {
        let dir = TempDir::new().unwrap();
        LogSegment::create(dir.path(), 3, DurabilityMode::Standard).unwrap();
        std::fs::rename(
            LogSegment::segment_path(dir.path(), 3),
            LogSegment::segment_path(dir.path(), 4),
        )
        .unwrap();

        let err = LogSegment::open_append(dir.path(), 4, DurabilityMode::Standard).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_max_append_bytes_caps_each_call() {
        let dir = TempDir::new().unwrap();
        let mut segment = LogSegment::create(dir.path(), 1, DurabilityMode::Standard)
            .unwrap()
            .with_max_append_bytes(4);

        let mut source = Cursor::new(b"0123456789".to_vec());
        assert_eq!(segment.append_from(&mut source, 10).unwrap(), 4);
        assert_eq!(segment.append_from(&mut source, 6).unwrap(), 4);
        assert_eq!(segment.append_from(&mut source, 2).unwrap(), 2);
        assert_eq!(segment.read_data().unwrap(), b"0123456789".to_vec());
    }

    /// Source that yields its data, then fails every read
    struct ResetAfter {
        data: Cursor<Vec<u8>>,
    }

    impl Read for ResetAfter {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.data.read(buf)? {
                0 => Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
                n => Ok(n),
            }
        }
    }

    #[test]
    fn test_source_error_midway_keeps_position_in_sync() {
        let dir = TempDir::new().unwrap();
        let mut segment = LogSegment::create(dir.path(), 1, DurabilityMode::Standard).unwrap();

        let mut source = ResetAfter {
            data: Cursor::new(vec![7u8; 40]),
        };
        assert_eq!(segment.append_from(&mut source, 100).unwrap(), 40);
        let err = segment.append_from(&mut source, 60).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);

        let on_disk = segment.read_data().unwrap();
        assert_eq!(segment.data_len(), on_disk.len() as u64);
        assert_eq!(segment.data_len(), 40);

        let base = segment.data_len();
        segment.append(b"hello").unwrap();
        let data = segment.read_data().unwrap();
        assert_eq!(&data[base as usize..base as usize + 5], b"hello");
        assert_eq!(segment.data_len(), data.len() as u64);
    }

    #[test]
    fn test_always_mode_syncs_each_progressing_append() {
        let dir = TempDir::new().unwrap();
        let mut segment = LogSegment::create(dir.path(), 1, DurabilityMode::Always).unwrap();
        let base = segment.sync_calls();

        let mut source = Cursor::new(b"abc".to_vec());
        segment.append_from(&mut source, 3).unwrap();
        segment.append_from(&mut source, 3).unwrap();

        assert_eq!(segment.sync_calls(), base + 1);
    }

    #[test]
    fn test_closed_segment_rejects_appends() {
        let dir = TempDir::new().unwrap();
        let mut segment = LogSegment::create(dir.path(), 1, DurabilityMode::Standard).unwrap();
        segment.close().unwrap();
        assert!(segment.is_closed());

        let mut source = Cursor::new(b"late".to_vec());
        let err = segment.append_from(&mut source, 4).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }
}
