//! Segment write tests
//!
//! End-to-end batches written into file-backed segments:
//! - Consecutive batches land back to back and map to the right records
//! - Page-bounded segments still receive whole batches
//! - A failed batch leaves a prefix past the last good offset
//! - Real-clock deadline is enforced against a stuck sink
//! - A source error partway through keeps sink offsets in step with the bytes

use std::io::{self, Cursor, Read};
use std::time::{Duration, Instant};
use stowage_core::{RecordInfo, StoreKey, WriteSetError};
use stowage_durability::{
    DurabilityMode, LogSegment, Sink, StreamWriteSet, WriteSet, WriteSetConfig, WriterSink,
};
use tempfile::TempDir;

/// Helper to build a batch from record payloads
fn batch(payloads: &[&[u8]]) -> (Vec<u8>, Vec<RecordInfo>) {
    let mut stream = Vec::new();
    let mut records = Vec::new();
    for payload in payloads {
        stream.extend_from_slice(payload);
        records.push(RecordInfo::new(StoreKey::random(), payload.len() as u64));
    }
    (stream, records)
}

#[test]
fn test_consecutive_batches_map_to_records() {
    let temp_dir = TempDir::new().unwrap();
    let mut segment = LogSegment::create(temp_dir.path(), 1, DurabilityMode::Always).unwrap();
    let config = WriteSetConfig::for_testing();

    let (first_stream, first_records) = batch(&[b"alpha", b"beta"]);
    let (second_stream, second_records) = batch(&[b"gamma", b"", b"delta!"]);

    let first_base = segment.data_len();
    let mut first = StreamWriteSet::new(Cursor::new(first_stream), first_records, &config).unwrap();
    assert_eq!(first.write_to(&mut segment).unwrap(), 9);

    let second_base = segment.data_len();
    let mut second =
        StreamWriteSet::new(Cursor::new(second_stream), second_records, &config.clone().with_materialize(true))
            .unwrap();
    assert_eq!(second.write_to(&mut segment).unwrap(), 11);

    let data = segment.read_data().unwrap();
    assert_eq!(data, b"alphabetagammadelta!".to_vec());

    let expected: [&[u8]; 5] = [b"alpha", b"beta", b"gamma", b"", b"delta!"];
    let spans: Vec<_> = first
        .record_spans(first_base)
        .into_iter()
        .chain(second.record_spans(second_base))
        .collect();
    for (span, want) in spans.iter().zip(expected.iter()) {
        assert_eq!(&data[span.offset as usize..span.end() as usize], *want);
    }
}

#[test]
fn test_page_bounded_segment_receives_whole_batch() {
    let temp_dir = TempDir::new().unwrap();
    let mut segment = LogSegment::create(temp_dir.path(), 1, DurabilityMode::Standard)
        .unwrap()
        .with_max_append_bytes(4096);

    let big: Vec<u8> = (0..100_000u32).map(|i| (i % 253) as u8).collect();
    let records = vec![
        RecordInfo::new(StoreKey::random(), 60_000),
        RecordInfo::new(StoreKey::random(), 40_000),
    ];
    let mut write_set =
        StreamWriteSet::new(Cursor::new(big.clone()), records, &WriteSetConfig::default()).unwrap();

    assert_eq!(write_set.write_to(&mut segment).unwrap(), 100_000);
    segment.close().unwrap();
    assert_eq!(segment.read_data().unwrap(), big);
}

#[test]
fn test_failed_batch_leaves_prefix_after_last_good_offset() {
    let temp_dir = TempDir::new().unwrap();
    let mut segment = LogSegment::create(temp_dir.path(), 1, DurabilityMode::Standard).unwrap();
    let config = WriteSetConfig::for_testing().with_max_write_time(Duration::from_millis(20));

    let (good_stream, good_records) = batch(&[b"committed"]);
    let mut good = StreamWriteSet::new(Cursor::new(good_stream), good_records, &config).unwrap();
    good.write_to(&mut segment).unwrap();
    let last_good = segment.data_len();

    // Declares 10 bytes, delivers 4
    let records = vec![RecordInfo::new(StoreKey::random(), 10)];
    let mut bad = StreamWriteSet::new(Cursor::new(b"part".to_vec()), records, &config).unwrap();
    let err = bad.write_to(&mut segment).unwrap_err();
    assert!(err.is_timeout());

    assert_eq!(last_good, 9);
    assert_eq!(segment.data_len(), 13);
    let data = segment.read_data().unwrap();
    assert_eq!(&data[..last_good as usize], b"committed");
}

#[test]
fn test_stuck_sink_bounded_by_real_clock() {
    struct Stuck;

    impl Sink for Stuck {
        fn append_from(&mut self, _: &mut dyn Read, _: u64) -> io::Result<u64> {
            std::thread::sleep(Duration::from_millis(1));
            Ok(0)
        }
    }

    let config = WriteSetConfig::for_testing().with_max_write_time(Duration::from_millis(50));
    let records = vec![RecordInfo::new(StoreKey::random(), 16)];
    let mut write_set = StreamWriteSet::new(Cursor::new(vec![0u8; 16]), records, &config).unwrap();

    let start = Instant::now();
    let err = write_set.write_to(&mut Stuck).unwrap_err();
    let took = start.elapsed();

    assert!(matches!(err, WriteSetError::WriteTimeout { written: 0, .. }));
    assert!(took >= Duration::from_millis(50));
    assert!(took < Duration::from_secs(5), "took {:?}", took);
}

#[test]
fn test_writer_sink_over_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("plain.bin");
    let file = std::fs::File::create(&path).unwrap();
    let mut sink = WriterSink::new(file).with_max_chunk(3);

    let (stream, records) = batch(&[b"one", b"two", b"three"]);
    let mut write_set =
        StreamWriteSet::new(Cursor::new(stream), records, &WriteSetConfig::for_testing()).unwrap();
    assert_eq!(write_set.write_to(&mut sink).unwrap(), 11);
    assert_eq!(sink.appended(), 11);

    drop(sink);
    assert_eq!(std::fs::read(&path).unwrap(), b"onetwothree".to_vec());
}

/// Source that serves `data` then fails every read with `ConnectionReset`
struct ResetAfter {
    data: Cursor<Vec<u8>>,
}

impl ResetAfter {
    fn new(data: &[u8]) -> Self {
        ResetAfter {
            data: Cursor::new(data.to_vec()),
        }
    }
}

impl Read for ResetAfter {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.data.read(buf)? {
            0 => Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset")),
            n => Ok(n),
        }
    }
}

#[test]
fn test_source_error_midway_keeps_segment_offsets() {
    let temp_dir = TempDir::new().unwrap();
    let mut segment = LogSegment::create(temp_dir.path(), 1, DurabilityMode::Standard).unwrap();
    let config = WriteSetConfig::for_testing();

    // Declares 100 bytes, the connection drops after 40
    let records = vec![RecordInfo::new(StoreKey::random(), 100)];
    let mut broken =
        StreamWriteSet::new(ResetAfter::new(&[b'x'; 40]), records, &config).unwrap();
    let err = broken.write_to(&mut segment).unwrap_err();
    match err {
        WriteSetError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::ConnectionReset),
        other => panic!("expected Io error, got {:?}", other),
    }

    let on_disk = segment.read_data().unwrap();
    assert_eq!(on_disk.len(), 40);
    assert_eq!(segment.data_len(), on_disk.len() as u64);

    let base = segment.data_len();
    let (stream, records) = batch(&[b"hello"]);
    let mut next = StreamWriteSet::new(Cursor::new(stream), records, &config).unwrap();
    assert_eq!(next.write_to(&mut segment).unwrap(), 5);

    let data = segment.read_data().unwrap();
    let span = next.record_spans(base)[0];
    assert_eq!(&data[span.offset as usize..span.end() as usize], b"hello");
    assert_eq!(segment.data_len(), data.len() as u64);
}

#[test]
fn test_source_error_midway_keeps_writer_sink_count() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("plain.bin");
    let file = std::fs::File::create(&path).unwrap();
    let mut sink = WriterSink::new(file).with_max_chunk(16);
    let config = WriteSetConfig::for_testing();

    let records = vec![RecordInfo::new(StoreKey::random(), 64)];
    let mut broken =
        StreamWriteSet::new(ResetAfter::new(&[b'y'; 40]), records, &config).unwrap();
    let err = broken.write_to(&mut sink).unwrap_err();
    assert!(matches!(&err, WriteSetError::Io(e) if e.kind() == io::ErrorKind::ConnectionReset));
    assert_eq!(sink.appended(), 40);

    let base = sink.appended();
    let (stream, records) = batch(&[b"hello"]);
    let mut next = StreamWriteSet::new(Cursor::new(stream), records, &config).unwrap();
    assert_eq!(next.write_to(&mut sink).unwrap(), 5);

    drop(sink);
    let data = std::fs::read(&path).unwrap();
    assert_eq!(data.len(), 45);
    let span = next.record_spans(base)[0];
    assert_eq!(&data[span.offset as usize..span.end() as usize], b"hello");
}
