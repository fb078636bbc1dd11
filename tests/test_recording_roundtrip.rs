//! Recording round-trip and truncation tolerance.

use std::io::Write;
use std::time::SystemTime;

use fexscope::domain::{AppType, RecordingError, SessionMetadata};
use fexscope::recording::format::{write_varint, COMPRESSION_LEVEL, FORMAT_VERSION, MAGIC};
use fexscope::recording::{RecordingReader, RecordingWriter};
use fexscope::residency::MemSnapshot;
use fexscope::sampling::{ComputedFrame, HistogramEntry, ThreadDelta, ThreadLoad};

fn metadata() -> SessionMetadata {
    SessionMetadata {
        pid: 4242,
        fex_version: "FEX-2506".to_string(),
        app_type: AppType::Linux64,
        stats_version: 2,
        cycle_counter_frequency: 1_000_000_000,
        hardware_concurrency: 8,
        recording_start: SystemTime::UNIX_EPOCH,
    }
}

fn frame(index: u64) -> ComputedFrame {
    ComputedFrame {
        timestamp_unix_ns: 1_700_000_000_000_000_000 + index * 100_000_000,
        timestamp_mono_ns: index * 100_000_000,
        sample_period_ns: if index == 0 { 0 } else { 100_000_000 },
        threads_sampled: 2,
        total_jit_time: 1000 * index,
        total_signal_time: 10 * index,
        total_jit_count: 40 + index, // strictly increasing
        fex_load_percent: 12.5,
        thread_loads: vec![
            ThreadLoad { tid: 1, load_percent: 8.0, total_cycles: 800 * index },
            ThreadLoad { tid: 2, load_percent: 4.5, total_cycles: 200 * index },
        ],
        mem: Some(MemSnapshot { total_anon: 4096 + index, jit_code: 2048, ..MemSnapshot::default() }),
        histogram_entry: (index > 0).then(|| HistogramEntry {
            load_percent: 12.5,
            high_jit_load: false,
            high_invalidation: false,
            high_sigbus: false,
            high_softfloat: false,
        }),
        per_thread_deltas: vec![
            ThreadDelta { tid: 1, jit_time: 800 * index, ..ThreadDelta::default() },
            ThreadDelta { tid: 2, jit_time: 200 * index, ..ThreadDelta::default() },
        ],
        ..ComputedFrame::default()
    }
}

#[test]
fn test_round_trip_preserves_every_frame() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.wtfr");

    let frames: Vec<ComputedFrame> = (0..10).map(frame).collect();
    let meta = metadata();

    let mut writer = RecordingWriter::create(&path, &meta).unwrap();
    for f in &frames {
        writer.write_frame(f).unwrap();
    }
    writer.finish().unwrap();

    let reader = RecordingReader::open(&path).unwrap();
    assert!(!reader.truncated());
    assert_eq!(reader.frame_count(), 10);

    assert_eq!(reader.metadata().pid, meta.pid);
    assert_eq!(reader.metadata().fex_version, meta.fex_version);
    assert_eq!(reader.metadata().app_type, meta.app_type);
    assert_eq!(reader.metadata().cycle_counter_frequency, meta.cycle_counter_frequency);
    assert_eq!(reader.metadata().hardware_concurrency, meta.hardware_concurrency);

    for (read, written) in reader.frames().iter().zip(&frames) {
        assert_eq!(read, written);
    }

    // Recorded timestamps are non-decreasing.
    for pair in reader.frames().windows(2) {
        assert!(pair[1].timestamp_unix_ns >= pair[0].timestamp_unix_ns);
        assert!(pair[1].timestamp_mono_ns >= pair[0].timestamp_mono_ns);
    }
}

#[test]
fn test_empty_recording_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.wtfr");

    let writer = RecordingWriter::create(&path, &metadata()).unwrap();
    writer.finish().unwrap();

    let reader = RecordingReader::open(&path).unwrap();
    assert_eq!(reader.frame_count(), 0);
    assert!(!reader.truncated());
    assert!(reader.frame_at(0).is_none());
}

#[test]
fn test_truncated_mid_frame_keeps_decoded_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cut.wtfr");

    // Build the file by hand so the cut lands exactly mid-way through the
    // sixth frame: five complete frames, then a length prefix with only half
    // its payload, and no EOF marker.
    let file = std::fs::File::create(&path).unwrap();
    let mut plain = std::io::BufWriter::new(file);
    plain.write_all(&MAGIC).unwrap();
    plain.write_all(&[FORMAT_VERSION]).unwrap();

    let mut encoder = zstd::Encoder::new(plain, COMPRESSION_LEVEL).unwrap();
    let header = postcard::to_stdvec(&metadata()).unwrap();
    write_varint(&mut encoder, header.len() as u32).unwrap();
    encoder.write_all(&header).unwrap();

    for i in 0..5 {
        let bytes = postcard::to_stdvec(&frame(i)).unwrap();
        encoder.write_all(&(bytes.len() as u32).to_le_bytes()).unwrap();
        encoder.write_all(&bytes).unwrap();
    }
    let sixth = postcard::to_stdvec(&frame(5)).unwrap();
    encoder.write_all(&(sixth.len() as u32).to_le_bytes()).unwrap();
    encoder.write_all(&sixth[..sixth.len() / 2]).unwrap();
    encoder.finish().unwrap().flush().unwrap();

    let reader = RecordingReader::open(&path).unwrap();
    assert!(reader.truncated());
    assert_eq!(reader.frame_count(), 5);
    for (i, read) in reader.frames().iter().enumerate() {
        assert_eq!(*read, frame(i as u64));
    }
}

#[test]
fn test_bad_magic_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bogus.wtfr");
    std::fs::write(&path, b"NOPE and some trailing bytes").unwrap();

    let err = RecordingReader::open(&path).map(|_| ()).unwrap_err();
    assert!(matches!(err, RecordingError::BadMagic), "expected BadMagic, got {err:?}");
}

#[test]
fn test_unsupported_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.wtfr");
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&MAGIC);
    bytes.push(FORMAT_VERSION + 1);
    std::fs::write(&path, &bytes).unwrap();

    let err = RecordingReader::open(&path).map(|_| ()).unwrap_err();
    match err {
        RecordingError::UnsupportedVersion { found, expected } => {
            assert_eq!(found, FORMAT_VERSION + 1);
            assert_eq!(expected, FORMAT_VERSION);
        }
        other => panic!("expected UnsupportedVersion, got {other:?}"),
    }
}
