//! Replay playback semantics: ordering, pause, seeks, speed, histogram
//! reconstruction.

use std::time::{Duration, Instant, SystemTime};

use fexscope::domain::{AppType, SessionMetadata};
use fexscope::recording::{RecordingReader, RecordingWriter, ReplaySource};
use fexscope::sampling::{ComputedFrame, HistogramEntry};
use fexscope::source::FrameSource;

fn metadata() -> SessionMetadata {
    SessionMetadata {
        pid: 7,
        fex_version: "FEX-2506".to_string(),
        app_type: AppType::Linux64,
        stats_version: 2,
        cycle_counter_frequency: 1_000_000_000,
        hardware_concurrency: 4,
        recording_start: SystemTime::UNIX_EPOCH,
    }
}

/// Frames with a zero period are due on every poll, which makes playback
/// effectively instantaneous for ordering tests.
fn instant_frame(index: u64) -> ComputedFrame {
    ComputedFrame {
        timestamp_mono_ns: index * 1_000_000,
        total_jit_time: index,
        histogram_entry: (index > 0).then(|| HistogramEntry {
            load_percent: index as f32,
            ..HistogramEntry::default()
        }),
        ..ComputedFrame::default()
    }
}

fn timed_frame(index: u64, period_ns: u64) -> ComputedFrame {
    ComputedFrame { sample_period_ns: period_ns, ..instant_frame(index) }
}

fn write_recording(frames: &[ComputedFrame]) -> ReplaySource {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("replay.wtfr");
    let mut writer = RecordingWriter::create(&path, &metadata()).unwrap();
    for f in frames {
        writer.write_frame(f).unwrap();
    }
    writer.finish().unwrap();
    ReplaySource::new(RecordingReader::open(&path).unwrap())
}

fn drain(source: &mut ReplaySource) -> Vec<ComputedFrame> {
    let mut out = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(5);
    while !source.is_finished() && Instant::now() < deadline {
        if let Some(frame) = source.next_frame() {
            out.push(frame);
        }
    }
    out
}

#[test]
fn test_full_run_emits_every_frame_in_order() {
    let frames: Vec<ComputedFrame> = (0..10).map(instant_frame).collect();
    let mut source = write_recording(&frames);

    let emitted = drain(&mut source);
    assert_eq!(emitted.len(), 10);
    for (e, f) in emitted.iter().zip(&frames) {
        assert_eq!(e, f);
    }
    assert!(source.is_finished());
    assert!(source.next_frame().is_none());
}

#[test]
fn test_paused_source_emits_nothing() {
    let frames: Vec<ComputedFrame> = (0..3).map(instant_frame).collect();
    let mut source = write_recording(&frames);

    source.toggle_pause();
    assert!(source.is_paused());
    assert!(source.next_frame().is_none());

    source.toggle_pause();
    assert!(source.next_frame().is_some());
}

#[test]
fn test_seek_emits_target_frame_immediately_even_when_paused() {
    let frames: Vec<ComputedFrame> = (0..10).map(|i| timed_frame(i, 60_000_000_000)).collect();
    let mut source = write_recording(&frames);

    source.toggle_pause();
    source.seek_to(4);
    let emitted = source.next_frame().expect("seek target must be emitted");
    assert_eq!(emitted, frames[4]);
    assert_eq!(source.position(), Some(4));

    // Still paused: nothing further until resumed.
    assert!(source.next_frame().is_none());
}

#[test]
fn test_seek_is_clamped_to_last_frame() {
    let frames: Vec<ComputedFrame> = (0..5).map(instant_frame).collect();
    let mut source = write_recording(&frames);

    source.seek_to(100);
    let emitted = source.next_frame().unwrap();
    assert_eq!(emitted, frames[4]);
    assert!(source.is_finished());
}

#[test]
fn test_step_seeks_move_one_frame() {
    let frames: Vec<ComputedFrame> = (0..5).map(|i| timed_frame(i, 60_000_000_000)).collect();
    let mut source = write_recording(&frames);

    source.seek_forward();
    assert_eq!(source.next_frame().unwrap(), frames[0]);
    source.seek_forward();
    assert_eq!(source.next_frame().unwrap(), frames[1]);
    source.seek_backward();
    assert_eq!(source.next_frame().unwrap(), frames[0]);
    source.seek_end();
    assert_eq!(source.next_frame().unwrap(), frames[4]);
    source.seek_start();
    assert_eq!(source.next_frame().unwrap(), frames[0]);
}

#[test]
fn test_seek_back_from_finished_resumes() {
    let frames: Vec<ComputedFrame> = (0..3).map(instant_frame).collect();
    let mut source = write_recording(&frames);

    drain(&mut source);
    assert!(source.is_finished());

    source.seek_to(1);
    assert!(!source.is_finished());
    assert_eq!(source.next_frame().unwrap(), frames[1]);
}

#[test]
fn test_histogram_rebuild_matches_live_accumulation() {
    let frames: Vec<ComputedFrame> = (0..10).map(instant_frame).collect();
    let mut source = write_recording(&frames);

    // Live accumulation: push each frame's entry as it is emitted.
    let mut live_ring: Vec<Vec<HistogramEntry>> = Vec::new();
    let mut ring: Vec<HistogramEntry> = Vec::new();
    for frame in drain(&mut source) {
        if let Some(entry) = &frame.histogram_entry {
            ring.push(entry.clone());
        }
        live_ring.push(ring.clone());
    }

    for (k, expected) in live_ring.iter().enumerate() {
        let rebuilt: Vec<HistogramEntry> =
            source.histogram_through(k).into_iter().collect();
        assert_eq!(&rebuilt, expected, "histogram mismatch after frame {k}");
    }
}

#[test]
fn test_speed_steps_clamp_at_both_ends() {
    let frames: Vec<ComputedFrame> = (0..2).map(instant_frame).collect();
    let mut source = write_recording(&frames);

    assert!((source.speed() - 1.0).abs() < f64::EPSILON);
    for _ in 0..10 {
        source.speed_up();
    }
    assert!((source.speed() - 16.0).abs() < f64::EPSILON);
    for _ in 0..10 {
        source.speed_down();
    }
    assert!((source.speed() - 0.25).abs() < f64::EPSILON);
}

#[test]
fn test_speed_divides_emission_cadence() {
    // 5 frames of 40 ms at 2x: the run needs at least 4 * 20 ms after the
    // first emission, and far less than the 1x total of 200 ms.
    let frames: Vec<ComputedFrame> = (0..5).map(|i| timed_frame(i, 40_000_000)).collect();
    let mut source = write_recording(&frames);
    source.speed_up(); // 2.0x

    let start = Instant::now();
    let emitted = drain(&mut source);
    let elapsed = start.elapsed();

    assert_eq!(emitted.len(), 5);
    assert!(elapsed >= Duration::from_millis(80), "ran too fast: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(1000), "ran too slow: {elapsed:?}");
}

#[test]
fn test_empty_recording_is_finished_from_the_start() {
    let mut source = write_recording(&[]);
    assert!(source.is_finished());
    assert!(source.next_frame().is_none());
    assert_eq!(source.position(), None);
}
