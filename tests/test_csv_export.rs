//! CSV export over a real recording.

use std::time::SystemTime;

use fexscope::domain::{AppType, SessionMetadata};
use fexscope::export::export_csv;
use fexscope::recording::{RecordingReader, RecordingWriter};
use fexscope::residency::MemSnapshot;
use fexscope::sampling::{ComputedFrame, ThreadLoad};

fn metadata() -> SessionMetadata {
    SessionMetadata {
        pid: 99,
        fex_version: "FEX-2506".to_string(),
        app_type: AppType::WinArm64ec,
        stats_version: 2,
        cycle_counter_frequency: 1_000_000_000,
        hardware_concurrency: 4,
        recording_start: SystemTime::UNIX_EPOCH,
    }
}

#[test]
fn test_export_produces_one_row_per_frame() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("export.wtfr");

    let mut writer = RecordingWriter::create(&path, &metadata()).unwrap();
    for i in 0..3u64 {
        writer
            .write_frame(&ComputedFrame {
                timestamp_unix_ns: 1_000_000_000 * i,
                sample_period_ns: 250_000_000,
                threads_sampled: 1,
                total_jit_time: 100 * i,
                fex_load_percent: 10.0 * i as f64,
                thread_loads: vec![ThreadLoad {
                    tid: 42,
                    load_percent: 5.0,
                    total_cycles: 1000,
                }],
                mem: Some(MemSnapshot { total_anon: 8192, ..MemSnapshot::default() }),
                ..ComputedFrame::default()
            })
            .unwrap();
    }
    writer.finish().unwrap();

    let reader = RecordingReader::open(&path).unwrap();
    let mut out = Vec::new();
    export_csv(&reader, &mut out).unwrap();
    let csv = String::from_utf8(out).unwrap();

    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 4); // header + 3 rows

    assert!(lines[0].starts_with("timestamp_ms,sample_period_ms,threads_sampled,fex_load_percent,"));
    assert!(lines[0].contains(",mem_allocator,mem_unaccounted,thread_0_load,thread_0_cycles"));

    // Second frame: 1000 ms wall clock, 250 ms period, one thread.
    assert!(lines[2].starts_with("1000,250,1,10.0000,100,"));
    assert!(lines[2].contains(",8192,"));
    assert!(lines[2].ends_with(",5.0000,1000"));
}
