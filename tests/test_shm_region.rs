//! Stats-region protocol tests against a real shared-memory object.
//!
//! Each test publishes a synthetic region under a unique fake pid, attaches
//! a [`StatsRegion`] to it, and exercises the walk/resize/truncation
//! behaviour the live sampler depends on.

use std::os::fd::OwnedFd;
use std::os::unix::fs::FileExt;

use nix::fcntl::OFlag;
use nix::sys::mman::{shm_open, shm_unlink};
use nix::sys::stat::Mode;
use nix::unistd::ftruncate;

use fexscope::domain::{ShmError, STATS_VERSION};
use fexscope::shm::{region_name, StatsRegion};

const HEADER_SIZE: usize = 64;
const RECORD_SIZE: u16 = 80;

/// A producer-side stats region we control byte by byte.
struct FakeRegion {
    pid: i32,
    file: std::fs::File,
}

impl FakeRegion {
    fn create(pid: i32, len: u64) -> Self {
        let name = region_name(pid);
        // Remove leftovers from a crashed previous run.
        let _ = shm_unlink(name.as_str());
        let fd: OwnedFd = shm_open(
            name.as_str(),
            OFlag::O_CREAT | OFlag::O_RDWR | OFlag::O_EXCL,
            Mode::from_bits_truncate(0o600),
        )
        .expect("shm_open failed");
        ftruncate(&fd, len as i64).expect("ftruncate failed");
        Self { pid, file: std::fs::File::from(fd) }
    }

    fn grow(&self, len: u64) {
        self.file.set_len(len).expect("grow failed");
    }

    fn write_header(&self, version: u8, app_type: u8, record_size: u16, head: u32, size: u32) {
        let mut header = [0u8; HEADER_SIZE];
        header[0] = version;
        header[1] = app_type;
        header[2..4].copy_from_slice(&record_size.to_le_bytes());
        let fex = b"FEX-2506";
        header[4..4 + fex.len()].copy_from_slice(fex);
        header[52..56].copy_from_slice(&head.to_le_bytes());
        header[56..60].copy_from_slice(&size.to_le_bytes());
        self.file.write_all_at(&header, 0).expect("header write failed");
    }

    fn write_record(&self, offset: u64, next: u32, tid: u32, jit_time: u64, signal_time: u64) {
        let mut record = [0u8; RECORD_SIZE as usize];
        record[0..4].copy_from_slice(&next.to_le_bytes());
        record[4..8].copy_from_slice(&tid.to_le_bytes());
        record[8..16].copy_from_slice(&jit_time.to_le_bytes());
        record[16..24].copy_from_slice(&signal_time.to_le_bytes());
        self.file.write_all_at(&record, offset).expect("record write failed");
    }
}

impl Drop for FakeRegion {
    fn drop(&mut self) {
        let _ = shm_unlink(region_name(self.pid).as_str());
    }
}

#[test]
fn test_header_snapshot_fields() {
    let region = FakeRegion::create(9_100_001, 4096);
    region.write_header(STATS_VERSION, 1, RECORD_SIZE, 0, 4096);

    let reader = StatsRegion::open(region.pid).unwrap();
    let header = reader.header();
    assert_eq!(header.version, STATS_VERSION);
    assert_eq!(header.fex_version, "FEX-2506");
    assert_eq!(header.thread_stats_size, RECORD_SIZE);
    assert_eq!(header.head, 0);
    assert_eq!(header.size, 4096);
    assert!(header.ensure_supported().is_ok());
}

#[test]
fn test_version_mismatch_is_fatal() {
    let region = FakeRegion::create(9_100_002, 4096);
    region.write_header(STATS_VERSION + 5, 1, RECORD_SIZE, 0, 4096);

    let reader = StatsRegion::open(region.pid).unwrap();
    let err = reader.header().ensure_supported().unwrap_err();
    assert!(matches!(err, ShmError::VersionMismatch { .. }));
}

#[test]
fn test_missing_region_fails_to_open() {
    let err = StatsRegion::open(9_100_003).map(|_| ()).unwrap_err();
    assert!(matches!(err, ShmError::OpenFailed { .. }));
}

#[test]
fn test_undersized_region_is_rejected() {
    let region = FakeRegion::create(9_100_004, 16);
    let err = StatsRegion::open(region.pid).map(|_| ()).unwrap_err();
    assert!(matches!(err, ShmError::RegionTooSmall { actual: 16, .. }));
}

#[test]
fn test_walk_follows_the_record_list() {
    let region = FakeRegion::create(9_100_005, 4096);
    region.write_header(STATS_VERSION, 1, RECORD_SIZE, 64, 4096);
    region.write_record(64, 160, 1001, 111, 11);
    region.write_record(160, 0, 1002, 222, 22);

    let reader = StatsRegion::open(region.pid).unwrap();
    let walk = reader.walk();
    assert!(!walk.truncated);
    assert_eq!(walk.records.len(), 2);
    assert_eq!(walk.records[0].tid, 1001);
    assert_eq!(walk.records[0].jit_time, 111);
    assert_eq!(walk.records[1].tid, 1002);
    assert_eq!(walk.records[1].signal_time, 22);
}

#[test]
fn test_out_of_range_next_offset_truncates_without_fault() {
    let region = FakeRegion::create(9_100_006, 4096);
    region.write_header(STATS_VERSION, 1, RECORD_SIZE, 64, 4096);
    region.write_record(64, 8000, 1001, 111, 11);

    let reader = StatsRegion::open(region.pid).unwrap();
    let walk = reader.walk();
    assert!(walk.truncated);
    assert_eq!(walk.records.len(), 1);
    assert_eq!(walk.records[0].tid, 1001);
}

#[test]
fn test_cyclic_record_list_terminates() {
    let region = FakeRegion::create(9_100_007, 4096);
    region.write_header(STATS_VERSION, 1, RECORD_SIZE, 64, 4096);
    // Record points at itself.
    region.write_record(64, 64, 1001, 111, 11);

    let reader = StatsRegion::open(region.pid).unwrap();
    let walk = reader.walk();
    assert!(walk.truncated);
    assert!(!walk.records.is_empty());
}

#[test]
fn test_region_growth_is_observed_after_resize_check() {
    let region = FakeRegion::create(9_100_008, 4096);
    region.write_header(STATS_VERSION, 1, RECORD_SIZE, 64, 4096);
    region.write_record(64, 0, 1001, 111, 11);

    let mut reader = StatsRegion::open(region.pid).unwrap();
    assert_eq!(reader.walk().records.len(), 1);

    // The producer grows the region and links a record beyond the old size.
    region.grow(8192);
    region.write_record(4992, 0, 2002, 999, 99);
    region.write_record(64, 4992, 1001, 112, 11);
    region.write_header(STATS_VERSION, 1, RECORD_SIZE, 64, 8192);

    // Before the resize check, the high offset does not fit the mapping.
    let walk = reader.walk();
    assert!(walk.truncated);
    assert_eq!(walk.records.len(), 1);

    reader.check_resize().unwrap();
    assert_eq!(reader.mapped_len(), 8192);

    let walk = reader.walk();
    assert!(!walk.truncated);
    assert_eq!(walk.records.len(), 2);
    assert_eq!(walk.records[1].tid, 2002);
    assert_eq!(walk.records[1].jit_time, 999);
}

#[test]
fn test_producer_record_size_limits_the_copy() {
    let region = FakeRegion::create(9_100_009, 4096);
    // Producer claims 16-byte records: next, tid and jit_time only.
    region.write_header(STATS_VERSION, 1, 16, 64, 4096);
    region.write_record(64, 0, 1001, 77, 55);

    let reader = StatsRegion::open(region.pid).unwrap();
    let walk = reader.walk();
    assert_eq!(walk.records.len(), 1);
    assert_eq!(walk.records[0].jit_time, 77);
    // Beyond the producer's record size: zero-filled, never read.
    assert_eq!(walk.records[0].signal_time, 0);
}

#[test]
fn test_zero_record_size_yields_truncated_empty_walk() {
    let region = FakeRegion::create(9_100_010, 4096);
    region.write_header(STATS_VERSION, 1, 0, 64, 4096);

    let reader = StatsRegion::open(region.pid).unwrap();
    let walk = reader.walk();
    assert!(walk.truncated);
    assert!(walk.records.is_empty());
}
