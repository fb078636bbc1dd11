//! Shared-memory stats region access
//!
//! The emulator publishes per-thread JIT counters in a POSIX shared-memory
//! region named `fex-<pid>-stats`. This module owns the byte layout of that
//! region ([`layout`]) and the read-only, remap-tolerant view over it
//! ([`region`]). Nothing outside this module touches the mapping directly;
//! every read produces an owned copy.

pub mod layout;
pub mod region;

pub use layout::{RegionHeader, ThreadCounters};
pub use region::{HeaderSnapshot, StatsRegion, ThreadWalk};

/// Shared-memory object name for a given emulator pid, as passed to
/// `shm_open` (the file appears under `/dev/shm` without the leading slash).
#[must_use]
pub fn region_name(pid: i32) -> String {
    format!("/fex-{pid}-stats")
}

/// Filesystem path of the region, used for presence probes.
#[must_use]
pub fn region_path(pid: i32) -> std::path::PathBuf {
    std::path::PathBuf::from(format!("/dev/shm/fex-{pid}-stats"))
}
