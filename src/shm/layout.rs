//! Byte layout of the stats region.
//!
//! Mirrors the emulator's producer-side structs. The header occupies the
//! first 64 bytes of the region; thread records form a singly linked list of
//! byte offsets starting at `head`, terminated by offset 0. Offsets handed
//! out by the producer are always 16-byte aligned.

use serde::{Deserialize, Serialize};

/// Fixed header at offset 0 of the mapped region.
///
/// `head` and `size` are updated atomically by the producer while we read;
/// both are only ever accessed through volatile loads.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct RegionHeader {
    pub version: u8,
    pub app_type: u8,
    /// Producer-side size of one thread record. The consumer copies
    /// `min(thread_stats_size, size_of::<ThreadCounters>())` bytes per
    /// record, so old readers tolerate new producers and vice versa.
    pub thread_stats_size: u16,
    pub fex_version: [u8; 48],
    pub head: u32,
    pub size: u32,
    pub reserved: u32,
}

/// One per-thread counter record.
///
/// All counters are monotonically increasing; times are raw cycle-counter
/// ticks. The 16-byte alignment matches the producer and is what allows
/// single-copy-atomic 128-bit loads on aarch64.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(C, align(16))]
pub struct ThreadCounters {
    pub next: u32,
    pub tid: u32,
    pub jit_time: u64,
    pub signal_time: u64,
    pub sigbus_count: u64,
    pub smc_count: u64,
    pub float_fallback_count: u64,
    pub cache_miss_count: u64,
    pub cache_read_lock_time: u64,
    pub cache_write_lock_time: u64,
    pub jit_count: u64,
}

const _: () = assert!(
    std::mem::size_of::<RegionHeader>() == 64,
    "RegionHeader must stay at its published 64-byte layout"
);

const _: () = assert!(
    std::mem::size_of::<ThreadCounters>() % 16 == 0,
    "ThreadCounters size must be a multiple of 16"
);

const _: () = assert!(
    std::mem::align_of::<ThreadCounters>() == 16,
    "ThreadCounters must be 16-byte aligned"
);
