//! Derived load metrics.
//!
//! Converts one pass worth of per-thread deltas plus the elapsed wall time
//! into the frame consumers see: period totals, overall and per-thread JIT
//! load as a percentage of saturating the host's cores, and the summary
//! entry appended to the scrolling load histogram.

use serde::{Deserialize, Serialize};

use super::differ::{ThreadDelta, ThreadDiff};
use crate::residency::MemSnapshot;

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

/// Capacity of the scrolling load histogram ring.
pub const HISTOGRAM_CAPACITY: usize = 200;

/// Per-thread load entries are capped at this many rows regardless of the
/// host's core count.
pub const MAX_THREAD_LOADS: usize = 32;

const HIGH_SMC_THRESHOLD: u64 = 500;
const HIGH_SIGBUS_THRESHOLD: u64 = 5_000;
const HIGH_SOFTFLOAT_THRESHOLD: u64 = 1_000_000;

/// One thread's share of the sample period.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreadLoad {
    pub tid: u32,
    /// JIT time as a percentage of one core over the period. Raw, may exceed
    /// 100; the display layer clamps.
    pub load_percent: f32,
    /// JIT plus signal-handling cycles; the sort key of the load table.
    pub total_cycles: u64,
}

/// Summary of one frame for the scrolling histogram.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistogramEntry {
    pub load_percent: f32,
    /// More than one core-equivalent of JIT time this period.
    pub high_jit_load: bool,
    /// Code invalidation (SMC) events above threshold this period.
    pub high_invalidation: bool,
    pub high_sigbus: bool,
    pub high_softfloat: bool,
}

/// Session-cumulative event counts, carried on every frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CumulativeCounts {
    pub jit_invocations: u64,
    pub sigbus: u64,
    pub smc: u64,
    pub float_fallback: u64,
    pub cache_miss: u64,
}

impl CumulativeCounts {
    pub fn absorb(&mut self, deltas: &[ThreadDelta]) {
        for d in deltas {
            self.jit_invocations = self.jit_invocations.wrapping_add(d.jit_count);
            self.sigbus = self.sigbus.wrapping_add(d.sigbus_count);
            self.smc = self.smc.wrapping_add(d.smc_count);
            self.float_fallback = self.float_fallback.wrapping_add(d.float_fallback_count);
            self.cache_miss = self.cache_miss.wrapping_add(d.cache_miss_count);
        }
    }
}

/// One atomic unit of observable state, produced at the sample cadence.
///
/// Carries the raw per-thread deltas alongside the derived metrics so a
/// recording loses nothing relative to the live session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComputedFrame {
    /// Wall-clock nanoseconds since the Unix epoch.
    pub timestamp_unix_ns: u64,
    /// Monotonic nanoseconds since the session started.
    pub timestamp_mono_ns: u64,
    pub sample_period_ns: u64,
    pub threads_sampled: usize,

    pub total_jit_time: u64,
    pub total_signal_time: u64,
    pub total_sigbus_count: u64,
    pub total_smc_count: u64,
    pub total_float_fallback_count: u64,
    pub total_cache_miss_count: u64,
    pub total_cache_read_lock_time: u64,
    pub total_cache_write_lock_time: u64,
    pub total_jit_count: u64,

    /// Overall JIT load as a percent of saturating all active cores.
    pub fex_load_percent: f64,
    pub thread_loads: Vec<ThreadLoad>,
    /// `None` until the residency worker produced its first snapshot.
    pub mem: Option<MemSnapshot>,
    /// `None` exactly on the first frame of a session (no prior timestamp).
    pub histogram_entry: Option<HistogramEntry>,
    pub cumulative: CumulativeCounts,
    pub per_thread_deltas: Vec<ThreadDelta>,
}

/// Stateless frame computation; all mutable sampling state stays with the
/// differ and the source.
pub struct LoadAccumulator {
    cycle_freq: f64,
    hardware_concurrency: usize,
}

impl LoadAccumulator {
    #[must_use]
    pub fn new(cycle_freq: u64, hardware_concurrency: usize) -> Self {
        #[allow(clippy::cast_precision_loss)]
        Self { cycle_freq: cycle_freq as f64, hardware_concurrency }
    }

    /// Computes the frame for one pass.
    ///
    /// A `sample_period_ns` of zero marks the first pass of a session: all
    /// derived fields stay zero and no histogram entry is produced.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn compute(
        &self,
        diff: ThreadDiff,
        mem: Option<MemSnapshot>,
        timestamp_unix_ns: u64,
        timestamp_mono_ns: u64,
        sample_period_ns: u64,
        cumulative: CumulativeCounts,
    ) -> ComputedFrame {
        let mut frame = ComputedFrame {
            timestamp_unix_ns,
            timestamp_mono_ns,
            sample_period_ns,
            threads_sampled: diff.threads_sampled,
            mem,
            cumulative,
            ..ComputedFrame::default()
        };

        for delta in &diff.per_thread {
            frame.total_jit_time += delta.jit_time;
            frame.total_signal_time += delta.signal_time;
            frame.total_sigbus_count += delta.sigbus_count;
            frame.total_smc_count += delta.smc_count;
            frame.total_float_fallback_count += delta.float_fallback_count;
            frame.total_cache_miss_count += delta.cache_miss_count;
            frame.total_cache_read_lock_time += delta.cache_read_lock_time;
            frame.total_cache_write_lock_time += delta.cache_write_lock_time;
            frame.total_jit_count += delta.jit_count;
        }

        let max_cycles = self.cycle_freq * (sample_period_ns as f64 / NANOS_PER_SECOND);
        let active_cores = self.hardware_concurrency.min(diff.threads_sampled);

        if max_cycles > 0.0 && active_cores > 0 {
            frame.fex_load_percent = (frame.total_jit_time as f64
                / (max_cycles * active_cores as f64))
                * 100.0;
        }

        frame.thread_loads = self.thread_loads(&diff.per_thread, max_cycles);

        if sample_period_ns > 0 {
            frame.histogram_entry = Some(self.histogram_entry(&frame, max_cycles));
        }

        frame.per_thread_deltas = diff.per_thread;
        frame
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    fn thread_loads(&self, deltas: &[ThreadDelta], max_cycles: f64) -> Vec<ThreadLoad> {
        let mut loads: Vec<ThreadLoad> = deltas
            .iter()
            .map(|d| {
                let load_percent = if max_cycles > 0.0 {
                    (d.jit_time as f64 / max_cycles * 100.0) as f32
                } else {
                    0.0
                };
                ThreadLoad {
                    tid: d.tid,
                    load_percent,
                    total_cycles: d.jit_time + d.signal_time,
                }
            })
            .collect();

        loads.sort_by(|a, b| b.total_cycles.cmp(&a.total_cycles));
        loads.truncate(self.hardware_concurrency.min(MAX_THREAD_LOADS));
        loads
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn histogram_entry(&self, frame: &ComputedFrame, max_cycles: f64) -> HistogramEntry {
        HistogramEntry {
            load_percent: frame.fex_load_percent as f32,
            high_jit_load: frame.total_jit_time >= max_cycles as u64,
            high_invalidation: frame.total_smc_count >= HIGH_SMC_THRESHOLD,
            high_sigbus: frame.total_sigbus_count >= HIGH_SIGBUS_THRESHOLD,
            high_softfloat: frame.total_float_fallback_count >= HIGH_SOFTFLOAT_THRESHOLD,
        }
    }
}
