//! Per-thread counter differencing.
//!
//! The emulator publishes absolute, ever-growing counters; consumers want
//! per-period deltas. The differ keeps the previous record per thread id,
//! emits `current - previous` on each pass, and evicts threads that have
//! disappeared from the producer's list for longer than the stale timeout.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::shm::ThreadCounters;

pub const DEFAULT_STALE_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-period change of one thread's counters.
///
/// Every field is non-negative: a counter observed below its previous value
/// (thread restart, counter reset) yields a zero delta for that field alone
/// and the stored previous value is resynchronised.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadDelta {
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

/// Output of one differencing pass.
pub struct ThreadDiff {
    pub timestamp: Instant,
    pub per_thread: Vec<ThreadDelta>,
    pub threads_sampled: usize,
}

struct TrackedThread {
    previous: ThreadCounters,
    last_seen: Instant,
}

/// Stateful differ over successive sampling passes.
pub struct ThreadDiffer {
    threads: HashMap<u32, TrackedThread>,
    stale_timeout: Duration,
}

impl ThreadDiffer {
    #[must_use]
    pub fn new() -> Self {
        Self::with_stale_timeout(DEFAULT_STALE_TIMEOUT)
    }

    #[must_use]
    pub fn with_stale_timeout(stale_timeout: Duration) -> Self {
        Self { threads: HashMap::new(), stale_timeout }
    }

    /// Differences one pass worth of raw records against the stored state.
    ///
    /// Threads seen for the first time contribute a zero delta; threads not
    /// seen for longer than the stale timeout are forgotten.
    pub fn diff(&mut self, raw: &[ThreadCounters], now: Instant) -> ThreadDiff {
        let mut per_thread = Vec::with_capacity(raw.len());

        for record in raw {
            let delta = match self.threads.get(&record.tid) {
                Some(tracked) => delta_of(record, &tracked.previous),
                None => ThreadDelta { tid: record.tid, ..ThreadDelta::default() },
            };
            self.threads
                .insert(record.tid, TrackedThread { previous: *record, last_seen: now });
            per_thread.push(delta);
        }

        let stale_timeout = self.stale_timeout;
        self.threads
            .retain(|_, tracked| now.duration_since(tracked.last_seen) < stale_timeout);

        ThreadDiff { timestamp: now, threads_sampled: per_thread.len(), per_thread }
    }

    /// Number of threads currently tracked.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.threads.len()
    }

    #[cfg(test)]
    fn is_tracked(&self, tid: u32) -> bool {
        self.threads.contains_key(&tid)
    }
}

impl Default for ThreadDiffer {
    fn default() -> Self {
        Self::new()
    }
}

fn delta_of(current: &ThreadCounters, previous: &ThreadCounters) -> ThreadDelta {
    ThreadDelta {
        tid: current.tid,
        jit_time: current.jit_time.saturating_sub(previous.jit_time),
        signal_time: current.signal_time.saturating_sub(previous.signal_time),
        sigbus_count: current.sigbus_count.saturating_sub(previous.sigbus_count),
        smc_count: current.smc_count.saturating_sub(previous.smc_count),
        float_fallback_count: current
            .float_fallback_count
            .saturating_sub(previous.float_fallback_count),
        cache_miss_count: current.cache_miss_count.saturating_sub(previous.cache_miss_count),
        cache_read_lock_time: current
            .cache_read_lock_time
            .saturating_sub(previous.cache_read_lock_time),
        cache_write_lock_time: current
            .cache_write_lock_time
            .saturating_sub(previous.cache_write_lock_time),
        jit_count: current.jit_count.saturating_sub(previous.jit_count),
    }
}
