//! The sampling pipeline: raw counters in, computed frames out.
//!
//! - [`differ`] turns absolute per-thread counters into per-period deltas
//!   and handles thread turnover.
//! - [`accumulator`] turns deltas plus elapsed time into load metrics and
//!   histogram entries.
//! - [`live`] drives both on a cadence against a live emulator process and
//!   exposes the [`crate::source::FrameSource`] contract.

pub mod accumulator;
pub mod differ;
pub mod live;

pub use accumulator::{
    ComputedFrame, CumulativeCounts, HistogramEntry, LoadAccumulator, ThreadLoad,
    HISTOGRAM_CAPACITY, MAX_THREAD_LOADS,
};
pub use differ::{ThreadDelta, ThreadDiff, ThreadDiffer, DEFAULT_STALE_TIMEOUT};
pub use live::{LiveSource, SourceState, DEFAULT_SAMPLE_PERIOD, SAMPLE_PERIOD_MAX, SAMPLE_PERIOD_MIN};
