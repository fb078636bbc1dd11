//! The live sampling loop.
//!
//! [`LiveSource`] owns every moving part of a live session: the mapped
//! stats region, the liveness watcher, the differ, the accumulator, the
//! residency worker and the optional recording sink. One call to
//! [`FrameSource::next_frame`] performs at most one sampling pass and holds
//! no locks at return, so the UI can poll it from its input loop at a much
//! finer cadence than the sample period.

use std::collections::VecDeque;
use std::path::Path;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use log::{info, warn};

use super::accumulator::{
    ComputedFrame, CumulativeCounts, HistogramEntry, LoadAccumulator, HISTOGRAM_CAPACITY,
};
use super::differ::ThreadDiffer;
use crate::domain::SessionMetadata;
use crate::liveness::ProcessWatcher;
use crate::platform::{cycle_counter_frequency, hardware_concurrency, store_memory_barrier};
use crate::recording::RecordingWriter;
use crate::residency::{MemSnapshot, ResidencyWorker};
use crate::shm::StatsRegion;
use crate::source::FrameSource;

pub const SAMPLE_PERIOD_MIN: Duration = Duration::from_millis(10);
pub const SAMPLE_PERIOD_MAX: Duration = Duration::from_millis(1000);
pub const DEFAULT_SAMPLE_PERIOD: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Running,
    TargetExited,
    Error,
}

/// Live sampling session over one emulator process.
pub struct LiveSource {
    region: StatsRegion,
    watcher: ProcessWatcher,
    differ: ThreadDiffer,
    accumulator: LoadAccumulator,
    residency: ResidencyWorker,
    writer: Option<RecordingWriter>,

    metadata: SessionMetadata,
    sample_period: Duration,
    state: SourceState,

    session_start: Instant,
    last_sample: Option<Instant>,
    latest_mem: Option<MemSnapshot>,
    cumulative: CumulativeCounts,
    histogram: VecDeque<HistogramEntry>,
}

impl LiveSource {
    /// Attaches to a running emulator process.
    ///
    /// The sample period is clamped to the supported 10–1000 ms range. When
    /// `record_path` is given, every produced frame is also encoded to the
    /// recording sink.
    ///
    /// # Errors
    ///
    /// Fails fast when the stats region is missing or malformed, when its
    /// version does not match this build, or when the recording file cannot
    /// be created.
    pub fn attach(
        pid: i32,
        sample_period: Duration,
        record_path: Option<&Path>,
    ) -> anyhow::Result<Self> {
        let sample_period = sample_period.clamp(SAMPLE_PERIOD_MIN, SAMPLE_PERIOD_MAX);

        let region = StatsRegion::open(pid)
            .with_context(|| format!("cannot attach to pid {pid}"))?;
        let header = region.header();
        header.ensure_supported()?;

        let metadata = SessionMetadata {
            pid,
            fex_version: header.fex_version.clone(),
            app_type: header.app_type,
            stats_version: header.version,
            cycle_counter_frequency: cycle_counter_frequency(),
            hardware_concurrency: hardware_concurrency(),
            recording_start: SystemTime::now(),
        };

        let residency = ResidencyWorker::spawn(pid, sample_period)?;
        let accumulator =
            LoadAccumulator::new(metadata.cycle_counter_frequency, metadata.hardware_concurrency);

        let writer = match record_path {
            Some(path) => {
                info!("recording to {}", path.display());
                Some(
                    RecordingWriter::create(path, &metadata)
                        .with_context(|| format!("cannot record to {}", path.display()))?,
                )
            }
            None => None,
        };

        info!(
            "attached to pid {pid} ({}, FEX {})",
            metadata.app_type, metadata.fex_version
        );

        Ok(Self {
            region,
            watcher: ProcessWatcher::new(pid),
            differ: ThreadDiffer::new(),
            accumulator,
            residency,
            writer,
            metadata,
            sample_period,
            state: SourceState::Running,
            session_start: Instant::now(),
            last_sample: None,
            latest_mem: None,
            cumulative: CumulativeCounts::default(),
            histogram: VecDeque::with_capacity(HISTOGRAM_CAPACITY),
        })
    }

    #[must_use]
    pub fn state(&self) -> SourceState {
        self.state
    }

    #[must_use]
    pub fn sample_period(&self) -> Duration {
        self.sample_period
    }

    /// Scrolling load histogram over the most recent frames.
    #[must_use]
    pub fn histogram(&self) -> &VecDeque<HistogramEntry> {
        &self.histogram
    }

    /// Ends the session cleanly: drains the recording sink and stops the
    /// residency worker.
    pub fn shutdown(&mut self) {
        self.finish_recording();
        self.residency.shutdown();
    }

    fn finish_recording(&mut self) {
        if let Some(writer) = self.writer.take() {
            match writer.finish() {
                Ok(()) => info!("recording finished"),
                Err(err) => warn!("failed to finish recording: {err}"),
            }
        }
    }

    fn take_sample(&mut self, now: Instant) -> ComputedFrame {
        // Make the producer's counter stores observable before we read.
        store_memory_barrier();

        if let Err(err) = self.region.check_resize() {
            warn!("stats region remap failed: {err}");
            self.state = SourceState::Error;
            self.finish_recording();
            return ComputedFrame::default();
        }

        let walk = self.region.walk();
        if walk.truncated {
            warn!("thread list truncated");
        }

        let diff = self.differ.diff(&walk.records, now);
        self.cumulative.absorb(&diff.per_thread);

        if let Some(snap) = self.residency.poll_latest() {
            self.latest_mem = Some(snap);
        }

        let sample_period_ns = match self.last_sample {
            Some(prev) => duration_ns(now.duration_since(prev)),
            None => 0, // first pass
        };

        let timestamp_unix_ns =
            duration_ns(SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default());
        let timestamp_mono_ns = duration_ns(now.duration_since(self.session_start));

        let frame = self.accumulator.compute(
            diff,
            self.latest_mem.clone(),
            timestamp_unix_ns,
            timestamp_mono_ns,
            sample_period_ns,
            self.cumulative,
        );

        if let Some(entry) = &frame.histogram_entry {
            if self.histogram.len() >= HISTOGRAM_CAPACITY {
                self.histogram.pop_front();
            }
            self.histogram.push_back(entry.clone());
        }

        let write_failed = match &mut self.writer {
            Some(writer) => match writer.write_frame(&frame) {
                Ok(()) => false,
                Err(err) => {
                    warn!("recording write failed, recording stopped: {err}");
                    true
                }
            },
            None => false,
        };
        if write_failed {
            self.writer = None;
        }

        frame
    }
}

impl FrameSource for LiveSource {
    fn next_frame(&mut self) -> Option<ComputedFrame> {
        if self.state != SourceState::Running {
            return None;
        }

        if self.watcher.has_exited() {
            info!("target pid {} exited", self.metadata.pid);
            self.state = SourceState::TargetExited;
            self.finish_recording();
            return None;
        }

        let now = Instant::now();
        if let Some(prev) = self.last_sample {
            if now.duration_since(prev) < self.sample_period {
                return None; // not due yet
            }
        }

        let frame = self.take_sample(now);
        if self.state == SourceState::Error {
            return None;
        }

        self.last_sample = Some(now);
        Some(frame)
    }

    fn metadata(&self) -> &SessionMetadata {
        &self.metadata
    }

    fn is_live(&self) -> bool {
        true
    }
}

impl Drop for LiveSource {
    fn drop(&mut self) {
        self.finish_recording();
    }
}

fn duration_ns(d: Duration) -> u64 {
    #[allow(clippy::cast_possible_truncation)] // u64 nanoseconds cover 584 years
    {
        d.as_nanos() as u64
    }
}
