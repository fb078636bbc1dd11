//! Replay of a decoded recording through the frame-source contract.
//!
//! Frames are re-emitted on the cadence they were captured at, scaled by
//! the playback speed. Consumers poll [`FrameSource::next_frame`] exactly
//! as they would a live source; pause, seek and speed are extra capability
//! on this type only.

use std::collections::VecDeque;
use std::time::Instant;

use super::reader::RecordingReader;
use crate::domain::SessionMetadata;
use crate::sampling::{ComputedFrame, HistogramEntry, HISTOGRAM_CAPACITY};
use crate::source::FrameSource;

pub const SPEED_STEPS: [f64; 7] = [0.25, 0.5, 1.0, 2.0, 4.0, 8.0, 16.0];
const DEFAULT_SPEED_INDEX: usize = 2; // 1.0x

/// Playback over the frames of one recording.
pub struct ReplaySource {
    reader: RecordingReader,
    /// Index of the next frame to emit.
    next_index: usize,
    speed_index: usize,
    paused: bool,
    finished: bool,
    last_emit: Instant,
    /// A seek requested that its target frame be emitted on the next poll,
    /// regardless of pause state or cadence.
    seek_pending: bool,
}

impl ReplaySource {
    #[must_use]
    pub fn new(reader: RecordingReader) -> Self {
        let finished = reader.frame_count() == 0;
        Self {
            reader,
            next_index: 0,
            speed_index: DEFAULT_SPEED_INDEX,
            paused: false,
            finished,
            last_emit: Instant::now(),
            seek_pending: false,
        }
    }

    #[must_use]
    pub fn reader(&self) -> &RecordingReader {
        &self.reader
    }

    #[must_use]
    pub fn speed(&self) -> f64 {
        SPEED_STEPS[self.speed_index]
    }

    pub fn speed_up(&mut self) {
        if self.speed_index + 1 < SPEED_STEPS.len() {
            self.speed_index += 1;
        }
    }

    pub fn speed_down(&mut self) {
        self.speed_index = self.speed_index.saturating_sub(1);
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
        if !self.paused {
            // Resume from now rather than bursting to catch up.
            self.last_emit = Instant::now();
        }
    }

    /// Index of the most recently emitted frame.
    #[must_use]
    pub fn position(&self) -> Option<usize> {
        self.next_index.checked_sub(1)
    }

    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.reader.frame_count()
    }

    /// Jumps to an absolute frame index. The frame at the new position is
    /// emitted by the next poll even while paused.
    pub fn seek_to(&mut self, index: usize) {
        let count = self.reader.frame_count();
        if count == 0 {
            return;
        }
        self.next_index = index.min(count - 1);
        self.finished = false;
        self.seek_pending = true;
    }

    pub fn seek_forward(&mut self) {
        self.seek_to(self.position().map_or(0, |p| p + 1));
    }

    pub fn seek_backward(&mut self) {
        self.seek_to(self.position().map_or(0, |p| p.saturating_sub(1)));
    }

    pub fn seek_start(&mut self) {
        self.seek_to(0);
    }

    pub fn seek_end(&mut self) {
        let count = self.reader.frame_count();
        if count > 0 {
            self.seek_to(count - 1);
        }
    }

    #[must_use]
    pub fn progress_fraction(&self) -> f64 {
        let count = self.reader.frame_count();
        if count <= 1 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            self.position().unwrap_or(0) as f64 / (count - 1) as f64
        }
    }

    /// Rebuilds the histogram ring as it was just after the frame at
    /// `index` was emitted live, by replaying entries from the start of the
    /// recording.
    #[must_use]
    pub fn histogram_through(&self, index: usize) -> VecDeque<HistogramEntry> {
        let mut ring = VecDeque::with_capacity(HISTOGRAM_CAPACITY);
        let end = index.min(self.reader.frame_count().saturating_sub(1));
        for frame in self.reader.frames().iter().take(end + 1) {
            if let Some(entry) = &frame.histogram_entry {
                if ring.len() >= HISTOGRAM_CAPACITY {
                    ring.pop_front();
                }
                ring.push_back(entry.clone());
            }
        }
        ring
    }

    fn emit(&mut self) -> Option<ComputedFrame> {
        let frame = self.reader.frame_at(self.next_index)?.clone();
        self.next_index += 1;
        self.last_emit = Instant::now();
        if self.next_index >= self.reader.frame_count() {
            self.finished = true;
        }
        Some(frame)
    }
}

impl FrameSource for ReplaySource {
    fn next_frame(&mut self) -> Option<ComputedFrame> {
        if self.seek_pending {
            self.seek_pending = false;
            return self.emit();
        }

        if self.paused || self.finished {
            return None;
        }

        let period_ns = self.reader.frame_at(self.next_index)?.sample_period_ns;
        #[allow(clippy::cast_precision_loss)]
        let due_ns = period_ns as f64 / self.speed();
        #[allow(clippy::cast_precision_loss)]
        let elapsed_ns = self.last_emit.elapsed().as_nanos() as f64;

        if elapsed_ns < due_ns {
            return None;
        }

        self.emit()
    }

    fn metadata(&self) -> &SessionMetadata {
        self.reader.metadata()
    }

    fn is_live(&self) -> bool {
        false
    }
}
