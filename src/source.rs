//! The frame-source contract.
//!
//! Everything downstream of the sampling pipeline (the TUI, exporters)
//! consumes frames through this trait and treats a live session and a
//! replayed recording identically. Playback-only operations (pause, seek,
//! speed) are deliberately not part of the contract; they live on the
//! replay type alone.

use crate::domain::SessionMetadata;
use crate::sampling::ComputedFrame;

pub trait FrameSource {
    /// Returns the next frame if one is due, without blocking.
    ///
    /// `None` means "nothing yet" while the source is running, and "nothing
    /// ever again" once a live target has exited or a replay has finished;
    /// callers poll on their own cadence and decide when to stop.
    fn next_frame(&mut self) -> Option<ComputedFrame>;

    fn metadata(&self) -> &SessionMetadata;

    fn is_live(&self) -> bool;
}
