//! Domain model for fexscope
//!
//! Core types shared across the sampling pipeline, the recording layer and
//! the TUI, plus structured errors for the failure modes callers are
//! expected to match on.

pub mod errors;
pub mod types;

pub use errors::{RecordingError, ShmError};
pub use types::{AppType, SessionMetadata, STATS_VERSION};
