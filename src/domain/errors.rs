//! Structured error types for fexscope
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! Setup failures are fatal at session start; everything transient is
//! handled locally by the sampling pipeline and never surfaces here.

use thiserror::Error;

/// Failures attaching to or remapping the emulator's stats region.
#[derive(Error, Debug)]
pub enum ShmError {
    #[error("failed to open shared memory region {name}: {source}")]
    OpenFailed { name: String, source: nix::Error },

    #[error("shared memory region is {actual} bytes, need at least {min}")]
    RegionTooSmall { actual: usize, min: usize },

    #[error("failed to map shared memory region: {0}")]
    MapFailed(nix::Error),

    #[error("unsupported stats version {found} (this build expects {expected})")]
    VersionMismatch { found: u8, expected: u8 },
}

/// Failures reading or writing a recording file.
#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("not a fexscope recording (bad magic)")]
    BadMagic,

    #[error("unsupported recording format version {found} (this build expects {expected})")]
    UnsupportedVersion { found: u8, expected: u8 },

    #[error("failed to encode frame: {0}")]
    Encode(postcard::Error),

    #[error("failed to decode recording header: {0}")]
    DecodeHeader(postcard::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
