//! Shared domain types
//!
//! These mirror what the emulator publishes about itself (stats version,
//! application flavour) together with the session-level facts every consumer
//! needs: who we attached to, how fast the cycle counter ticks, and how many
//! cores the host has.

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Stats region layout version this build understands. A region advertising
/// any other version is rejected at attach time.
pub const STATS_VERSION: u8 = 2;

/// Flavour of guest application the emulator is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppType {
    Linux32,
    Linux64,
    WinArm64ec,
    WinWow64,
    /// Published value not recognised by this build.
    Unknown,
}

impl AppType {
    #[must_use]
    pub fn from_raw(val: u8) -> Self {
        match val {
            0 => Self::Linux32,
            1 => Self::Linux64,
            2 => Self::WinArm64ec,
            3 => Self::WinWow64,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for AppType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linux32 => write!(f, "Linux32"),
            Self::Linux64 => write!(f, "Linux64"),
            Self::WinArm64ec => write!(f, "arm64ec"),
            Self::WinWow64 => write!(f, "wow64"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Immutable facts about one observation session.
///
/// Built once when a live session attaches, and persisted verbatim in the
/// header of every recording so that replay and export see the same numbers
/// the live view did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub pid: i32,
    pub fex_version: String,
    pub app_type: AppType,
    pub stats_version: u8,
    /// Ticks per second of the hardware cycle counter all time-valued
    /// counters are expressed in.
    pub cycle_counter_frequency: u64,
    pub hardware_concurrency: usize,
    pub recording_start: SystemTime,
}
