//! On-disk session recordings.
//!
//! ## File layout (little-endian throughout)
//!
//! ```text
//! "WTFR" (4) | format version (1) |  <- plaintext
//! +--------------- zstd stream (level 3) ----------------+
//! | varint len | SessionMetadata (postcard)              |
//! | { frame len (u32) | ComputedFrame (postcard) } ...   |
//! | "WEOF" (4)                                           |
//! +------------------------------------------------------+
//! ```
//!
//! Frames carry their raw per-thread deltas, so a recording is a lossless
//! capture of the live session. A file that ends without the `WEOF` marker
//! (crash, interrupted copy) is still readable: every frame decoded before
//! the truncation point is kept and the truncation is reported as a
//! warning, not an error.

pub mod format;
pub mod reader;
pub mod replay;
pub mod writer;

pub use reader::RecordingReader;
pub use replay::ReplaySource;
pub use writer::RecordingWriter;
