//! Recording file parser.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use log::warn;

use super::format::{read_varint, EOF_MARKER, FORMAT_VERSION, MAGIC};
use crate::domain::{RecordingError, SessionMetadata};
use crate::sampling::ComputedFrame;

/// A fully decoded recording.
pub struct RecordingReader {
    metadata: SessionMetadata,
    frames: Vec<ComputedFrame>,
    truncated: bool,
}

impl RecordingReader {
    /// Opens and decodes a recording file.
    ///
    /// Magic, version and metadata must be intact; anything less is a hard
    /// error. The frame stream however may stop at any point: a missing
    /// `WEOF` marker means the recording was cut short, and every frame
    /// decoded before the cut is kept ([`RecordingReader::truncated`] is set
    /// and a warning is logged).
    ///
    /// # Errors
    ///
    /// Returns [`RecordingError::BadMagic`], [`RecordingError::UnsupportedVersion`],
    /// [`RecordingError::DecodeHeader`] or an I/O error for an unreadable
    /// header.
    pub fn open(path: &Path) -> Result<Self, RecordingError> {
        let file = File::open(path)?;
        let mut plain = BufReader::new(file);

        let mut magic = [0u8; 4];
        plain.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(RecordingError::BadMagic);
        }

        let mut version = [0u8; 1];
        plain.read_exact(&mut version)?;
        if version[0] != FORMAT_VERSION {
            return Err(RecordingError::UnsupportedVersion {
                found: version[0],
                expected: FORMAT_VERSION,
            });
        }

        let mut decoder = zstd::Decoder::new(plain)?;

        let header_len = read_varint(&mut decoder)? as usize;
        let mut header = vec![0u8; header_len];
        decoder.read_exact(&mut header)?;
        let metadata: SessionMetadata =
            postcard::from_bytes(&header).map_err(RecordingError::DecodeHeader)?;

        let (frames, truncated) = read_frames(&mut decoder);
        if truncated {
            warn!(
                "recording {} is truncated, loaded {} frame(s)",
                path.display(),
                frames.len()
            );
        }

        Ok(Self { metadata, frames, truncated })
    }

    #[must_use]
    pub fn metadata(&self) -> &SessionMetadata {
        &self.metadata
    }

    #[must_use]
    pub fn frames(&self) -> &[ComputedFrame] {
        &self.frames
    }

    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn frame_at(&self, index: usize) -> Option<&ComputedFrame> {
        self.frames.get(index)
    }

    /// Whether the file ended without its `WEOF` marker.
    #[must_use]
    pub fn truncated(&self) -> bool {
        self.truncated
    }
}

/// Reads length-prefixed frames until the EOF marker (clean) or the first
/// failure of any kind (truncated).
fn read_frames(decoder: &mut impl Read) -> (Vec<ComputedFrame>, bool) {
    let mut frames = Vec::new();

    loop {
        let mut len_buf = [0u8; 4];
        if decoder.read_exact(&mut len_buf).is_err() {
            return (frames, true);
        }
        if len_buf == EOF_MARKER {
            return (frames, false);
        }

        let len = u32::from_le_bytes(len_buf) as usize;
        let mut data = vec![0u8; len];
        if decoder.read_exact(&mut data).is_err() {
            return (frames, true);
        }

        match postcard::from_bytes(&data) {
            Ok(frame) => frames.push(frame),
            Err(_) => return (frames, true),
        }
    }
}
