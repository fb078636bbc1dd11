//! Streaming recording writer.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::format::{write_varint, COMPRESSION_LEVEL, EOF_MARKER, FORMAT_VERSION, MAGIC};
use crate::domain::{RecordingError, SessionMetadata};
use crate::sampling::ComputedFrame;

/// Appends frames to a recording file as they are produced.
///
/// Dropping the writer without calling [`RecordingWriter::finish`] leaves a
/// truncated file; the reader accepts those, so a crashed session still
/// yields a usable recording.
pub struct RecordingWriter {
    encoder: zstd::Encoder<'static, BufWriter<File>>,
}

impl RecordingWriter {
    /// Creates the recording file and writes the session header.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or the metadata cannot
    /// be encoded and written.
    pub fn create(path: &Path, metadata: &SessionMetadata) -> Result<Self, RecordingError> {
        let file = File::create(path)?;
        let mut plain = BufWriter::new(file);
        plain.write_all(&MAGIC)?;
        plain.write_all(&[FORMAT_VERSION])?;

        let mut encoder = zstd::Encoder::new(plain, COMPRESSION_LEVEL)?;

        let header = postcard::to_stdvec(metadata).map_err(RecordingError::Encode)?;
        #[allow(clippy::cast_possible_truncation)] // metadata is tiny
        write_varint(&mut encoder, header.len() as u32)?;
        encoder.write_all(&header)?;

        Ok(Self { encoder })
    }

    /// Encodes and appends one frame.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the compressed write fails; the
    /// caller is expected to stop recording on the first failure.
    pub fn write_frame(&mut self, frame: &ComputedFrame) -> Result<(), RecordingError> {
        let bytes = postcard::to_stdvec(frame).map_err(RecordingError::Encode)?;

        #[allow(clippy::cast_possible_truncation)] // frames are far below 4 GiB
        let len = bytes.len() as u32;
        self.encoder.write_all(&len.to_le_bytes())?;
        self.encoder.write_all(&bytes)?;
        Ok(())
    }

    /// Writes the end-of-file marker, flushes the compressor and closes the
    /// file.
    ///
    /// # Errors
    ///
    /// Returns an error if the final writes or the flush fail.
    pub fn finish(mut self) -> Result<(), RecordingError> {
        self.encoder.write_all(&EOF_MARKER)?;
        let mut plain = self.encoder.finish()?;
        plain.flush()?;
        Ok(())
    }
}
