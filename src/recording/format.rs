//! Recording file constants and framing helpers.

use std::io::{Read, Write};

pub const MAGIC: [u8; 4] = *b"WTFR";
pub const FORMAT_VERSION: u8 = 1;
pub const EOF_MARKER: [u8; 4] = *b"WEOF";

/// zstd compression level for the stream following the version byte.
pub const COMPRESSION_LEVEL: i32 = 3;

/// Writes a `u32` as an LEB128 varint (the same unsigned-varint encoding
/// postcard uses for its own integers).
///
/// # Errors
///
/// Propagates I/O errors from the underlying writer.
pub fn write_varint(w: &mut impl Write, mut value: u32) -> std::io::Result<()> {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        w.write_all(&[byte])?;
        if value == 0 {
            return Ok(());
        }
    }
}

/// Reads an LEB128 varint `u32`.
///
/// # Errors
///
/// Propagates I/O errors; returns `InvalidData` when the varint runs past
/// the 5 bytes a `u32` can occupy.
pub fn read_varint(r: &mut impl Read) -> std::io::Result<u32> {
    let mut value: u32 = 0;
    for shift in (0..).step_by(7).take(5) {
        let mut byte = [0u8; 1];
        r.read_exact(&mut byte)?;
        value |= u32::from(byte[0] & 0x7f) << shift;
        if byte[0] & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "varint too long for u32"))
}
