// Length-prefixed frame codec over any byte stream.
//
// Wire format: a 4-byte little-endian `u32` length, then exactly that many
// payload bytes. Both peers use it for every structured exchange (catalogue
// delivery server → client, roster selection client → server). The codec
// carries opaque bytes; JSON encoding happens in the callers, keeping this
// module format-agnostic.
//
// `MAX_FRAME_SIZE` (16 MiB) bounds what `read_frame` will accept. The length
// prefix is checked before any payload is read, and the body is read through
// `Read::take` so the buffer only grows as bytes actually arrive: a lying
// length on a short stream never triggers the full allocation.
//
// Short reads are retried internally (`read_exact` / `read_to_end`). A stream
// that ends before the length or the body is complete yields
// `FrameError::Io` with `UnexpectedEof`; no partial payload is ever returned.

use std::io::{self, Read, Write};

use crate::error::FrameError;

/// Default upper bound on a single frame's payload (16 MiB). The bundled
/// catalogue is a few kilobytes; a full upstream catalogue stays well under
/// one megabyte.
pub const MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Write one frame: 4-byte little-endian length, then `payload` verbatim.
/// Flushes the writer so buffered streams put the frame on the wire.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<(), FrameError> {
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|len| *len <= MAX_FRAME_SIZE)
        .ok_or(FrameError::TooLarge {
            len: payload.len() as u64,
            max: MAX_FRAME_SIZE,
        })?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

/// Read one frame, accepting payloads up to `MAX_FRAME_SIZE`.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>, FrameError> {
    read_frame_limited(reader, MAX_FRAME_SIZE)
}

/// Read one frame, rejecting any declared length above `max_len` with
/// `FrameError::TooLarge` before reading the body.
pub fn read_frame_limited<R: Read>(reader: &mut R, max_len: u32) -> Result<Vec<u8>, FrameError> {
    let mut len_buf = [0u8; LENGTH_PREFIX_LEN];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_le_bytes(len_buf);
    if len > max_len {
        return Err(FrameError::TooLarge {
            len: u64::from(len),
            max: max_len,
        });
    }

    // Cap the up-front reservation; the rest grows with the data received.
    let mut buf = Vec::with_capacity((len as usize).min(64 * 1024));
    let got = reader.take(u64::from(len)).read_to_end(&mut buf)?;
    if got != len as usize {
        return Err(FrameError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("frame truncated: got {got} of {len} bytes"),
        )));
    }
    Ok(buf)
}
