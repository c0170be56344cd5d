// The plain-text handshake line.
//
// The first thing a client sends is its display name as raw UTF-8 terminated
// by `\n`, with no length prefix. Everything after it on the same stream is
// framed (see `framing.rs`), so the server must read the line through the
// same `BufRead` it later reads frames from: bytes buffered past the newline
// belong to the next frame.
//
// The line is bounded by `MAX_NAME_LINE` so a peer that never sends a newline
// cannot grow the buffer without limit.

use std::io::{self, BufRead, Read, Write};

use crate::error::FrameError;

/// Longest accepted handshake line, newline excluded.
pub const MAX_NAME_LINE: usize = 1024;

/// Write `name` followed by a single `\n`. Trailing line terminators already
/// present on `name` are dropped first; an embedded newline is rejected
/// because it would split the handshake.
pub fn write_name_line<W: Write>(writer: &mut W, name: &str) -> Result<(), FrameError> {
    let name = trim_line_end(name);
    if name.contains('\n') {
        return Err(FrameError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            "display name contains a newline",
        )));
    }
    writer.write_all(name.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Read one `\n`-terminated line of at most `max_len` bytes and return it
/// without its line terminator (`\n` or `\r\n`).
///
/// Ending the stream before the newline is an `Io` error with
/// `UnexpectedEof`, including the zero-byte case.
pub fn read_name_line<R: BufRead>(reader: &mut R, max_len: usize) -> Result<String, FrameError> {
    let mut buf = Vec::new();
    reader
        .by_ref()
        .take(max_len as u64 + 1)
        .read_until(b'\n', &mut buf)?;

    if buf.last() != Some(&b'\n') {
        if buf.len() > max_len {
            return Err(FrameError::NameTooLong { max: max_len });
        }
        return Err(FrameError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "stream closed before the handshake line ended",
        )));
    }

    let line = String::from_utf8(buf).map_err(|_| FrameError::NotUtf8)?;
    Ok(trim_line_end(&line).to_owned())
}

fn trim_line_end(s: &str) -> &str {
    s.trim_end_matches(['\r', '\n'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::{read_frame, write_frame};
    use std::io::Cursor;

    #[test]
    fn name_line_roundtrip() {
        let mut wire = Vec::new();
        write_name_line(&mut wire, "Ash").unwrap();
        assert_eq!(wire, b"Ash\n");

        let name = read_name_line(&mut Cursor::new(wire), MAX_NAME_LINE).unwrap();
        assert_eq!(name, "Ash");
    }

    #[test]
    fn carriage_return_is_stripped() {
        let name = read_name_line(&mut Cursor::new(b"Misty\r\n".to_vec()), MAX_NAME_LINE).unwrap();
        assert_eq!(name, "Misty");
    }

    #[test]
    fn writer_drops_existing_terminator() {
        let mut wire = Vec::new();
        write_name_line(&mut wire, "Brock\r\n").unwrap();
        assert_eq!(wire, b"Brock\n");
    }

    #[test]
    fn embedded_newline_is_refused() {
        let mut wire = Vec::new();
        let err = write_name_line(&mut wire, "Ash\nKetchum").unwrap_err();
        assert!(matches!(err, FrameError::Io(_)));
        assert!(wire.is_empty());
    }

    #[test]
    fn frame_after_line_is_not_consumed() {
        let mut wire = Vec::new();
        write_name_line(&mut wire, "Ash").unwrap();
        write_frame(&mut wire, b"{\"next\":true}").unwrap();

        let mut reader = std::io::BufReader::new(Cursor::new(wire));
        assert_eq!(read_name_line(&mut reader, MAX_NAME_LINE).unwrap(), "Ash");
        assert_eq!(read_frame(&mut reader).unwrap(), b"{\"next\":true}");
    }

    #[test]
    fn empty_stream_is_eof() {
        let err = read_name_line(&mut Cursor::new(Vec::new()), MAX_NAME_LINE).unwrap_err();
        match err {
            FrameError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("expected Io, got {other:?}"),
        }
    }

    #[test]
    fn unterminated_line_is_eof() {
        let err = read_name_line(&mut Cursor::new(b"Ash".to_vec()), MAX_NAME_LINE).unwrap_err();
        assert!(matches!(err, FrameError::Io(_)));
    }

    #[test]
    fn overlong_line_is_rejected() {
        let long = vec![b'a'; 40];
        let err = read_name_line(&mut Cursor::new(long), 16).unwrap_err();
        assert!(matches!(err, FrameError::NameTooLong { max: 16 }));
    }

    #[test]
    fn line_at_limit_is_accepted() {
        let mut wire = vec![b'a'; 16];
        wire.push(b'\n');
        let name = read_name_line(&mut Cursor::new(wire), 16).unwrap();
        assert_eq!(name.len(), 16);
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let err = read_name_line(&mut Cursor::new(vec![0xFF, 0xFE, b'\n']), MAX_NAME_LINE)
            .unwrap_err();
        assert!(matches!(err, FrameError::NotUtf8));
    }
}
