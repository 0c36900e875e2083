//! Browser native-messaging host.
//!
//! The browser launches `localnative web-ext-host` and exchanges messages
//! over stdio. Each message is a 32-bit length in native byte order followed
//! by that many bytes of UTF-8 JSON. Requests are protocol commands, see
//! [`crate::cmd`]. stdout carries framed messages only; logs go to stderr.

use std::io::{self, Read, Write};
use tracing::{debug, info};

use crate::cmd;
use crate::config::Config;

/// Browsers refuse host-to-extension messages larger than this.
pub const MAX_RESPONSE_BYTES: usize = 1024 * 1024;

/// Reads one framed message. `Ok(None)` on a clean EOF before a new frame.
pub fn read_message<R: Read>(reader: &mut R) -> io::Result<Option<String>> {
    let mut len_buf = [0u8; 4];
    let mut filled = 0;
    while filled < len_buf.len() {
        match reader.read(&mut len_buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    match filled {
        0 => return Ok(None),
        4 => {}
        _ => {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "truncated length prefix",
            ))
        }
    }
    let len = u32::from_ne_bytes(len_buf) as usize;

    let mut body = Vec::new();
    reader.take(len as u64).read_to_end(&mut body)?;
    if body.len() < len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "truncated message body",
        ));
    }
    String::from_utf8(body)
        .map(Some)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Writes one framed message and flushes.
pub fn write_message<W: Write>(writer: &mut W, message: &str) -> io::Result<()> {
    let len = u32::try_from(message.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "message too large"))?;
    writer.write_all(&len.to_ne_bytes())?;
    writer.write_all(message.as_bytes())?;
    writer.flush()
}

/// Answers framed requests from `reader` on `writer` until EOF.
pub fn serve<R: Read, W: Write>(config: &Config, reader: &mut R, writer: &mut W) -> io::Result<usize> {
    let mut handled = 0;
    while let Some(request) = read_message(reader)? {
        debug!("web-ext request of {} bytes", request.len());
        let mut response = cmd::run_with_config(config, &request);
        if response.len() > MAX_RESPONSE_BYTES {
            response = cmd::error_json(format!(
                "response of {} bytes exceeds the {} byte native messaging limit; use a smaller limit",
                response.len(),
                MAX_RESPONSE_BYTES
            ));
        }
        write_message(writer, &response)?;
        handled += 1;
    }
    info!("web-ext host done after {} messages", handled);
    Ok(handled)
}

/// Runs the host on the process's stdio.
pub fn run_stdio(config: &Config) -> io::Result<usize> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    serve(config, &mut stdin.lock(), &mut stdout.lock())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn frame(s: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        write_message(&mut buf, s).unwrap();
        buf
    }

    #[test]
    fn test_frame_layout() {
        let buf = frame("{}");
        assert_eq!(buf.len(), 6);
        assert_eq!(u32::from_ne_bytes([buf[0], buf[1], buf[2], buf[3]]), 2);
        assert_eq!(&buf[4..], b"{}");
    }

    #[test]
    fn test_read_sequence_then_eof() {
        let mut bytes = frame(r#"{"a":1}"#);
        bytes.extend(frame("[]"));
        let mut r = Cursor::new(bytes);
        assert_eq!(read_message(&mut r).unwrap().as_deref(), Some(r#"{"a":1}"#));
        assert_eq!(read_message(&mut r).unwrap().as_deref(), Some("[]"));
        assert_eq!(read_message(&mut r).unwrap(), None);
    }

    #[test]
    fn test_truncated_body_is_error() {
        let mut bytes = frame("hello");
        bytes.truncate(6);
        assert!(read_message(&mut Cursor::new(bytes)).is_err());
        assert!(read_message(&mut Cursor::new(vec![1u8, 0])).is_err());
    }

    #[test]
    fn test_huge_declared_length_without_body_is_error() {
        let bytes = u32::MAX.to_ne_bytes().to_vec();
        let err = read_message(&mut Cursor::new(bytes)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_oversized_response_replaced_by_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_db_path(dir.path().join("ln.sqlite3"));

        let title = "x".repeat(300_000);
        let insert = serde_json::json!({
            "action": "insert",
            "title": title,
            "url": "https://example.com",
            "limit": 10,
            "offset": 0,
        })
        .to_string();
        let mut input = Vec::new();
        for _ in 0..4 {
            input.extend(frame(&insert));
        }
        input.extend(frame(r#"{"action":"select","limit":1,"offset":0}"#));

        let mut out = Vec::new();
        assert_eq!(serve(&config, &mut Cursor::new(input), &mut out).unwrap(), 5);

        let mut r = Cursor::new(out);
        let mut replies = Vec::new();
        while let Some(reply) = read_message(&mut r).unwrap() {
            assert!(reply.len() <= MAX_RESPONSE_BYTES);
            replies.push(serde_json::from_str::<serde_json::Value>(&reply).unwrap());
        }
        assert_eq!(replies.len(), 5);
        assert_eq!(replies[2]["count"], 3);
        assert!(replies[3]["error"]
            .as_str()
            .unwrap()
            .contains("native messaging limit"));
        // The insert itself went through; only its reply was too large.
        assert_eq!(replies[4]["count"], 4);
    }

    #[test]
    fn test_serve_answers_each_request() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_db_path(dir.path().join("ln.sqlite3"));

        let mut input = frame(r#"{"action":"select","limit":5,"offset":0}"#);
        input.extend(frame("garbage"));
        let mut out = Vec::new();
        let handled = serve(&config, &mut Cursor::new(input), &mut out).unwrap();
        assert_eq!(handled, 2);

        let mut r = Cursor::new(out);
        let first: serde_json::Value =
            serde_json::from_str(&read_message(&mut r).unwrap().unwrap()).unwrap();
        assert_eq!(first["count"], 0);
        let second: serde_json::Value =
            serde_json::from_str(&read_message(&mut r).unwrap().unwrap()).unwrap();
        assert!(second["error"].is_string());
    }
}
