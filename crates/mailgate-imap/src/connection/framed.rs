//! Framed I/O for the IMAP protocol.
//!
//! Server responses are CRLF-terminated lines that may embed literals
//! (`{n}\r\n` followed by `n` raw bytes). [`FramedStream`] hands the parser
//! whole responses with their literals inlined.

#![allow(clippy::missing_errors_doc)]

use std::io;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::{Error, Result};

const READ_BUFFER_SIZE: usize = 8192;

/// Longest line accepted before a literal or CRLF.
const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Largest literal accepted from the server.
const MAX_LITERAL_SIZE: usize = 100 * 1024 * 1024;

/// Buffered IMAP connection.
pub struct FramedStream<S> {
    reader: BufReader<S>,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a transport.
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::with_capacity(READ_BUFFER_SIZE, stream),
        }
    }

    /// Reads one complete response, literals included.
    pub async fn read_response(&mut self) -> Result<Vec<u8>> {
        let mut response = Vec::new();

        loop {
            let line = self.read_line().await?;
            response.extend_from_slice(&line);

            let Some(len) = parse_literal_length(&line) else {
                break;
            };
            if len > MAX_LITERAL_SIZE {
                return Err(Error::Protocol(format!(
                    "literal too large: {len} bytes (max {MAX_LITERAL_SIZE})"
                )));
            }
            let start = response.len();
            response.resize(start + len, 0);
            self.reader.read_exact(&mut response[start..]).await?;
        }

        Ok(response)
    }

    /// Reads responses until the tagged completion for `tag`, returning all
    /// of them with the tagged line last.
    pub async fn read_until_tagged(&mut self, tag: &str) -> Result<Vec<Vec<u8>>> {
        let mut responses = Vec::new();
        loop {
            let response = self.read_response().await?;
            let done = is_tagged(&response, tag);
            responses.push(response);
            if done {
                return Ok(responses);
            }
        }
    }

    async fn read_line(&mut self) -> Result<Vec<u8>> {
        let mut line = Vec::new();

        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed",
                )));
            }

            // A CR may end one read and its LF start the next
            let scan_from = line.len().saturating_sub(1);
            line.extend_from_slice(buf);
            let consumed = buf.len();

            if let Some(pos) = find_crlf(&line[scan_from..]) {
                let end = scan_from + pos + 2;
                let overshoot = line.len() - end;
                line.truncate(end);
                self.reader.consume(consumed - overshoot);
                return Ok(line);
            }

            self.reader.consume(consumed);
            if line.len() > MAX_LINE_LENGTH {
                return Err(Error::Protocol("line too long".to_string()));
            }
        }
    }

    /// Writes and flushes a serialized command.
    pub async fn write_command(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.reader.get_mut();
        stream.write_all(data).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Returns the transport.
    pub fn get_ref(&self) -> &S {
        self.reader.get_ref()
    }

    /// Consumes the framing and returns the transport.
    ///
    /// Buffered but unread bytes are discarded, so call this only when the
    /// server is waiting on the client, as after a STARTTLS completion.
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }
}

/// Returns true if `response` is the tagged completion for `tag`.
pub(crate) fn is_tagged(response: &[u8], tag: &str) -> bool {
    response.starts_with(tag.as_bytes()) && response.get(tag.len()) == Some(&b' ')
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Splits a serialized command after each literal announcement. Every
/// segment after the first may only be sent once the server has answered
/// the previous one with a continuation.
///
/// A trailing announcement whose data is not part of `wire` (APPEND's
/// message) ends the last segment.
pub(crate) fn literal_segments(wire: &[u8]) -> Vec<&[u8]> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut pos = 0;

    while let Some(offset) = find_crlf(&wire[pos..]) {
        let end = pos + offset + 2;
        let Some(len) = parse_literal_length(&wire[start..end]) else {
            break;
        };
        segments.push(&wire[start..end]);
        start = end;
        pos = end + len;
        if pos >= wire.len() {
            break;
        }
    }
    if start < wire.len() {
        segments.push(&wire[start..]);
    }
    segments
}

/// Parses the length of a literal announced at the end of a line, accepting
/// both `{n}` and the non-synchronizing `{n+}`.
fn parse_literal_length(line: &[u8]) -> Option<usize> {
    let line = line.strip_suffix(b"\r\n")?;
    let line = line.strip_suffix(b"}")?;
    let open = line.iter().rposition(|&b| b == b'{')?;
    let digits = &line[open + 1..];
    let digits = digits.strip_suffix(b"+").unwrap_or(digits);
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[test]
    fn test_parse_literal_length() {
        assert_eq!(parse_literal_length(b"BODY[] {123}\r\n"), Some(123));
        assert_eq!(parse_literal_length(b"BODY[] {123+}\r\n"), Some(123));
        assert_eq!(parse_literal_length(b"{0}\r\n"), Some(0));
        assert_eq!(parse_literal_length(b"no literal\r\n"), None);
        assert_eq!(parse_literal_length(b"incomplete {123"), None);
        assert_eq!(parse_literal_length(b"wrong {abc}\r\n"), None);
        assert_eq!(parse_literal_length(b"empty {}\r\n"), None);
    }

    #[test]
    fn test_literal_segments() {
        let plain: &[u8] = b"A0001 SELECT INBOX\r\n";
        assert_eq!(literal_segments(plain), vec![plain]);

        let wire = b"A0002 SELECT {6}\r\nCaf\xc3\xa9s\r\n";
        assert_eq!(
            literal_segments(wire),
            vec![&b"A0002 SELECT {6}\r\n"[..], &b"Caf\xc3\xa9s\r\n"[..]]
        );

        let append = b"A0003 APPEND {2}\r\n\r\n (\\Seen) {310}\r\n";
        assert_eq!(
            literal_segments(append),
            vec![&b"A0003 APPEND {2}\r\n"[..], &b"\r\n (\\Seen) {310}\r\n"[..]]
        );
    }

    #[test]
    fn test_is_tagged() {
        assert!(is_tagged(b"A0001 OK done\r\n", "A0001"));
        assert!(!is_tagged(b"A00012 OK done\r\n", "A0001"));
        assert!(!is_tagged(b"* OK hi\r\n", "A0001"));
    }

    #[tokio::test]
    async fn test_read_simple_line() {
        let mock = Builder::new().read(b"* OK ready\r\n").build();
        let mut framed = FramedStream::new(mock);

        assert_eq!(framed.read_response().await.unwrap(), b"* OK ready\r\n");
    }

    #[tokio::test]
    async fn test_crlf_split_across_reads() {
        let mock = Builder::new()
            .read(b"* OK ready\r")
            .read(b"\n* 2 EXISTS\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        assert_eq!(framed.read_response().await.unwrap(), b"* OK ready\r\n");
        assert_eq!(framed.read_response().await.unwrap(), b"* 2 EXISTS\r\n");
    }

    #[tokio::test]
    async fn test_literal_is_inlined() {
        let mock = Builder::new()
            .read(b"* 1 FETCH (BODY[] {5}\r\n")
            .read(b"hel")
            .read(b"lo)\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let response = framed.read_response().await.unwrap();
        assert_eq!(response, b"* 1 FETCH (BODY[] {5}\r\nhello)\r\n");
    }

    #[tokio::test]
    async fn test_literal_containing_crlf() {
        let mock = Builder::new()
            .read(b"* 1 FETCH (BODY[] {4}\r\na\r\nb)\r\nA0002 OK done\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let responses = framed.read_until_tagged("A0002").await.unwrap();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0], b"* 1 FETCH (BODY[] {4}\r\na\r\nb)\r\n");
    }

    #[tokio::test]
    async fn test_write_command() {
        let mock = Builder::new().write(b"A0001 NOOP\r\n").build();
        let mut framed = FramedStream::new(mock);

        framed.write_command(b"A0001 NOOP\r\n").await.unwrap();
    }

    #[tokio::test]
    async fn test_read_until_tagged_collects_untagged() {
        let mock = Builder::new()
            .read(b"* CAPABILITY IMAP4rev1 MOVE\r\n")
            .read(b"* OK still here\r\n")
            .read(b"A0001 OK done\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        let responses = framed.read_until_tagged("A0001").await.unwrap();
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[2], b"A0001 OK done\r\n");
    }

    #[tokio::test]
    async fn test_closed_connection_is_io_error() {
        let mock = Builder::new().read(b"* OK par").build();
        let mut framed = FramedStream::new(mock);

        let err = framed.read_response().await.unwrap_err();
        assert!(err.is_connection_lost());
        assert!(matches!(err, Error::Io(_)));
    }

    #[tokio::test]
    async fn test_literal_too_large() {
        let header = format!("* 1 FETCH (BODY[] {{{}}}\r\n", MAX_LITERAL_SIZE + 1);
        let mock = Builder::new().read(header.as_bytes()).build();
        let mut framed = FramedStream::new(mock);

        let err = framed.read_response().await.unwrap_err();
        assert!(err.to_string().contains("literal too large"));
    }

    #[tokio::test]
    async fn test_line_length_limit() {
        let long_line = "A".repeat(MAX_LINE_LENGTH + 100);
        let mock = Builder::new().read(long_line.as_bytes()).build();
        let mut framed = FramedStream::new(mock);

        let err = framed.read_response().await.unwrap_err();
        assert!(err.to_string().contains("line too long"));
    }
}
