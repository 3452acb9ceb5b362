//! MIME message structure and parsing.

use crate::content_type::{ContentType, parse_parameters, split_unquoted};
use crate::encoding::{decode_base64, decode_charset, decode_quoted_printable};
use crate::error::{Error, Result};
use crate::header::Headers;
use std::fmt;

/// Nesting depth past which multipart bodies are kept opaque.
const MAX_DEPTH: usize = 32;

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit binary.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
}

impl TransferEncoding {
    /// Parses transfer encoding from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit, // Default (includes "7bit")
        }
    }

    /// Reverses this transfer encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if Base64 data is malformed.
    pub fn decode(self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Base64 => decode_base64(data),
            Self::QuotedPrintable => Ok(decode_quoted_printable(data)),
            Self::SevenBit | Self::EightBit | Self::Binary => Ok(data.to_vec()),
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

/// Body of a MIME part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Leaf content, still transfer-encoded.
    Single(Vec<u8>),
    /// Children of a multipart container, preamble and epilogue dropped.
    Multipart(Vec<Part>),
    /// An encapsulated `message/rfc822`.
    Message(Box<Part>),
}

/// MIME message part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// Part headers.
    pub headers: Headers,
    /// Part body.
    pub body: Body,
}

impl Part {
    /// Parses a part from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingBoundary`] for a multipart part without a
    /// boundary parameter, or a decoding error for a Base64 encapsulated
    /// message.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        Self::parse_at(raw, 0)
    }

    fn parse_at(raw: &[u8], depth: usize) -> Result<Self> {
        let (header_bytes, body) = split_head(raw);
        let headers = Headers::parse(&decode_header_bytes(header_bytes));
        let mut part = Self {
            headers,
            body: Body::Single(body.to_vec()),
        };

        if depth >= MAX_DEPTH {
            return Ok(part);
        }

        let content_type = part.content_type();
        if content_type.is_multipart() {
            let boundary = content_type.boundary().ok_or(Error::MissingBoundary)?;
            let children = split_multipart(body, boundary)
                .into_iter()
                .map(|child| Self::parse_at(child, depth + 1))
                .collect::<Result<Vec<_>>>()?;
            part.body = Body::Multipart(children);
        } else if content_type.is("message", "rfc822") {
            let inner = part.transfer_encoding().decode(body)?;
            part.body = Body::Message(Box::new(Self::parse_at(&inner, depth + 1)?));
        }

        Ok(part)
    }

    /// Gets the content type, `text/plain` when absent or unparsable.
    #[must_use]
    pub fn content_type(&self) -> ContentType {
        self.headers
            .get("content-type")
            .and_then(|value| ContentType::parse(value).ok())
            .unwrap_or_else(|| ContentType::new("text", "plain"))
    }

    /// Gets the transfer encoding.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.headers
            .get("content-transfer-encoding")
            .map_or(TransferEncoding::SevenBit, TransferEncoding::parse)
    }

    /// Returns the lowercased disposition kind and its parameters.
    #[must_use]
    pub fn disposition(&self) -> Option<(String, Vec<(String, String)>)> {
        let value = self.headers.get("content-disposition")?;
        let mut segments = split_unquoted(value, ';').into_iter();
        let kind = segments.next()?.trim().to_lowercase();
        Some((kind, parse_parameters(segments)))
    }

    /// True when the part is marked `Content-Disposition: attachment`.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.disposition()
            .is_some_and(|(kind, _)| kind == "attachment")
    }

    /// Filename from the disposition, else the content type `name`.
    #[must_use]
    pub fn filename(&self) -> Option<String> {
        self.disposition()
            .and_then(|(_, params)| {
                params
                    .into_iter()
                    .find(|(k, _)| k == "filename")
                    .map(|(_, v)| v)
            })
            .or_else(|| self.content_type().parameter("name").map(str::to_string))
            .filter(|name| !name.is_empty())
    }

    /// Decodes a leaf body according to the transfer encoding.
    ///
    /// Containers have no leaf content and decode to an empty buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding fails.
    pub fn decoded_body(&self) -> Result<Vec<u8>> {
        match &self.body {
            Body::Single(raw) => self.transfer_encoding().decode(raw),
            Body::Multipart(_) | Body::Message(_) => Ok(Vec::new()),
        }
    }

    /// Gets the decoded body as text in its declared charset.
    ///
    /// # Errors
    ///
    /// Returns an error if transfer decoding fails.
    pub fn body_text(&self) -> Result<String> {
        let decoded = self.decoded_body()?;
        let content_type = self.content_type();
        Ok(decode_charset(&decoded, content_type.charset().unwrap_or("utf-8")))
    }

    /// Iterates over this part and every part nested below it, depth first.
    /// Encapsulated messages are not entered.
    pub fn walk(&self) -> impl Iterator<Item = &Self> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let part = stack.pop()?;
            if let Body::Multipart(children) = &part.body {
                stack.extend(children.iter().rev());
            }
            Some(part)
        })
    }

    fn first_text(&self, sub_type: &str) -> Option<&Self> {
        self.walk().find(|part| {
            matches!(part.body, Body::Single(_))
                && part.content_type().is("text", sub_type)
                && !part.is_attachment()
        })
    }
}

/// Parsed MIME message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    root: Part,
}

impl Message {
    /// Parses a raw RFC 5322 message.
    ///
    /// Both CRLF and bare LF line endings are accepted. Header bytes that are
    /// not UTF-8 are read as Latin-1.
    ///
    /// # Errors
    ///
    /// Returns an error if a multipart container has no boundary.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        Ok(Self {
            root: Part::parse(raw)?,
        })
    }

    /// Top-level headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.root.headers
    }

    /// The root part.
    #[must_use]
    pub const fn root(&self) -> &Part {
        &self.root
    }

    /// Gets the decoded From header.
    #[must_use]
    pub fn from(&self) -> Option<String> {
        self.root.headers.get_decoded("from")
    }

    /// Gets the decoded To header.
    #[must_use]
    pub fn to(&self) -> Option<String> {
        self.root.headers.get_decoded("to")
    }

    /// Gets the decoded Subject header.
    #[must_use]
    pub fn subject(&self) -> Option<String> {
        self.root.headers.get_decoded("subject")
    }

    /// Gets the Date header.
    #[must_use]
    pub fn date(&self) -> Option<&str> {
        self.root.headers.get("date")
    }

    /// Gets the Message-ID header.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.root.headers.get("message-id")
    }

    /// First inline `text/plain` body, decoded.
    #[must_use]
    pub fn text_body(&self) -> Option<String> {
        self.root.first_text("plain")?.body_text().ok()
    }

    /// First inline `text/html` body, decoded.
    #[must_use]
    pub fn html_body(&self) -> Option<String> {
        self.root.first_text("html")?.body_text().ok()
    }

    /// Leaf parts that carry a filename or an attachment disposition.
    #[must_use]
    pub fn attachments(&self) -> Vec<&Part> {
        self.root
            .walk()
            .filter(|part| !matches!(part.body, Body::Multipart(_)))
            .filter(|part| part.is_attachment() || part.filename().is_some())
            .collect()
    }
}

/// Splits raw bytes at the blank line that ends the header block.
fn split_head(raw: &[u8]) -> (&[u8], &[u8]) {
    // A part that opens with a blank line has no headers
    if raw.starts_with(b"\r\n") {
        return (&[], &raw[2..]);
    }
    if raw.starts_with(b"\n") {
        return (&[], &raw[1..]);
    }

    let crlf = find(raw, b"\r\n\r\n").map(|i| (i, i + 4));
    let lf = find(raw, b"\n\n").map(|i| (i, i + 2));
    let split = match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    };

    match split {
        Some((end, start)) => (&raw[..end], &raw[start..]),
        None => (raw, &[]),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn decode_header_bytes(bytes: &[u8]) -> String {
    std::str::from_utf8(bytes).map_or_else(|_| decode_charset(bytes, "iso-8859-1"), str::to_string)
}

/// Splits a multipart body into the raw bytes of each child.
///
/// A missing close delimiter ends the last child at the end of input.
fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Vec<&'a [u8]> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();
    let mut parts = Vec::new();
    let mut start: Option<usize> = None;
    let mut pos = 0;

    while pos < body.len() {
        let line_end = body[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(body.len(), |i| pos + i);
        let line = &body[pos..line_end];

        if let Some(rest) = line.strip_prefix(delimiter) {
            let closing = rest.starts_with(b"--");
            if closing || rest.iter().all(u8::is_ascii_whitespace) {
                if let Some(s) = start {
                    parts.push(&body[s..content_end(body, pos).max(s)]);
                }
                if closing {
                    return parts;
                }
                start = Some((line_end + 1).min(body.len()));
            }
        }

        pos = line_end + 1;
    }

    if let Some(s) = start {
        parts.push(&body[s..]);
    }
    parts
}

/// End of a child's content: the line break before the delimiter belongs to
/// the delimiter.
fn content_end(body: &[u8], delimiter_start: usize) -> usize {
    let mut end = delimiter_start;
    if end > 0 && body[end - 1] == b'\n' {
        end -= 1;
        if end > 0 && body[end - 1] == b'\r' {
            end -= 1;
        }
    }
    end
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

    const NESTED: &[u8] = b"From: Ana <ana@example.com>\r\n\
To: bo@example.com\r\n\
Subject: =?utf-8?Q?Caf=C3=A9?= plans\r\n\
Content-Type: multipart/mixed; boundary=\"outer\"\r\n\
\r\n\
This is a multi-part message.\r\n\
--outer\r\n\
Content-Type: multipart/alternative; boundary=inner\r\n\
\r\n\
--inner\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\
\r\n\
See you at the caf=C3=A9 =\r\n\
at noon.\r\n\
--inner\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<p>See you</p>\r\n\
--inner--\r\n\
--outer\r\n\
Content-Type: application/pdf; name=\"menu.pdf\"\r\n\
Content-Disposition: attachment; filename=\"menu.pdf\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
JVBERi0x\r\n\
LjQ=\r\n\
--outer--\r\n\
epilogue\r\n";

    #[test]
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse("BASE64"), TransferEncoding::Base64);
        assert_eq!(
            TransferEncoding::parse(" quoted-printable "),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(TransferEncoding::parse("x-unknown"), TransferEncoding::SevenBit);
        assert_eq!(TransferEncoding::Base64.to_string(), "base64");
    }

    #[test]
    fn single_part_message() {
        let raw = b"Subject: Test\r\nContent-Type: text/plain; charset=utf-8\r\n\r\nHello, World!";
        let message = Message::parse(raw).unwrap();

        assert_eq!(message.subject().as_deref(), Some("Test"));
        assert_eq!(message.text_body().as_deref(), Some("Hello, World!"));
        assert!(message.html_body().is_none());
        assert!(message.attachments().is_empty());
    }

    #[test]
    fn nested_multipart_bodies_are_found_and_decoded() {
        let message = Message::parse(NESTED).unwrap();

        assert_eq!(message.subject().as_deref(), Some("Café plans"));
        assert_eq!(
            message.text_body().as_deref(),
            Some("See you at the café at noon.")
        );
        assert_eq!(message.html_body().as_deref(), Some("<p>See you</p>"));

        let attachments = message.attachments();
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].filename().as_deref(), Some("menu.pdf"));
        assert_eq!(attachments[0].decoded_body().unwrap(), b"%PDF-1.4");
    }

    #[test]
    fn walk_visits_parts_in_document_order() {
        let message = Message::parse(NESTED).unwrap();
        let types: Vec<String> = message
            .root()
            .walk()
            .map(|part| part.content_type().mime_type())
            .collect();
        assert_eq!(
            types,
            vec![
                "multipart/mixed",
                "multipart/alternative",
                "text/plain",
                "text/html",
                "application/pdf",
            ]
        );
    }

    #[test]
    fn bare_lf_and_missing_close_delimiter() {
        let raw = b"Content-Type: multipart/alternative; boundary=b\n\n--b\nContent-Type: text/plain\n\nfirst\n--b\nContent-Type: text/html\n\n<b>second</b>\n";
        let message = Message::parse(raw).unwrap();
        assert_eq!(message.text_body().as_deref(), Some("first"));
        assert_eq!(message.html_body().as_deref(), Some("<b>second</b>\n"));
    }

    #[test]
    fn multipart_without_boundary_is_an_error() {
        let raw = b"Content-Type: multipart/mixed\r\n\r\nbody";
        assert!(matches!(Message::parse(raw), Err(Error::MissingBoundary)));
    }

    #[test]
    fn text_attachment_is_not_the_body() {
        let raw = b"Content-Type: multipart/mixed; boundary=x\r\n\r\n--x\r\nContent-Type: text/plain\r\nContent-Disposition: attachment; filename=notes.txt\r\n\r\nnotes\r\n--x--\r\n";
        let message = Message::parse(raw).unwrap();
        assert!(message.text_body().is_none());
        assert_eq!(message.attachments().len(), 1);
    }

    #[test]
    fn latin1_body_and_headers() {
        let raw = b"Subject: Caf\xe9\r\nContent-Type: text/plain; charset=iso-8859-1\r\n\r\nd\xe9j\xe0 vu";
        let message = Message::parse(raw).unwrap();
        assert_eq!(message.subject().as_deref(), Some("Café"));
        assert_eq!(message.text_body().as_deref(), Some("déjà vu"));
    }

    #[test]
    fn encapsulated_message_is_parsed_but_not_walked() {
        let raw = b"Content-Type: multipart/mixed; boundary=m\r\n\r\n--m\r\nContent-Type: message/rfc822\r\n\r\nSubject: inner\r\n\r\ninner body\r\n--m--\r\n";
        let message = Message::parse(raw).unwrap();
        let Body::Multipart(children) = &message.root().body else {
            panic!("expected multipart");
        };
        let Body::Message(inner) = &children[0].body else {
            panic!("expected encapsulated message");
        };
        assert_eq!(inner.headers.get("subject"), Some("inner"));
        assert!(message.text_body().is_none());
    }

    proptest::proptest! {
        #[test]
        fn parse_never_panics(raw in proptest::collection::vec(proptest::num::u8::ANY, 0..512)) {
            let _ = Message::parse(&raw);
        }

        #[test]
        fn quoted_printable_bodies_decode_to_their_text(text in "[ -~\u{e0}-\u{ff}]{0,200}") {
            let encoded = crate::encoding::encode_quoted_printable(text.as_bytes());
            let raw = format!(
                "Content-Type: text/plain; charset=utf-8\r\nContent-Transfer-Encoding: quoted-printable\r\n\r\n{encoded}"
            );
            let message = Message::parse(raw.as_bytes()).unwrap();
            proptest::prop_assert_eq!(message.text_body(), Some(text));
        }
    }

    #[test]
    fn headers_only_message() {
        let message = Message::parse(b"Subject: only headers").unwrap();
        assert_eq!(message.subject().as_deref(), Some("only headers"));
        assert_eq!(message.text_body().as_deref(), Some(""));
    }
}
