//! MIME encoding and decoding utilities.
//!
//! Supports Base64, Quoted-Printable, and RFC 2047 header encoding.
//! Decoders are lenient: mail in the wild is often slightly malformed, and a
//! readable body beats a hard error.

use crate::error::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt::Write as _;

/// Maximum encoded line length for Base64 and Quoted-Printable bodies.
const MAX_LINE_LENGTH: usize = 76;

/// Input bytes per RFC 2047 encoded word, keeping each word under 75 chars.
const ENCODED_WORD_CHUNK: usize = 45;

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encodes data as Base64 split into CRLF-terminated lines of 76 chars.
#[must_use]
pub fn encode_base64_lines(data: &[u8]) -> String {
    let encoded = STANDARD.encode(data);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / MAX_LINE_LENGTH * 2 + 2);
    for chunk in encoded.as_bytes().chunks(MAX_LINE_LENGTH) {
        // Base64 output is pure ASCII
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push_str("\r\n");
    }
    out
}

/// Decodes Base64 data, ignoring line breaks and other whitespace.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &[u8]) -> Result<Vec<u8>> {
    let compact: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    STANDARD.decode(compact).map_err(Into::into)
}

/// Encodes bytes using Quoted-Printable encoding (RFC 2045).
///
/// Line breaks in the input become CRLF hard breaks; long lines get soft
/// breaks so no output line exceeds 76 characters.
#[must_use]
pub fn encode_quoted_printable(data: &[u8]) -> String {
    let mut result = String::new();

    let mut lines = data.split(|&b| b == b'\n').peekable();
    while let Some(line) = lines.next() {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let mut line_length = 0;

        for (i, &byte) in line.iter().enumerate() {
            let last = i + 1 == line.len();
            let literal = matches!(byte, b'!'..=b'<' | b'>'..=b'~')
                || (matches!(byte, b' ' | b'\t') && !last);
            let width = if literal { 1 } else { 3 };

            if line_length + width > MAX_LINE_LENGTH - 1 {
                result.push_str("=\r\n");
                line_length = 0;
            }

            if literal {
                result.push(char::from(byte));
            } else {
                let _ = write!(result, "={byte:02X}");
            }
            line_length += width;
        }

        if lines.peek().is_some() {
            result.push_str("\r\n");
        }
    }

    result
}

/// Decodes Quoted-Printable data (RFC 2045).
///
/// Soft line breaks are removed. Malformed escapes are kept verbatim.
#[must_use]
pub fn decode_quoted_printable(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        let byte = data[i];
        if byte != b'=' {
            result.push(byte);
            i += 1;
            continue;
        }

        match data.get(i + 1..) {
            Some([b'\r', b'\n', ..]) => i += 3,
            Some([b'\n', ..]) => i += 2,
            Some([hi, lo, ..]) => {
                if let (Some(hi), Some(lo)) = (hex_value(*hi), hex_value(*lo)) {
                    result.push((hi << 4) | lo);
                    i += 3;
                } else {
                    result.push(b'=');
                    i += 1;
                }
            }
            _ => {
                result.push(b'=');
                i += 1;
            }
        }
    }

    result
}

const fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}

/// Encodes a header value using RFC 2047 B-encoding when it is not plain
/// ASCII. Long values are split into several encoded words joined by a
/// folding line break.
#[must_use]
pub fn encode_rfc2047(text: &str, charset: &str) -> String {
    if text.is_ascii() {
        return text.to_string();
    }

    let mut words = Vec::new();
    let mut start = 0;
    while start < text.len() {
        let mut end = (start + ENCODED_WORD_CHUNK).min(text.len());
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        let encoded = encode_base64(&text.as_bytes()[start..end]);
        words.push(format!("=?{charset}?B?{encoded}?="));
        start = end;
    }

    words.join("\r\n ")
}

/// Decodes every RFC 2047 encoded word embedded in a header value.
///
/// Whitespace between two adjacent encoded words is dropped. Words that do
/// not parse are left as they are.
#[must_use]
pub fn decode_rfc2047(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut pending_space = String::new();
    let mut after_word = false;

    while !rest.is_empty() {
        if let Some((decoded, consumed)) = decode_encoded_word(rest) {
            // Whitespace separating two encoded words is not part of the text
            if !after_word {
                out.push_str(&pending_space);
            }
            pending_space.clear();
            out.push_str(&decoded);
            rest = &rest[consumed..];
            after_word = true;
            continue;
        }

        let Some(c) = rest.chars().next() else {
            break;
        };
        rest = &rest[c.len_utf8()..];

        if c.is_whitespace() {
            pending_space.push(c);
        } else {
            out.push_str(&pending_space);
            pending_space.clear();
            out.push(c);
            after_word = false;
        }
    }

    out.push_str(&pending_space);
    out
}

/// Decodes one `=?charset?enc?text?=` word at the start of `s`, returning
/// the text and the number of bytes consumed.
fn decode_encoded_word(s: &str) -> Option<(String, usize)> {
    let inner = s.strip_prefix("=?")?;
    let (charset, inner) = inner.split_once('?')?;
    let (encoding, inner) = inner.split_once('?')?;
    let end = inner.find("?=")?;
    let payload = &inner[..end];
    if payload.contains(char::is_whitespace) || charset.is_empty() {
        return None;
    }

    let bytes = match encoding {
        "B" | "b" => decode_base64(payload.as_bytes()).ok()?,
        "Q" | "q" => decode_quoted_printable(payload.replace('_', " ").as_bytes()),
        _ => return None,
    };

    let consumed = 2 + charset.len() + 1 + encoding.len() + 1 + end + 2;
    // RFC 2231 language suffix: charset*lang
    let charset = charset.split('*').next().unwrap_or(charset);
    Some((decode_charset(&bytes, charset), consumed))
}

/// Converts bytes in the named charset to a string.
///
/// UTF-8 and ASCII decode lossily; the Latin-1 family maps byte to code
/// point. Unknown charsets are treated as UTF-8.
#[must_use]
pub fn decode_charset(bytes: &[u8], charset: &str) -> String {
    match charset.trim().to_ascii_lowercase().as_str() {
        "iso-8859-1" | "latin1" | "latin-1" | "iso8859-1" | "windows-1252" | "cp1252" => {
            bytes.iter().map(|&b| char::from(b)).collect()
        }
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
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

    #[test]
    fn test_base64_encode_decode() {
        let data = b"Hello, World!";
        let encoded = encode_base64(data);
        assert_eq!(encoded, "SGVsbG8sIFdvcmxkIQ==");

        let decoded = decode_base64(encoded.as_bytes()).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn base64_lines_are_wrapped() {
        let data = vec![0xAB_u8; 200];
        let encoded = encode_base64_lines(&data);
        for line in encoded.split("\r\n").filter(|l| !l.is_empty()) {
            assert!(line.len() <= 76);
        }
        assert!(encoded.ends_with("\r\n"));
        assert_eq!(decode_base64(encoded.as_bytes()).unwrap(), data);
    }

    #[test]
    fn base64_decode_rejects_garbage() {
        assert!(decode_base64(b"!!not base64!!").is_err());
    }

    #[test]
    fn test_quoted_printable_encode() {
        assert_eq!(encode_quoted_printable(b"Hello, World!"), "Hello, World!");

        let encoded = encode_quoted_printable("Héllo, Wørld!".as_bytes());
        assert!(encoded.contains("=C3=A9"));
    }

    #[test]
    fn quoted_printable_keeps_hard_breaks_and_escapes_trailing_space() {
        let encoded = encode_quoted_printable(b"a = b \nnext");
        assert_eq!(encoded, "a =3D b=20\r\nnext");
    }

    #[test]
    fn quoted_printable_long_lines_get_soft_breaks() {
        let line = "x".repeat(200);
        let encoded = encode_quoted_printable(line.as_bytes());
        assert!(encoded.split("\r\n").all(|l| l.len() <= 76));
        assert_eq!(decode_quoted_printable(encoded.as_bytes()), line.as_bytes());
    }

    #[test]
    fn test_quoted_printable_decode() {
        assert_eq!(decode_quoted_printable(b"Hello, World!"), b"Hello, World!");
        assert_eq!(
            decode_quoted_printable(b"H=C3=A9llo"),
            "Héllo".as_bytes()
        );
    }

    #[test]
    fn test_quoted_printable_soft_line_break() {
        assert_eq!(decode_quoted_printable(b"Hello=\r\nWorld"), b"HelloWorld");
        assert_eq!(decode_quoted_printable(b"Hello=\nWorld"), b"HelloWorld");
    }

    #[test]
    fn quoted_printable_malformed_escape_is_kept() {
        assert_eq!(decode_quoted_printable(b"100=ZZ ="), b"100=ZZ =");
    }

    #[test]
    fn test_rfc2047_encode() {
        assert_eq!(encode_rfc2047("Hello", "utf-8"), "Hello");

        let encoded = encode_rfc2047("Héllo", "utf-8");
        assert!(encoded.starts_with("=?utf-8?B?"));
        assert!(encoded.ends_with("?="));
        assert_eq!(decode_rfc2047(&encoded), "Héllo");
    }

    #[test]
    fn long_rfc2047_values_split_on_char_boundaries() {
        let text = "ü".repeat(60);
        let encoded = encode_rfc2047(&text, "utf-8");
        assert!(encoded.contains("\r\n "));
        assert_eq!(decode_rfc2047(&encoded), text);
    }

    #[test]
    fn test_rfc2047_decode() {
        assert_eq!(decode_rfc2047("Hello"), "Hello");
        assert_eq!(decode_rfc2047("=?utf-8?B?SMOpbGxv?="), "Héllo");
    }

    #[test]
    fn test_rfc2047_quoted_printable() {
        assert_eq!(decode_rfc2047("=?utf-8?Q?H=C3=A9llo_there?="), "Héllo there");
    }

    #[test]
    fn rfc2047_words_inside_text() {
        assert_eq!(
            decode_rfc2047("Re: =?utf-8?Q?caf=C3=A9?= =?utf-8?Q?_au_lait?= today"),
            "Re: café au lait today"
        );
    }

    #[test]
    fn rfc2047_latin1_and_broken_words() {
        assert_eq!(decode_rfc2047("=?ISO-8859-1?Q?Andr=E9?="), "André");
        assert_eq!(decode_rfc2047("=?utf-8?X?abc?= ok"), "=?utf-8?X?abc?= ok");
    }
}
