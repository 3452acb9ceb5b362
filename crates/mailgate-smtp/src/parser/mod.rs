//! SMTP reply parser.

use crate::error::{Error, Result};
use crate::types::{Reply, ReplyCode};

/// Parses an SMTP reply from its lines, CRLF already stripped.
///
/// - Single: `250 OK`
/// - Multi: `250-First line`, `250-Second line`, `250 Last line`
///
/// # Errors
///
/// Returns an error if the reply is malformed or the lines disagree on the
/// code.
pub fn parse_reply(lines: &[String]) -> Result<Reply> {
    let Some(first) = lines.first() else {
        return Err(Error::Protocol("Empty reply".into()));
    };
    let code = reply_code(first)?;

    let mut message = Vec::with_capacity(lines.len());
    for line in lines {
        if reply_code(line)? != code {
            return Err(Error::Protocol(format!("Mixed reply codes: {line}")));
        }
        message.push(line.get(4..).unwrap_or_default().to_string());
    }

    Ok(Reply::new(ReplyCode::new(code), message))
}

fn reply_code(line: &str) -> Result<u16> {
    let digits = line
        .get(..3)
        .filter(|d| d.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| Error::Protocol(format!("Invalid reply line: {line}")))?;
    if !matches!(line.as_bytes().get(3), None | Some(b' ' | b'-')) {
        return Err(Error::Protocol(format!("Invalid reply line: {line}")));
    }
    digits
        .parse()
        .map_err(|_| Error::Protocol(format!("Invalid reply code: {digits}")))
}

/// Checks if a line ends a reply: `-` continues, a space or nothing ends.
#[must_use]
pub fn is_last_reply_line(line: &str) -> bool {
    line.as_bytes().get(3) != Some(&b'-')
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_single_line_reply() {
        let reply = parse_reply(&lines(&["250 OK"])).unwrap();
        assert_eq!(reply.code.as_u16(), 250);
        assert_eq!(reply.message, vec!["OK"]);
        assert!(reply.is_success());
    }

    #[test]
    fn test_multi_line_reply() {
        let reply =
            parse_reply(&lines(&["250-mail.example.com", "250-SIZE 1000", "250 AUTH PLAIN"]))
                .unwrap();
        assert_eq!(reply.message, vec!["mail.example.com", "SIZE 1000", "AUTH PLAIN"]);
    }

    #[test]
    fn test_bare_code() {
        let reply = parse_reply(&lines(&["354"])).unwrap();
        assert_eq!(reply.code.as_u16(), 354);
        assert_eq!(reply.message, vec![""]);
    }

    #[test]
    fn test_is_last_reply_line() {
        assert!(is_last_reply_line("250 OK"));
        assert!(is_last_reply_line("250"));
        assert!(!is_last_reply_line("250-Continuing"));
    }

    #[test]
    fn test_malformed_replies() {
        assert!(parse_reply(&[]).is_err());
        assert!(parse_reply(&lines(&["25"])).is_err());
        assert!(parse_reply(&lines(&["ABC OK"])).is_err());
        assert!(parse_reply(&lines(&["250xOK"])).is_err());
        assert!(parse_reply(&lines(&["250-one", "251 two"])).is_err());
    }
}
