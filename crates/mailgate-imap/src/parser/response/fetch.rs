//! FETCH response parsing.

use crate::parser::lexer::{Lexer, Token};
use crate::types::Uid;
use crate::{Error, Result};

use super::parse_flag_list;
use super::types::{Address, BodyPart, BodyStructure, Disposition, Envelope, FetchItem};

/// Parses a FETCH response.
pub fn parse_fetch_response(lexer: &mut Lexer<'_>) -> Result<Vec<FetchItem>> {
    lexer.expect(Token::LParen)?;

    let mut items = Vec::new();

    loop {
        match lexer.next_token()? {
            Token::RParen => break,
            Token::Space => {}
            Token::Atom(name) => {
                let upper = name.to_ascii_uppercase();
                match upper.as_str() {
                    "FLAGS" => {
                        lexer.expect_space()?;
                        items.push(FetchItem::Flags(parse_flag_list(lexer)?));
                    }
                    "UID" => {
                        lexer.expect_space()?;
                        let n = lexer.read_number()?;
                        let uid = Uid::new(n).ok_or_else(|| Error::Parse {
                            position: lexer.position(),
                            message: format!("invalid UID value: {n} (UID cannot be 0)"),
                        })?;
                        items.push(FetchItem::Uid(uid));
                    }
                    "RFC822.SIZE" => {
                        lexer.expect_space()?;
                        items.push(FetchItem::Rfc822Size(lexer.read_number()?));
                    }
                    "INTERNALDATE" => {
                        lexer.expect_space()?;
                        if let Some(date) = lexer.read_nstring()? {
                            items.push(FetchItem::InternalDate(date));
                        }
                    }
                    "ENVELOPE" => {
                        lexer.expect_space()?;
                        items.push(FetchItem::Envelope(Box::new(parse_envelope(lexer)?)));
                    }
                    "BODYSTRUCTURE" => {
                        lexer.expect_space()?;
                        items.push(FetchItem::BodyStructure(parse_body_structure(lexer)?));
                    }
                    // Non-extensible BODY: same shape as BODYSTRUCTURE without extension data
                    "BODY" if lexer.peek() == Some(b' ') => {
                        lexer.expect_space()?;
                        items.push(FetchItem::BodyStructure(parse_body_structure(lexer)?));
                    }
                    "BODY" | "RFC822" => {
                        let (section, origin) = parse_body_section_and_origin(lexer);
                        lexer.expect_space()?;
                        let data = lexer.read_nbytes()?;
                        items.push(FetchItem::Body {
                            section,
                            origin,
                            data,
                        });
                    }
                    _ => {
                        lexer.expect_space()?;
                        lexer.skip_value()?;
                    }
                }
            }
            token => {
                return Err(Error::Parse {
                    position: lexer.position(),
                    message: format!("Unexpected token in FETCH data: {token:?}"),
                });
            }
        }
    }

    Ok(items)
}

/// Parses optional `[section]` and `<origin>` following BODY in a response.
fn parse_body_section_and_origin(lexer: &mut Lexer<'_>) -> (Option<String>, Option<u32>) {
    let mut section = None;
    let mut origin = None;

    if lexer.peek() == Some(b'[') {
        lexer.advance();
        let mut section_buf = String::new();
        while let Some(b) = lexer.advance() {
            if b == b']' {
                break;
            }
            section_buf.push(char::from(b));
        }
        if !section_buf.is_empty() {
            section = Some(section_buf);
        }
    }

    if lexer.peek() == Some(b'<') {
        lexer.advance();
        let mut origin_buf = String::new();
        while let Some(b) = lexer.peek() {
            lexer.advance();
            if b == b'>' {
                break;
            }
            origin_buf.push(char::from(b));
        }
        origin = origin_buf.parse().ok();
    }

    (section, origin)
}

/// Parses an envelope structure.
pub fn parse_envelope(lexer: &mut Lexer<'_>) -> Result<Envelope> {
    lexer.expect(Token::LParen)?;

    let date = lexer.read_nstring()?;
    lexer.expect_space()?;
    let subject = lexer.read_nstring()?;
    lexer.expect_space()?;
    let from = parse_address_list(lexer)?;
    lexer.expect_space()?;
    let sender = parse_address_list(lexer)?;
    lexer.expect_space()?;
    let reply_to = parse_address_list(lexer)?;
    lexer.expect_space()?;
    let to = parse_address_list(lexer)?;
    lexer.expect_space()?;
    let cc = parse_address_list(lexer)?;
    lexer.expect_space()?;
    let bcc = parse_address_list(lexer)?;
    lexer.expect_space()?;
    let in_reply_to = lexer.read_nstring()?;
    lexer.expect_space()?;
    let message_id = lexer.read_nstring()?;

    lexer.expect(Token::RParen)?;

    Ok(Envelope {
        date,
        subject,
        from,
        sender,
        reply_to,
        to,
        cc,
        bcc,
        in_reply_to,
        message_id,
    })
}

/// Parses an address list.
pub fn parse_address_list(lexer: &mut Lexer<'_>) -> Result<Vec<Address>> {
    match lexer.next_token()? {
        Token::Nil => Ok(Vec::new()),
        Token::LParen => {
            let mut addresses = Vec::new();
            loop {
                match lexer.peek() {
                    Some(b')') => {
                        lexer.advance();
                        break;
                    }
                    Some(b'(') => addresses.push(parse_address(lexer)?),
                    Some(b' ') => {
                        lexer.advance();
                    }
                    _ => {
                        return Err(Error::Parse {
                            position: lexer.position(),
                            message: "Unterminated address list".to_string(),
                        });
                    }
                }
            }
            Ok(addresses)
        }
        token => Err(Error::Parse {
            position: lexer.position(),
            message: format!("Expected address list, got {token:?}"),
        }),
    }
}

/// Parses a single address.
pub fn parse_address(lexer: &mut Lexer<'_>) -> Result<Address> {
    lexer.expect(Token::LParen)?;

    let name = lexer.read_nstring()?;
    lexer.expect_space()?;
    let adl = lexer.read_nstring()?;
    lexer.expect_space()?;
    let mailbox = lexer.read_nstring()?;
    lexer.expect_space()?;
    let host = lexer.read_nstring()?;

    lexer.expect(Token::RParen)?;

    Ok(Address {
        name,
        adl,
        mailbox,
        host,
    })
}

/// Parses a BODYSTRUCTURE (or BODY) value, extension data included.
///
/// ```text
/// single    = "(" type SP subtype SP params SP id SP desc SP enc SP size
///             [SP envelope SP body SP lines]   ; message/rfc822
///             [SP lines]                       ; text/*
///             [SP md5 [SP disposition [SP language [SP location *(SP ext)]]]] ")"
/// multipart = "(" 1*body SP subtype
///             [SP params [SP disposition [SP language [SP location *(SP ext)]]]] ")"
/// ```
pub fn parse_body_structure(lexer: &mut Lexer<'_>) -> Result<BodyStructure> {
    lexer.expect(Token::LParen)?;

    if lexer.peek() == Some(b'(') {
        parse_multipart(lexer)
    } else {
        parse_single(lexer)
    }
}

fn parse_multipart(lexer: &mut Lexer<'_>) -> Result<BodyStructure> {
    let mut bodies = Vec::new();
    while lexer.peek() == Some(b'(') {
        bodies.push(parse_body_structure(lexer)?);
        lexer.skip_spaces();
    }

    let subtype = lower(lexer.read_nstring()?);

    let mut params = Vec::new();
    let mut disposition = None;
    if next_extension(lexer) {
        params = parse_body_params(lexer)?;
        if next_extension(lexer) {
            disposition = parse_disposition(lexer)?;
        }
    }
    skip_remaining_extensions(lexer)?;

    Ok(BodyStructure::Multipart {
        bodies,
        subtype,
        params,
        disposition,
    })
}

fn parse_single(lexer: &mut Lexer<'_>) -> Result<BodyStructure> {
    let media_type = lower(lexer.read_nstring()?);
    lexer.expect_space()?;
    let media_subtype = lower(lexer.read_nstring()?);
    lexer.expect_space()?;
    let params = parse_body_params(lexer)?;
    lexer.expect_space()?;
    let id = lexer.read_nstring()?;
    lexer.expect_space()?;
    let description = lexer.read_nstring()?;
    lexer.expect_space()?;
    let encoding = lower(lexer.read_nstring()?);
    lexer.expect_space()?;
    let size = lexer.read_number()?;

    let mut part = BodyPart {
        media_type,
        media_subtype,
        params,
        id,
        description,
        encoding,
        size,
        lines: None,
        disposition: None,
    };

    let is_message = part.media_type == "message"
        && matches!(part.media_subtype.as_str(), "rfc822" | "global")
        && lexer.remaining().starts_with(b" (");

    let nested = if is_message {
        lexer.expect_space()?;
        let envelope = parse_envelope(lexer)?;
        lexer.expect_space()?;
        let body = parse_body_structure(lexer)?;
        lexer.expect_space()?;
        part.lines = Some(lexer.read_number()?);
        Some((envelope, body))
    } else {
        if part.media_type == "text" && next_extension(lexer) {
            part.lines = Some(lexer.read_number()?);
        }
        None
    };

    // md5, then disposition
    if next_extension(lexer) {
        lexer.skip_value()?;
        if next_extension(lexer) {
            part.disposition = parse_disposition(lexer)?;
        }
    }
    skip_remaining_extensions(lexer)?;

    Ok(match nested {
        Some((envelope, body)) => BodyStructure::Message {
            part,
            envelope: Box::new(envelope),
            body: Box::new(body),
        },
        None => BodyStructure::Single(part),
    })
}

/// Consumes the separating space if another extension field follows.
fn next_extension(lexer: &mut Lexer<'_>) -> bool {
    if lexer.peek() == Some(b' ') && lexer.peek_at(1) != Some(b')') {
        lexer.advance();
        true
    } else {
        false
    }
}

/// Skips language, location and any future extension fields, then the
/// closing parenthesis.
fn skip_remaining_extensions(lexer: &mut Lexer<'_>) -> Result<()> {
    while next_extension(lexer) {
        lexer.skip_value()?;
    }
    lexer.skip_spaces();
    lexer.expect(Token::RParen)
}

/// Parses `NIL` or `("attachment" ("filename" "x.pdf"))`.
fn parse_disposition(lexer: &mut Lexer<'_>) -> Result<Option<Disposition>> {
    match lexer.next_token()? {
        Token::Nil => Ok(None),
        Token::LParen => {
            let kind = lower(lexer.read_nstring()?);
            let params = if next_extension(lexer) {
                parse_body_params(lexer)?
            } else {
                Vec::new()
            };
            lexer.skip_spaces();
            lexer.expect(Token::RParen)?;
            Ok(Some(Disposition { kind, params }))
        }
        token => Err(Error::Parse {
            position: lexer.position(),
            message: format!("Expected disposition, got {token:?}"),
        }),
    }
}

/// Parses body parameters: `NIL` or `("key" "value" ...)`. Keys are lowercased.
fn parse_body_params(lexer: &mut Lexer<'_>) -> Result<Vec<(String, String)>> {
    match lexer.next_token()? {
        Token::Nil => Ok(Vec::new()),
        Token::LParen => {
            let mut params = Vec::new();
            loop {
                lexer.skip_spaces();
                if lexer.peek() == Some(b')') {
                    lexer.advance();
                    break;
                }
                let key = lower(lexer.read_nstring()?);
                lexer.skip_spaces();
                let value = lexer.read_nstring()?.unwrap_or_default();
                params.push((key, value));
            }
            Ok(params)
        }
        token => Err(Error::Parse {
            position: lexer.position(),
            message: format!("Expected body parameters, got {token:?}"),
        }),
    }
}

fn lower(value: Option<String>) -> String {
    value.unwrap_or_default().to_ascii_lowercase()
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

    fn structure(input: &[u8]) -> BodyStructure {
        let mut lexer = Lexer::new(input);
        parse_body_structure(&mut lexer).unwrap()
    }

    #[test]
    fn fetch_uid_and_flags() {
        let mut lexer = Lexer::new(b"(UID 123 FLAGS (\\Seen))");
        let items = parse_fetch_response(&mut lexer).unwrap();

        assert_eq!(items.len(), 2);
        assert!(matches!(items[0], FetchItem::Uid(uid) if uid.get() == 123));
        assert!(matches!(&items[1], FetchItem::Flags(f) if f.is_seen()));
    }

    #[test]
    fn fetch_uid_zero_rejected() {
        let mut lexer = Lexer::new(b"(UID 0)");
        let err = parse_fetch_response(&mut lexer).unwrap_err();
        assert!(err.to_string().contains("UID"));
    }

    #[test]
    fn fetch_unknown_items_are_skipped() {
        let mut lexer = Lexer::new(b"(X-GM-LABELS (\"\\\\Important\" foo) MODSEQ (12345) UID 9)");
        let items = parse_fetch_response(&mut lexer).unwrap();
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], FetchItem::Uid(uid) if uid.get() == 9));
    }

    #[test]
    fn fetch_body_section_literal() {
        let mut lexer = Lexer::new(b"(UID 5 BODY[2] {4}\r\nAAEC)");
        let items = parse_fetch_response(&mut lexer).unwrap();
        match &items[1] {
            FetchItem::Body { section, data, .. } => {
                assert_eq!(section.as_deref(), Some("2"));
                assert_eq!(data.as_deref(), Some(&b"AAEC"[..]));
            }
            other => panic!("Expected body, got {other:?}"),
        }
    }

    #[test]
    fn fetch_whole_message_and_origin() {
        let mut lexer = Lexer::new(b"(BODY[]<0> \"Hi\")");
        let items = parse_fetch_response(&mut lexer).unwrap();
        assert_eq!(
            items[0],
            FetchItem::Body {
                section: None,
                origin: Some(0),
                data: Some(b"Hi".to_vec()),
            }
        );
    }

    #[test]
    fn fetch_nil_body() {
        let mut lexer = Lexer::new(b"(BODY[1.2] NIL)");
        let items = parse_fetch_response(&mut lexer).unwrap();
        assert!(matches!(&items[0], FetchItem::Body { data: None, .. }));
    }

    #[test]
    fn envelope_with_addresses() {
        let data = b"(\"Mon, 7 Feb 1994 21:52:25 -0800\" \"Lunch\" ((\"Fred\" NIL \"fred\" \"example.com\")) NIL NIL ((NIL NIL \"ana\" \"example.org\")(NIL NIL \"bo\" \"example.org\")) NIL NIL NIL \"<B27397-0100000@example.com>\")";
        let mut lexer = Lexer::new(data);
        let envelope = parse_envelope(&mut lexer).unwrap();

        assert_eq!(envelope.subject.as_deref(), Some("Lunch"));
        assert_eq!(envelope.from[0].name.as_deref(), Some("Fred"));
        assert_eq!(envelope.to.len(), 2);
        assert_eq!(envelope.to[1].email().as_deref(), Some("bo@example.org"));
        assert_eq!(
            envelope.message_id.as_deref(),
            Some("<B27397-0100000@example.com>")
        );
    }

    #[test]
    fn single_text_part_with_lines() {
        let body = structure(b"(\"TEXT\" \"PLAIN\" (\"CHARSET\" \"US-ASCII\") NIL NIL \"7BIT\" 3028 92)");
        match body {
            BodyStructure::Single(part) => {
                assert_eq!(part.mime_type(), "text/plain");
                assert_eq!(part.param("charset"), Some("US-ASCII"));
                assert_eq!(part.encoding, "7bit");
                assert_eq!(part.size, 3028);
                assert_eq!(part.lines, Some(92));
                assert!(part.disposition.is_none());
            }
            other => panic!("Expected single part, got {other:?}"),
        }
    }

    #[test]
    fn single_part_with_disposition() {
        let body = structure(
            b"(\"APPLICATION\" \"PDF\" (\"NAME\" \"a.pdf\") NIL NIL \"BASE64\" 4096 NIL (\"ATTACHMENT\" (\"FILENAME\" \"Quarterly.pdf\")) NIL NIL)",
        );
        let disposition = body.disposition().unwrap();
        assert_eq!(disposition.kind, "attachment");
        assert_eq!(disposition.param("filename"), Some("Quarterly.pdf"));
    }

    #[test]
    fn inline_image_with_content_id() {
        let body = structure(
            b"(\"IMAGE\" \"PNG\" NIL \"<logo@x>\" NIL \"BASE64\" 1200 NIL (\"INLINE\" NIL) NIL)",
        );
        match body {
            BodyStructure::Single(part) => {
                assert_eq!(part.id.as_deref(), Some("<logo@x>"));
                assert_eq!(part.disposition.unwrap().kind, "inline");
            }
            other => panic!("Expected single part, got {other:?}"),
        }
    }

    #[test]
    fn multipart_mixed_with_attachment() {
        let body = structure(
            b"((\"TEXT\" \"PLAIN\" (\"CHARSET\" \"utf-8\") NIL NIL \"QUOTED-PRINTABLE\" 120 4 NIL NIL NIL)(\"APPLICATION\" \"ZIP\" (\"NAME\" \"logs.zip\") NIL NIL \"BASE64\" 20000 NIL (\"attachment\" (\"filename\" \"logs.zip\")) NIL NIL) \"MIXED\" (\"BOUNDARY\" \"b1\") NIL NIL NIL)",
        );
        match body {
            BodyStructure::Multipart {
                bodies,
                subtype,
                params,
                disposition,
            } => {
                assert_eq!(subtype, "mixed");
                assert_eq!(params, vec![("boundary".to_string(), "b1".to_string())]);
                assert!(disposition.is_none());
                assert_eq!(bodies.len(), 2);
                assert_eq!(bodies[1].disposition().unwrap().kind, "attachment");
            }
            other => panic!("Expected multipart, got {other:?}"),
        }
    }

    #[test]
    fn multipart_without_extension_data() {
        let body = structure(
            b"((\"TEXT\" \"PLAIN\" NIL NIL NIL \"7BIT\" 10 1)(\"TEXT\" \"HTML\" NIL NIL NIL \"7BIT\" 20 1) \"ALTERNATIVE\")",
        );
        assert!(matches!(
            body,
            BodyStructure::Multipart { ref subtype, ref bodies, .. }
                if subtype == "alternative" && bodies.len() == 2
        ));
    }

    #[test]
    fn encapsulated_message() {
        let body = structure(
            b"(\"MESSAGE\" \"RFC822\" NIL NIL NIL \"7BIT\" 342 (NIL \"Fwd\" NIL NIL NIL NIL NIL NIL NIL NIL) (\"TEXT\" \"PLAIN\" NIL NIL NIL \"7BIT\" 20 2) 12 NIL (\"attachment\" NIL) NIL)",
        );
        match body {
            BodyStructure::Message {
                part,
                envelope,
                body,
            } => {
                assert_eq!(part.mime_type(), "message/rfc822");
                assert_eq!(part.lines, Some(12));
                assert_eq!(part.disposition.unwrap().kind, "attachment");
                assert_eq!(envelope.subject.as_deref(), Some("Fwd"));
                assert!(matches!(*body, BodyStructure::Single(_)));
            }
            other => panic!("Expected message, got {other:?}"),
        }
    }

    #[test]
    fn language_list_and_location_are_skipped() {
        let body = structure(
            b"(\"TEXT\" \"PLAIN\" NIL NIL NIL \"7BIT\" 1 1 NIL NIL (\"en\" \"de\") \"http://x\" 99)",
        );
        assert!(matches!(body, BodyStructure::Single(_)));
    }

    #[test]
    fn fetch_with_bodystructure_and_envelope() {
        let data = b"(UID 77 FLAGS () ENVELOPE (NIL \"s\" NIL NIL NIL NIL NIL NIL NIL NIL) BODYSTRUCTURE (\"TEXT\" \"PLAIN\" NIL NIL NIL \"7BIT\" 5 1 NIL NIL NIL NIL) RFC822.SIZE 400)";
        let mut lexer = Lexer::new(data);
        let items = parse_fetch_response(&mut lexer).unwrap();
        assert_eq!(items.len(), 5);
        assert!(matches!(items[3], FetchItem::BodyStructure(_)));
        assert!(matches!(items[4], FetchItem::Rfc822Size(400)));
    }
}
