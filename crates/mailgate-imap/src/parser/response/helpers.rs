//! Parser helper functions.

use crate::parser::lexer::{Lexer, Token};
use crate::types::{
    Capability, Flag, Flags, ListResponse, Mailbox, MailboxAttribute, ResponseCode, SeqNum, Uid,
    UidValidity,
};
use crate::{Error, Result};

fn zero_error(lexer: &Lexer<'_>, what: &str) -> Error {
    Error::Parse {
        position: lexer.position(),
        message: format!("Invalid {what} 0"),
    }
}

/// Parses a response code.
pub fn parse_response_code(lexer: &mut Lexer<'_>) -> Result<ResponseCode> {
    lexer.expect(Token::LBracket)?;

    let atom = lexer.read_atom_string()?;
    let upper = atom.to_ascii_uppercase();

    let code = match upper.as_str() {
        "ALERT" => ResponseCode::Alert,
        "READ-ONLY" => ResponseCode::ReadOnly,
        "READ-WRITE" => ResponseCode::ReadWrite,
        "TRYCREATE" => ResponseCode::TryCreate,
        "NONEXISTENT" => ResponseCode::Nonexistent,
        "UIDNEXT" => {
            lexer.expect_space()?;
            let n = lexer.read_number()?;
            ResponseCode::UidNext(Uid::new(n).ok_or_else(|| zero_error(lexer, "UID"))?)
        }
        "UIDVALIDITY" => {
            lexer.expect_space()?;
            let n = lexer.read_number()?;
            ResponseCode::UidValidity(
                UidValidity::new(n).ok_or_else(|| zero_error(lexer, "UIDVALIDITY"))?,
            )
        }
        "UNSEEN" => {
            lexer.expect_space()?;
            let n = lexer.read_number()?;
            ResponseCode::Unseen(SeqNum::new(n).ok_or_else(|| zero_error(lexer, "sequence number"))?)
        }
        "APPENDUID" => {
            lexer.expect_space()?;
            let validity = lexer.read_number()?;
            lexer.expect_space()?;
            let uid = lexer.read_number()?;
            ResponseCode::AppendUid {
                uidvalidity: UidValidity::new(validity)
                    .ok_or_else(|| zero_error(lexer, "UIDVALIDITY"))?,
                uid: Uid::new(uid).ok_or_else(|| zero_error(lexer, "UID"))?,
            }
        }
        "CAPABILITY" => ResponseCode::Capability(parse_capability_data(lexer)?),
        "PERMANENTFLAGS" => {
            lexer.expect_space()?;
            let flags = parse_flag_list(lexer)?;
            ResponseCode::PermanentFlags(flags.into_iter().collect())
        }
        _ => ResponseCode::Unknown(atom.to_string()),
    };

    // Codes may carry arguments we do not model
    while lexer.peek() != Some(b']') && !lexer.is_eof() {
        lexer.advance();
    }
    lexer.expect(Token::RBracket)?;

    Ok(code)
}

/// Parses capability data.
pub fn parse_capability_data(lexer: &mut Lexer<'_>) -> Result<Vec<Capability>> {
    let mut caps = Vec::new();

    while lexer.peek() == Some(b' ') {
        lexer.advance();
        if let Token::Atom(s) = lexer.next_token()? {
            caps.push(Capability::parse(s));
        }
    }

    Ok(caps)
}

/// Parses a flag list.
///
/// The `\*` wildcard of PERMANENTFLAGS lexes as a lone backslash followed by
/// an asterisk and is dropped.
pub fn parse_flag_list(lexer: &mut Lexer<'_>) -> Result<Flags> {
    lexer.expect(Token::LParen)?;

    let mut flags = Flags::new();

    loop {
        match lexer.next_token()? {
            Token::RParen => break,
            Token::Atom("\\") | Token::Asterisk | Token::Space => {}
            Token::Atom(s) => flags.insert(Flag::parse(s)),
            token => {
                return Err(Error::Parse {
                    position: lexer.position(),
                    message: format!("Unexpected token in flag list: {token:?}"),
                });
            }
        }
    }

    Ok(flags)
}

/// Parses a LIST response.
pub fn parse_list_response(lexer: &mut Lexer<'_>) -> Result<ListResponse> {
    lexer.expect(Token::LParen)?;
    let mut attributes = Vec::new();

    loop {
        match lexer.next_token()? {
            Token::RParen => break,
            Token::Atom(s) => attributes.push(MailboxAttribute::parse(s)),
            Token::Space => {}
            token => {
                return Err(Error::Parse {
                    position: lexer.position(),
                    message: format!("Unexpected token in LIST attributes: {token:?}"),
                });
            }
        }
    }

    lexer.expect_space()?;

    let delimiter = match lexer.next_token()? {
        Token::Nil => None,
        Token::Str(bytes) => bytes.first().map(|&b| char::from(b)),
        token => {
            return Err(Error::Parse {
                position: lexer.position(),
                message: format!("Expected delimiter, got {token:?}"),
            });
        }
    };

    lexer.expect_space()?;

    // Some servers send a bare number as the name of a numeric folder
    let mailbox_name = match lexer.next_token()? {
        Token::Number(n) => n.to_string(),
        Token::Atom(s) => s.to_string(),
        token @ Token::Str(_) => token.into_text().unwrap_or_default(),
        token => {
            return Err(Error::Parse {
                position: lexer.position(),
                message: format!("Expected mailbox name, got {token:?}"),
            });
        }
    };

    Ok(ListResponse {
        attributes,
        delimiter,
        mailbox: Mailbox::new(mailbox_name),
    })
}

/// Parses a SEARCH response into the raw numbers, skipping zeros.
pub fn parse_search_response(lexer: &mut Lexer<'_>) -> Result<Vec<u32>> {
    let mut nums = Vec::new();

    while lexer.peek() == Some(b' ') {
        lexer.advance();
        if let Token::Number(n) = lexer.next_token()?
            && n > 0
        {
            nums.push(n);
        }
    }

    Ok(nums)
}

/// Reads text until CRLF.
pub fn read_text_until_crlf(lexer: &mut Lexer<'_>) -> String {
    let remaining = lexer.remaining();

    let end = remaining
        .windows(2)
        .position(|w| w == b"\r\n")
        .unwrap_or(remaining.len());

    lexer.skip(end);

    if lexer.peek() == Some(b'\r') {
        lexer.skip(2);
    }

    String::from_utf8_lossy(&remaining[..end]).to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn permanent_flags_wildcard_is_dropped() {
        let mut lexer = Lexer::new(b"[PERMANENTFLAGS (\\Deleted \\Seen \\*)]");
        match parse_response_code(&mut lexer).unwrap() {
            ResponseCode::PermanentFlags(flags) => {
                assert_eq!(flags, vec![Flag::Deleted, Flag::Seen]);
            }
            other => panic!("Expected PERMANENTFLAGS, got {other:?}"),
        }
    }

    #[test]
    fn nonexistent_code() {
        let mut lexer = Lexer::new(b"[NONEXISTENT]");
        assert_eq!(
            parse_response_code(&mut lexer).unwrap(),
            ResponseCode::Nonexistent
        );
    }

    #[test]
    fn append_uid_code() {
        let mut lexer = Lexer::new(b"[APPENDUID 38505 3955]");
        match parse_response_code(&mut lexer).unwrap() {
            ResponseCode::AppendUid { uidvalidity, uid } => {
                assert_eq!(uidvalidity.get(), 38505);
                assert_eq!(uid.get(), 3955);
            }
            other => panic!("Expected APPENDUID, got {other:?}"),
        }
    }

    #[test]
    fn unknown_code_with_arguments_is_skipped() {
        let mut lexer = Lexer::new(b"[COPYUID 1 2:3 4:5] done");
        assert_eq!(
            parse_response_code(&mut lexer).unwrap(),
            ResponseCode::Unknown("COPYUID".to_string())
        );
        assert_eq!(lexer.remaining(), b" done");
    }

    #[test]
    fn list_with_numeric_name() {
        let mut lexer = Lexer::new(b"(\\HasNoChildren) \".\" 2024");
        let list = parse_list_response(&mut lexer).unwrap();
        assert_eq!(list.mailbox.as_str(), "2024");
        assert_eq!(list.delimiter, Some('.'));
    }

    #[test]
    fn list_with_nil_delimiter() {
        let mut lexer = Lexer::new(b"(\\Noselect) NIL \"\"");
        let list = parse_list_response(&mut lexer).unwrap();
        assert!(list.delimiter.is_none());
        assert!(list.attributes.contains(&MailboxAttribute::NoSelect));
    }

    #[test]
    fn empty_search() {
        let mut lexer = Lexer::new(b"");
        assert!(parse_search_response(&mut lexer).unwrap().is_empty());
    }
}
