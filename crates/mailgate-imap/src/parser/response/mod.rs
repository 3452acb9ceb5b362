//! IMAP response parser.
//!
//! Turns one complete response (as returned by the framing layer, literals
//! inlined) into a [`Response`]. Anything the gateway never asks for, such as
//! STATUS or NAMESPACE data, is reported as a parse error and ignored by the
//! client.

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::elidable_lifetime_names)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::needless_continue)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::option_if_let_else)]

mod fetch;
mod helpers;
mod types;

pub use types::{
    Address, BodyPart, BodyStructure, Disposition, Envelope, FetchItem, MessageData,
    UntaggedResponse,
};

use crate::parser::lexer::{Lexer, Token};
use crate::types::{ResponseCode, SeqNum, Status, Tag};
use crate::{Error, Result};

use helpers::{
    parse_capability_data, parse_list_response, parse_response_code, parse_search_response,
    read_text_until_crlf,
};

/// A parsed IMAP response.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Tagged response (command completion).
    Tagged {
        /// The command tag.
        tag: Tag,
        /// Response status.
        status: Status,
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// Untagged response (server data).
    Untagged(UntaggedResponse),
    /// Continuation request.
    Continuation {
        /// Optional text/data.
        text: Option<String>,
    },
}

/// Response parser.
pub struct ResponseParser;

impl ResponseParser {
    /// Parses a complete response line.
    pub fn parse(input: &[u8]) -> Result<Response> {
        let mut lexer = Lexer::new(input);

        match lexer.next_token()? {
            Token::Asterisk => Self::parse_untagged(&mut lexer),
            Token::Plus => Self::parse_continuation(&mut lexer),
            Token::Atom(tag) => Self::parse_tagged(&mut lexer, tag),
            token => Err(Error::Parse {
                position: 0,
                message: format!("Expected *, +, or tag, got {token:?}"),
            }),
        }
    }

    /// Parses a tagged response.
    fn parse_tagged(lexer: &mut Lexer<'_>, tag_str: &str) -> Result<Response> {
        lexer.expect_space()?;

        let status = Self::parse_status(lexer)?;
        lexer.expect_space()?;

        let (code, text) = Self::parse_resp_text(lexer)?;

        Ok(Response::Tagged {
            tag: Tag::new(tag_str),
            status,
            code,
            text,
        })
    }

    /// Parses an untagged response.
    fn parse_untagged(lexer: &mut Lexer<'_>) -> Result<Response> {
        lexer.expect_space()?;

        let token = lexer.next_token()?;

        match token {
            Token::Atom(s) => {
                let upper = s.to_ascii_uppercase();
                match upper.as_str() {
                    "OK" => {
                        lexer.expect_space()?;
                        let (code, text) = Self::parse_resp_text(lexer)?;
                        Ok(Response::Untagged(UntaggedResponse::Ok { code, text }))
                    }
                    "NO" => {
                        lexer.expect_space()?;
                        let (code, text) = Self::parse_resp_text(lexer)?;
                        Ok(Response::Untagged(UntaggedResponse::No { code, text }))
                    }
                    "BAD" => {
                        lexer.expect_space()?;
                        let (code, text) = Self::parse_resp_text(lexer)?;
                        Ok(Response::Untagged(UntaggedResponse::Bad { code, text }))
                    }
                    "PREAUTH" => {
                        lexer.expect_space()?;
                        let (code, text) = Self::parse_resp_text(lexer)?;
                        Ok(Response::Untagged(UntaggedResponse::PreAuth { code, text }))
                    }
                    "BYE" => {
                        lexer.expect_space()?;
                        let (code, text) = Self::parse_resp_text(lexer)?;
                        Ok(Response::Untagged(UntaggedResponse::Bye { code, text }))
                    }
                    "CAPABILITY" => {
                        let caps = parse_capability_data(lexer)?;
                        Ok(Response::Untagged(UntaggedResponse::Capability(caps)))
                    }
                    "FLAGS" => {
                        lexer.expect_space()?;
                        let flags = parse_flag_list(lexer)?;
                        Ok(Response::Untagged(UntaggedResponse::Flags(flags)))
                    }
                    "LIST" => {
                        lexer.expect_space()?;
                        let list = parse_list_response(lexer)?;
                        Ok(Response::Untagged(UntaggedResponse::List(list)))
                    }
                    "SEARCH" => {
                        let nums = parse_search_response(lexer)?;
                        Ok(Response::Untagged(UntaggedResponse::Search(nums)))
                    }
                    _ => Err(Error::Parse {
                        position: lexer.position(),
                        message: format!("Unknown untagged response: {s}"),
                    }),
                }
            }
            Token::Number(n) => {
                lexer.expect_space()?;
                let keyword = lexer.read_atom_string()?;
                let upper = keyword.to_ascii_uppercase();

                match upper.as_str() {
                    "EXISTS" => Ok(Response::Untagged(UntaggedResponse::Exists(n))),
                    "RECENT" => Ok(Response::Untagged(UntaggedResponse::Recent(n))),
                    "EXPUNGE" => {
                        let seq = SeqNum::new(n).ok_or_else(|| Error::Parse {
                            position: lexer.position(),
                            message: "Invalid sequence number 0".to_string(),
                        })?;
                        Ok(Response::Untagged(UntaggedResponse::Expunge(seq)))
                    }
                    "FETCH" => {
                        let seq = SeqNum::new(n).ok_or_else(|| Error::Parse {
                            position: lexer.position(),
                            message: "Invalid sequence number 0".to_string(),
                        })?;
                        lexer.expect_space()?;
                        let items = fetch::parse_fetch_response(lexer)?;
                        Ok(Response::Untagged(UntaggedResponse::Fetch { seq, items }))
                    }
                    _ => Err(Error::Parse {
                        position: lexer.position(),
                        message: format!("Unknown message data: {keyword}"),
                    }),
                }
            }
            _ => Err(Error::Parse {
                position: lexer.position(),
                message: format!("Unexpected token in untagged response: {token:?}"),
            }),
        }
    }

    /// Parses a continuation response.
    fn parse_continuation(lexer: &mut Lexer<'_>) -> Result<Response> {
        // Skip optional space
        if lexer.peek() == Some(b' ') {
            lexer.advance();
        }

        // Read remaining text until CRLF
        let text = read_text_until_crlf(lexer);

        Ok(Response::Continuation {
            text: if text.is_empty() { None } else { Some(text) },
        })
    }

    /// Parses a status keyword.
    fn parse_status(lexer: &mut Lexer<'_>) -> Result<Status> {
        let s = lexer.read_atom_string()?;
        match s.to_ascii_uppercase().as_str() {
            "OK" => Ok(Status::Ok),
            "NO" => Ok(Status::No),
            "BAD" => Ok(Status::Bad),
            "PREAUTH" => Ok(Status::PreAuth),
            "BYE" => Ok(Status::Bye),
            _ => Err(Error::Parse {
                position: lexer.position(),
                message: format!("Invalid status: {s}"),
            }),
        }
    }

    /// Parses response text with optional response code.
    fn parse_resp_text(lexer: &mut Lexer<'_>) -> Result<(Option<ResponseCode>, String)> {
        let code = if lexer.peek() == Some(b'[') {
            Some(parse_response_code(lexer)?)
        } else {
            None
        };

        // Skip space after code if present
        if lexer.peek() == Some(b' ') {
            lexer.advance();
        }

        let text = read_text_until_crlf(lexer);

        Ok((code, text))
    }
}

// Re-export parse_flag_list for fetch module
pub(crate) use helpers::parse_flag_list;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::types::{Capability, Flag, MailboxAttribute, ResponseCode};

    use super::*;

    #[test]
    fn test_parse_greeting() {
        let input = b"* OK [CAPABILITY IMAP4rev1 MOVE UIDPLUS] Dovecot ready.\r\n";
        match ResponseParser::parse(input).unwrap() {
            Response::Untagged(UntaggedResponse::Ok {
                code: Some(ResponseCode::Capability(caps)),
                text,
            }) => {
                assert!(caps.contains(&Capability::Move));
                assert!(caps.contains(&Capability::UidPlus));
                assert_eq!(text, "Dovecot ready.");
            }
            other => panic!("Expected greeting, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_tagged_ok() {
        let input = b"A0001 OK LOGIN completed\r\n";
        match ResponseParser::parse(input).unwrap() {
            Response::Tagged {
                tag,
                status,
                code,
                text,
            } => {
                assert_eq!(tag.as_str(), "A0001");
                assert_eq!(status, Status::Ok);
                assert!(code.is_none());
                assert_eq!(text, "LOGIN completed");
            }
            other => panic!("Expected tagged response, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_tagged_no_with_nonexistent() {
        let input = b"A0007 NO [NONEXISTENT] Unknown UID\r\n";
        match ResponseParser::parse(input).unwrap() {
            Response::Tagged {
                status, code, text, ..
            } => {
                assert_eq!(status, Status::No);
                assert_eq!(code, Some(ResponseCode::Nonexistent));
                assert_eq!(text, "Unknown UID");
            }
            other => panic!("Expected tagged response, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_exists_and_expunge() {
        assert_eq!(
            ResponseParser::parse(b"* 23 EXISTS\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Exists(23))
        );
        assert_eq!(
            ResponseParser::parse(b"* 4 EXPUNGE\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Expunge(SeqNum::new(4).unwrap()))
        );
    }

    #[test]
    fn test_parse_flags() {
        let input = b"* FLAGS (\\Seen \\Answered \\Flagged \\Deleted \\Draft)\r\n";
        match ResponseParser::parse(input).unwrap() {
            Response::Untagged(UntaggedResponse::Flags(flags)) => {
                assert!(flags.contains(&Flag::Seen));
                assert!(flags.contains(&Flag::Draft));
                assert_eq!(flags.len(), 5);
            }
            other => panic!("Expected FLAGS, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_list_special_use() {
        let input = b"* LIST (\\HasNoChildren \\Sent) \"/\" \"Sent Messages\"\r\n";
        match ResponseParser::parse(input).unwrap() {
            Response::Untagged(UntaggedResponse::List(list)) => {
                assert!(list.attributes.contains(&MailboxAttribute::Sent));
                assert_eq!(list.delimiter, Some('/'));
                assert_eq!(list.mailbox.as_str(), "Sent Messages");
            }
            other => panic!("Expected LIST, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_continuation() {
        match ResponseParser::parse(b"+ Ready for literal data\r\n").unwrap() {
            Response::Continuation { text } => {
                assert_eq!(text.as_deref(), Some("Ready for literal data"));
            }
            other => panic!("Expected continuation, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_bare_continuation() {
        assert_eq!(
            ResponseParser::parse(b"+\r\n").unwrap(),
            Response::Continuation { text: None }
        );
    }

    #[test]
    fn test_parse_uidvalidity() {
        let input = b"* OK [UIDVALIDITY 1234567890] UIDs valid\r\n";
        match ResponseParser::parse(input).unwrap() {
            Response::Untagged(UntaggedResponse::Ok {
                code: Some(ResponseCode::UidValidity(v)),
                ..
            }) => assert_eq!(v.get(), 1_234_567_890),
            other => panic!("Expected UIDVALIDITY, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_uid_search() {
        match ResponseParser::parse(b"* SEARCH 3 9 27 28\r\n").unwrap() {
            Response::Untagged(UntaggedResponse::Search(nums)) => {
                assert_eq!(nums, vec![3, 9, 27, 28]);
            }
            other => panic!("Expected SEARCH, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_fetch_with_literal() {
        let input = b"* 2 FETCH (UID 31 BODY[1] {5}\r\nhello)\r\n";
        match ResponseParser::parse(input).unwrap() {
            Response::Untagged(UntaggedResponse::Fetch { seq, items }) => {
                let data = MessageData::from_items(seq, items);
                assert_eq!(data.uid.unwrap().get(), 31);
                assert_eq!(data.section(Some("1")), Some(&b"hello"[..]));
            }
            other => panic!("Expected FETCH, got {other:?}"),
        }
    }

    #[test]
    fn test_unmodelled_untagged_is_an_error() {
        assert!(ResponseParser::parse(b"* STATUS INBOX (MESSAGES 3)\r\n").is_err());
    }
}
