//! Sans-I/O parser for IMAP server responses.
//!
//! - **Lexer**: tokenizes raw bytes into IMAP tokens (atoms, strings, numbers, ...)
//! - **Response parser**: builds structured responses from tokens
//!
//! # Example
//!
//! ```
//! use mailgate_imap::parser::{Response, ResponseParser, UntaggedResponse};
//!
//! let response = ResponseParser::parse(b"* 12 EXISTS\r\n").unwrap();
//! assert_eq!(response, Response::Untagged(UntaggedResponse::Exists(12)));
//! ```

pub mod lexer;
pub mod response;

pub use lexer::{Lexer, Token};
pub use response::{
    Address, BodyPart, BodyStructure, Disposition, Envelope, FetchItem, MessageData, Response,
    ResponseParser, UntaggedResponse,
};
