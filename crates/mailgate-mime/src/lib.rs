//! # mailgate-mime
//!
//! RFC 5322 message composition and MIME parsing for the mailgate gateway.
//!
//! - [`MessageBuilder`] renders an outgoing message once, as the exact bytes
//!   that are both submitted over SMTP and archived into the Sent folder.
//! - [`Message::parse`] walks a fetched message, nested multiparts
//!   included, and returns the decoded text and HTML bodies.
//! - [`encoding`] holds the Base64, Quoted-Printable and RFC 2047 codecs.
//!
//! ```
//! use mailgate_mime::Message;
//!
//! let raw = b"Subject: =?utf-8?Q?Caf=C3=A9?=\r\n\
//! Content-Type: text/plain; charset=utf-8\r\n\
//! \r\n\
//! Hello";
//!
//! let message = Message::parse(raw).unwrap();
//! assert_eq!(message.subject().as_deref(), Some("Café"));
//! assert_eq!(message.text_body().as_deref(), Some("Hello"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod builder;
mod content_type;
mod error;
mod header;
mod message;

pub mod encoding;

pub use builder::{Attachment, MessageBuilder};
pub use content_type::ContentType;
pub use error::{Error, Result};
pub use header::Headers;
pub use message::{Body, Message, Part, TransferEncoding};
