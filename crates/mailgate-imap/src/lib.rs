//! # mailgate-imap
//!
//! Async IMAP4rev1 client used by the mailgate gateway.
//!
//! ## Features
//!
//! - **Type-state connection management**: compile-time enforcement of valid
//!   IMAP state transitions (`NotAuthenticated` → `Authenticated` → `Selected`)
//! - **UID addressed commands**: SEARCH, FETCH, STORE, COPY, MOVE, EXPUNGE
//! - **TLS via rustls**: implicit TLS or STARTTLS, with bounded connect and
//!   greeting waits
//! - **Sans-I/O parser**: envelopes, body structures with dispositions, and
//!   binary body sections
//!
//! ## Quick Start
//!
//! ```no_run
//! use mailgate_imap::{Client, Config, FetchItems, SearchCriteria, UidSet};
//!
//! # async fn run() -> mailgate_imap::Result<()> {
//! let config = Config::new("imap.example.com");
//! let client = Client::connect(&config).await?;
//! let mut client = client.login("user@example.com", "password").await?;
//!
//! for folder in client.list("", "*").await? {
//!     println!("{}", folder.mailbox);
//! }
//!
//! let mut inbox = client.select("INBOX").await?;
//! let uids = inbox.uid_search(SearchCriteria::All).await?;
//! if let Some(set) = UidSet::list(&uids) {
//!     let messages = inbox.uid_fetch(&set, FetchItems::summary()).await?;
//!     println!("fetched {}", messages.len());
//! }
//! inbox.logout().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! NotAuthenticated ── login() ──→ Authenticated ── select() ──→ Selected
//!                                                    ↺ select()
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use command::{Command, FetchAttribute, FetchItems, SearchCriteria, StoreAction, TagGenerator};
pub use connection::{
    Authenticated, Client, Config, ConfigBuilder, FramedStream, ImapStream, LoggedIn,
    NotAuthenticated, Security, Selected,
};
pub use error::{Error, Result};
pub use parser::{
    Address, BodyPart, BodyStructure, Disposition, Envelope, MessageData, Response,
    ResponseParser, UntaggedResponse,
};
pub use types::{
    Capability, Flag, Flags, ListResponse, Mailbox, MailboxAttribute, MailboxStatus, ResponseCode,
    SeqNum, Status, Tag, Uid, UidSet, UidValidity,
};
