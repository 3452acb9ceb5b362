//! Core IMAP types.
//!
//! Follows RFC 9051 (`IMAP4rev2`) and RFC 3501 (`IMAP4rev1`), limited to
//! what a UID-addressed webmail session needs.

#![allow(clippy::missing_const_for_fn)]

mod capability;
mod flags;
mod identifiers;
mod mailbox;
mod response_code;
mod sequence;

pub use capability::{Capability, Status};
pub use flags::{Flag, Flags};
pub use identifiers::{SeqNum, Tag, Uid, UidValidity};
pub use mailbox::{ListResponse, Mailbox, MailboxAttribute, MailboxStatus};
pub use response_code::ResponseCode;
pub use sequence::UidSet;
