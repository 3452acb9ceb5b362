//! # mailgate-core
//!
//! Gateway core for `mailgate`, a personal webmail backend.
//!
//! This crate provides:
//! - Account storage (`SQLite`) with credentials sealed by an AEAD vault
//! - A connection pool holding one live IMAP session per account identity
//! - Folder-role discovery for Trash, Sent and Spam
//! - Stable newest-first UID pagination
//! - Attachment classification over IMAP body structures
//! - The send-then-archive workflow
//! - [`GatewayService`], the facade the HTTP layer calls

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod account;
pub mod classify;
pub mod config;
mod error;
pub mod folders;
pub mod pagination;
pub mod pool;
pub mod send;
pub mod service;
pub mod vault;

#[cfg(test)]
mod testing;

pub use account::{
    Account, AccountId, AccountRepository, ActiveIdentity, CredentialRecord, Endpoint, Identities,
    Identity, NewAccount, Security, ValidationError, ValidationResult, validate_record,
};
pub use classify::{AttachmentDescriptor, classify};
pub use config::GatewayConfig;
pub use error::{Error, Result, is_missing_message};
pub use folders::{Folder, Role, find_role};
pub use pagination::{Page, paginate};
pub use pool::{ConnectionPool, Connector, ImapConnector, PoolConfig, PoolKey, PooledSession, SweeperHandle};
pub use send::{ComposedMessage, SendReport, SendState, SmtpSubmitter, Submitter, send_and_archive};
pub use service::{
    AccountContext, AttachmentContent, DeleteOutcome, EmailAddress, FlagMode, GatewayService,
    MessageDetail, MessagePage, MessageSummary,
};
pub use vault::Vault;

/// Re-exported so callers can build attachments without depending on
/// `mailgate-mime` directly.
pub use mailgate_mime::Attachment;
