//! # mailgate-smtp
//!
//! Async SMTP submission client (RFC 5321) used by the mailgate gateway.
//!
//! ## Features
//!
//! - **Type-state connection management**: compile-time enforcement of valid
//!   SMTP state transitions
//! - **Submission flow**: EHLO, STARTTLS, AUTH PLAIN, MAIL FROM, RCPT TO,
//!   DATA with dot-stuffing
//! - **TLS via rustls**: implicit TLS (port 465) or STARTTLS (port 587)
//!
//! ## Quick Start
//!
//! ```no_run
//! use mailgate_smtp::{Address, Client, Config, Security};
//!
//! # async fn run() -> mailgate_smtp::Result<()> {
//! let config = Config::new("smtp.example.com", Security::Implicit);
//! let client = Client::connect(&config).await?;
//! let client = client.auth_plain("user@example.com", "password").await?;
//!
//! let from = Address::new("user@example.com")?;
//! let to = Address::new("friend@example.org")?;
//! let client = client
//!     .send(from, &[to], b"Subject: Hello\r\n\r\nHi!\r\n")
//!     .await?;
//! client.quit().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! Connected ── auth_plain() ──→ Authenticated ── mail_from() ──→ MailTransaction
//!                                    ↑                               │ rcpt_to()
//!                                    └── send_message() ── Data ←── RecipientAdded
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

pub use connection::{
    Authenticated, Client, Config, Connected, Data, MailTransaction, RecipientAdded, Security,
    ServerInfo, SmtpStream,
};
pub use error::{Error, Result};
pub use types::{Address, AuthMechanism, Extension, Reply, ReplyCode};
