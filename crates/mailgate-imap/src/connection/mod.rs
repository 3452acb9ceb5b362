//! IMAP connection management.
//!
//! - Configuration (host, port, security mode, timeouts)
//! - TLS/plaintext stream abstraction
//! - Framed I/O for the IMAP protocol
//! - Type-state client

mod client;
mod config;
mod framed;
mod stream;

pub use client::{Authenticated, Client, LoggedIn, NotAuthenticated, Selected};
pub use config::{Config, ConfigBuilder, Security};
pub use framed::FramedStream;
pub use stream::{ImapStream, connect_plain, connect_tls, create_tls_connector, open, with_timeout};
