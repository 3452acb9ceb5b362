//! Error types for SMTP operations.

use std::io;
use std::time::Duration;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Hostname is not a valid TLS server name.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Server answered with a non-success reply.
    #[error("SMTP error {code}: {message}")]
    Reply {
        /// Reply code (e.g., 550).
        code: u16,
        /// Error message from server.
        message: String,
    },

    /// Protocol error (unexpected or malformed response).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Message is larger than the server's advertised SIZE.
    #[error("Message of {size} bytes exceeds server limit of {limit} bytes")]
    MessageTooLarge {
        /// Message size.
        size: usize,
        /// Server limit.
        limit: usize,
    },

    /// Feature not supported by server.
    #[error("Server does not support {0}")]
    NotSupported(String),

    /// Connecting took too long.
    #[error("Connection timed out after {0:?}")]
    Timeout(Duration),
}

impl Error {
    /// Creates an error from a reply code and message.
    #[must_use]
    pub fn reply(code: u16, message: impl Into<String>) -> Self {
        Self::Reply {
            code,
            message: message.into(),
        }
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Reply { code, .. } if *code >= 500 && *code < 600)
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Reply { code, .. } if *code >= 400 && *code < 500)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_classes() {
        assert!(Error::reply(535, "bad credentials").is_permanent());
        assert!(Error::reply(451, "try later").is_transient());
        assert!(!Error::Protocol("x".into()).is_permanent());
    }

    #[test]
    fn reply_display() {
        let err = Error::reply(550, "no such user");
        assert_eq!(err.to_string(), "SMTP error 550: no such user");
    }
}
