//! Error types for the IMAP library.

use std::time::Duration;

use thiserror::Error;

use crate::types::ResponseCode;

/// Errors that can occur during IMAP operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS handshake or encryption error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Protocol parsing error.
    #[error("Protocol error at position {position}: {message}")]
    Parse {
        /// Byte position where the error occurred.
        position: usize,
        /// Description of what went wrong.
        message: String,
    },

    /// Server returned NO.
    #[error("Server returned NO: {text}")]
    No {
        /// Response code, when the server sent one.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },

    /// Server returned BAD response.
    #[error("Server returned BAD: {0}")]
    Bad(String),

    /// Server sent BYE (disconnecting).
    #[error("Server sent BYE: {0}")]
    Bye(String),

    /// Operation timed out.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid state for the requested operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Protocol violation or unexpected data.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Returns true if the connection can no longer be trusted after this
    /// error: the stream broke, timed out, desynchronized or was closed by
    /// the server. NO and BAD leave the session usable.
    #[must_use]
    pub const fn is_connection_lost(&self) -> bool {
        matches!(
            self,
            Self::Io(_)
                | Self::Tls(_)
                | Self::Parse { .. }
                | Self::Bye(_)
                | Self::Timeout(_)
                | Self::Protocol(_)
        )
    }

    /// Returns the response code of a NO, if any.
    #[must_use]
    pub const fn response_code(&self) -> Option<&ResponseCode> {
        match self {
            Self::No { code, .. } => code.as_ref(),
            _ => None,
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_lose_the_connection() {
        let io = Error::Io(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"));
        assert!(io.is_connection_lost());
        assert!(Error::Bye("shutting down".to_string()).is_connection_lost());
        assert!(Error::Timeout(Duration::from_secs(15)).is_connection_lost());
    }

    #[test]
    fn command_failures_keep_the_connection() {
        let no = Error::No {
            code: Some(ResponseCode::Nonexistent),
            text: "no such message".to_string(),
        };
        assert!(!no.is_connection_lost());
        assert_eq!(no.response_code(), Some(&ResponseCode::Nonexistent));
        assert!(!Error::Bad("syntax".to_string()).is_connection_lost());
    }
}
