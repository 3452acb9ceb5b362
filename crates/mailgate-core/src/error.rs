//! Error types for the core library.

use mailgate_imap::ResponseCode;
use thiserror::Error;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Dialing or authenticating against a mail server failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A credential blob was tampered with, truncated or sealed under
    /// another key.
    #[error("Credential decryption failed")]
    DecryptionFailed,

    /// The server no longer knows the message.
    #[error("Message {uid} not found in {mailbox}")]
    MessageNotFound {
        /// Mailbox that was searched.
        mailbox: String,
        /// UID that was requested.
        uid: u32,
    },

    /// Every Sent candidate refused the archived copy.
    #[error("Archiving to Sent failed: {0}")]
    ArchiveFailed(String),

    /// Any other protocol failure, with the server's message.
    #[error("Operation failed: {0}")]
    OperationFailed(String),

    /// SMTP submission failed.
    #[error("Submission failed: {0}")]
    Submission(String),

    /// Outgoing attachments exceed the size ceiling.
    #[error("Attachments too large: {size} bytes exceeds {limit}")]
    AttachmentsTooLarge {
        /// Total attachment payload in bytes.
        size: usize,
        /// Allowed maximum in bytes.
        limit: usize,
    },

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A credential record failed validation.
    #[error("Invalid account: {0}")]
    InvalidAccount(String),

    /// Account not found.
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<mailgate_imap::Error> for Error {
    fn from(err: mailgate_imap::Error) -> Self {
        Self::OperationFailed(err.to_string())
    }
}

impl From<mailgate_mime::Error> for Error {
    fn from(err: mailgate_mime::Error) -> Self {
        Self::OperationFailed(err.to_string())
    }
}

impl From<mailgate_smtp::Error> for Error {
    fn from(err: mailgate_smtp::Error) -> Self {
        Self::Submission(err.to_string())
    }
}

/// Returns true if an IMAP error says the addressed message is gone: a NO
/// carrying `[NONEXISTENT]`, or any error mentioning an invalid message set.
#[must_use]
pub fn is_missing_message(err: &mailgate_imap::Error) -> bool {
    err.response_code() == Some(&ResponseCode::Nonexistent)
        || err
            .to_string()
            .to_ascii_lowercase()
            .contains("invalid messageset")
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_message_signatures() {
        let nonexistent = mailgate_imap::Error::No {
            code: Some(ResponseCode::Nonexistent),
            text: "gone".to_string(),
        };
        assert!(is_missing_message(&nonexistent));

        let messageset = mailgate_imap::Error::Bad("Error in IMAP command: Invalid messageset".into());
        assert!(is_missing_message(&messageset));

        let other = mailgate_imap::Error::No {
            code: None,
            text: "mailbox is locked".to_string(),
        };
        assert!(!is_missing_message(&other));
    }

    #[test]
    fn protocol_errors_keep_their_text() {
        let err: Error = mailgate_imap::Error::Bad("unknown command".to_string()).into();
        assert!(matches!(err, Error::OperationFailed(ref m) if m.contains("unknown command")));
    }
}
