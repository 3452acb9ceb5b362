//! Credential record validation.

use std::collections::HashSet;

use super::model::CredentialRecord;

/// Validation error for a credential record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// IMAP host is empty.
    EmptyImapHost,
    /// IMAP port is invalid.
    InvalidImapPort,
    /// SMTP host is empty.
    EmptySmtpHost,
    /// SMTP port is invalid.
    InvalidSmtpPort,
    /// An identity has an empty id.
    EmptyIdentityId,
    /// An identity has an empty username.
    EmptyUsername(String),
    /// An identity has an empty secret.
    EmptySecret(String),
    /// Two identities share an id.
    DuplicateIdentity(String),
}

impl ValidationError {
    /// Get the field name this error relates to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::EmptyImapHost => "imap_host",
            Self::InvalidImapPort => "imap_port",
            Self::EmptySmtpHost => "smtp_host",
            Self::InvalidSmtpPort => "smtp_port",
            Self::EmptyIdentityId | Self::DuplicateIdentity(_) => "identity_id",
            Self::EmptyUsername(_) => "username",
            Self::EmptySecret(_) => "secret",
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyImapHost => f.write_str("IMAP server is required"),
            Self::InvalidImapPort => f.write_str("IMAP port must be 1-65535"),
            Self::EmptySmtpHost => f.write_str("SMTP server is required"),
            Self::InvalidSmtpPort => f.write_str("SMTP port must be 1-65535"),
            Self::EmptyIdentityId => f.write_str("identity id is required"),
            Self::EmptyUsername(id) => write!(f, "username is required for identity {id}"),
            Self::EmptySecret(id) => write!(f, "password is required for identity {id}"),
            Self::DuplicateIdentity(id) => write!(f, "identity {id} is listed twice"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Result of validating a record.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Validate a credential record before it is verified and sealed.
///
/// # Errors
///
/// Returns every problem found, not just the first.
pub fn validate_record(record: &CredentialRecord) -> ValidationResult {
    let mut errors = Vec::new();

    if record.imap.host.trim().is_empty() {
        errors.push(ValidationError::EmptyImapHost);
    }
    if record.imap.port == 0 {
        errors.push(ValidationError::InvalidImapPort);
    }
    if record.smtp.host.trim().is_empty() {
        errors.push(ValidationError::EmptySmtpHost);
    }
    if record.smtp.port == 0 {
        errors.push(ValidationError::InvalidSmtpPort);
    }

    let mut seen = HashSet::new();
    for identity in record.identities.iter() {
        if identity.id.trim().is_empty() {
            errors.push(ValidationError::EmptyIdentityId);
        } else if !seen.insert(identity.id.as_str()) {
            errors.push(ValidationError::DuplicateIdentity(identity.id.clone()));
        }
        if identity.username.trim().is_empty() {
            errors.push(ValidationError::EmptyUsername(identity.id.clone()));
        }
        if identity.secret.is_empty() {
            errors.push(ValidationError::EmptySecret(identity.id.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
