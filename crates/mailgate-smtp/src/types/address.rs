//! Email address types.

use crate::error::{Error, Result};

/// Envelope address for MAIL FROM and RCPT TO.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Creates a new address from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn new(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        let trimmed = addr
            .trim()
            .trim_start_matches('<')
            .trim_end_matches('>')
            .to_string();
        Self::validate(&trimmed)?;
        Ok(Self(trimmed))
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validates an email address (basic validation).
    fn validate(addr: &str) -> Result<()> {
        if addr.is_empty() {
            return Err(Error::InvalidAddress("Address cannot be empty".into()));
        }

        if addr
            .chars()
            .any(|c| c.is_control() || c.is_whitespace() || c == '<' || c == '>')
        {
            return Err(Error::InvalidAddress(format!("Unexpected character in {addr:?}")));
        }

        if !addr.contains('@') {
            return Err(Error::InvalidAddress("Address must contain @".into()));
        }

        let parts: Vec<&str> = addr.split('@').collect();
        if parts.len() != 2 {
            return Err(Error::InvalidAddress(
                "Address must have exactly one @".into(),
            ));
        }

        if parts[0].is_empty() || parts[1].is_empty() {
            return Err(Error::InvalidAddress(
                "Local and domain parts cannot be empty".into(),
            ));
        }

        Ok(())
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_address() {
        let addr = Address::new("user@example.com").unwrap();
        assert_eq!(addr.as_str(), "user@example.com");
    }

    #[test]
    fn test_invalid_address_no_at() {
        assert!(Address::new("userexample.com").is_err());
    }

    #[test]
    fn test_invalid_address_empty() {
        assert!(Address::new("").is_err());
    }

    #[test]
    fn test_invalid_address_empty_local() {
        assert!(Address::new("@example.com").is_err());
    }

    #[test]
    fn test_invalid_address_empty_domain() {
        assert!(Address::new("user@").is_err());
    }

    #[test]
    fn test_surrounding_whitespace_and_brackets_are_trimmed() {
        let addr = Address::new("  <bo@example.org> ").unwrap();
        assert_eq!(addr.as_str(), "bo@example.org");
    }

    #[test]
    fn test_angle_brackets_inside_are_rejected() {
        assert!(Address::new("a<b@example.org").is_err());
        assert!(Address::new("bo@example.org\r\nRCPT TO:<x@y>").is_err());
    }
}
