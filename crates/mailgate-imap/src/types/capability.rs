//! Server capabilities and response status.

/// Response status from a tagged or untagged status response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Command completed successfully.
    Ok,
    /// Command failed (operational error).
    No,
    /// Command failed (protocol/syntax error).
    Bad,
    /// Server greeting (pre-authenticated).
    PreAuth,
    /// Server is closing connection.
    Bye,
}

impl Status {
    /// Returns true if this is a successful status.
    #[must_use]
    pub fn is_ok(self) -> bool {
        matches!(self, Self::Ok | Self::PreAuth)
    }
}

/// Server capability.
///
/// Only the capabilities the gateway branches on get their own variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `IMAP4rev1` (RFC 3501)
    Imap4Rev1,
    /// `IMAP4rev2` (RFC 9051)
    Imap4Rev2,
    /// UIDPLUS extension (RFC 4315)
    UidPlus,
    /// MOVE extension (RFC 6851)
    Move,
    /// STARTTLS support
    StartTls,
    /// LOGIN disabled
    LoginDisabled,
    /// SPECIAL-USE mailboxes (RFC 6154)
    SpecialUse,
    /// AUTH mechanism
    Auth(String),
    /// Unknown capability
    Unknown(String),
}

impl Capability {
    /// Parses a capability string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let upper = s.to_ascii_uppercase();
        match upper.as_str() {
            "IMAP4REV1" => Self::Imap4Rev1,
            "IMAP4REV2" => Self::Imap4Rev2,
            "UIDPLUS" => Self::UidPlus,
            "MOVE" => Self::Move,
            "STARTTLS" => Self::StartTls,
            "LOGINDISABLED" => Self::LoginDisabled,
            "SPECIAL-USE" => Self::SpecialUse,
            _ => match upper.strip_prefix("AUTH=") {
                Some(_) => Self::Auth(s[5..].to_string()),
                None => Self::Unknown(s.to_string()),
            },
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Imap4Rev1 => f.write_str("IMAP4rev1"),
            Self::Imap4Rev2 => f.write_str("IMAP4rev2"),
            Self::UidPlus => f.write_str("UIDPLUS"),
            Self::Move => f.write_str("MOVE"),
            Self::StartTls => f.write_str("STARTTLS"),
            Self::LoginDisabled => f.write_str("LOGINDISABLED"),
            Self::SpecialUse => f.write_str("SPECIAL-USE"),
            Self::Auth(mech) => write!(f, "AUTH={mech}"),
            Self::Unknown(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_ok() {
        assert!(Status::Ok.is_ok());
        assert!(Status::PreAuth.is_ok());
        assert!(!Status::No.is_ok());
        assert!(!Status::Bad.is_ok());
        assert!(!Status::Bye.is_ok());
    }

    #[test]
    fn parse_known_capabilities() {
        assert_eq!(Capability::parse("IMAP4rev1"), Capability::Imap4Rev1);
        assert_eq!(Capability::parse("move"), Capability::Move);
        assert_eq!(Capability::parse("UIDPLUS"), Capability::UidPlus);
        assert_eq!(Capability::parse("LOGINDISABLED"), Capability::LoginDisabled);
    }

    #[test]
    fn parse_auth_keeps_mechanism_case() {
        assert_eq!(
            Capability::parse("AUTH=Plain"),
            Capability::Auth("Plain".to_string())
        );
    }

    #[test]
    fn unknown_round_trips_through_display() {
        let cap = Capability::parse("X-GM-EXT-1");
        assert_eq!(cap, Capability::Unknown("X-GM-EXT-1".to_string()));
        assert_eq!(cap.to_string(), "X-GM-EXT-1");
    }
}
