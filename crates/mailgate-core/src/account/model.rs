//! Account model types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub i64);

impl AccountId {
    /// Create a new account ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Security/encryption mode for connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Security {
    /// No encryption. Only for local test servers.
    None,
    /// Implicit TLS (connect directly with TLS).
    #[default]
    Tls,
    /// Plaintext connect, upgraded with STARTTLS when the server offers it.
    StartTls,
}

impl Security {
    /// Get display name for the security mode.
    #[must_use]
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::None => "None (insecure)",
            Self::Tls => "SSL/TLS",
            Self::StartTls => "STARTTLS",
        }
    }

    /// Stable name used in storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Tls => "tls",
            Self::StartTls => "starttls",
        }
    }

    /// Parses a stored name, defaulting to TLS.
    #[must_use]
    pub fn from_name(s: &str) -> Self {
        match s {
            "none" => Self::None,
            "starttls" => Self::StartTls,
            _ => Self::Tls,
        }
    }
}

impl From<Security> for mailgate_imap::Security {
    fn from(security: Security) -> Self {
        match security {
            Security::None => Self::None,
            Security::Tls => Self::Implicit,
            Security::StartTls => Self::StartTls,
        }
    }
}

impl From<Security> for mailgate_smtp::Security {
    fn from(security: Security) -> Self {
        match security {
            Security::None => Self::None,
            Security::Tls => Self::Implicit,
            Security::StartTls => Self::StartTls,
        }
    }
}

/// Host, port and security of one server.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Endpoint {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
}

impl Endpoint {
    /// Creates an endpoint.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, security: Security) -> Self {
        Self {
            host: host.into(),
            port,
            security,
        }
    }
}

/// One login identity of an account.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable id, used as the sub-account key.
    pub id: String,
    /// Optional human label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Login name for IMAP and SMTP.
    pub username: String,
    /// Password or app password.
    pub secret: String,
}

impl Identity {
    /// Creates an identity without a label.
    #[must_use]
    pub fn new(id: impl Into<String>, username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
            username: username.into(),
            secret: secret.into(),
        }
    }

    /// Sets the label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// The identities an account can log in as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Identities {
    /// A plain account with one login.
    Single {
        /// The only identity.
        identity: Identity,
    },
    /// An account with sub-accounts sharing the same servers.
    Multi {
        /// Identity used when no sub-account is requested or found.
        primary: Identity,
        /// Additional identities.
        identities: Vec<Identity>,
    },
}

impl Identities {
    /// The identity used by default.
    #[must_use]
    pub const fn primary(&self) -> &Identity {
        match self {
            Self::Single { identity } => identity,
            Self::Multi { primary, .. } => primary,
        }
    }

    /// Every identity, primary first.
    pub fn iter(&self) -> impl Iterator<Item = &Identity> {
        let extra = match self {
            Self::Single { .. } => &[][..],
            Self::Multi { identities, .. } => identities.as_slice(),
        };
        std::iter::once(self.primary()).chain(extra)
    }
}

/// Decrypted credentials of an account. Never persisted in clear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// IMAP server.
    pub imap: Endpoint,
    /// SMTP server.
    pub smtp: Endpoint,
    /// Login identities.
    pub identities: Identities,
}

impl CredentialRecord {
    /// Creates a single-identity record.
    #[must_use]
    pub const fn single(imap: Endpoint, smtp: Endpoint, identity: Identity) -> Self {
        Self {
            imap,
            smtp,
            identities: Identities::Single { identity },
        }
    }

    /// Resolves the identity to connect as: the requested sub-account when
    /// it exists, otherwise the primary identity.
    #[must_use]
    pub fn resolve(&self, sub_account: Option<&str>) -> ActiveIdentity {
        let identity = sub_account
            .and_then(|id| self.identities.iter().find(|i| i.id == id))
            .unwrap_or_else(|| self.identities.primary());

        ActiveIdentity {
            identity: identity.clone(),
            imap: self.imap.clone(),
            smtp: self.smtp.clone(),
        }
    }
}

/// A concrete identity with the endpoints it logs into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveIdentity {
    /// Identity to authenticate as.
    pub identity: Identity,
    /// IMAP server.
    pub imap: Endpoint,
    /// SMTP server.
    pub smtp: Endpoint,
}

/// A persisted account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    /// Unique identifier.
    pub id: AccountId,
    /// Display username.
    pub username: String,
    /// Default IMAP endpoint.
    pub imap: Endpoint,
    /// Default SMTP endpoint.
    pub smtp: Endpoint,
    /// Sealed [`CredentialRecord`].
    #[serde(skip)]
    pub enc_creds: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last credential refresh.
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to insert an account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    /// Display username.
    pub username: String,
    /// Default IMAP endpoint.
    pub imap: Endpoint,
    /// Default SMTP endpoint.
    pub smtp: Endpoint,
    /// Sealed [`CredentialRecord`].
    pub enc_creds: String,
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    fn multi() -> CredentialRecord {
        CredentialRecord {
            imap: Endpoint::new("imap.example.com", 993, Security::Tls),
            smtp: Endpoint::new("smtp.example.com", 587, Security::StartTls),
            identities: Identities::Multi {
                primary: Identity::new("main", "ana@example.com", "one"),
                identities: vec![
                    Identity::new("sales", "sales@example.com", "two").with_label("Sales"),
                ],
            },
        }
    }

    mod account_id_tests {
        use super::*;

        #[test]
        fn new() {
            let id = AccountId::new(42);
            assert_eq!(id.0, 42);
        }

        #[test]
        fn display() {
            let id = AccountId::new(123);
            assert_eq!(format!("{id}"), "123");
        }
    }

    mod security_tests {
        use super::*;

        #[test]
        fn default_is_tls() {
            assert_eq!(Security::default(), Security::Tls);
        }

        #[test]
        fn display_names() {
            assert_eq!(Security::None.display_name(), "None (insecure)");
            assert_eq!(Security::Tls.display_name(), "SSL/TLS");
            assert_eq!(Security::StartTls.display_name(), "STARTTLS");
        }

        #[test]
        fn storage_names() {
            for security in [Security::None, Security::Tls, Security::StartTls] {
                assert_eq!(Security::from_name(security.as_str()), security);
            }
            assert_eq!(Security::from_name("bogus"), Security::Tls);
        }

        #[test]
        fn protocol_modes() {
            assert_eq!(
                mailgate_imap::Security::from(Security::Tls),
                mailgate_imap::Security::Implicit
            );
            assert_eq!(
                mailgate_smtp::Security::from(Security::StartTls),
                mailgate_smtp::Security::StartTls
            );
        }
    }

    mod identity_tests {
        use super::*;

        #[test]
        fn debug_redacts_secret() {
            let rendered = format!("{:?}", multi());
            assert!(rendered.contains("ana@example.com"));
            assert!(!rendered.contains("\"one\""));
            assert!(!rendered.contains("\"two\""));
            assert!(rendered.contains("<redacted>"));
        }

        #[test]
        fn resolve_known_sub_account() {
            let active = multi().resolve(Some("sales"));
            assert_eq!(active.identity.username, "sales@example.com");
            assert_eq!(active.smtp.port, 587);
        }

        #[test]
        fn resolve_falls_back_to_primary() {
            assert_eq!(multi().resolve(Some("missing")).identity.id, "main");
            assert_eq!(multi().resolve(None).identity.id, "main");
        }

        #[test]
        fn serialized_form_is_tagged() {
            let json = serde_json::to_value(multi()).unwrap();
            assert_eq!(json["identities"]["kind"], "multi");
            let back: CredentialRecord = serde_json::from_value(json).unwrap();
            assert_eq!(back, multi());
        }

        #[test]
        fn iter_lists_primary_first() {
            let ids: Vec<_> = multi().identities.iter().map(|i| i.id.clone()).collect();
            assert_eq!(ids, vec!["main", "sales"]);
        }
    }
}
