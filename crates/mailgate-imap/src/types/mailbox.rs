//! Mailbox types.

use super::{Flags, SeqNum, Uid, UidValidity};

/// Mailbox name, as the server spells it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Mailbox(pub String);

impl Mailbox {
    /// Creates a new mailbox name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The INBOX mailbox.
    #[must_use]
    pub fn inbox() -> Self {
        Self("INBOX".to_string())
    }

    /// Returns the mailbox name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Mailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Mailbox status information from SELECT/EXAMINE.
#[derive(Debug, Clone, Default)]
pub struct MailboxStatus {
    /// Number of messages in the mailbox.
    pub exists: u32,
    /// Number of recent messages.
    pub recent: u32,
    /// First unseen message sequence number.
    pub unseen: Option<SeqNum>,
    /// Next UID to be assigned.
    pub uid_next: Option<Uid>,
    /// UIDVALIDITY value.
    pub uid_validity: Option<UidValidity>,
    /// Flags defined for this mailbox.
    pub flags: Flags,
    /// Whether the server opened the mailbox read-only.
    pub read_only: bool,
}

/// LIST response data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListResponse {
    /// Mailbox attributes.
    pub attributes: Vec<MailboxAttribute>,
    /// Hierarchy delimiter.
    pub delimiter: Option<char>,
    /// Mailbox name.
    pub mailbox: Mailbox,
}

impl ListResponse {
    /// Returns true if the mailbox carries the given attribute.
    #[must_use]
    pub fn has_attribute(&self, attribute: &MailboxAttribute) -> bool {
        self.attributes.contains(attribute)
    }
}

/// Mailbox attributes from LIST response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MailboxAttribute {
    /// Mailbox cannot be selected.
    NoSelect,
    /// Mailbox does not exist on the server (only a hierarchy placeholder).
    NonExistent,
    /// Mailbox has no children.
    HasNoChildren,
    /// Mailbox has children.
    HasChildren,
    /// Mailbox is marked for attention.
    Marked,
    /// Mailbox is not marked.
    Unmarked,
    // SPECIAL-USE mailbox attributes (RFC 6154)
    /// All messages (virtual mailbox).
    All,
    /// Mailbox is the archive folder.
    Archive,
    /// Mailbox is the drafts folder.
    Drafts,
    /// Flagged/starred messages (virtual mailbox).
    Flagged,
    /// Mailbox is the junk folder. Servers announce it as `\Junk` or `\Spam`.
    Junk,
    /// Mailbox is the sent folder.
    Sent,
    /// Mailbox is the trash folder.
    Trash,
    /// Unknown attribute.
    Unknown(String),
}

impl MailboxAttribute {
    /// Parses a mailbox attribute string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "\\NOSELECT" => Self::NoSelect,
            "\\NONEXISTENT" => Self::NonExistent,
            "\\HASNOCHILDREN" => Self::HasNoChildren,
            "\\HASCHILDREN" => Self::HasChildren,
            "\\MARKED" => Self::Marked,
            "\\UNMARKED" => Self::Unmarked,
            "\\ALL" => Self::All,
            "\\ARCHIVE" => Self::Archive,
            "\\DRAFTS" => Self::Drafts,
            "\\FLAGGED" => Self::Flagged,
            "\\JUNK" | "\\SPAM" => Self::Junk,
            "\\SENT" => Self::Sent,
            "\\TRASH" => Self::Trash,
            _ => Self::Unknown(s.to_string()),
        }
    }

    /// Returns the canonical wire spelling.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::NoSelect => "\\Noselect",
            Self::NonExistent => "\\NonExistent",
            Self::HasNoChildren => "\\HasNoChildren",
            Self::HasChildren => "\\HasChildren",
            Self::Marked => "\\Marked",
            Self::Unmarked => "\\Unmarked",
            Self::All => "\\All",
            Self::Archive => "\\Archive",
            Self::Drafts => "\\Drafts",
            Self::Flagged => "\\Flagged",
            Self::Junk => "\\Junk",
            Self::Sent => "\\Sent",
            Self::Trash => "\\Trash",
            Self::Unknown(s) => s,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn special_use_attributes() {
        assert_eq!(MailboxAttribute::parse("\\Sent"), MailboxAttribute::Sent);
        assert_eq!(MailboxAttribute::parse("\\TRASH"), MailboxAttribute::Trash);
        assert_eq!(MailboxAttribute::parse("\\Drafts"), MailboxAttribute::Drafts);
        assert_eq!(MailboxAttribute::parse("\\Archive"), MailboxAttribute::Archive);
    }

    #[test]
    fn spam_is_an_alias_for_junk() {
        assert_eq!(MailboxAttribute::parse("\\Spam"), MailboxAttribute::Junk);
        assert_eq!(MailboxAttribute::parse("\\junk"), MailboxAttribute::Junk);
    }

    #[test]
    fn unknown_attribute_keeps_spelling() {
        let attr = MailboxAttribute::parse("\\X-Custom");
        assert_eq!(attr.as_str(), "\\X-Custom");
    }

    #[test]
    fn has_attribute() {
        let list = ListResponse {
            attributes: vec![MailboxAttribute::HasNoChildren, MailboxAttribute::Sent],
            delimiter: Some('/'),
            mailbox: Mailbox::new("Sent Items"),
        };
        assert!(list.has_attribute(&MailboxAttribute::Sent));
        assert!(!list.has_attribute(&MailboxAttribute::Trash));
    }
}
