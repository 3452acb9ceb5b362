//! Mailbox listing and folder-role discovery.
//!
//! Servers disagree on what Trash, Sent and Spam are called, so a role is
//! found by an ordered chain of rules: special-use flags first, then
//! well-known display names, then path substrings. Within a tier the first
//! folder in listing order wins.

use mailgate_imap::ListResponse;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::Result;
use crate::pool::PooledSession;

/// Path used for Sent when nothing on the server looks like it.
pub const DEFAULT_SENT: &str = "Sent";

/// A mailbox as reported by LIST.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Folder {
    /// Full path, as used in SELECT.
    pub path: String,
    /// Last path segment.
    pub name: String,
    /// Hierarchy delimiter.
    pub delimiter: Option<char>,
    /// Attributes such as `\Trash` or `\HasChildren`.
    pub flags: Vec<String>,
}

impl Folder {
    /// Creates a folder, deriving the display name from the path.
    #[must_use]
    pub fn new(path: impl Into<String>, delimiter: Option<char>, flags: Vec<String>) -> Self {
        let path = path.into();
        let name = delimiter
            .and_then(|d| path.rsplit(d).next())
            .unwrap_or(&path)
            .to_string();
        Self {
            path,
            name,
            delimiter,
            flags,
        }
    }

    /// Returns true if the folder carries the attribute, ignoring case.
    #[must_use]
    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f.eq_ignore_ascii_case(flag))
    }
}

impl From<ListResponse> for Folder {
    fn from(item: ListResponse) -> Self {
        let flags = item
            .attributes
            .iter()
            .map(|attr| attr.as_str().to_string())
            .collect();
        Self::new(item.mailbox.0, item.delimiter, flags)
    }
}

/// A folder role that has to be discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Deleted messages.
    Trash,
    /// Sent messages.
    Sent,
    /// Junk mail.
    Spam,
}

/// One tier of the discovery chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// The folder carries one of these attributes.
    Flag(&'static [&'static str]),
    /// The lowercased display name is one of these.
    Name(&'static [&'static str]),
    /// The lowercased path contains one of these.
    PathContains(&'static [&'static str]),
}

impl Rule {
    /// Returns true if the folder satisfies this rule.
    #[must_use]
    pub fn matches(&self, folder: &Folder) -> bool {
        match self {
            Self::Flag(flags) => flags.iter().any(|flag| folder.has_flag(flag)),
            Self::Name(names) => {
                let name = folder.name.to_lowercase();
                names.contains(&name.as_str())
            }
            Self::PathContains(needles) => {
                let path = folder.path.to_lowercase();
                needles.iter().any(|needle| path.contains(needle))
            }
        }
    }
}

const TRASH_RULES: &[Rule] = &[
    Rule::Flag(&["\\Trash"]),
    Rule::Name(&["trash", "deleted items", "deleted messages", "bin"]),
    Rule::PathContains(&["trash"]),
];

const SENT_RULES: &[Rule] = &[
    Rule::Flag(&["\\Sent"]),
    Rule::Name(&["sent", "sent items", "sent mail"]),
    Rule::PathContains(&["sent"]),
];

const SPAM_RULES: &[Rule] = &[
    Rule::Flag(&["\\Junk", "\\Spam"]),
    Rule::Name(&["spam", "junk"]),
    Rule::PathContains(&["spam", "junk"]),
];

impl Role {
    /// The rule chain, in evaluation order.
    #[must_use]
    pub const fn rules(self) -> &'static [Rule] {
        match self {
            Self::Trash => TRASH_RULES,
            Self::Sent => SENT_RULES,
            Self::Spam => SPAM_RULES,
        }
    }
}

/// Finds the folder playing a role, returning its path.
#[must_use]
pub fn find_role(folders: &[Folder], role: Role) -> Option<String> {
    role.rules().iter().find_map(|rule| {
        folders
            .iter()
            .find(|folder| rule.matches(folder))
            .map(|folder| folder.path.clone())
    })
}

/// The Sent folder, or [`DEFAULT_SENT`] when none is recognizable.
#[must_use]
pub fn sent_folder_or_default(folders: &[Folder]) -> String {
    find_role(folders, Role::Sent).unwrap_or_else(|| DEFAULT_SENT.to_string())
}

/// Returns true if a mailbox path looks like a trash folder.
#[must_use]
pub fn is_trash_like(path: &str) -> bool {
    let path = path.to_lowercase();
    ["trash", "bin", "deleted items", "deleted messages"]
        .iter()
        .any(|needle| path.contains(needle))
}

/// Lists every mailbox over a pooled connection.
///
/// # Errors
///
/// Returns [`crate::Error::OperationFailed`] if LIST fails.
pub async fn list_folders<S>(session: &mut PooledSession<S>) -> Result<Vec<Folder>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let items = session.list().await?;
    Ok(items.into_iter().map(Folder::from).collect())
}

/// Lists the mailboxes and resolves a role against them.
///
/// # Errors
///
/// Returns [`crate::Error::OperationFailed`] if LIST fails.
pub async fn resolve_role<S>(session: &mut PooledSession<S>, role: Role) -> Result<Option<String>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let folders = list_folders(session).await?;
    let found = find_role(&folders, role);
    debug!(?role, folder = ?found, "Resolved folder role");
    Ok(found)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn folder(path: &str, flags: &[&str]) -> Folder {
        Folder::new(path, Some('/'), flags.iter().map(|f| (*f).to_string()).collect())
    }

    #[test]
    fn display_name_is_last_segment() {
        assert_eq!(folder("Archive/2024/Q1", &[]).name, "Q1");
        assert_eq!(Folder::new("INBOX", None, Vec::new()).name, "INBOX");
        assert_eq!(Folder::new("INBOX.Sent", Some('.'), Vec::new()).name, "Sent");
    }

    #[test]
    fn flag_tier_wins_over_names() {
        let folders = vec![
            folder("Trash", &[]),
            folder("Papierkorb", &["\\HasNoChildren", "\\trash"]),
        ];
        assert_eq!(find_role(&folders, Role::Trash).as_deref(), Some("Papierkorb"));
    }

    #[test]
    fn deleted_items_by_name() {
        let folders = vec![folder("INBOX", &[]), folder("Deleted Items", &[])];
        assert_eq!(find_role(&folders, Role::Trash).as_deref(), Some("Deleted Items"));
    }

    #[test]
    fn name_tier_uses_display_name() {
        let folders = vec![
            folder("Projects/sent-reports", &[]),
            folder("INBOX/Sent Mail", &[]),
        ];
        assert_eq!(find_role(&folders, Role::Sent).as_deref(), Some("INBOX/Sent Mail"));
    }

    #[test]
    fn path_tier_is_the_last_resort() {
        let folders = vec![folder("INBOX", &[]), folder("[Gmail]/Spam Folder", &[])];
        assert_eq!(find_role(&folders, Role::Spam).as_deref(), Some("[Gmail]/Spam Folder"));
    }

    #[test]
    fn spam_accepts_junk_and_spam_flags() {
        assert_eq!(
            find_role(&[folder("Bulk", &["\\Junk"])], Role::Spam).as_deref(),
            Some("Bulk")
        );
        assert_eq!(
            find_role(&[folder("Bulk", &["\\Spam"])], Role::Spam).as_deref(),
            Some("Bulk")
        );
    }

    #[test]
    fn missing_roles() {
        let folders = vec![folder("INBOX", &[]), folder("Drafts", &["\\Drafts"])];
        assert_eq!(find_role(&folders, Role::Trash), None);
        assert_eq!(find_role(&folders, Role::Spam), None);
        assert_eq!(sent_folder_or_default(&folders), "Sent");
    }

    #[test]
    fn rule_chain_order() {
        for role in [Role::Trash, Role::Sent, Role::Spam] {
            let rules = role.rules();
            assert_eq!(rules.len(), 3);
            assert!(matches!(rules[0], Rule::Flag(_)));
            assert!(matches!(rules[1], Rule::Name(_)));
            assert!(matches!(rules[2], Rule::PathContains(_)));
        }
    }

    #[test]
    fn trash_like_paths() {
        assert!(is_trash_like("INBOX.Trash"));
        assert!(is_trash_like("Deleted Messages"));
        assert!(!is_trash_like("INBOX"));
        assert!(!is_trash_like("Archive"));
    }
}
