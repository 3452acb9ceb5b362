//! Type-state markers for IMAP client connection states.
//!
//! `Selected` is more than a marker: it carries the selected mailbox and
//! the status snapshot the server sent with SELECT.

use crate::types::{MailboxStatus, Uid, UidValidity};

/// Marker type for the not-authenticated state.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotAuthenticated;

/// Marker type for the authenticated state.
#[derive(Debug, Clone, Copy, Default)]
pub struct Authenticated;

/// State for a selected mailbox.
#[derive(Debug, Clone)]
pub struct Selected {
    pub(crate) mailbox: String,
    pub(crate) status: MailboxStatus,
}

impl Selected {
    /// Creates a new Selected state.
    #[must_use]
    pub fn new(mailbox: impl Into<String>, status: MailboxStatus) -> Self {
        Self {
            mailbox: mailbox.into(),
            status,
        }
    }

    /// Returns the name of the selected mailbox.
    #[must_use]
    pub fn mailbox(&self) -> &str {
        &self.mailbox
    }

    /// Returns true if the server opened the mailbox read-only.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.status.read_only
    }

    /// Returns the mailbox status snapshot from SELECT.
    #[must_use]
    pub const fn status(&self) -> &MailboxStatus {
        &self.status
    }

    /// Returns the number of messages in the mailbox.
    #[must_use]
    pub const fn exists(&self) -> u32 {
        self.status.exists
    }

    /// Returns the UID validity value.
    #[must_use]
    pub fn uid_validity(&self) -> Option<u32> {
        self.status.uid_validity.map(UidValidity::get)
    }

    /// Returns the next UID value.
    #[must_use]
    pub fn uid_next(&self) -> Option<u32> {
        self.status.uid_next.map(Uid::get)
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Authenticated {}
    impl Sealed for super::Selected {}
}

/// States in which the client is logged in.
pub trait LoggedIn: sealed::Sealed {}

impl LoggedIn for Authenticated {}
impl LoggedIn for Selected {}

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

    fn _assert_send<T: Send>() {}
    fn _assert_sync<T: Sync>() {}

    #[test]
    fn test_states_are_send_sync() {
        _assert_send::<NotAuthenticated>();
        _assert_sync::<NotAuthenticated>();
        _assert_send::<Authenticated>();
        _assert_sync::<Authenticated>();
        _assert_send::<Selected>();
        _assert_sync::<Selected>();
    }

    #[test]
    fn test_selected_state_accessors() {
        let status = MailboxStatus {
            exists: 100,
            uid_validity: UidValidity::new(12345),
            uid_next: Uid::new(200),
            ..Default::default()
        };
        let selected = Selected::new("Sent Items", status);

        assert_eq!(selected.mailbox(), "Sent Items");
        assert!(!selected.is_read_only());
        assert_eq!(selected.exists(), 100);
        assert_eq!(selected.uid_validity(), Some(12345));
        assert_eq!(selected.uid_next(), Some(200));
    }

    #[test]
    fn test_selected_read_only_follows_status() {
        let status = MailboxStatus {
            read_only: true,
            ..Default::default()
        };
        assert!(Selected::new("Archive", status).is_read_only());
    }
}
