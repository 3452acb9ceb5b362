//! IMAP command builder.
//!
//! Every message-addressing command is UID based; sequence numbers never
//! leave the parser.

mod serialize;
mod tag_generator;
mod types;

use crate::types::{Flag, Mailbox, UidSet};

pub use tag_generator::TagGenerator;
pub use types::{FetchAttribute, FetchItems, SearchCriteria, StoreAction};

use serialize::{Wire, fetch_items, flag_list, search_criteria};

/// IMAP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // Any state
    /// CAPABILITY command.
    Capability,
    /// NOOP command.
    Noop,
    /// LOGOUT command.
    Logout,

    // Not authenticated
    /// STARTTLS command.
    StartTls,
    /// LOGIN command.
    Login {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },

    // Authenticated
    /// SELECT command.
    Select {
        /// Mailbox to select.
        mailbox: Mailbox,
    },
    /// LIST command.
    List {
        /// Reference name.
        reference: String,
        /// Mailbox pattern.
        pattern: String,
    },
    /// APPEND command header. The message itself follows as a literal once
    /// the server sends a continuation.
    Append {
        /// Target mailbox.
        mailbox: Mailbox,
        /// Flags to set, `None` to omit the flag list.
        flags: Option<Vec<Flag>>,
        /// Size of the literal that follows.
        size: usize,
    },

    // Selected
    /// EXPUNGE command.
    Expunge,
    /// UID EXPUNGE command (RFC 4315 UIDPLUS).
    UidExpunge {
        /// UIDs to expunge.
        uids: UidSet,
    },
    /// UID SEARCH command.
    UidSearch {
        /// Search criteria.
        criteria: SearchCriteria,
    },
    /// UID FETCH command.
    UidFetch {
        /// UIDs to fetch.
        uids: UidSet,
        /// Items to fetch.
        items: FetchItems,
    },
    /// UID STORE command, always `.SILENT`.
    UidStore {
        /// UIDs to modify.
        uids: UidSet,
        /// Store action.
        action: StoreAction,
    },
    /// UID COPY command.
    UidCopy {
        /// UIDs to copy.
        uids: UidSet,
        /// Target mailbox.
        mailbox: Mailbox,
    },
    /// UID MOVE command (RFC 6851).
    UidMove {
        /// UIDs to move.
        uids: UidSet,
        /// Target mailbox.
        mailbox: Mailbox,
    },
}

impl Command {
    /// Serializes the command with the given tag, CRLF included.
    #[must_use]
    pub fn serialize(&self, tag: &str) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64);
        buf.put(tag).put(" ");

        match self {
            Self::Capability => buf.put("CAPABILITY"),
            Self::Noop => buf.put("NOOP"),
            Self::Logout => buf.put("LOGOUT"),
            Self::StartTls => buf.put("STARTTLS"),
            Self::Login { username, password } => {
                buf.put("LOGIN ").put_astring(username).put(" ").put_astring(password)
            }
            Self::Select { mailbox } => buf.put("SELECT ").put_astring(mailbox.as_str()),
            Self::List { reference, pattern } => {
                buf.put("LIST ").put_astring(reference).put(" ").put_astring(pattern)
            }
            Self::Append {
                mailbox,
                flags,
                size,
            } => {
                buf.put("APPEND ").put_astring(mailbox.as_str());
                if let Some(flags) = flags {
                    buf.put(" ");
                    flag_list(&mut buf, flags);
                }
                buf.put(format!(" {{{size}}}"))
            }
            Self::Expunge => buf.put("EXPUNGE"),
            Self::UidExpunge { uids } => buf.put("UID EXPUNGE ").put(uids.to_string()),
            Self::UidSearch { criteria } => {
                buf.put("UID SEARCH ");
                search_criteria(&mut buf, criteria);
                &mut buf
            }
            Self::UidFetch { uids, items } => {
                buf.put("UID FETCH ").put(uids.to_string()).put(" ");
                fetch_items(&mut buf, items);
                &mut buf
            }
            Self::UidStore { uids, action } => {
                let (keyword, flags) = action.parts();
                buf.put("UID STORE ")
                    .put(uids.to_string())
                    .put(" ")
                    .put(keyword)
                    .put(".SILENT ");
                flag_list(&mut buf, flags);
                &mut buf
            }
            Self::UidCopy { uids, mailbox } => buf
                .put("UID COPY ")
                .put(uids.to_string())
                .put(" ")
                .put_astring(mailbox.as_str()),
            Self::UidMove { uids, mailbox } => buf
                .put("UID MOVE ")
                .put(uids.to_string())
                .put(" ")
                .put_astring(mailbox.as_str()),
        };

        buf.put("\r\n");
        buf
    }
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
    use crate::types::Uid;

    fn uids(values: &[u32]) -> UidSet {
        let uids: Vec<Uid> = values.iter().map(|v| Uid::new(*v).unwrap()).collect();
        UidSet::list(&uids).unwrap()
    }

    fn wire(cmd: &Command) -> String {
        String::from_utf8(cmd.serialize("A0001")).unwrap()
    }

    #[test]
    fn login_quotes_when_needed() {
        let cmd = Command::Login {
            username: "me@example.com".to_string(),
            password: "p\"ss word".to_string(),
        };
        assert_eq!(wire(&cmd), "A0001 LOGIN me@example.com \"p\\\"ss word\"\r\n");
    }

    #[test]
    fn select_quotes_mailbox_with_space() {
        let cmd = Command::Select {
            mailbox: Mailbox::new("Sent Items"),
        };
        assert_eq!(wire(&cmd), "A0001 SELECT \"Sent Items\"\r\n");
    }

    #[test]
    fn list_everything() {
        let cmd = Command::List {
            reference: String::new(),
            pattern: "*".to_string(),
        };
        assert_eq!(wire(&cmd), "A0001 LIST \"\" \"*\"\r\n");
    }

    #[test]
    fn append_with_seen_flag() {
        let cmd = Command::Append {
            mailbox: Mailbox::new("Sent"),
            flags: Some(vec![Flag::Seen]),
            size: 310,
        };
        assert_eq!(wire(&cmd), "A0001 APPEND Sent (\\Seen) {310}\r\n");
    }

    #[test]
    fn append_without_flags() {
        let cmd = Command::Append {
            mailbox: Mailbox::new("INBOX.Sent"),
            flags: None,
            size: 12,
        };
        assert_eq!(wire(&cmd), "A0001 APPEND INBOX.Sent {12}\r\n");
    }

    #[test]
    fn uid_search_all() {
        let cmd = Command::UidSearch {
            criteria: SearchCriteria::All,
        };
        assert_eq!(wire(&cmd), "A0001 UID SEARCH ALL\r\n");
    }

    #[test]
    fn uid_search_not_deleted() {
        let cmd = Command::UidSearch {
            criteria: SearchCriteria::Not(Box::new(SearchCriteria::Deleted)),
        };
        assert_eq!(wire(&cmd), "A0001 UID SEARCH NOT DELETED\r\n");
    }

    #[test]
    fn uid_fetch_exact_list() {
        let cmd = Command::UidFetch {
            uids: uids(&[30, 29, 27]),
            items: FetchItems::new([FetchAttribute::Uid, FetchAttribute::Flags]),
        };
        assert_eq!(wire(&cmd), "A0001 UID FETCH 30,29,27 (UID FLAGS)\r\n");
    }

    #[test]
    fn uid_fetch_section_peek() {
        let cmd = Command::UidFetch {
            uids: uids(&[4]),
            items: FetchItems::section("2.1"),
        };
        assert_eq!(wire(&cmd), "A0001 UID FETCH 4 (UID BODYSTRUCTURE BODY.PEEK[2.1])\r\n");
    }

    #[test]
    fn uid_fetch_detail_includes_size() {
        let cmd = Command::UidFetch {
            uids: uids(&[8]),
            items: FetchItems::detail(),
        };
        assert_eq!(
            wire(&cmd),
            "A0001 UID FETCH 8 (UID FLAGS ENVELOPE INTERNALDATE RFC822.SIZE BODYSTRUCTURE BODY.PEEK[])\r\n"
        );
    }

    #[test]
    fn eight_bit_mailbox_is_a_literal() {
        let cmd = Command::UidCopy {
            uids: uids(&[3]),
            mailbox: Mailbox::new("Entwürfe"),
        };
        assert_eq!(wire(&cmd), "A0001 UID COPY 3 {9}\r\nEntwürfe\r\n");

        let cmd = Command::Select {
            mailbox: Mailbox::new("a\r\nb"),
        };
        assert_eq!(wire(&cmd), "A0001 SELECT {4}\r\na\r\nb\r\n");
    }

    #[test]
    fn uid_fetch_single_attribute_is_unparenthesized() {
        let cmd = Command::UidFetch {
            uids: uids(&[4]),
            items: FetchItems::new([FetchAttribute::BodyStructure]),
        };
        assert_eq!(wire(&cmd), "A0001 UID FETCH 4 BODYSTRUCTURE\r\n");
    }

    #[test]
    fn uid_store_is_always_silent() {
        let add = Command::UidStore {
            uids: uids(&[7]),
            action: StoreAction::AddFlags(vec![Flag::Seen, Flag::Flagged]),
        };
        assert_eq!(wire(&add), "A0001 UID STORE 7 +FLAGS.SILENT (\\Seen \\Flagged)\r\n");

        let remove = Command::UidStore {
            uids: uids(&[7]),
            action: StoreAction::RemoveFlags(vec![Flag::Seen]),
        };
        assert_eq!(wire(&remove), "A0001 UID STORE 7 -FLAGS.SILENT (\\Seen)\r\n");
    }

    #[test]
    fn astring_forms() {
        let mut buf = Vec::new();
        buf.put_astring("INBOX")
            .put(" ")
            .put_astring("")
            .put(" ")
            .put_astring("a]b")
            .put(" ")
            .put_astring("tab\there")
            .put(" ")
            .put_astring("back\\slash");
        assert_eq!(buf, b"INBOX \"\" a]b \"tab\there\" \"back\\\\slash\"");
    }

    #[test]
    fn uid_move_and_copy() {
        let mv = Command::UidMove {
            uids: uids(&[12]),
            mailbox: Mailbox::new("Archive"),
        };
        assert_eq!(wire(&mv), "A0001 UID MOVE 12 Archive\r\n");

        let copy = Command::UidCopy {
            uids: uids(&[12]),
            mailbox: Mailbox::new("Deleted Items"),
        };
        assert_eq!(wire(&copy), "A0001 UID COPY 12 \"Deleted Items\"\r\n");
    }

    #[test]
    fn uid_expunge() {
        let cmd = Command::UidExpunge { uids: uids(&[5, 9]) };
        assert_eq!(wire(&cmd), "A0001 UID EXPUNGE 5,9\r\n");
    }
}
