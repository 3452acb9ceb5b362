//! Response codes carried in `[...]` brackets of status responses.

use super::{Capability, Flag, SeqNum, Uid, UidValidity};

/// Response code from a status response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCode {
    /// ALERT: Human-readable message that MUST be shown to user.
    Alert,
    /// CAPABILITY response.
    Capability(Vec<Capability>),
    /// PERMANENTFLAGS: Flags that can be changed permanently.
    PermanentFlags(Vec<Flag>),
    /// READ-ONLY: Mailbox selected as read-only.
    ReadOnly,
    /// READ-WRITE: Mailbox selected as read-write.
    ReadWrite,
    /// TRYCREATE: Mailbox doesn't exist, but can be created.
    TryCreate,
    /// NONEXISTENT (RFC 5530): the command referred to something that does
    /// not exist, such as a UID that was expunged.
    Nonexistent,
    /// UIDNEXT: Next UID to be assigned.
    UidNext(Uid),
    /// UIDVALIDITY: Unique identifier validity value.
    UidValidity(UidValidity),
    /// UNSEEN: First unseen message sequence number.
    Unseen(SeqNum),
    /// APPENDUID: UID assigned to appended message.
    AppendUid {
        /// UIDVALIDITY of the mailbox.
        uidvalidity: UidValidity,
        /// UID of the appended message.
        uid: Uid,
    },
    /// Unknown response code.
    Unknown(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonexistent_is_distinct_from_unknown() {
        assert_ne!(
            ResponseCode::Nonexistent,
            ResponseCode::Unknown("NONEXISTENT".to_string())
        );
    }
}
