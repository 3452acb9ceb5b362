//! UID sets for UID-addressed commands.

use super::Uid;

/// UID-based message set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UidSet {
    /// Single UID.
    Single(Uid),
    /// Range of UIDs (inclusive).
    Range(Uid, Uid),
    /// Range from start to highest UID.
    RangeFrom(Uid),
    /// Multiple UID specifications.
    Set(Vec<Self>),
}

impl UidSet {
    /// Creates a UID set from a single UID.
    #[must_use]
    pub const fn single(uid: Uid) -> Self {
        Self::Single(uid)
    }

    /// Creates a UID set from an inclusive range.
    #[must_use]
    pub const fn range(start: Uid, end: Uid) -> Self {
        Self::Range(start, end)
    }

    /// Builds an exact comma-separated list of the given UIDs.
    ///
    /// Never collapses into ranges: a page of UIDs must fetch exactly those
    /// messages even when the mailbox has gaps. Returns `None` for an empty
    /// slice since IMAP has no empty set syntax.
    #[must_use]
    pub fn list(uids: &[Uid]) -> Option<Self> {
        match uids {
            [] => None,
            [one] => Some(Self::Single(*one)),
            many => Some(Self::Set(many.iter().copied().map(Self::Single).collect())),
        }
    }
}

impl std::fmt::Display for UidSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single(n) => write!(f, "{n}"),
            Self::Range(start, end) => write!(f, "{start}:{end}"),
            Self::RangeFrom(start) => write!(f, "{start}:*"),
            Self::Set(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn uid(n: u32) -> Uid {
        Uid::new(n).unwrap()
    }

    #[test]
    fn list_of_one_is_single() {
        assert_eq!(UidSet::list(&[uid(9)]), Some(UidSet::Single(uid(9))));
    }

    #[test]
    fn list_of_none_is_none() {
        assert!(UidSet::list(&[]).is_none());
    }

    #[test]
    fn list_keeps_gaps_and_order() {
        let set = UidSet::list(&[uid(30), uid(29), uid(4)]).unwrap();
        assert_eq!(set.to_string(), "30,29,4");
    }

    #[test]
    fn contiguous_list_is_not_collapsed() {
        let set = UidSet::list(&[uid(3), uid(4), uid(5)]).unwrap();
        assert_eq!(set.to_string(), "3,4,5");
    }

    #[test]
    fn range_display() {
        assert_eq!(UidSet::range(uid(1), uid(100)).to_string(), "1:100");
        assert_eq!(UidSet::RangeFrom(uid(50)).to_string(), "50:*");
    }
}
