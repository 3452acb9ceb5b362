//! Arguments of FETCH, STORE and SEARCH.

use crate::types::{Flag, UidSet};

/// The data items a `UID FETCH` asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchItems(Vec<FetchAttribute>);

impl FetchItems {
    /// An arbitrary item list, sent in the given order.
    #[must_use]
    pub fn new(items: impl IntoIterator<Item = FetchAttribute>) -> Self {
        Self(items.into_iter().collect())
    }

    /// What a message list row needs.
    #[must_use]
    pub fn summary() -> Self {
        Self::new([
            FetchAttribute::Uid,
            FetchAttribute::Flags,
            FetchAttribute::Envelope,
            FetchAttribute::InternalDate,
            FetchAttribute::Rfc822Size,
            FetchAttribute::BodyStructure,
        ])
    }

    /// The summary items plus the full raw source.
    #[must_use]
    pub fn detail() -> Self {
        let mut items = Self::summary();
        items.0.push(FetchAttribute::BodyPeek(None));
        items
    }

    /// One body part with the structure needed to describe it. Never sets `\Seen`.
    #[must_use]
    pub fn section(part: impl Into<String>) -> Self {
        Self::new([
            FetchAttribute::Uid,
            FetchAttribute::BodyStructure,
            FetchAttribute::BodyPeek(Some(part.into())),
        ])
    }

    /// The requested items.
    #[must_use]
    pub fn attributes(&self) -> &[FetchAttribute] {
        &self.0
    }
}

/// A single FETCH data item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchAttribute {
    /// `UID`
    Uid,
    /// `FLAGS`
    Flags,
    /// `ENVELOPE`
    Envelope,
    /// `INTERNALDATE`
    InternalDate,
    /// `RFC822.SIZE`
    Rfc822Size,
    /// `BODYSTRUCTURE`
    BodyStructure,
    /// `BODY.PEEK[section]`; `None` is the whole message.
    BodyPeek(Option<String>),
}

impl FetchAttribute {
    pub(crate) const fn keyword(&self) -> &'static str {
        match self {
            Self::Uid => "UID",
            Self::Flags => "FLAGS",
            Self::Envelope => "ENVELOPE",
            Self::InternalDate => "INTERNALDATE",
            Self::Rfc822Size => "RFC822.SIZE",
            Self::BodyStructure => "BODYSTRUCTURE",
            Self::BodyPeek(_) => "BODY.PEEK",
        }
    }
}

/// Flag change applied by `UID STORE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreAction {
    /// `+FLAGS`
    AddFlags(Vec<Flag>),
    /// `-FLAGS`
    RemoveFlags(Vec<Flag>),
}

impl StoreAction {
    pub(crate) fn parts(&self) -> (&'static str, &[Flag]) {
        match self {
            Self::AddFlags(flags) => ("+FLAGS", flags),
            Self::RemoveFlags(flags) => ("-FLAGS", flags),
        }
    }
}

/// `UID SEARCH` criteria.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchCriteria {
    /// Every message.
    All,
    /// Messages flagged `\Deleted`.
    Deleted,
    /// Messages not flagged `\Deleted`.
    Undeleted,
    /// Messages in a UID set.
    UidSet(UidSet),
    /// Negation.
    Not(Box<Self>),
}
