//! Response data types.

use crate::types::{Capability, Flags, ListResponse, ResponseCode, SeqNum, Uid};

/// FETCH response item.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchItem {
    /// Message flags.
    Flags(Flags),
    /// Internal date.
    InternalDate(String),
    /// RFC822 size.
    Rfc822Size(u32),
    /// Envelope.
    Envelope(Box<Envelope>),
    /// UID.
    Uid(Uid),
    /// BODY section.
    Body {
        /// Section specifier, `None` for the whole message.
        section: Option<String>,
        /// Origin offset.
        origin: Option<u32>,
        /// Body data.
        data: Option<Vec<u8>>,
    },
    /// BODYSTRUCTURE.
    BodyStructure(BodyStructure),
}

/// All data items of one FETCH response, gathered by kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageData {
    /// Sequence number the server reported the data under.
    pub seq: Option<SeqNum>,
    /// UID, if requested and reported.
    pub uid: Option<Uid>,
    /// Flags.
    pub flags: Flags,
    /// Envelope.
    pub envelope: Option<Envelope>,
    /// Internal date, in the server's `dd-Mon-yyyy hh:mm:ss +zzzz` form.
    pub internal_date: Option<String>,
    /// RFC822 size.
    pub size: Option<u32>,
    /// Body structure.
    pub body_structure: Option<BodyStructure>,
    /// Body sections in the order the server sent them.
    pub sections: Vec<(Option<String>, Vec<u8>)>,
}

impl MessageData {
    /// Folds a FETCH item list into one record.
    #[must_use]
    pub fn from_items(seq: SeqNum, items: Vec<FetchItem>) -> Self {
        let mut data = Self {
            seq: Some(seq),
            ..Self::default()
        };
        for item in items {
            match item {
                FetchItem::Flags(flags) => data.flags = flags,
                FetchItem::InternalDate(date) => data.internal_date = Some(date),
                FetchItem::Rfc822Size(size) => data.size = Some(size),
                FetchItem::Envelope(envelope) => data.envelope = Some(*envelope),
                FetchItem::Uid(uid) => data.uid = Some(uid),
                FetchItem::BodyStructure(body) => data.body_structure = Some(body),
                FetchItem::Body { section, data: Some(bytes), .. } => {
                    data.sections.push((section, bytes));
                }
                FetchItem::Body { data: None, .. } => {}
            }
        }
        data
    }

    /// Returns the bytes of a section, `None` meaning the whole message.
    #[must_use]
    pub fn section(&self, section: Option<&str>) -> Option<&[u8]> {
        self.sections
            .iter()
            .find(|(s, _)| match (s.as_deref(), section) {
                (None, None) => true,
                (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                _ => false,
            })
            .map(|(_, bytes)| bytes.as_slice())
    }
}

/// Message envelope.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Envelope {
    /// Date header.
    pub date: Option<String>,
    /// Subject header.
    pub subject: Option<String>,
    /// From addresses.
    pub from: Vec<Address>,
    /// Sender addresses.
    pub sender: Vec<Address>,
    /// Reply-To addresses.
    pub reply_to: Vec<Address>,
    /// To addresses.
    pub to: Vec<Address>,
    /// Cc addresses.
    pub cc: Vec<Address>,
    /// Bcc addresses.
    pub bcc: Vec<Address>,
    /// In-Reply-To header.
    pub in_reply_to: Option<String>,
    /// Message-ID header.
    pub message_id: Option<String>,
}

/// Email address from envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    /// Display name.
    pub name: Option<String>,
    /// Source route (obsolete).
    pub adl: Option<String>,
    /// Mailbox name (local part).
    pub mailbox: Option<String>,
    /// Host name (domain part).
    pub host: Option<String>,
}

impl Address {
    /// Returns the full email address.
    #[must_use]
    pub fn email(&self) -> Option<String> {
        match (&self.mailbox, &self.host) {
            (Some(m), Some(h)) => Some(format!("{m}@{h}")),
            _ => None,
        }
    }
}

/// `Content-Disposition` as reported inside BODYSTRUCTURE extension data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disposition {
    /// Disposition type, lowercased (`attachment`, `inline`, ...).
    pub kind: String,
    /// Disposition parameters with lowercased names.
    pub params: Vec<(String, String)>,
}

impl Disposition {
    /// Looks up a parameter by name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        lookup(&self.params, name)
    }
}

/// One non-multipart body part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyPart {
    /// MIME type, lowercased.
    pub media_type: String,
    /// MIME subtype, lowercased.
    pub media_subtype: String,
    /// Content-Type parameters with lowercased names.
    pub params: Vec<(String, String)>,
    /// Content-ID.
    pub id: Option<String>,
    /// Content-Description.
    pub description: Option<String>,
    /// Content-Transfer-Encoding, lowercased.
    pub encoding: String,
    /// Size in octets of the encoded body.
    pub size: u32,
    /// Line count, reported for `text/*` and `message/rfc822` parts.
    pub lines: Option<u32>,
    /// Disposition from the extension data, when the server sent it.
    pub disposition: Option<Disposition>,
}

impl BodyPart {
    /// Returns `type/subtype`.
    #[must_use]
    pub fn mime_type(&self) -> String {
        format!("{}/{}", self.media_type, self.media_subtype)
    }

    /// Looks up a Content-Type parameter by name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        lookup(&self.params, name)
    }
}

/// Body structure of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyStructure {
    /// Leaf part.
    Single(BodyPart),
    /// An encapsulated `message/rfc822` part.
    Message {
        /// The part's own fields.
        part: BodyPart,
        /// Envelope of the nested message.
        envelope: Box<Envelope>,
        /// Body structure of the nested message.
        body: Box<Self>,
    },
    /// Multipart container.
    Multipart {
        /// Child body parts.
        bodies: Vec<Self>,
        /// Multipart subtype, lowercased.
        subtype: String,
        /// Content-Type parameters with lowercased names.
        params: Vec<(String, String)>,
        /// Disposition from the extension data.
        disposition: Option<Disposition>,
    },
}

impl BodyStructure {
    /// Disposition of this node, whatever its kind.
    #[must_use]
    pub fn disposition(&self) -> Option<&Disposition> {
        match self {
            Self::Single(part) | Self::Message { part, .. } => part.disposition.as_ref(),
            Self::Multipart { disposition, .. } => disposition.as_ref(),
        }
    }
}

fn lookup<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Untagged response data.
#[derive(Debug, Clone, PartialEq)]
pub enum UntaggedResponse {
    /// OK response with optional code.
    Ok {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// NO response.
    No {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// BAD response.
    Bad {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// PREAUTH response.
    PreAuth {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// BYE response.
    Bye {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// CAPABILITY response.
    Capability(Vec<Capability>),
    /// LIST response.
    List(ListResponse),
    /// FLAGS response.
    Flags(Flags),
    /// EXISTS response (message count).
    Exists(u32),
    /// RECENT response.
    Recent(u32),
    /// EXPUNGE response (message removed).
    Expunge(SeqNum),
    /// FETCH response.
    Fetch {
        /// Message sequence number.
        seq: SeqNum,
        /// Fetch data items.
        items: Vec<FetchItem>,
    },
    /// SEARCH response. After `UID SEARCH` the numbers are UIDs.
    Search(Vec<u32>),
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
    use crate::types::Flag;

    fn leaf(media_type: &str, subtype: &str) -> BodyPart {
        BodyPart {
            media_type: media_type.to_string(),
            media_subtype: subtype.to_string(),
            params: vec![("name".to_string(), "report.pdf".to_string())],
            id: None,
            description: None,
            encoding: "base64".to_string(),
            size: 1024,
            lines: None,
            disposition: Some(Disposition {
                kind: "attachment".to_string(),
                params: vec![("filename".to_string(), "Report.pdf".to_string())],
            }),
        }
    }

    #[test]
    fn address_email_needs_both_parts() {
        let full = Address {
            name: Some("Ana".to_string()),
            adl: None,
            mailbox: Some("ana".to_string()),
            host: Some("example.com".to_string()),
        };
        assert_eq!(full.email(), Some("ana@example.com".to_string()));

        let group = Address {
            name: None,
            adl: None,
            mailbox: Some("undisclosed-recipients".to_string()),
            host: None,
        };
        assert_eq!(group.email(), None);
    }

    #[test]
    fn part_params_are_case_insensitive() {
        let part = leaf("application", "pdf");
        assert_eq!(part.mime_type(), "application/pdf");
        assert_eq!(part.param("NAME"), Some("report.pdf"));
        assert_eq!(
            part.disposition.as_ref().unwrap().param("FileName"),
            Some("Report.pdf")
        );
    }

    #[test]
    fn disposition_of_each_node_kind() {
        let single = BodyStructure::Single(leaf("image", "png"));
        assert_eq!(single.disposition().unwrap().kind, "attachment");

        let multipart = BodyStructure::Multipart {
            bodies: vec![single.clone()],
            subtype: "mixed".to_string(),
            params: Vec::new(),
            disposition: None,
        };
        assert!(multipart.disposition().is_none());
    }

    #[test]
    fn message_data_gathers_items() {
        let seq = SeqNum::new(3).unwrap();
        let items = vec![
            FetchItem::Uid(Uid::new(44).unwrap()),
            FetchItem::Flags([Flag::Seen].into_iter().collect()),
            FetchItem::Rfc822Size(900),
            FetchItem::Body {
                section: Some("1".to_string()),
                origin: None,
                data: Some(b"hello".to_vec()),
            },
            FetchItem::Body {
                section: Some("2".to_string()),
                origin: None,
                data: None,
            },
        ];
        let data = MessageData::from_items(seq, items);

        assert_eq!(data.uid.unwrap().get(), 44);
        assert!(data.flags.is_seen());
        assert_eq!(data.size, Some(900));
        assert_eq!(data.section(Some("1")), Some(&b"hello"[..]));
        assert_eq!(data.section(Some("2")), None);
        assert_eq!(data.section(None), None);
    }
}
