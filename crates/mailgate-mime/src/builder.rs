//! RFC 5322 message composition.

use crate::content_type::ContentType;
use crate::encoding::{encode_base64_lines, encode_quoted_printable, encode_rfc2047};
use crate::error::{Error, Result};
use crate::header::Headers;
use crate::message::TransferEncoding;
use chrono::{DateTime, FixedOffset, Utc};
use rand::Rng;

/// Longest line allowed in a 7bit body.
const MAX_7BIT_LINE: usize = 998;

/// A file to attach to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// File name shown to the recipient.
    pub filename: String,
    /// MIME type, e.g. `application/pdf`.
    pub content_type: String,
    /// Raw file content.
    pub data: Vec<u8>,
    /// Optional Content-ID for inline references.
    pub content_id: Option<String>,
}

impl Attachment {
    /// Creates an attachment.
    #[must_use]
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            data: data.into(),
            content_id: None,
        }
    }

    /// Sets the Content-ID.
    #[must_use]
    pub fn with_content_id(mut self, id: impl Into<String>) -> Self {
        self.content_id = Some(id.into());
        self
    }
}

/// Builder for a raw RFC 5322 message.
///
/// With both a text and an HTML body the result is `multipart/alternative`;
/// attachments wrap that in `multipart/mixed`. Bcc recipients are kept for
/// the envelope but never written to the headers.
///
/// ```
/// use mailgate_mime::{Attachment, Message, MessageBuilder};
///
/// let raw = MessageBuilder::new()
///     .from("Ana <ana@example.com>")
///     .to("bo@example.com")
///     .subject("Minutes")
///     .text_body("See attached.")
///     .attach(Attachment::new("minutes.txt", "text/plain", b"1. coffee".to_vec()))
///     .build()
///     .unwrap();
///
/// let parsed = Message::parse(&raw).unwrap();
/// assert_eq!(parsed.text_body().as_deref(), Some("See attached."));
/// assert_eq!(parsed.attachments().len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    from: Option<String>,
    to: Vec<String>,
    cc: Vec<String>,
    bcc: Vec<String>,
    reply_to: Option<String>,
    subject: Option<String>,
    text: Option<String>,
    html: Option<String>,
    attachments: Vec<Attachment>,
    date: Option<DateTime<FixedOffset>>,
    message_id: Option<String>,
}

/// Headers and encoded body of one entity.
struct Entity {
    headers: Headers,
    body: Vec<u8>,
}

impl MessageBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the From mailbox (`addr` or `Name <addr>`).
    #[must_use]
    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Adds a To recipient.
    #[must_use]
    pub fn to(mut self, to: impl Into<String>) -> Self {
        self.to.push(to.into());
        self
    }

    /// Adds a Cc recipient.
    #[must_use]
    pub fn cc(mut self, cc: impl Into<String>) -> Self {
        self.cc.push(cc.into());
        self
    }

    /// Adds a Bcc recipient.
    #[must_use]
    pub fn bcc(mut self, bcc: impl Into<String>) -> Self {
        self.bcc.push(bcc.into());
        self
    }

    /// Sets Reply-To.
    #[must_use]
    pub fn reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    /// Sets the subject.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Sets the plain text body.
    #[must_use]
    pub fn text_body(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Sets the HTML body.
    #[must_use]
    pub fn html_body(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    /// Adds an attachment.
    #[must_use]
    pub fn attach(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Overrides the Date header, which otherwise is the build time.
    #[must_use]
    pub const fn date(mut self, date: DateTime<FixedOffset>) -> Self {
        self.date = Some(date);
        self
    }

    /// Overrides the generated Message-ID. Angle brackets are added if missing.
    #[must_use]
    pub fn message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    /// Every envelope recipient: To, then Cc, then Bcc.
    #[must_use]
    pub fn recipients(&self) -> Vec<&str> {
        self.to
            .iter()
            .chain(&self.cc)
            .chain(&self.bcc)
            .map(String::as_str)
            .collect()
    }

    /// Total size of the attachment payloads before encoding.
    #[must_use]
    pub fn attachments_size(&self) -> usize {
        self.attachments.iter().map(|a| a.data.len()).sum()
    }

    /// Renders the message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingHeader`] without a From or any recipient, and
    /// [`Error::InvalidHeader`] when a header value contains a line break.
    pub fn build(&self) -> Result<Vec<u8>> {
        let from = self
            .from
            .as_deref()
            .filter(|f| !f.trim().is_empty())
            .ok_or_else(|| Error::MissingHeader("From".to_string()))?;
        if self.recipients().is_empty() {
            return Err(Error::MissingHeader("To".to_string()));
        }

        let mut headers = Headers::new();
        let date = self
            .date
            .unwrap_or_else(|| Utc::now().fixed_offset())
            .to_rfc2822();
        headers.add_checked("Date", date)?;
        headers.add_checked("From", encode_mailbox(from))?;
        if !self.to.is_empty() {
            headers.add_checked("To", encode_mailbox_list(&self.to))?;
        }
        if !self.cc.is_empty() {
            headers.add_checked("Cc", encode_mailbox_list(&self.cc))?;
        }
        if let Some(reply_to) = &self.reply_to {
            headers.add_checked("Reply-To", encode_mailbox(reply_to))?;
        }
        if let Some(subject) = &self.subject {
            headers.add_checked("Subject", encode_rfc2047(subject, "utf-8"))?;
        }
        let message_id = self.message_id.as_ref().map_or_else(
            || generate_message_id(from),
            |id| {
                if id.starts_with('<') {
                    id.clone()
                } else {
                    format!("<{id}>")
                }
            },
        );
        headers.add_checked("Message-ID", message_id)?;
        headers.add("MIME-Version", "1.0");

        let body = self.body_entity();
        let root = if self.attachments.is_empty() {
            body
        } else {
            let mut children = vec![body];
            for attachment in &self.attachments {
                children.push(attachment_entity(attachment)?);
            }
            multipart(ContentType::multipart_mixed(boundary()), children)
        };

        let mut out = headers.to_string().into_bytes();
        write_entity(&mut out, &root);
        Ok(out)
    }

    fn body_entity(&self) -> Entity {
        match (&self.text, &self.html) {
            (Some(text), Some(html)) => multipart(
                ContentType::multipart_alternative(boundary()),
                vec![
                    text_entity(ContentType::text_plain(), text),
                    text_entity(ContentType::text_html(), html),
                ],
            ),
            (None, Some(html)) => text_entity(ContentType::text_html(), html),
            (Some(text), None) => text_entity(ContentType::text_plain(), text),
            (None, None) => text_entity(ContentType::text_plain(), ""),
        }
    }
}

fn text_entity(content_type: ContentType, text: &str) -> Entity {
    let mut headers = Headers::new();
    headers.add("Content-Type", content_type.to_string());

    let plain = text.is_ascii() && text.lines().all(|l| l.len() <= MAX_7BIT_LINE);
    let body = if plain {
        headers.add("Content-Transfer-Encoding", TransferEncoding::SevenBit.to_string());
        normalize_line_endings(text)
    } else {
        headers.add(
            "Content-Transfer-Encoding",
            TransferEncoding::QuotedPrintable.to_string(),
        );
        encode_quoted_printable(text.as_bytes()).into_bytes()
    };

    Entity { headers, body }
}

fn attachment_entity(attachment: &Attachment) -> Result<Entity> {
    let filename = encode_rfc2047(&attachment.filename, "utf-8").replace("\r\n ", " ");
    let content_type = ContentType::parse(&attachment.content_type)
        .unwrap_or_else(|_| ContentType::new("application", "octet-stream"))
        .with_parameter("name", filename.clone());

    let mut headers = Headers::new();
    headers.add_checked("Content-Type", content_type.to_string())?;
    headers.add_checked(
        "Content-Disposition",
        format!("attachment; filename=\"{}\"", filename.replace('"', "\\\"")),
    )?;
    headers.add("Content-Transfer-Encoding", TransferEncoding::Base64.to_string());
    if let Some(id) = &attachment.content_id {
        let id = id.trim_matches(['<', '>']);
        headers.add_checked("Content-ID", format!("<{id}>"))?;
    }

    let body = encode_base64_lines(&attachment.data)
        .trim_end()
        .as_bytes()
        .to_vec();
    Ok(Entity { headers, body })
}

fn multipart(content_type: ContentType, children: Vec<Entity>) -> Entity {
    let boundary = content_type.boundary().unwrap_or_default().to_string();
    let mut headers = Headers::new();
    headers.add("Content-Type", content_type.to_string());

    let mut body = Vec::new();
    for child in &children {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        write_entity(&mut body, child);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    Entity { headers, body }
}

fn write_entity(out: &mut Vec<u8>, entity: &Entity) {
    out.extend_from_slice(entity.headers.to_string().as_bytes());
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(&entity.body);
}

fn normalize_line_endings(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() + text.len() / 40);
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(line.strip_suffix('\r').unwrap_or(line).as_bytes());
    }
    out
}

/// Encodes the display name of `Name <addr>` when it is not ASCII.
fn encode_mailbox(mailbox: &str) -> String {
    let mailbox = mailbox.trim();
    match mailbox.rsplit_once('<') {
        Some((name, addr)) if !name.trim().is_empty() => {
            let name = name.trim().trim_matches('"');
            let name = if name.is_ascii() {
                format!("\"{}\"", name.replace('"', "\\\""))
            } else {
                encode_rfc2047(name, "utf-8")
            };
            format!("{name} <{addr}")
        }
        _ => mailbox.to_string(),
    }
}

fn encode_mailbox_list(mailboxes: &[String]) -> String {
    mailboxes
        .iter()
        .map(String::as_str)
        .map(encode_mailbox)
        .collect::<Vec<_>>()
        .join(", ")
}

fn boundary() -> String {
    format!("=_mailgate_{:032x}", rand::thread_rng().r#gen::<u128>())
}

fn generate_message_id(from: &str) -> String {
    let domain = from
        .rsplit_once('@')
        .map(|(_, domain)| domain.trim_end_matches('>').trim())
        .filter(|domain| !domain.is_empty())
        .unwrap_or("localhost");
    let unique: u64 = rand::thread_rng().r#gen();
    format!("<{}.{unique:016x}@{domain}>", Utc::now().timestamp_millis())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::message::{Body, Message};

    fn fixed_date() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc2822("Mon, 05 Oct 2026 09:30:00 +0000").unwrap()
    }

    #[test]
    fn plain_text_message() {
        let raw = MessageBuilder::new()
            .from("ana@example.com")
            .to("bo@example.com")
            .subject("Hello")
            .text_body("line one\nline two")
            .date(fixed_date())
            .message_id("abc@example.com")
            .build()
            .unwrap();
        let text = String::from_utf8(raw.clone()).unwrap();

        assert!(text.starts_with("Date: Mon, "));
        assert!(text.contains(" Oct 2026 09:30:00 +0000\r\n"));
        assert!(text.contains("Message-ID: <abc@example.com>\r\n"));
        assert!(text.contains("Content-Transfer-Encoding: 7bit\r\n"));
        assert!(text.ends_with("\r\n\r\nline one\r\nline two"));

        let parsed = Message::parse(&raw).unwrap();
        assert_eq!(parsed.subject().as_deref(), Some("Hello"));
        assert_eq!(parsed.text_body().as_deref(), Some("line one\r\nline two"));
    }

    #[test]
    fn alternative_inside_mixed_with_attachment() {
        let builder = MessageBuilder::new()
            .from("Ana Lopez <ana@example.com>")
            .to("bo@example.com")
            .cc("cy@example.com")
            .bcc("hidden@example.com")
            .subject("Résumé")
            .text_body("plain")
            .html_body("<b>rich</b>")
            .attach(Attachment::new("cv.pdf", "application/pdf", b"%PDF-1.4".to_vec()));
        let raw = builder.build().unwrap();
        let text = String::from_utf8_lossy(&raw);

        assert!(!text.contains("hidden@example.com"));
        assert!(text.contains("From: \"Ana Lopez\" <ana@example.com>\r\n"));
        assert!(text.contains("Subject: =?utf-8?B?"));
        assert!(text.contains("Content-Disposition: attachment; filename=\"cv.pdf\""));
        assert_eq!(
            builder.recipients(),
            vec!["bo@example.com", "cy@example.com", "hidden@example.com"]
        );
        assert_eq!(builder.attachments_size(), 8);

        let parsed = Message::parse(&raw).unwrap();
        assert_eq!(parsed.subject().as_deref(), Some("Résumé"));
        assert_eq!(parsed.text_body().as_deref(), Some("plain"));
        assert_eq!(parsed.html_body().as_deref(), Some("<b>rich</b>"));
        let attachments = parsed.attachments();
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].filename().as_deref(), Some("cv.pdf"));
        assert_eq!(attachments[0].decoded_body().unwrap(), b"%PDF-1.4");

        let Body::Multipart(children) = &parsed.root().body else {
            panic!("expected multipart/mixed");
        };
        assert!(children[0].content_type().is("multipart", "alternative"));
    }

    #[test]
    fn non_ascii_text_uses_quoted_printable() {
        let raw = MessageBuilder::new()
            .from("ana@example.com")
            .to("bo@example.com")
            .text_body("déjà vu")
            .build()
            .unwrap();
        let text = String::from_utf8(raw.clone()).unwrap();
        assert!(text.contains("Content-Transfer-Encoding: quoted-printable"));
        assert_eq!(
            Message::parse(&raw).unwrap().text_body().as_deref(),
            Some("déjà vu")
        );
    }

    #[test]
    fn generated_ids_use_the_sender_domain() {
        let raw = MessageBuilder::new()
            .from("Ana <ana@mail.example.org>")
            .to("bo@example.com")
            .build()
            .unwrap();
        let parsed = Message::parse(&raw).unwrap();
        let id = parsed.message_id().unwrap();
        assert!(id.starts_with('<'));
        assert!(id.ends_with("@mail.example.org>"));
    }

    #[test]
    fn missing_sender_or_recipients() {
        assert!(matches!(
            MessageBuilder::new().to("bo@example.com").build(),
            Err(Error::MissingHeader(h)) if h == "From"
        ));
        assert!(matches!(
            MessageBuilder::new().from("ana@example.com").build(),
            Err(Error::MissingHeader(h)) if h == "To"
        ));
        // Bcc alone is enough for delivery
        assert!(
            MessageBuilder::new()
                .from("ana@example.com")
                .bcc("bo@example.com")
                .build()
                .is_ok()
        );
    }

    #[test]
    fn header_injection_is_rejected() {
        let result = MessageBuilder::new()
            .from("ana@example.com")
            .to("bo@example.com")
            .subject("hi\r\nBcc: victim@example.com")
            .build();
        assert!(matches!(result, Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn unknown_attachment_type_falls_back_to_octet_stream() {
        let raw = MessageBuilder::new()
            .from("ana@example.com")
            .to("bo@example.com")
            .attach(Attachment::new("blob", "not a type", vec![0, 1, 2]).with_content_id("<c1>"))
            .build()
            .unwrap();
        let text = String::from_utf8_lossy(&raw);
        assert!(text.contains("Content-Type: application/octet-stream; name=blob"));
        assert!(text.contains("Content-ID: <c1>"));
    }
}
