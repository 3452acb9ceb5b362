//! Attachment detection over IMAP body structures.

use mailgate_imap::{BodyPart, BodyStructure};
use mailgate_mime::encoding::decode_rfc2047;
use serde::Serialize;

/// An attachment found in a body structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentDescriptor {
    /// IMAP section number, e.g. `2` or `1.2`.
    pub part_id: String,
    /// Best available file name.
    pub filename: String,
    /// `type/subtype`, lowercased.
    pub mime_type: String,
    /// Encoded size in octets.
    pub size: u32,
    /// Content-ID without angle brackets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
}

/// Lists the attachments of a message. Multipart containers are never
/// attachments themselves.
#[must_use]
pub fn classify(structure: Option<&BodyStructure>) -> Vec<AttachmentDescriptor> {
    let Some(structure) = structure else {
        return Vec::new();
    };
    leaf_parts(structure)
        .into_iter()
        .filter(|(_, part)| is_attachment(part))
        .map(|(part_id, part)| descriptor(part_id, part))
        .collect()
}

/// Every non-multipart part with its section number, depth first.
///
/// An encapsulated message is listed itself, followed by the parts of the
/// message it carries.
#[must_use]
pub fn leaf_parts(structure: &BodyStructure) -> Vec<(String, &BodyPart)> {
    let mut out = Vec::new();
    let root = if matches!(structure, BodyStructure::Multipart { .. }) {
        ""
    } else {
        "1"
    };
    collect(structure, root, &mut out);
    out
}

/// Looks up a part by section number.
#[must_use]
pub fn find_part<'a>(structure: &'a BodyStructure, part_id: &str) -> Option<&'a BodyPart> {
    leaf_parts(structure)
        .into_iter()
        .find(|(id, _)| id == part_id)
        .map(|(_, part)| part)
}

/// Returns true if a direct child of the root is marked as an attachment.
#[must_use]
pub fn has_attachments(structure: Option<&BodyStructure>) -> bool {
    match structure {
        Some(BodyStructure::Multipart { bodies, .. }) => bodies.iter().any(|child| {
            child
                .disposition()
                .is_some_and(|d| d.kind.eq_ignore_ascii_case("attachment"))
        }),
        _ => false,
    }
}

/// Best file name for a part: disposition `filename`, then content type
/// `name`, both with encoded words decoded.
#[must_use]
pub fn part_filename(part: &BodyPart) -> Option<String> {
    part.disposition
        .as_ref()
        .and_then(|d| d.param("filename"))
        .or_else(|| part.param("name"))
        .filter(|name| !name.trim().is_empty())
        .map(decode_rfc2047)
}

fn collect<'a>(node: &'a BodyStructure, id: &str, out: &mut Vec<(String, &'a BodyPart)>) {
    match node {
        BodyStructure::Multipart { bodies, .. } => {
            for (i, child) in bodies.iter().enumerate() {
                collect(child, &child_id(id, i + 1), out);
            }
        }
        BodyStructure::Single(part) => out.push((id.to_string(), part)),
        BodyStructure::Message { part, body, .. } => {
            out.push((id.to_string(), part));
            // A multipart body numbers its children directly below the
            // message part; a single body is part 1 of it
            let nested = if matches!(**body, BodyStructure::Multipart { .. }) {
                id.to_string()
            } else {
                child_id(id, 1)
            };
            collect(body, &nested, out);
        }
    }
}

fn child_id(parent: &str, index: usize) -> String {
    if parent.is_empty() {
        index.to_string()
    } else {
        format!("{parent}.{index}")
    }
}

fn is_attachment(part: &BodyPart) -> bool {
    let disposition = part.disposition.as_ref().map(|d| d.kind.to_ascii_lowercase());
    let has_filename = part_filename(part).is_some();
    let is_text = part.media_type.eq_ignore_ascii_case("text");
    let is_body_text = is_text
        && (part.media_subtype.eq_ignore_ascii_case("plain")
            || part.media_subtype.eq_ignore_ascii_case("html"));

    // The readable body is never an attachment
    if is_body_text && disposition.is_none() && !has_filename {
        return false;
    }

    match disposition.as_deref() {
        Some("attachment") => true,
        Some("inline") if !is_text => true,
        _ => has_filename && !is_body_text,
    }
}

/// Describes one part as an attachment, filling in fallbacks for a
/// missing file name or type.
#[must_use]
pub fn descriptor(part_id: String, part: &BodyPart) -> AttachmentDescriptor {
    let content_id = part
        .id
        .as_deref()
        .map(|id| id.trim().trim_start_matches('<').trim_end_matches('>').to_string())
        .filter(|id| !id.is_empty());

    let filename = part_filename(part)
        .or_else(|| content_id.clone())
        .unwrap_or_else(|| format!("attachment-{part_id}"));

    let media_type = if part.media_type.is_empty() {
        "application".to_string()
    } else {
        part.media_type.to_ascii_lowercase()
    };
    let media_subtype = if part.media_subtype.is_empty() {
        "octet-stream".to_string()
    } else {
        part.media_subtype.to_ascii_lowercase()
    };

    AttachmentDescriptor {
        part_id,
        filename,
        mime_type: format!("{media_type}/{media_subtype}"),
        size: part.size,
        content_id,
    }
}
