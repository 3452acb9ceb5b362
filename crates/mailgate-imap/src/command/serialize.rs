//! Writers for command arguments.

use crate::types::Flag;

use super::types::{FetchItems, SearchCriteria};

/// Appends protocol syntax to a command buffer.
pub trait Wire {
    /// Raw bytes, no escaping.
    fn put(&mut self, raw: impl AsRef<[u8]>) -> &mut Self;

    /// An astring: atom when safe, quoted when it holds specials, and a
    /// synchronizing literal for CR, LF or 8-bit text, which a quoted
    /// string cannot carry.
    fn put_astring(&mut self, s: &str) -> &mut Self;

    /// `(a b c)` with each element written by `each`.
    fn put_list<T>(&mut self, items: &[T], each: impl FnMut(&mut Self, &T)) -> &mut Self;
}

impl Wire for Vec<u8> {
    fn put(&mut self, raw: impl AsRef<[u8]>) -> &mut Self {
        self.extend_from_slice(raw.as_ref());
        self
    }

    fn put_astring(&mut self, s: &str) -> &mut Self {
        let bytes = s.as_bytes();
        if bytes.iter().copied().any(needs_literal) {
            return self.put(format!("{{{}}}\r\n", bytes.len())).put(bytes);
        }
        if !bytes.is_empty() && bytes.iter().copied().all(is_safe_atom) {
            return self.put(bytes);
        }
        self.push(b'"');
        for &b in bytes {
            if matches!(b, b'"' | b'\\') {
                self.push(b'\\');
            }
            self.push(b);
        }
        self.put("\"")
    }

    fn put_list<T>(&mut self, items: &[T], mut each: impl FnMut(&mut Self, &T)) -> &mut Self {
        self.push(b'(');
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.push(b' ');
            }
            each(self, item);
        }
        self.put(")")
    }
}

const fn needs_literal(b: u8) -> bool {
    matches!(b, b'\r' | b'\n') || b >= 0x80
}

/// Printable ASCII minus the bytes that would end or change an atom.
const fn is_safe_atom(b: u8) -> bool {
    b.is_ascii_graphic() && !matches!(b, b'"' | b'\\' | b'(' | b')' | b'{' | b'%' | b'*')
}

pub fn flag_list(buf: &mut Vec<u8>, flags: &[Flag]) {
    buf.put_list(flags, |buf, flag| {
        buf.put(flag.as_str());
    });
}

/// A lone item goes out bare, several as a parenthesized list.
pub fn fetch_items(buf: &mut Vec<u8>, items: &FetchItems) {
    let each = |buf: &mut Vec<u8>, attr: &super::FetchAttribute| {
        buf.put(attr.keyword());
        if let super::FetchAttribute::BodyPeek(section) = attr {
            buf.put("[").put(section.as_deref().unwrap_or_default()).put("]");
        }
    };
    match items.attributes() {
        [single] => each(buf, single),
        all => {
            buf.put_list(all, each);
        }
    }
}

pub fn search_criteria(buf: &mut Vec<u8>, criteria: &SearchCriteria) {
    match criteria {
        SearchCriteria::All => buf.put("ALL"),
        SearchCriteria::Deleted => buf.put("DELETED"),
        SearchCriteria::Undeleted => buf.put("UNDELETED"),
        SearchCriteria::UidSet(set) => buf.put("UID ").put(set.to_string()),
        SearchCriteria::Not(inner) => {
            buf.put("NOT ");
            search_criteria(buf, inner);
            buf
        }
    };
}
