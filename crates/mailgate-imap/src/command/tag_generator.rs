//! IMAP command tag generator.

/// Per-connection tag generator.
///
/// Produces `A0001`, `A0002`, ... Tags only need to be unique among the
/// commands in flight on one connection, and a client never pipelines, so
/// the counter simply wraps instead of failing after `u32::MAX` commands.
#[derive(Debug, Clone)]
pub struct TagGenerator {
    counter: u32,
    prefix: char,
}

impl TagGenerator {
    /// Creates a new tag generator with the given prefix.
    #[must_use]
    pub const fn new(prefix: char) -> Self {
        Self { counter: 0, prefix }
    }

    /// Generates the next tag.
    pub fn next(&mut self) -> String {
        self.counter = self.counter.wrapping_add(1);
        format!("{}{:04}", self.prefix, self.counter)
    }

    /// Number of tags handed out since the last wrap.
    #[must_use]
    pub const fn issued(&self) -> u32 {
        self.counter
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::new('A')
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_sequential_and_padded() {
        let mut generator = TagGenerator::default();
        assert_eq!(generator.next(), "A0001");
        assert_eq!(generator.next(), "A0002");
        assert_eq!(generator.issued(), 2);
    }

    #[test]
    fn custom_prefix() {
        let mut generator = TagGenerator::new('G');
        assert_eq!(generator.next(), "G0001");
    }

    #[test]
    fn padding_grows_past_four_digits() {
        let mut generator = TagGenerator::default();
        generator.counter = 9_999;
        assert_eq!(generator.next(), "A10000");
    }

    #[test]
    fn counter_wraps_instead_of_panicking() {
        let mut generator = TagGenerator::default();
        generator.counter = u32::MAX;
        assert_eq!(generator.next(), "A0000");
    }
}
