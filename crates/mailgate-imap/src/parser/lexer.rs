//! Tokenizer for server responses.
//!
//! The framing layer hands over a complete response with literals inlined,
//! so a literal is just another string here. String bytes are kept raw; the
//! caller decides whether to decode them (header values are not always UTF-8).

use crate::{Error, Result};

/// One token of a server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// Atom, including `\`-prefixed flags and attributes.
    Atom(&'a str),
    /// Unsigned number.
    Number(u32),
    /// Quoted string or literal, unescaped.
    Str(Vec<u8>),
    /// `NIL` in any case.
    Nil,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// A single space.
    Space,
    /// `*`, the untagged prefix.
    Asterisk,
    /// `+`, the continuation prefix.
    Plus,
    /// Line end.
    Crlf,
    /// End of the buffer.
    Eof,
}

impl Token<'_> {
    /// Converts a string token to text, replacing invalid UTF-8.
    #[must_use]
    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Str(bytes) => Some(String::from_utf8(bytes).unwrap_or_else(|e| {
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            })),
            _ => None,
        }
    }
}

/// Cursor over a response buffer.
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Starts at the beginning of `input`.
    #[must_use]
    pub const fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    /// Byte offset of the cursor, for error reporting.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Unconsumed bytes.
    #[must_use]
    pub fn remaining(&self) -> &'a [u8] {
        &self.input[self.pos..]
    }

    /// True once every byte has been consumed.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Current byte, not consumed.
    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.peek_at(0)
    }

    /// Byte `offset` positions ahead, not consumed.
    #[must_use]
    pub fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    /// Consumes one byte.
    pub fn advance(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    /// Moves the cursor forward, stopping at the end of input.
    pub fn skip(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.input.len());
    }

    /// Consumes the longest run of bytes matching `pred`.
    fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a [u8] {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.pos += 1;
        }
        &self.input[start..self.pos]
    }

    fn fail(&self, message: impl Into<String>) -> Error {
        Error::Parse {
            position: self.pos,
            message: message.into(),
        }
    }

    /// Reads the next token.
    pub fn next_token(&mut self) -> Result<Token<'a>> {
        let Some(byte) = self.peek() else {
            return Ok(Token::Eof);
        };

        let single = match byte {
            b' ' => Some(Token::Space),
            b'(' => Some(Token::LParen),
            b')' => Some(Token::RParen),
            b'[' => Some(Token::LBracket),
            b']' => Some(Token::RBracket),
            b'*' => Some(Token::Asterisk),
            b'+' => Some(Token::Plus),
            _ => None,
        };
        if let Some(token) = single {
            self.pos += 1;
            return Ok(token);
        }

        match byte {
            b'\r' if self.peek_at(1) == Some(b'\n') => {
                self.pos += 2;
                Ok(Token::Crlf)
            }
            b'"' => self.quoted(),
            b'{' => self.literal(),
            _ if is_atom_char(byte) => self.atom(),
            _ => Err(self.fail(format!("Unexpected byte {byte:#04x}"))),
        }
    }

    fn quoted(&mut self) -> Result<Token<'a>> {
        self.pos += 1;
        let mut out = Vec::new();
        loop {
            match self.advance() {
                Some(b'"') => return Ok(Token::Str(out)),
                Some(b'\\') => match self.advance() {
                    Some(c @ (b'"' | b'\\')) => out.push(c),
                    Some(c) => return Err(self.fail(format!("Invalid escape \\{}", c as char))),
                    None => break,
                },
                Some(c) => out.push(c),
                None => break,
            }
        }
        Err(self.fail("Unterminated quoted string"))
    }

    /// Reads `{n}\r\n` followed by n bytes.
    fn literal(&mut self) -> Result<Token<'a>> {
        self.pos += 1;
        let digits = self.take_while(|b| b.is_ascii_digit());
        let len: usize = std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| self.fail("Invalid literal length"))?;

        if !self.remaining().starts_with(b"}\r\n") {
            return Err(self.fail("Malformed literal prefix"));
        }
        self.pos += 3;

        let data = self
            .remaining()
            .get(..len)
            .ok_or_else(|| self.fail("Literal runs past end of response"))?
            .to_vec();
        self.pos += len;
        Ok(Token::Str(data))
    }

    fn atom(&mut self) -> Result<Token<'a>> {
        let start = self.pos;
        let raw = self.take_while(is_atom_char);
        let text = std::str::from_utf8(raw).map_err(|_| Error::Parse {
            position: start,
            message: "Atom is not UTF-8".into(),
        })?;

        if raw.iter().all(u8::is_ascii_digit) {
            return text
                .parse()
                .map(Token::Number)
                .map_err(|_| self.fail("Number out of range"));
        }
        Ok(if text.eq_ignore_ascii_case("NIL") {
            Token::Nil
        } else {
            Token::Atom(text)
        })
    }

    /// Consumes a token of the same kind as `expected`.
    #[allow(clippy::needless_pass_by_value)]
    pub fn expect(&mut self, expected: Token<'_>) -> Result<()> {
        let token = self.next_token()?;
        if std::mem::discriminant(&token) == std::mem::discriminant(&expected) {
            Ok(())
        } else {
            Err(self.fail(format!("Expected {expected:?}, got {token:?}")))
        }
    }

    /// Consumes a space.
    pub fn expect_space(&mut self) -> Result<()> {
        self.expect(Token::Space)
    }

    /// Reads `NIL` or a string as text.
    pub fn read_nstring(&mut self) -> Result<Option<String>> {
        match self.next_token()? {
            Token::Nil => Ok(None),
            token @ Token::Str(_) => Ok(token.into_text()),
            token => Err(self.fail(format!("Expected nstring, got {token:?}"))),
        }
    }

    /// Reads `NIL` or a string as raw bytes, for message bodies.
    pub fn read_nbytes(&mut self) -> Result<Option<Vec<u8>>> {
        match self.next_token()? {
            Token::Nil => Ok(None),
            Token::Str(bytes) => Ok(Some(bytes)),
            token => Err(self.fail(format!("Expected nstring, got {token:?}"))),
        }
    }

    /// Reads a number token.
    pub fn read_number(&mut self) -> Result<u32> {
        match self.next_token()? {
            Token::Number(n) => Ok(n),
            token => Err(self.fail(format!("Expected number, got {token:?}"))),
        }
    }

    /// Reads an atom token.
    pub fn read_atom_string(&mut self) -> Result<&'a str> {
        match self.next_token()? {
            Token::Atom(s) => Ok(s),
            token => Err(self.fail(format!("Expected atom, got {token:?}"))),
        }
    }

    /// Consumes one value, descending into parenthesized lists.
    pub fn skip_value(&mut self) -> Result<()> {
        let mut depth = 0usize;
        loop {
            match self.next_token()? {
                Token::LParen => depth += 1,
                Token::RParen if depth > 0 => depth -= 1,
                Token::RParen | Token::Eof | Token::Crlf => {
                    return Err(self.fail(if depth > 0 {
                        "Unterminated list"
                    } else {
                        "Expected a value"
                    }));
                }
                _ => {}
            }
            if depth == 0 {
                return Ok(());
            }
        }
    }

    /// Consumes any run of spaces.
    pub fn skip_spaces(&mut self) {
        self.take_while(|b| b == b' ');
    }
}

/// Bytes allowed in an atom.
///
/// `\` is accepted so system flags such as `\Seen` come out as one atom.
/// `[` and `]` are excluded so `BODY[TEXT]` splits into its parts.
#[must_use]
pub const fn is_atom_char(b: u8) -> bool {
    b.is_ascii_graphic()
        && !matches!(
            b,
            b'(' | b')' | b'{' | b'}' | b'%' | b'*' | b'"' | b'[' | b']'
        )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn tokens(input: &[u8]) -> Vec<Token<'_>> {
        let mut lexer = Lexer::new(input);
        let mut out = Vec::new();
        loop {
            match lexer.next_token().unwrap() {
                Token::Eof => return out,
                token => out.push(token),
            }
        }
    }

    #[test]
    fn untagged_fetch_line() {
        assert_eq!(
            tokens(b"* 4 FETCH (UID 9 FLAGS (\\Seen $Label1))\r\n"),
            vec![
                Token::Asterisk,
                Token::Space,
                Token::Number(4),
                Token::Space,
                Token::Atom("FETCH"),
                Token::Space,
                Token::LParen,
                Token::Atom("UID"),
                Token::Space,
                Token::Number(9),
                Token::Space,
                Token::Atom("FLAGS"),
                Token::Space,
                Token::LParen,
                Token::Atom("\\Seen"),
                Token::Space,
                Token::Atom("$Label1"),
                Token::RParen,
                Token::RParen,
                Token::Crlf,
            ]
        );
    }

    #[test]
    fn response_code_brackets() {
        assert_eq!(
            tokens(b"[UIDNEXT 100]"),
            vec![
                Token::LBracket,
                Token::Atom("UIDNEXT"),
                Token::Space,
                Token::Number(100),
                Token::RBracket,
            ]
        );
    }

    #[test]
    fn section_brackets_split_atoms() {
        assert_eq!(
            tokens(b"BODY[TEXT]"),
            vec![Token::Atom("BODY"), Token::LBracket, Token::Atom("TEXT"), Token::RBracket]
        );
    }

    #[test]
    fn atoms_with_digits_are_not_numbers() {
        assert_eq!(tokens(b"A001 4x"), vec![Token::Atom("A001"), Token::Space, Token::Atom("4x")]);
    }

    #[test]
    fn nil_is_case_insensitive() {
        assert_eq!(tokens(b"nil"), vec![Token::Nil]);
        assert_eq!(tokens(b"NILS"), vec![Token::Atom("NILS")]);
    }

    #[test]
    fn quoted_escapes() {
        assert_eq!(
            tokens(b"\"say \\\"hi\\\" \\\\ bye\""),
            vec![Token::Str(b"say \"hi\" \\ bye".to_vec())]
        );
        assert!(Lexer::new(b"\"bad \\n\"").next_token().is_err());
        assert!(Lexer::new(b"\"open").next_token().is_err());
    }

    #[test]
    fn literal_keeps_binary_bytes() {
        let mut lexer = Lexer::new(b"{3}\r\n\x00\xff\r rest");
        assert_eq!(lexer.read_nbytes().unwrap(), Some(vec![0x00, 0xff, b'\r']));
        assert_eq!(lexer.remaining(), b" rest");
    }

    #[test]
    fn short_literal_is_an_error() {
        assert!(Lexer::new(b"{10}\r\nabc").next_token().is_err());
        assert!(Lexer::new(b"{3}abc").next_token().is_err());
    }

    #[test]
    fn nstring_decodes_lossily() {
        let mut lexer = Lexer::new(b"\"caf\xe9\" NIL");
        assert_eq!(lexer.read_nstring().unwrap(), Some("caf\u{fffd}".to_string()));
        lexer.expect_space().unwrap();
        assert_eq!(lexer.read_nstring().unwrap(), None);
    }

    #[test]
    fn skip_value_handles_nesting() {
        let mut lexer = Lexer::new(b"(\"a\" (\"b)\" NIL) 3) UID");
        lexer.skip_value().unwrap();
        assert_eq!(lexer.remaining(), b" UID");

        let mut lexer = Lexer::new(b"42 rest");
        lexer.skip_value().unwrap();
        assert_eq!(lexer.remaining(), b" rest");

        assert!(Lexer::new(b"(\"a\" (NIL)").skip_value().is_err());
        assert!(Lexer::new(b")").skip_value().is_err());
    }

    #[test]
    fn atom_charset() {
        for b in [b'A', b'z', b'0', b':', b'\\', b'$', b'~'] {
            assert!(is_atom_char(b), "{}", b as char);
        }
        for b in [b' ', b'(', b')', b'{', b'%', b'*', b'"', b'[', b']', b'\r', 0xc3] {
            assert!(!is_atom_char(b), "{b:#04x}");
        }
    }
}
