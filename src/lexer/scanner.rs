//! Single-pass scanner with one character of pushback

use super::token::{KeywordTable, Token, TokenKind};
use super::LexError;
use std::io::{self, BufReader, Read};

/// Whether a character may appear inside an identifier.
///
/// Letters, digits and punctuation are identifier characters, so the `!`
/// command marker scans together with the word it prefixes. Math and currency
/// symbols (`+ $ < = > ^ | ~` and the backtick) are not.
pub fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || is_punctuation(c)
}

fn is_punctuation(c: char) -> bool {
    match c {
        '!' | '"' | '#' | '%' | '&' | '\'' | '(' | ')' | '*' | ',' | '-' | '.' | '/' | ':'
        | ';' | '?' | '@' | '[' | '\\' | ']' | '_' | '{' | '}' => true,
        '\u{00A1}' | '\u{00A7}' | '\u{00AB}' | '\u{00B6}' | '\u{00B7}' | '\u{00BB}'
        | '\u{00BF}' => true,
        '\u{2010}'..='\u{2027}' | '\u{2030}'..='\u{2043}' | '\u{2045}'..='\u{2051}'
        | '\u{2053}'..='\u{205E}' => true,
        '\u{3001}'..='\u{3003}' | '\u{3008}'..='\u{3011}' => true,
        _ => false,
    }
}

/// Byte length of a UTF-8 sequence given its lead byte, 0 if invalid
fn utf8_width(lead: u8) -> usize {
    match lead {
        0x00..=0x7F => 1,
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => 0,
    }
}

/// Lazy tokenizer over any byte source.
///
/// Each call to [`Lexer::next_token`] consumes input from the cursor; the sequence
/// is finite and cannot be restarted.
pub struct Lexer<'t, R, K> {
    reader: BufReader<R>,
    table: &'t KeywordTable<K>,
    pending: Option<char>,
    finished: bool,
}

impl<'t, 'a, K: Copy + PartialEq> Lexer<'t, &'a [u8], K> {
    /// Lex an in-memory string
    pub fn for_text(input: &'a str, table: &'t KeywordTable<K>) -> Self {
        Self::new(input.as_bytes(), table)
    }
}

impl<'t, R: Read, K: Copy + PartialEq> Lexer<'t, R, K> {
    pub fn new(reader: R, table: &'t KeywordTable<K>) -> Self {
        Self {
            reader: BufReader::new(reader),
            table,
            pending: None,
            finished: false,
        }
    }

    /// Scan the next token. `Ok(None)` marks the end of input.
    ///
    /// A method named `scan` would be shadowed by `Iterator::scan` on owned
    /// lexers.
    pub fn next_token(&mut self) -> Result<Option<Token<K>>, LexError> {
        loop {
            let Some(c) = self.read_char()? else {
                return Ok(None);
            };

            if c.is_whitespace() {
                continue;
            }

            if is_ident_char(c) {
                self.pending = Some(c);
                let literal = self.scan_ident()?;
                let kind = match self.table.lookup(&literal) {
                    Some(keyword) => TokenKind::Keyword(keyword),
                    None => TokenKind::Ident,
                };
                return Ok(Some(Token { kind, literal }));
            }

            return Ok(Some(Token {
                kind: TokenKind::Illegal,
                literal: c.to_string(),
            }));
        }
    }

    /// Collect every remaining token, stopping cleanly at end of input
    pub fn scan_all(mut self) -> Result<Vec<Token<K>>, LexError> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn scan_ident(&mut self) -> Result<String, LexError> {
        let mut literal = String::new();
        while let Some(c) = self.read_char()? {
            if is_ident_char(c) {
                literal.push(c);
            } else {
                self.pending = Some(c);
                break;
            }
        }
        Ok(literal)
    }

    fn read_char(&mut self) -> Result<Option<char>, LexError> {
        if let Some(c) = self.pending.take() {
            return Ok(Some(c));
        }

        let Some(lead) = self.read_byte()? else {
            return Ok(None);
        };

        let width = utf8_width(lead);
        if width == 0 {
            return Err(invalid_utf8().into());
        }

        let mut buf = [lead, 0, 0, 0];
        for slot in buf.iter_mut().take(width).skip(1) {
            *slot = self.read_byte()?.ok_or_else(invalid_utf8)?;
        }

        let decoded = std::str::from_utf8(&buf[..width]).map_err(|_| invalid_utf8())?;
        Ok(decoded.chars().next())
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.reader.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

fn invalid_utf8() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, "input is not valid UTF-8")
}

impl<R: Read, K: Copy + PartialEq> Iterator for Lexer<'_, R, K> {
    type Item = Result<Token<K>, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.next_token() {
            Ok(Some(token)) => Some(Ok(token)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
