//! Token and keyword table types

use super::scanner::is_ident_char;
use super::LexError;

/// Kind of a scanned token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind<K> {
    /// A single character outside the identifier class
    Illegal,
    /// An identifier that matched no keyword
    Ident,
    /// An identifier that matched a keyword in the active table
    Keyword(K),
}

/// A scanned token with its literal text as it appeared in the input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<K> {
    pub kind: TokenKind<K>,
    pub literal: String,
}

impl<K: Copy> Token<K> {
    pub fn new(kind: TokenKind<K>, literal: impl Into<String>) -> Self {
        Self {
            kind,
            literal: literal.into(),
        }
    }

    /// The keyword kind, if this token matched one
    pub fn keyword(&self) -> Option<K> {
        match self.kind {
            TokenKind::Keyword(k) => Some(k),
            _ => None,
        }
    }
}

/// Ordered keyword table with case-insensitive, first-match-wins lookup
#[derive(Debug, Clone)]
pub struct KeywordTable<K> {
    entries: Vec<(K, String)>,
}

impl<K: Copy + PartialEq> KeywordTable<K> {
    /// Build a table, rejecting literals the scanner could never produce
    pub fn new<I, S>(entries: I) -> Result<Self, LexError>
    where
        I: IntoIterator<Item = (K, S)>,
        S: Into<String>,
    {
        let mut table = Vec::new();
        for (kind, literal) in entries {
            let literal = literal.into();
            if literal.is_empty() || !literal.chars().all(is_ident_char) {
                return Err(LexError::InvalidKeyword { literal });
            }
            table.push((kind, literal.to_lowercase()));
        }

        Ok(Self { entries: table })
    }

    /// Find the keyword kind for a literal
    pub fn lookup(&self, literal: &str) -> Option<K> {
        let needle = literal.to_lowercase();
        self.entries
            .iter()
            .find(|(_, lit)| *lit == needle)
            .map(|(kind, _)| *kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Kw {
        Prefix,
        Example,
        Shadowed,
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let table = KeywordTable::new([(Kw::Prefix, "!twwr"), (Kw::Example, "example")]).unwrap();

        assert_eq!(table.lookup("!TWWR"), Some(Kw::Prefix));
        assert_eq!(table.lookup("Example"), Some(Kw::Example));
        assert_eq!(table.lookup("other"), None);
    }

    #[test]
    fn test_first_declaration_wins() {
        let table =
            KeywordTable::new([(Kw::Example, "dup"), (Kw::Shadowed, "DUP")]).unwrap();
        assert_eq!(table.lookup("dup"), Some(Kw::Example));
    }

    #[test]
    fn test_rejects_unscannable_literals() {
        let err = KeywordTable::new([(Kw::Prefix, "two words")]).unwrap_err();
        assert!(matches!(err, LexError::InvalidKeyword { .. }));

        assert!(KeywordTable::new([(Kw::Prefix, "")]).is_err());
        assert!(KeywordTable::new([(Kw::Prefix, "a+b")]).is_err());
    }

    #[test]
    fn test_len() {
        let table = KeywordTable::new([(Kw::Prefix, "!Twwr")]).unwrap();
        assert_eq!(table.len(), 1);
        assert!(!table.is_empty());
    }
}
