//! Chat text tokenizer
//!
//! Scans raw chat text into a typed token stream against a caller-supplied
//! keyword table. Tables are plain values owned by whoever builds them, so
//! several bots with different command sets can share the scanner.

pub mod scanner;
pub mod token;

pub use scanner::{is_ident_char, Lexer};
pub use token::{KeywordTable, Token, TokenKind};

/// Errors produced while scanning
#[derive(Debug, thiserror::Error)]
pub enum LexError {
    #[error("scan failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("keyword literal {literal:?} contains characters the scanner never groups into one token")]
    InvalidKeyword { literal: String },
}

/// Tokenize a complete message
pub fn tokenize<K: Copy + PartialEq>(
    input: &str,
    table: &KeywordTable<K>,
) -> Result<Vec<Token<K>>, LexError> {
    Lexer::for_text(input, table).scan_all()
}
