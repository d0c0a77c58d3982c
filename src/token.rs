//! Token model shared by the lexer and the parser.
//!
//! Dispatch in the parser is driven by `TokenKind` alone; the text is only
//! carried along so later stages can read literal values and so diagnostics
//! can quote the offending input.

use std::fmt;

/// Identifier-shaped words that are lexed as `TokenKind::Keyword`.
pub const KEYWORDS: [&str; 9] = [
  "fn", "for", "import", "in", "return", "True", "False", "extern", "free",
];

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
  Whitespace,
  Comment,
  Keyword,
  Number,
  String,
  Identifier,
  LParen,
  RParen,
  LBrace,
  RBrace,
  LBracket,
  RBracket,
  Period,
  Comma,
  Equal,
  GreaterThan,
  LessThan,
  Assign,
  Colon,
  Semicolon,
  Minus,
  Plus,
  Asterisk,
  Unknown,
  Eof,
}

impl TokenKind {
  /// Whitespace and comments consume input but never reach the parser.
  pub fn is_discarded(self) -> bool {
    matches!(self, TokenKind::Whitespace | TokenKind::Comment)
  }
}

/// A lexeme together with the 1-based line it was found on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
  pub kind: TokenKind,
  pub text: String,
  pub line: usize,
}

impl Token {
  pub fn new(kind: TokenKind, text: impl Into<String>, line: usize) -> Self {
    Self {
      kind,
      text: text.into(),
      line,
    }
  }

  /// Synthetic end-of-input marker appended by the parser.
  pub fn eof(line: usize) -> Self {
    Self::new(TokenKind::Eof, "$", line)
  }

  pub fn kind(&self) -> TokenKind {
    self.kind
  }

  /// True when this is the keyword `word`.
  pub fn is_keyword(&self, word: &str) -> bool {
    self.kind == TokenKind::Keyword && self.text == word
  }

  /// True when this is any of the keywords in `words`.
  pub fn is_any_keyword(&self, words: &[&str]) -> bool {
    self.kind == TokenKind::Keyword && words.contains(&self.text.as_str())
  }
}

impl fmt::Display for Token {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "<{:?}('{}') @ line {}>", self.kind, self.text, self.line)
  }
}
