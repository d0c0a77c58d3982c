//! Lexical analysis: turns source text into a flat vector of tokens.
//!
//! The source is scanned line by line. At every position the rules below are
//! tried in order and the first one that matches a prefix wins, so the order
//! of `RULES` is significant (numbers must be tried before identifiers, `==`
//! before `=`). Input that matches no rule becomes a single `Unknown` token
//! spanning the rest of the line; the parser reports it as a syntax error.

use std::sync::LazyLock;

use log::debug;
use regex::Regex;

use crate::token::{KEYWORDS, Token, TokenKind};

static RULES: LazyLock<Vec<(Regex, TokenKind)>> = LazyLock::new(|| {
  [
    (r"^\s+", TokenKind::Whitespace),
    (r"^[0-9]+", TokenKind::Number),
    (r"^#.*$", TokenKind::Comment),
    (r"^'.*?'", TokenKind::String),
    (r#"^".*?""#, TokenKind::String),
    (r"^[a-zA-Z_][a-zA-Z_0-9]*", TokenKind::Identifier),
    (r"^\(", TokenKind::LParen),
    (r"^\)", TokenKind::RParen),
    (r"^\{", TokenKind::LBrace),
    (r"^\}", TokenKind::RBrace),
    (r"^\[", TokenKind::LBracket),
    (r"^\]", TokenKind::RBracket),
    (r"^\.", TokenKind::Period),
    (r"^,", TokenKind::Comma),
    (r"^==", TokenKind::Equal),
    (r"^>", TokenKind::GreaterThan),
    (r"^<", TokenKind::LessThan),
    (r"^=", TokenKind::Assign),
    (r"^:", TokenKind::Colon),
    (r"^;", TokenKind::Semicolon),
    (r"^-", TokenKind::Minus),
    (r"^\+", TokenKind::Plus),
    (r"^\*", TokenKind::Asterisk),
  ]
  .into_iter()
  .map(|(pattern, kind)| (Regex::new(pattern).expect("lexer rule must compile"), kind))
  .collect()
});

/// Lex the input into the tokens the parser consumes.
///
/// Whitespace and comments are dropped; no end-of-input marker is added since
/// the parser may receive tokens from several calls before it parses.
pub fn tokenize(source: &str) -> Vec<Token> {
  source
    .split('\n')
    .enumerate()
    .flat_map(|(index, line)| scan_line(line, index + 1))
    .filter(|token| !token.kind.is_discarded())
    .inspect(|token| debug!("found token: {token}"))
    .collect()
}

/// Split one line into lexemes, including the discarded ones. The texts of
/// the returned tokens concatenate back to `line`.
fn scan_line(line: &str, line_number: usize) -> Vec<Token> {
  let mut lexemes = Vec::new();
  let mut rest = line;

  while !rest.is_empty() {
    let (kind, len) = match_prefix(rest);
    lexemes.push(Token::new(kind, &rest[..len], line_number));
    rest = &rest[len..];
  }

  lexemes
}

fn match_prefix(input: &str) -> (TokenKind, usize) {
  for (rule, kind) in RULES.iter() {
    if let Some(found) = rule.find(input) {
      let kind = if *kind == TokenKind::Identifier && KEYWORDS.contains(&found.as_str()) {
        TokenKind::Keyword
      } else {
        *kind
      };
      return (kind, found.end());
    }
  }
  (TokenKind::Unknown, input.len())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn kinds(source: &str) -> Vec<TokenKind> {
    tokenize(source).iter().map(Token::kind).collect()
  }

  #[test]
  fn assignment_statement() {
    let tokens = tokenize("x = 5;");
    let summary: Vec<_> = tokens.iter().map(|t| (t.kind, t.text.as_str())).collect();
    assert_eq!(
      summary,
      vec![
        (TokenKind::Identifier, "x"),
        (TokenKind::Assign, "="),
        (TokenKind::Number, "5"),
        (TokenKind::Semicolon, ";"),
      ]
    );
  }

  #[test]
  fn keywords_are_reclassified() {
    let tokens = tokenize("fn for in returned True");
    assert_eq!(tokens[0].kind, TokenKind::Keyword);
    assert_eq!(tokens[1].kind, TokenKind::Keyword);
    assert_eq!(tokens[2].kind, TokenKind::Keyword);
    assert_eq!(tokens[3].kind, TokenKind::Identifier);
    assert!(tokens[4].is_keyword("True"));
  }

  #[test]
  fn digits_before_identifiers() {
    // An identifier cannot start with a digit, so `12ab` is a number then a name.
    assert_eq!(kinds("12ab"), vec![TokenKind::Number, TokenKind::Identifier]);
  }

  #[test]
  fn equal_wins_over_assign() {
    assert_eq!(
      kinds("a == b = c"),
      vec![
        TokenKind::Identifier,
        TokenKind::Equal,
        TokenKind::Identifier,
        TokenKind::Assign,
        TokenKind::Identifier,
      ]
    );
  }

  #[test]
  fn strings_keep_their_quotes() {
    let tokens = tokenize(r#"'a b' "c" 'fn'"#);
    let texts: Vec<_> = tokens.iter().map(|t| t.text.as_str()).collect();
    assert_eq!(texts, vec!["'a b'", "\"c\"", "'fn'"]);
    assert!(tokens.iter().all(|t| t.kind == TokenKind::String));
  }

  #[test]
  fn comments_run_to_end_of_line() {
    let tokens = tokenize("x; # trailing = (\ny;");
    assert_eq!(
      kinds("x; # trailing = (\ny;"),
      vec![
        TokenKind::Identifier,
        TokenKind::Semicolon,
        TokenKind::Identifier,
        TokenKind::Semicolon,
      ]
    );
    assert_eq!(tokens[2].line, 2);
  }

  #[test]
  fn unmatched_input_swallows_rest_of_line() {
    let tokens = tokenize("x = @ 5;\ny;");
    assert_eq!(tokens[2].kind, TokenKind::Unknown);
    assert_eq!(tokens[2].text, "@ 5;");
    assert_eq!(tokens[3].text, "y");
    assert_eq!(tokens[3].line, 2);
  }

  #[test]
  fn discarded_kinds_never_emitted() {
    let source = "  a = 'x' # note\n\tfn(b) { return b; };\n";
    assert!(tokenize(source).iter().all(|t| !t.kind.is_discarded()));
  }

  #[test]
  fn lexemes_reconstruct_each_line() {
    let lines = ["  a = 'x' # note", "\tf(b, {1: 2})[0] == x;", "@@ ???", ""];
    for (index, line) in lines.iter().enumerate() {
      let rebuilt: String = scan_line(line, index + 1)
        .iter()
        .map(|t| t.text.as_str())
        .collect();
      assert_eq!(&rebuilt, line);
    }
  }

  #[test]
  fn unterminated_string_is_unknown() {
    assert_eq!(kinds("'abc"), vec![TokenKind::Unknown]);
  }
}
