//! Predictive recursive-descent parser with one token of lookahead.
//!
//! Grammar:
//!
//! ```text
//! program      → statements
//! statements   → (statement ';')*
//! statement    → expression | for | return | import | free
//! for          → 'for' identity 'in' identity block
//! free         → 'free' '(' identity ')'
//! import       → 'import' STRING
//! return       → 'return' expression?
//! extern       → 'extern' '(' STRING ',' NUMBER ')'
//! identity     → IDENTIFIER key*
//! key          → '[' expression ']'
//! expression   → primary comparison?
//! primary      → STRING | NUMBER | boolean | '(' expression ')' | function
//!              | dictionary | extern | identity (assignment | call_args)?
//! boolean      → 'True' | 'False'
//! comparison   → ('==' | '>' | '<') expression
//! function     → 'fn' '(' params ')' block
//! params       → (expression (',' params)?)?
//! block        → '{' statements '}'
//! dictionary   → '{' (key_value (',' key_values)?)? '}'
//! key_value    → expression ':' expression
//! assignment   → '=' expression
//! call_args    → '(' params ')'
//! ```
//!
//! Every rule dispatches on the lookahead against its FIRST set, and takes
//! an epsilon production only when the lookahead is in the rule's FOLLOW set.
//! Anything else is a syntax error at the lookahead. The right-hand side of a
//! comparison is a full expression, so `a == b == c` is `a == (b == c)`.

use log::{debug, trace};

use crate::ast::{Block, Identity, KeyValue, Node};
use crate::error::{ParseError, ParseResult};
use crate::token::{Token, TokenKind};

/// Buffers tokens across calls so a statement may arrive in pieces.
#[derive(Debug, Default)]
pub struct Parser {
  tokens: Vec<Token>,
  /// Statements produced by the last successful `parse`.
  pub ast: Vec<Node>,
}

impl Parser {
  pub fn new() -> Self {
    Self::default()
  }

  /// Append tokens to the buffer.
  pub fn add_tokens(&mut self, tokens: impl IntoIterator<Item = Token>) {
    self.tokens.extend(tokens);
  }

  /// Empty the token buffer.
  pub fn reset(&mut self) {
    self.tokens.clear();
  }

  /// First and last line numbers in the buffer, `(0, 0)` when it is empty.
  pub fn line_range(&self) -> (usize, usize) {
    match (self.tokens.first(), self.tokens.last()) {
      (Some(first), Some(last)) => (first.line, last.line),
      _ => (0, 0),
    }
  }

  /// Parse everything buffered so far as a complete program.
  ///
  /// On success the statements replace `ast` and the buffer is cleared. On
  /// error the buffer is left alone so the caller can either add more tokens
  /// (after `UnexpectedEof`) or `reset`.
  pub fn parse(&mut self) -> ParseResult<bool> {
    let eof = Token::eof(self.line_range().1);
    let mut stream = TokenStream::new(self.tokens.clone(), eof);
    let ast = parse_program(&mut stream)?;

    if !stream.at_end() {
      return Ok(false);
    }

    debug!("parsed {} statement(s)", ast.len());
    self.ast = ast;
    self.reset();
    Ok(true)
  }
}

fn starts_expression(token: &Token) -> bool {
  matches!(
    token.kind,
    TokenKind::String
      | TokenKind::Number
      | TokenKind::LParen
      | TokenKind::Identifier
      | TokenKind::LBrace
  ) || token.is_any_keyword(&["fn", "True", "False", "extern"])
}

fn starts_statement(token: &Token) -> bool {
  starts_expression(token) || token.is_any_keyword(&["for", "return", "import", "free"])
}

fn ends_statements(token: &Token) -> bool {
  matches!(token.kind, TokenKind::Eof | TokenKind::RBrace)
}

fn ends_keys(token: &Token) -> bool {
  matches!(
    token.kind,
    TokenKind::Semicolon
      | TokenKind::Assign
      | TokenKind::RParen
      | TokenKind::RBracket
      | TokenKind::LParen
      | TokenKind::Comma
      | TokenKind::Colon
      | TokenKind::LBrace
      | TokenKind::RBrace
      | TokenKind::Equal
      | TokenKind::GreaterThan
      | TokenKind::LessThan
  ) || token.is_keyword("in")
}

fn ends_reference(token: &Token) -> bool {
  matches!(
    token.kind,
    TokenKind::RParen
      | TokenKind::RBracket
      | TokenKind::Comma
      | TokenKind::Semicolon
      | TokenKind::Colon
      | TokenKind::RBrace
      | TokenKind::Equal
      | TokenKind::GreaterThan
      | TokenKind::LessThan
  )
}

fn ends_expression(token: &Token) -> bool {
  matches!(
    token.kind,
    TokenKind::Assign
      | TokenKind::RParen
      | TokenKind::RBracket
      | TokenKind::Comma
      | TokenKind::Semicolon
      | TokenKind::Colon
      | TokenKind::RBrace
  )
}

fn parse_program(stream: &mut TokenStream) -> ParseResult<Vec<Node>> {
  trace!("program: {}", stream.peek());
  let statements = parse_statements(stream)?;
  if stream.peek().kind != TokenKind::Eof {
    return Err(stream.error());
  }
  Ok(statements)
}

fn parse_statements(stream: &mut TokenStream) -> ParseResult<Vec<Node>> {
  let mut statements = Vec::new();

  loop {
    trace!("statements: {}", stream.peek());
    if starts_statement(stream.peek()) {
      statements.push(parse_statement(stream)?);
      stream.expect(TokenKind::Semicolon)?;
    } else if ends_statements(stream.peek()) {
      return Ok(statements);
    } else {
      return Err(stream.error());
    }
  }
}

fn parse_statement(stream: &mut TokenStream) -> ParseResult<Node> {
  trace!("statement: {}", stream.peek());
  let token = stream.peek();

  if starts_expression(token) {
    parse_expression(stream)
  } else if token.is_keyword("for") {
    parse_for(stream)
  } else if token.is_keyword("return") {
    parse_return(stream)
  } else if token.is_keyword("import") {
    parse_import(stream)
  } else if token.is_keyword("free") {
    parse_free(stream)
  } else {
    Err(stream.error())
  }
}

fn parse_for(stream: &mut TokenStream) -> ParseResult<Node> {
  trace!("for: {}", stream.peek());
  stream.expect_keyword("for")?;
  let item = parse_identity(stream)?;
  stream.expect_keyword("in")?;
  let iterable = parse_identity(stream)?;
  let body = parse_block(stream)?;
  Ok(Node::For {
    item,
    iterable,
    body,
  })
}

fn parse_free(stream: &mut TokenStream) -> ParseResult<Node> {
  trace!("free: {}", stream.peek());
  stream.expect_keyword("free")?;
  stream.expect(TokenKind::LParen)?;
  let identity = parse_identity(stream)?;
  stream.expect(TokenKind::RParen)?;
  Ok(Node::Free(identity))
}

fn parse_import(stream: &mut TokenStream) -> ParseResult<Node> {
  trace!("import: {}", stream.peek());
  stream.expect_keyword("import")?;
  let module = stream.expect(TokenKind::String)?;
  Ok(Node::Import(module))
}

fn parse_return(stream: &mut TokenStream) -> ParseResult<Node> {
  trace!("return: {}", stream.peek());
  stream.expect_keyword("return")?;

  if starts_expression(stream.peek()) {
    let value = parse_expression(stream)?;
    Ok(Node::Return(Some(Box::new(value))))
  } else if stream.peek().kind == TokenKind::Semicolon {
    Ok(Node::Return(None))
  } else {
    Err(stream.error())
  }
}

fn parse_extern(stream: &mut TokenStream) -> ParseResult<Node> {
  trace!("extern: {}", stream.peek());
  stream.expect_keyword("extern")?;
  stream.expect(TokenKind::LParen)?;
  let name = stream.expect(TokenKind::String)?;
  stream.expect(TokenKind::Comma)?;
  let params = stream.expect(TokenKind::Number)?;
  stream.expect(TokenKind::RParen)?;
  Ok(Node::Extern { name, params })
}

fn parse_identity(stream: &mut TokenStream) -> ParseResult<Identity> {
  trace!("identity: {}", stream.peek());
  let name = stream.expect(TokenKind::Identifier)?;
  let keys = parse_keys(stream)?;
  Ok(Identity { name, keys })
}

fn parse_keys(stream: &mut TokenStream) -> ParseResult<Vec<Node>> {
  let mut keys = Vec::new();

  loop {
    trace!("keys: {}", stream.peek());
    if stream.peek().kind == TokenKind::LBracket {
      keys.push(parse_key(stream)?);
    } else if ends_keys(stream.peek()) {
      return Ok(keys);
    } else {
      return Err(stream.error());
    }
  }
}

fn parse_key(stream: &mut TokenStream) -> ParseResult<Node> {
  trace!("key: {}", stream.peek());
  stream.expect(TokenKind::LBracket)?;
  let key = parse_expression(stream)?;
  stream.expect(TokenKind::RBracket)?;
  Ok(key)
}

fn parse_expression(stream: &mut TokenStream) -> ParseResult<Node> {
  trace!("expression: {}", stream.peek());
  let primary = parse_primary(stream)?;
  parse_comparison(stream, primary)
}

fn parse_primary(stream: &mut TokenStream) -> ParseResult<Node> {
  trace!("primary: {}", stream.peek());
  let token = stream.peek().clone();

  match token.kind {
    TokenKind::String => Ok(Node::StringLiteral(stream.advance())),
    TokenKind::Number => Ok(Node::NumberLiteral(stream.advance())),
    TokenKind::LParen => {
      stream.advance();
      let inner = parse_expression(stream)?;
      stream.expect(TokenKind::RParen)?;
      Ok(inner)
    }
    TokenKind::LBrace => parse_dictionary(stream),
    TokenKind::Identifier => {
      let identity = parse_identity(stream)?;
      parse_identity_suffix(stream, identity)
    }
    TokenKind::Keyword if token.is_keyword("fn") => parse_function(stream),
    TokenKind::Keyword if token.is_any_keyword(&["True", "False"]) => parse_boolean(stream),
    TokenKind::Keyword if token.is_keyword("extern") => parse_extern(stream),
    _ => Err(stream.error()),
  }
}

/// Decide between assignment, call and plain reference once the identity
/// itself has been consumed.
fn parse_identity_suffix(stream: &mut TokenStream, identity: Identity) -> ParseResult<Node> {
  trace!("identity suffix: {}", stream.peek());
  let token = stream.peek();

  if token.kind == TokenKind::Assign {
    stream.advance();
    let value = parse_expression(stream)?;
    Ok(Node::assignment(identity, value))
  } else if token.kind == TokenKind::LParen {
    let args = parse_call_args(stream)?;
    Ok(Node::FunctionCall {
      callee: identity,
      args,
    })
  } else if ends_reference(token) {
    Ok(Node::Identity(identity))
  } else {
    Err(stream.error())
  }
}

fn parse_call_args(stream: &mut TokenStream) -> ParseResult<Vec<Node>> {
  trace!("call args: {}", stream.peek());
  stream.expect(TokenKind::LParen)?;
  let args = parse_params(stream)?;
  stream.expect(TokenKind::RParen)?;
  Ok(args)
}

fn parse_comparison(stream: &mut TokenStream, lhs: Node) -> ParseResult<Node> {
  trace!("comparison: {}", stream.peek());
  let token = stream.peek();

  if matches!(
    token.kind,
    TokenKind::Equal | TokenKind::GreaterThan | TokenKind::LessThan
  ) {
    let op = stream.advance();
    let rhs = parse_expression(stream)?;
    Ok(Node::comparison(lhs, op, rhs))
  } else if ends_expression(token) {
    Ok(lhs)
  } else {
    Err(stream.error())
  }
}

/// Comma separated expressions up to, not including, the closing `)`.
/// A trailing comma is accepted.
fn parse_params(stream: &mut TokenStream) -> ParseResult<Vec<Node>> {
  let mut params = Vec::new();

  loop {
    trace!("params: {}", stream.peek());
    if starts_expression(stream.peek()) {
      params.push(parse_expression(stream)?);
      match stream.peek().kind {
        TokenKind::Comma => {
          stream.advance();
        }
        TokenKind::RParen => return Ok(params),
        _ => return Err(stream.error()),
      }
    } else if stream.peek().kind == TokenKind::RParen {
      return Ok(params);
    } else {
      return Err(stream.error());
    }
  }
}

fn parse_function(stream: &mut TokenStream) -> ParseResult<Node> {
  trace!("function: {}", stream.peek());
  stream.expect_keyword("fn")?;
  stream.expect(TokenKind::LParen)?;
  let params = parse_params(stream)?;
  stream.expect(TokenKind::RParen)?;
  let body = parse_block(stream)?;
  Ok(Node::Function { params, body })
}

fn parse_block(stream: &mut TokenStream) -> ParseResult<Block> {
  trace!("block: {}", stream.peek());
  stream.expect(TokenKind::LBrace)?;
  let statements = parse_statements(stream)?;
  stream.expect(TokenKind::RBrace)?;
  Ok(Block { statements })
}

fn parse_dictionary(stream: &mut TokenStream) -> ParseResult<Node> {
  trace!("dictionary: {}", stream.peek());
  stream.expect(TokenKind::LBrace)?;
  let mut entries = Vec::new();

  loop {
    if starts_expression(stream.peek()) {
      entries.push(parse_key_value(stream)?);
      match stream.peek().kind {
        TokenKind::Comma => {
          stream.advance();
        }
        TokenKind::RBrace => break,
        _ => return Err(stream.error()),
      }
    } else if stream.peek().kind == TokenKind::RBrace {
      break;
    } else {
      return Err(stream.error());
    }
  }

  stream.expect(TokenKind::RBrace)?;
  Ok(Node::Dictionary(entries))
}

fn parse_key_value(stream: &mut TokenStream) -> ParseResult<KeyValue> {
  trace!("key value: {}", stream.peek());
  let key = parse_expression(stream)?;
  stream.expect(TokenKind::Colon)?;
  let value = parse_expression(stream)?;
  Ok(KeyValue { key, value })
}

fn parse_boolean(stream: &mut TokenStream) -> ParseResult<Node> {
  trace!("boolean: {}", stream.peek());
  if stream.peek().is_any_keyword(&["True", "False"]) {
    return Ok(Node::Boolean(stream.advance()));
  }
  Err(stream.error())
}

/// Cursor over the buffered tokens. Reading past the end yields the
/// end-of-input marker, which is never consumed.
struct TokenStream {
  tokens: Vec<Token>,
  eof: Token,
  pos: usize,
}

impl TokenStream {
  fn new(tokens: Vec<Token>, eof: Token) -> Self {
    Self {
      tokens,
      eof,
      pos: 0,
    }
  }

  fn peek(&self) -> &Token {
    self.tokens.get(self.pos).unwrap_or(&self.eof)
  }

  /// Consume and return the lookahead.
  fn advance(&mut self) -> Token {
    let token = self.peek().clone();
    if self.pos < self.tokens.len() {
      self.pos += 1;
    }
    token
  }

  fn expect(&mut self, kind: TokenKind) -> ParseResult<Token> {
    if self.peek().kind == kind {
      return Ok(self.advance());
    }
    Err(self.error())
  }

  fn expect_keyword(&mut self, word: &str) -> ParseResult<Token> {
    if self.peek().is_keyword(word) {
      return Ok(self.advance());
    }
    Err(self.error())
  }

  fn error(&self) -> ParseError {
    ParseError::at(self.peek())
  }

  fn at_end(&self) -> bool {
    self.pos == self.tokens.len()
  }
}
