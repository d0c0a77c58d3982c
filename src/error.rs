//! Error types shared across the compilation pipeline.
//!
//! Every stage fails fast: errors propagate to the caller untouched and the
//! only place that inspects them is the interactive shell, which uses the
//! parser's `UnexpectedEof` to decide whether to wait for more input.

use snafu::Snafu;

use crate::token::{Token, TokenKind};

pub type CompileResult<T> = Result<T, CompileError>;
pub type ParseResult<T> = Result<T, ParseError>;
pub type LowerResult<T> = Result<T, LowerError>;
pub type GenerateResult<T> = Result<T, GenerateError>;

#[derive(Debug, Clone, PartialEq, Snafu)]
pub enum ParseError {
  #[snafu(display("Syntax error at line {line}: '{}'", token.text))]
  Syntax { token: Token, line: usize },

  #[snafu(display("unexpected end of input"))]
  UnexpectedEof,
}

impl ParseError {
  /// Error for a lookahead that no production accepts. Running into the
  /// end-of-input marker means the statement is incomplete rather than wrong.
  pub fn at(token: &Token) -> Self {
    if token.kind == TokenKind::Eof {
      return Self::UnexpectedEof;
    }
    Self::Syntax {
      line: token.line,
      token: token.clone(),
    }
  }

  pub fn is_unexpected_eof(&self) -> bool {
    matches!(self, Self::UnexpectedEof)
  }
}

#[derive(Debug, Clone, PartialEq, Snafu)]
pub enum LowerError {
  #[snafu(display("not implemented: {construct}"))]
  NotImplemented { construct: &'static str },

  #[snafu(display("function parameter {index} must be a plain name"))]
  InvalidParameter { index: usize },

  #[snafu(display("invalid number literal '{text}' at line {line}"))]
  InvalidNumber { text: String, line: usize },
}

#[derive(Debug, Clone, PartialEq, Snafu)]
pub enum GenerateError {
  #[snafu(display("Unknown variable: {name}"))]
  UnknownVariable { name: String },

  #[snafu(display("extern '{name}' takes {count} parameters, at most {max} are supported"))]
  TooManyParameters {
    name: String,
    count: usize,
    max: usize,
  },

  #[snafu(display("'return' outside of a function"))]
  ReturnOutsideFunction,
}

#[derive(Debug, Snafu)]
pub enum CompileError {
  #[snafu(context(false), display("{source}"))]
  Parse { source: ParseError },

  #[snafu(context(false), display("{source}"))]
  Lower { source: LowerError },

  #[snafu(context(false), display("{source}"))]
  Generate { source: GenerateError },
}
