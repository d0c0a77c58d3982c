//! Syntax tree produced by the parser.
//!
//! Each node owns its children. The `NodeKind` tag is what later passes match
//! on when they only care about the shape of a node.

use crate::token::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
  Assignment,
  Identity,
  StringLiteral,
  NumberLiteral,
  Boolean,
  FunctionCall,
  Function,
  Return,
  Dictionary,
  Import,
  For,
  Comparison,
  Extern,
  Free,
}

impl NodeKind {
  pub fn describe(self) -> &'static str {
    match self {
      NodeKind::Assignment => "assignment",
      NodeKind::Identity => "identity",
      NodeKind::StringLiteral => "string literal",
      NodeKind::NumberLiteral => "number literal",
      NodeKind::Boolean => "boolean",
      NodeKind::FunctionCall => "function call",
      NodeKind::Function => "function",
      NodeKind::Return => "return",
      NodeKind::Dictionary => "dictionary",
      NodeKind::Import => "import",
      NodeKind::For => "for loop",
      NodeKind::Comparison => "comparison",
      NodeKind::Extern => "extern",
      NodeKind::Free => "free",
    }
  }
}

/// A variable reference with zero or more index suffixes: `x[0][1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
  pub name: Token,
  pub keys: Vec<Node>,
}

impl Identity {
  pub fn is_bare(&self) -> bool {
    self.keys.is_empty()
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
  pub statements: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyValue {
  pub key: Node,
  pub value: Node,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
  Assignment {
    target: Identity,
    value: Box<Node>,
  },
  Identity(Identity),
  StringLiteral(Token),
  NumberLiteral(Token),
  Boolean(Token),
  FunctionCall {
    callee: Identity,
    args: Vec<Node>,
  },
  Function {
    params: Vec<Node>,
    body: Block,
  },
  Return(Option<Box<Node>>),
  Dictionary(Vec<KeyValue>),
  Import(Token),
  For {
    item: Identity,
    iterable: Identity,
    body: Block,
  },
  /// `lhs op rhs`; `rhs` may itself be a comparison.
  Comparison {
    lhs: Box<Node>,
    op: Token,
    rhs: Box<Node>,
  },
  Extern {
    name: Token,
    params: Token,
  },
  Free(Identity),
}

impl Node {
  pub fn kind(&self) -> NodeKind {
    match self {
      Node::Assignment { .. } => NodeKind::Assignment,
      Node::Identity(_) => NodeKind::Identity,
      Node::StringLiteral(_) => NodeKind::StringLiteral,
      Node::NumberLiteral(_) => NodeKind::NumberLiteral,
      Node::Boolean(_) => NodeKind::Boolean,
      Node::FunctionCall { .. } => NodeKind::FunctionCall,
      Node::Function { .. } => NodeKind::Function,
      Node::Return(_) => NodeKind::Return,
      Node::Dictionary(_) => NodeKind::Dictionary,
      Node::Import(_) => NodeKind::Import,
      Node::For { .. } => NodeKind::For,
      Node::Comparison { .. } => NodeKind::Comparison,
      Node::Extern { .. } => NodeKind::Extern,
      Node::Free(_) => NodeKind::Free,
    }
  }

  pub fn comparison(lhs: Node, op: Token, rhs: Node) -> Self {
    Self::Comparison {
      lhs: Box::new(lhs),
      op,
      rhs: Box::new(rhs),
    }
  }

  pub fn assignment(target: Identity, value: Node) -> Self {
    Self::Assignment {
      target,
      value: Box::new(value),
    }
  }
}
