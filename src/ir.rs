//! Intermediate representation and the lowering from the syntax tree.
//!
//! A program lowers to a flat list of instructions in source order. Function
//! bodies and call arguments stay nested inside their instruction so the
//! generator can compile them in the right frame. Every expression that
//! lowers successfully produces exactly one instruction, which is what lets
//! a call count its arguments by counting instructions.

use log::debug;

use crate::ast::{Identity, Node};
use crate::error::{LowerError, LowerResult};
use crate::token::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
  MakeNumber,
  MakeString,
  MakeBoolean,
  MakeFunction,
  Extern,
  SetName,
  CallFunction,
  PushReference,
  Return,
  Nop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
  MakeNumber(i64),
  MakeString(String),
  MakeBoolean(bool),
  MakeFunction {
    params: Vec<String>,
    body: Vec<Instruction>,
  },
  /// Declare a foreign symbol taking `params` word-sized arguments.
  Extern {
    name: String,
    params: usize,
  },
  /// Name the value currently on top of the stack.
  SetName(String),
  /// Call `name` after evaluating `args`, one instruction per argument.
  CallFunction {
    name: String,
    args: Vec<Instruction>,
  },
  PushReference(String),
  /// Leave the current function, returning the top of stack if `has_value`.
  Return {
    has_value: bool,
  },
  Nop,
}

impl Instruction {
  pub fn opcode(&self) -> OpCode {
    match self {
      Instruction::MakeNumber(_) => OpCode::MakeNumber,
      Instruction::MakeString(_) => OpCode::MakeString,
      Instruction::MakeBoolean(_) => OpCode::MakeBoolean,
      Instruction::MakeFunction { .. } => OpCode::MakeFunction,
      Instruction::Extern { .. } => OpCode::Extern,
      Instruction::SetName(_) => OpCode::SetName,
      Instruction::CallFunction { .. } => OpCode::CallFunction,
      Instruction::PushReference(_) => OpCode::PushReference,
      Instruction::Return { .. } => OpCode::Return,
      Instruction::Nop => OpCode::Nop,
    }
  }
}

/// Lower a parsed program into IR.
pub fn lower(ast: &[Node]) -> LowerResult<Vec<Instruction>> {
  let ir = lower_statements(ast)?;
  debug!("lowered IR: {ir:?}");
  Ok(ir)
}

fn lower_statements(statements: &[Node]) -> LowerResult<Vec<Instruction>> {
  let mut ir = Vec::new();
  for statement in statements {
    ir.extend(lower_statement(statement)?);
  }
  Ok(ir)
}

fn lower_statement(node: &Node) -> LowerResult<Vec<Instruction>> {
  debug!("lowering statement: {:?}", node.kind());
  match node {
    Node::Assignment { target, value } => lower_assignment(target, value),
    Node::Return(value) => lower_return(value.as_deref()),
    _ => lower_expression(node),
  }
}

fn lower_assignment(target: &Identity, value: &Node) -> LowerResult<Vec<Instruction>> {
  let mut ir = lower_expression(value)?;
  if !target.is_bare() {
    return Err(LowerError::NotImplemented {
      construct: "indexed assignment",
    });
  }
  ir.push(Instruction::SetName(target.name.text.clone()));
  Ok(ir)
}

fn lower_return(value: Option<&Node>) -> LowerResult<Vec<Instruction>> {
  let mut ir = match value {
    Some(value) => lower_expression(value)?,
    None => Vec::new(),
  };
  ir.push(Instruction::Return {
    has_value: value.is_some(),
  });
  Ok(ir)
}

fn lower_expression(node: &Node) -> LowerResult<Vec<Instruction>> {
  let instruction = match node {
    Node::Identity(identity) => lower_reference(identity)?,
    Node::StringLiteral(token) => Instruction::MakeString(remove_quotes(&token.text).to_string()),
    Node::NumberLiteral(token) => Instruction::MakeNumber(parse_number(token)?),
    Node::Boolean(token) => Instruction::MakeBoolean(token.text == "True"),
    Node::Function { params, body } => lower_function(params, &body.statements)?,
    Node::FunctionCall { callee, args } => lower_call(callee, args)?,
    Node::Extern { name, params } => Instruction::Extern {
      name: remove_quotes(&name.text).to_string(),
      params: parse_number(params)?.try_into().map_err(|_| LowerError::InvalidNumber {
        text: params.text.clone(),
        line: params.line,
      })?,
    },
    other => {
      return Err(LowerError::NotImplemented {
        construct: other.kind().describe(),
      });
    }
  };
  Ok(vec![instruction])
}

fn lower_reference(identity: &Identity) -> LowerResult<Instruction> {
  if !identity.is_bare() {
    return Err(LowerError::NotImplemented {
      construct: "indexed reference",
    });
  }
  Ok(Instruction::PushReference(identity.name.text.clone()))
}

fn lower_function(params: &[Node], body: &[Node]) -> LowerResult<Instruction> {
  let params = params
    .iter()
    .enumerate()
    .map(|(index, param)| match param {
      Node::Identity(identity) if identity.is_bare() => Ok(identity.name.text.clone()),
      _ => Err(LowerError::InvalidParameter { index }),
    })
    .collect::<LowerResult<Vec<_>>>()?;
  let body = lower_statements(body)?;
  Ok(Instruction::MakeFunction { params, body })
}

fn lower_call(callee: &Identity, args: &[Node]) -> LowerResult<Instruction> {
  if !callee.is_bare() {
    return Err(LowerError::NotImplemented {
      construct: "indexed call target",
    });
  }
  let mut lowered = Vec::with_capacity(args.len());
  for arg in args {
    lowered.extend(lower_expression(arg)?);
  }
  Ok(Instruction::CallFunction {
    name: callee.name.text.clone(),
    args: lowered,
  })
}

/// Strip the surrounding quote characters the lexer keeps on string tokens.
fn remove_quotes(text: &str) -> &str {
  let inner = text.strip_prefix(['\'', '"']).unwrap_or(text);
  inner.strip_suffix(['\'', '"']).unwrap_or(inner)
}

fn parse_number(token: &Token) -> LowerResult<i64> {
  token.text.parse().map_err(|_| LowerError::InvalidNumber {
    text: token.text.clone(),
    line: token.line,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::lexer::tokenize;
  use crate::parser::Parser;

  fn lower_source(source: &str) -> LowerResult<Vec<Instruction>> {
    let mut parser = Parser::new();
    parser.add_tokens(tokenize(source));
    assert_eq!(parser.parse(), Ok(true));
    lower(&parser.ast)
  }

  fn not_implemented(source: &str) -> &'static str {
    match lower_source(source) {
      Err(LowerError::NotImplemented { construct }) => construct,
      other => panic!("expected NotImplemented, got {other:?}"),
    }
  }

  #[test]
  fn assignment_of_number() {
    assert_eq!(
      lower_source("x = 5;").unwrap(),
      vec![Instruction::MakeNumber(5), Instruction::SetName("x".into())]
    );
  }

  #[test]
  fn literals() {
    let ir = lower_source("'hi'; \"it's\"; True; False; y;").unwrap();
    assert_eq!(
      ir,
      vec![
        Instruction::MakeString("hi".into()),
        Instruction::MakeString("it's".into()),
        Instruction::MakeBoolean(true),
        Instruction::MakeBoolean(false),
        Instruction::PushReference("y".into()),
      ]
    );
  }

  #[test]
  fn function_and_call() {
    let ir = lower_source("f = fn(x){ return x; }; f(5);").unwrap();
    assert_eq!(
      ir,
      vec![
        Instruction::MakeFunction {
          params: vec!["x".into()],
          body: vec![
            Instruction::PushReference("x".into()),
            Instruction::Return { has_value: true },
          ],
        },
        Instruction::SetName("f".into()),
        Instruction::CallFunction {
          name: "f".into(),
          args: vec![Instruction::MakeNumber(5)],
        },
      ]
    );
    assert_eq!(ir[2].opcode(), OpCode::CallFunction);
  }

  #[test]
  fn call_arguments_stay_nested_in_order() {
    let ir = lower_source("f(1, g(2), 'x');").unwrap();
    assert_eq!(ir.len(), 1);
    assert_eq!(
      ir[0],
      Instruction::CallFunction {
        name: "f".into(),
        args: vec![
          Instruction::MakeNumber(1),
          Instruction::CallFunction {
            name: "g".into(),
            args: vec![Instruction::MakeNumber(2)],
          },
          Instruction::MakeString("x".into()),
        ],
      }
    );
  }

  #[test]
  fn bare_return() {
    let ir = lower_source("fn() { return; };").unwrap();
    assert_eq!(
      ir,
      vec![Instruction::MakeFunction {
        params: Vec::new(),
        body: vec![Instruction::Return { has_value: false }],
      }]
    );
  }

  #[test]
  fn extern_declaration() {
    assert_eq!(
      lower_source("puts = extern('puts', 1);").unwrap(),
      vec![
        Instruction::Extern {
          name: "puts".into(),
          params: 1,
        },
        Instruction::SetName("puts".into()),
      ]
    );
  }

  #[test]
  fn indexing_is_not_lowered() {
    assert_eq!(not_implemented("x[0] = 5;"), "indexed assignment");
    assert_eq!(not_implemented("x[0];"), "indexed reference");
    assert_eq!(not_implemented("x[0](1);"), "indexed call target");
  }

  #[test]
  fn unsupported_constructs() {
    assert_eq!(not_implemented("{1: 2};"), "dictionary");
    assert_eq!(not_implemented("a == b;"), "comparison");
    assert_eq!(not_implemented("for x in xs {};"), "for loop");
    assert_eq!(not_implemented("import 'os';"), "import");
    assert_eq!(not_implemented("free(x);"), "free");
    assert_eq!(not_implemented("f(x = 1);"), "assignment");
  }

  #[test]
  fn parameters_must_be_plain_names() {
    assert_eq!(
      lower_source("fn(a, 1) {};"),
      Err(LowerError::InvalidParameter { index: 1 })
    );
  }

  #[test]
  fn oversized_number() {
    assert!(matches!(
      lower_source("99999999999999999999;"),
      Err(LowerError::InvalidNumber { line: 1, .. })
    ));
  }
}
