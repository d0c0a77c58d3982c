//! Code generation: compile IR into assembly text for a target backend.
//!
//! The IR has no notion of registers. Every value lives in a word-sized stack
//! slot addressed relative to the frame pointer, and names are bound to the
//! slot that was on top of the stack when they were set. A name bound in an
//! enclosing scope is reached by following the saved frame pointers, one
//! frame per scope level. Calls follow one
//! convention for both generated functions and extern thunks:
//!
//! - all arguments are pushed to the stack, the last argument first;
//! - the return value comes back in the return register;
//! - the caller drops the arguments and pushes the return value.

mod x86_64;

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use log::debug;

use crate::error::{GenerateError, GenerateResult};
use crate::ir::Instruction;

pub use x86_64::X86_64Linux;

/// Size of one stack slot in bytes.
pub const WORD: i64 = 8;

/// Target selected when constructing a `Generator`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Architecture {
  #[default]
  X86_64Linux,
}

/// One line of assembly: optional label, mnemonic and operands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Line {
  pub label: String,
  pub mnemonic: String,
  pub operands: String,
}

impl Line {
  pub fn new(mnemonic: impl Into<String>, operands: impl Into<String>) -> Self {
    Self {
      label: String::new(),
      mnemonic: mnemonic.into(),
      operands: operands.into(),
    }
  }

  pub fn labeled(
    label: impl Into<String>,
    mnemonic: impl Into<String>,
    operands: impl Into<String>,
  ) -> Self {
    Self {
      label: label.into(),
      mnemonic: mnemonic.into(),
      operands: operands.into(),
    }
  }
}

impl fmt::Display for Line {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "{:<10} {:<10} {:<10}", self.label, self.mnemonic, self.operands)
  }
}

/// Everything a backend has emitted so far. Entries are only ever added.
#[derive(Debug, Clone, Default)]
pub struct Output {
  /// Function label to body, in declaration order.
  pub functions: IndexMap<String, Vec<Line>>,
  /// Data label to its directive, in declaration order.
  pub data: IndexMap<String, Line>,
  /// Foreign symbol to the label of its thunk.
  pub externs: IndexMap<String, String>,
}

impl Output {
  /// Append a line to the function `name`, creating it if needed.
  pub fn emit(&mut self, name: &str, line: Line) {
    self.functions.entry(name.to_string()).or_default().push(line);
  }
}

/// Hands out `<prefix>_<nnnnnn>` labels, numbered from 1 per prefix.
#[derive(Debug, Default)]
pub struct LabelCounter {
  counters: HashMap<String, usize>,
}

impl LabelCounter {
  pub fn next(&mut self, prefix: &str) -> String {
    let counter = self.counters.entry(prefix.to_string()).or_insert(1);
    let label = format!("{prefix}_{:06}", *counter);
    *counter += 1;
    label
  }
}

/// Stack slot of a bound name: `offset` from the base of the frame `depth`
/// levels up the saved frame-pointer chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
  pub depth: usize,
  pub offset: i64,
}

/// Variable scope of the function currently being compiled.
///
/// `position` tracks the simulated stack pointer relative to the frame
/// pointer: it starts at 0 and drops by one word per pushed value. Lookups
/// fall back to the enclosing scopes.
#[derive(Debug)]
pub struct Context {
  name: String,
  variables: HashMap<String, i64>,
  parent: Option<Box<Context>>,
  position: i64,
}

impl Context {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      variables: HashMap::new(),
      parent: None,
      position: 0,
    }
  }

  /// Label of the function whose stream this scope emits into.
  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn position(&self) -> i64 {
    self.position
  }

  /// True for the entry scope, which has no caller frame to return to.
  pub fn is_outermost(&self) -> bool {
    self.parent.is_none()
  }

  /// Replace `self` with a fresh child scope; the current scope becomes its parent.
  pub fn enter(&mut self, name: impl Into<String>) {
    let parent = std::mem::replace(self, Context::new(name));
    self.parent = Some(Box::new(parent));
  }

  /// Drop the current scope and restore its parent. The outermost scope stays.
  pub fn leave(&mut self) {
    if let Some(parent) = self.parent.take() {
      *self = *parent;
    }
  }

  /// Bind `name` to the slot currently on top of the stack.
  pub fn add_variable(&mut self, name: impl Into<String>) {
    self.variables.insert(name.into(), self.position);
  }

  /// Account for one value pushed onto the stack.
  pub fn move_stack_pointer(&mut self) {
    self.position -= WORD;
  }

  /// Account for `slots` values dropped from the stack.
  pub fn release(&mut self, slots: usize) {
    self.position += WORD * slots as i64;
  }

  /// Slot of `name`, searching enclosing scopes outwards. Every enclosing
  /// scope is one more frame up.
  pub fn get_position(&self, name: &str) -> GenerateResult<Slot> {
    let mut scope = Some(self);
    let mut depth = 0;
    while let Some(current) = scope {
      if let Some(&offset) = current.variables.get(name) {
        return Ok(Slot { depth, offset });
      }
      scope = current.parent.as_deref();
      depth += 1;
    }
    Err(GenerateError::UnknownVariable {
      name: name.to_string(),
    })
  }
}

/// Operations every target implements, one per IR opcode.
pub trait Backend {
  fn make_number(&mut self, value: i64) -> GenerateResult<()>;
  fn make_string(&mut self, value: &str) -> GenerateResult<()>;
  fn make_boolean(&mut self, value: bool) -> GenerateResult<()>;
  fn make_function(&mut self, params: &[String], body: &[Instruction]) -> GenerateResult<()>;
  fn extern_function(&mut self, name: &str, params: usize) -> GenerateResult<()>;
  fn set_name(&mut self, name: &str) -> GenerateResult<()>;
  fn call_function(&mut self, name: &str, args: &[Instruction]) -> GenerateResult<()>;
  fn push_reference(&mut self, name: &str) -> GenerateResult<()>;
  fn return_from_function(&mut self, has_value: bool) -> GenerateResult<()>;

  /// State accumulated by every `compile` so far.
  fn output(&self) -> &Output;

  /// Final assembly text. Rendering does not change the backend.
  fn render(&self) -> String;

  /// Compile instructions in order, appending to the existing output.
  fn compile(&mut self, ir: &[Instruction]) -> GenerateResult<()> {
    for instruction in ir {
      debug!("compiling {instruction:?}");
      match instruction {
        Instruction::MakeNumber(value) => self.make_number(*value)?,
        Instruction::MakeString(value) => self.make_string(value)?,
        Instruction::MakeBoolean(value) => self.make_boolean(*value)?,
        Instruction::MakeFunction { params, body } => self.make_function(params, body)?,
        Instruction::Extern { name, params } => self.extern_function(name, *params)?,
        Instruction::SetName(name) => self.set_name(name)?,
        Instruction::CallFunction { name, args } => self.call_function(name, args)?,
        Instruction::PushReference(name) => self.push_reference(name)?,
        Instruction::Return { has_value } => self.return_from_function(*has_value)?,
        Instruction::Nop => {}
      }
    }
    Ok(())
  }
}

/// The closed set of available backends.
#[derive(Debug)]
pub enum Generator {
  X86_64Linux(X86_64Linux),
}

impl Generator {
  pub fn new(architecture: Architecture) -> Self {
    match architecture {
      Architecture::X86_64Linux => Self::X86_64Linux(X86_64Linux::new()),
    }
  }

  fn backend(&self) -> &dyn Backend {
    match self {
      Self::X86_64Linux(backend) => backend,
    }
  }

  fn backend_mut(&mut self) -> &mut dyn Backend {
    match self {
      Self::X86_64Linux(backend) => backend,
    }
  }

  pub fn compile(&mut self, ir: &[Instruction]) -> GenerateResult<()> {
    self.backend_mut().compile(ir)
  }

  pub fn output(&self) -> &Output {
    self.backend().output()
  }

  pub fn render(&self) -> String {
    self.backend().render()
  }
}

impl Default for Generator {
  fn default() -> Self {
    Self::new(Architecture::default())
  }
}
