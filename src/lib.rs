//! Crate root: wires together the compilation pipeline.
//!
//! - `lexer` turns source text into tokens (`token` defines them).
//! - `parser` builds the syntax tree (`ast`) by recursive descent.
//! - `ir` lowers the tree to a flat instruction list.
//! - `codegen` compiles instructions to assembly for a target backend.
//! - `error` holds the error types of every stage.
//! - `repl` is the interactive shell built on top of the same stages.

pub mod ast;
pub mod codegen;
pub mod error;
pub mod ir;
pub mod lexer;
pub mod parser;
pub mod repl;
pub mod token;

pub use codegen::{Architecture, Generator};
pub use error::{CompileError, CompileResult};
pub use parser::Parser;

/// Compile a whole program into assembly text for the default target.
pub fn compile_source(source: &str) -> CompileResult<String> {
  let mut parser = Parser::new();
  parser.add_tokens(lexer::tokenize(source));
  parser.parse()?;

  let ir = ir::lower(&parser.ast)?;
  let mut generator = Generator::new(Architecture::default());
  generator.compile(&ir)?;
  Ok(generator.render())
}
