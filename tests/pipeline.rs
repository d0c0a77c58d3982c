// End-to-end checks through the public API: source text in, assembly out.
use uroboros::error::{GenerateError, ParseError};
use uroboros::ir::{self, Instruction};
use uroboros::lexer::tokenize;
use uroboros::token::TokenKind;
use uroboros::{Architecture, CompileError, Generator, Parser, compile_source};

/// Rendered assembly with the column padding collapsed.
fn normalize(asm: &str) -> Vec<String> {
  asm
    .lines()
    .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
    .filter(|line| !line.is_empty())
    .collect()
}

struct Session {
  parser: Parser,
  generator: Generator,
}

impl Session {
  fn new() -> Self {
    Self {
      parser: Parser::new(),
      generator: Generator::new(Architecture::X86_64Linux),
    }
  }

  fn feed(&mut self, source: &str) -> Vec<Instruction> {
    self.parser.add_tokens(tokenize(source));
    assert_eq!(self.parser.parse(), Ok(true));
    let ir = ir::lower(&self.parser.ast).unwrap();
    self.generator.compile(&ir).unwrap();
    ir
  }
}

#[test]
fn assignment_program() {
  let kinds: Vec<_> = tokenize("x = 5;").iter().map(|t| t.kind).collect();
  assert_eq!(
    kinds,
    vec![
      TokenKind::Identifier,
      TokenKind::Assign,
      TokenKind::Number,
      TokenKind::Semicolon,
    ]
  );

  let asm = compile_source("x = 5;").unwrap();
  assert_eq!(
    normalize(&asm),
    vec![
      "; Generated by the uroboros compiler",
      "global main",
      "section .text",
      "main:",
      "mov rbp, rsp",
      "push 5",
      "push 0",
      "call exit",
      "exit:",
      "mov rax, 60",
      "mov rdi, [rsp+8]",
      "syscall",
      "section .data",
    ]
  );
}

#[test]
fn extern_declared_once_per_session() {
  let mut session = Session::new();
  let ir = session.feed("extern(\"puts\", 1);");
  assert_eq!(
    ir,
    vec![Instruction::Extern {
      name: "puts".into(),
      params: 1,
    }]
  );
  session.feed("extern(\"puts\", 1);");

  let asm = normalize(&session.generator.render());
  assert_eq!(asm.iter().filter(|line| *line == "extern puts").count(), 1);
  assert_eq!(asm.iter().filter(|line| *line == "f_000001:").count(), 1);
  assert!(asm.contains(&"mov rdi, [rbp+24]".to_string()));
  assert!(!asm.iter().any(|line| line == "f_000002:"));
}

#[test]
fn function_call_compiles_arguments_first() {
  let mut session = Session::new();
  let ir = session.feed("f = fn(x){ return x; }; f(5);");
  assert_eq!(
    ir[2],
    Instruction::CallFunction {
      name: "f".into(),
      args: vec![Instruction::MakeNumber(5)],
    }
  );

  let main: Vec<_> = session.generator.output().functions["main"]
    .iter()
    .map(|line| format!("{} {}", line.mnemonic, line.operands))
    .collect();
  assert_eq!(
    main,
    vec![
      "mov rbp, rsp",
      "mov rax, f_000001",
      "push rax",
      "push 5",
      "call [rbp-8]",
      "add rsp, 8",
      "push rax",
    ]
  );
}

#[test]
fn unclosed_block_is_incomplete() {
  assert!(matches!(
    compile_source("fn(x){ return x;"),
    Err(CompileError::Parse {
      source: ParseError::UnexpectedEof
    })
  ));
}

#[test]
fn plus_is_a_syntax_error() {
  match compile_source("1 +") {
    Err(CompileError::Parse {
      source: ParseError::Syntax { token, line },
    }) => {
      assert_eq!(token.kind, TokenKind::Plus);
      assert_eq!(line, 1);
    }
    other => panic!("expected a syntax error, got {other:?}"),
  }
}

#[test]
fn indexed_assignment_is_not_lowered() {
  assert!(matches!(
    compile_source("x = 1; x[0] = 5;"),
    Err(CompileError::Lower { .. })
  ));
}

#[test]
fn oversized_extern_is_rejected() {
  assert!(matches!(
    compile_source("extern('five', 5);"),
    Err(CompileError::Generate { .. })
  ));
  assert!(compile_source("extern('four', 4);").is_ok());
}

#[test]
fn output_only_grows_across_compiles() {
  let mut session = Session::new();
  let snippets = [
    "s = 'hello';",
    "puts = extern('puts', 1);",
    "puts(s);",
    "g = fn(a, b) { return b; };",
    "t = 'again'; g(s, t);",
  ];

  let mut previous_functions: Vec<String> = Vec::new();
  let mut previous_data: Vec<String> = Vec::new();
  for snippet in snippets {
    session.feed(snippet);
    let output = session.generator.output();
    let functions: Vec<String> = output.functions.keys().cloned().collect();
    let data: Vec<String> = output.data.keys().cloned().collect();
    assert!(functions.starts_with(&previous_functions));
    assert!(data.starts_with(&previous_data));
    previous_functions = functions;
    previous_data = data;
  }

  assert_eq!(previous_data, vec!["s_000001", "s_000002"]);
}

#[test]
fn render_twice_gives_same_text() {
  let mut session = Session::new();
  session.feed("x = 'a';");
  let first = session.generator.render();
  let second = session.generator.render();
  assert_eq!(first, second);
  assert_eq!(normalize(&first).iter().filter(|l| *l == "call exit").count(), 1);
}

#[test]
fn function_calls_an_outer_extern() {
  let asm = compile_source("puts = extern('puts', 1); f = fn(x) { puts(x); }; f('a');").unwrap();
  let asm = normalize(&asm);
  let start = asm.iter().position(|line| line == "f_000002:").unwrap();
  assert_eq!(
    asm[start + 1..start + 9],
    [
      "push rbp",
      "mov rbp, rsp",
      "mov rax, [rbp+16]",
      "push rax",
      "mov rax, [rbp-8]",
      "push rax",
      "mov rax, [rbp]",
      "call [rax-8]",
    ]
  );
}

#[test]
fn top_level_return_is_rejected() {
  assert!(matches!(
    compile_source("return 1;"),
    Err(CompileError::Generate {
      source: GenerateError::ReturnOutsideFunction
    })
  ));
  assert!(compile_source("f = fn() { return 1; };").is_ok());
}
