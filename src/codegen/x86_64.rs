//! x86-64 backend for Linux, emitting NASM-flavoured Intel syntax.
//!
//! The entry point is `main`; it starts by pointing `rbp` at the initial
//! stack and finishes by calling the built-in `exit` function, which issues
//! the exit syscall with the status found above its return address.
//! Extern symbols are reached through thunks that move stack arguments into
//! the System V argument registers.

use log::debug;

use super::{Backend, Context, LabelCounter, Line, Output, Slot, WORD};
use crate::error::{GenerateError, GenerateResult};
use crate::ir::Instruction;

const ENTRY: &str = "main";
const EXIT: &str = "exit";
const HEADER: &str = "; Generated by the uroboros compiler\n";

/// Argument registers available to extern thunks, in parameter order.
const ARGUMENT_REGISTERS: [&str; 4] = ["rdi", "rsi", "rdx", "rcx"];

/// Saved frame pointer plus return address between `rbp` and the arguments.
const FRAME_LINKAGE: i64 = 16;

#[derive(Debug)]
pub struct X86_64Linux {
  output: Output,
  labels: LabelCounter,
  context: Context,
}

impl X86_64Linux {
  pub fn new() -> Self {
    let mut output = Output::default();
    output.emit(ENTRY, Line::new("mov", "rbp, rsp"));
    output.functions.insert(
      EXIT.to_string(),
      vec![
        Line::new("mov", "rax, 60"),
        Line::new("mov", "rdi, [rsp+8]"),
        Line::new("syscall", ""),
      ],
    );

    Self {
      output,
      labels: LabelCounter::default(),
      context: Context::new(ENTRY),
    }
  }

  fn emit(&mut self, mnemonic: &str, operands: impl Into<String>) {
    self
      .output
      .emit(self.context.name(), Line::new(mnemonic, operands));
  }

  fn emit_labeled(&mut self, label: &str, mnemonic: &str, operands: impl Into<String>) {
    self.output.emit(
      self.context.name(),
      Line::labeled(format!("{label}:"), mnemonic, operands),
    );
  }

  /// Push the address of `label` so it can be called like any other value.
  fn push_label(&mut self, label: &str) {
    self.emit("mov", format!("rax, {label}"));
    self.emit("push", "rax");
    self.context.move_stack_pointer();
  }

  /// Call the function bound to `name` with `arg_count` arguments already
  /// on the stack, then replace them with the return value.
  fn emit_call(&mut self, name: &str, arg_count: usize) -> GenerateResult<()> {
    let slot = self.context.get_position(name)?;
    let operand = self.frame_operand(slot);
    self.emit("call", operand);
    self.emit("add", format!("rsp, {}", WORD * arg_count as i64));
    self.context.release(arg_count);
    self.emit("push", "rax");
    self.context.move_stack_pointer();
    Ok(())
  }

  /// Memory operand for `slot`. Slots in outer frames are addressed through
  /// `rax`, loaded by walking the saved `rbp` chain.
  fn frame_operand(&mut self, slot: Slot) -> String {
    if slot.depth == 0 {
      return frame_slot("rbp", slot.offset);
    }
    self.emit("mov", "rax, [rbp]");
    for _ in 1..slot.depth {
      self.emit("mov", "rax, [rax]");
    }
    frame_slot("rax", slot.offset)
  }

  fn emit_frame_teardown(&mut self) {
    self.emit("mov", "rsp, rbp");
    self.emit("pop", "rbp");
    self.emit("ret", "");
  }

  fn thunk_body(name: &str, params: usize) -> Vec<Line> {
    let registers = &ARGUMENT_REGISTERS[..params];
    let mut body = vec![Line::new("push", "rbp")];
    body.extend(registers.iter().map(|register| Line::new("push", *register)));
    body.push(Line::new("mov", "rbp, rsp"));

    // The saved registers sit between rbp and the frame linkage.
    let first_argument = FRAME_LINKAGE + WORD * params as i64;
    body.extend(registers.iter().enumerate().map(|(index, register)| {
      let offset = first_argument + WORD * index as i64;
      Line::new("mov", format!("{register}, [rbp+{offset}]"))
    }));

    body.push(Line::new("call", name));
    body.push(Line::new("mov", "rsp, rbp"));
    body.extend(registers.iter().rev().map(|register| Line::new("pop", *register)));
    body.push(Line::new("pop", "rbp"));
    body.push(Line::new("ret", ""));
    body
  }
}

impl Default for X86_64Linux {
  fn default() -> Self {
    Self::new()
  }
}

impl Backend for X86_64Linux {
  fn make_number(&mut self, value: i64) -> GenerateResult<()> {
    self.emit("push", value.to_string());
    self.context.move_stack_pointer();
    Ok(())
  }

  fn make_boolean(&mut self, value: bool) -> GenerateResult<()> {
    self.make_number(i64::from(value))
  }

  /// Copy the literal into a fresh `malloc` buffer, leaving the buffer's
  /// address on top of the stack.
  fn make_string(&mut self, value: &str) -> GenerateResult<()> {
    let length = value.len() + 1;

    self.extern_function("malloc", 1)?;
    self.set_name("malloc")?;
    self.make_number(length as i64)?;
    self.emit_call("malloc", 1)?;

    let string_label = self.labels.next("s");
    let start_label = self.labels.next("l");
    let end_label = self.labels.next("e");

    self
      .output
      .data
      .insert(string_label.clone(), Line::new("db", string_directive(value)));

    self.emit("mov", format!("rdi, {string_label}"));
    self.emit("mov", format!("rcx, {length}"));
    self.emit("xor", "rbx, rbx");
    self.emit_labeled(&start_label, "mov", "bl, byte [rdi]");
    self.emit("mov", "byte [rax], bl");
    self.emit("inc", "rax");
    self.emit("inc", "rdi");
    self.emit("dec", "rcx");
    self.emit("cmp", "rcx, byte 0");
    self.emit("je", end_label.as_str());
    self.emit("jmp", start_label.as_str());
    self.emit_labeled(&end_label, "", "");
    Ok(())
  }

  fn make_function(&mut self, params: &[String], body: &[Instruction]) -> GenerateResult<()> {
    let label = self.labels.next("f");
    self.push_label(&label);

    self.context.enter(label.as_str());
    self.output.functions.insert(label.clone(), Vec::new());
    self.emit("push", "rbp");
    self.emit("mov", "rbp, rsp");

    // Copy every argument into the callee's own frame so it can be named
    // like any other local.
    for (index, param) in params.iter().enumerate() {
      let offset = FRAME_LINKAGE + WORD * index as i64;
      self.emit("mov", format!("rax, [rbp+{offset}]"));
      self.emit("push", "rax");
      self.context.move_stack_pointer();
      self.context.add_variable(param.as_str());
    }

    let compiled = self.compile(body);
    self.emit("mov", "rax, 0");
    self.emit_frame_teardown();
    self.context.leave();
    debug!("compiled function {label}");
    compiled
  }

  fn extern_function(&mut self, name: &str, params: usize) -> GenerateResult<()> {
    if let Some(label) = self.output.externs.get(name).cloned() {
      self.push_label(&label);
      return Ok(());
    }

    if params > ARGUMENT_REGISTERS.len() {
      return Err(GenerateError::TooManyParameters {
        name: name.to_string(),
        count: params,
        max: ARGUMENT_REGISTERS.len(),
      });
    }

    let label = self.labels.next("f");
    self.output.externs.insert(name.to_string(), label.clone());
    self.push_label(&label);
    self
      .output
      .functions
      .insert(label.clone(), Self::thunk_body(name, params));
    debug!("declared extern {name} as {label}");
    Ok(())
  }

  fn set_name(&mut self, name: &str) -> GenerateResult<()> {
    self.context.add_variable(name);
    Ok(())
  }

  /// Arguments are compiled last to first so the first one ends up nearest
  /// the top of the stack. Their side effects therefore run right to left.
  fn call_function(&mut self, name: &str, args: &[Instruction]) -> GenerateResult<()> {
    for arg in args.iter().rev() {
      self.compile(std::slice::from_ref(arg))?;
    }
    self.emit_call(name, args.len())
  }

  fn push_reference(&mut self, name: &str) -> GenerateResult<()> {
    let slot = self.context.get_position(name)?;
    let operand = self.frame_operand(slot);
    self.emit("mov", format!("rax, {operand}"));
    self.emit("push", "rax");
    self.context.move_stack_pointer();
    Ok(())
  }

  fn return_from_function(&mut self, has_value: bool) -> GenerateResult<()> {
    if self.context.is_outermost() {
      return Err(GenerateError::ReturnOutsideFunction);
    }
    if has_value {
      self.emit("pop", "rax");
      self.context.release(1);
    } else {
      self.emit("mov", "rax, 0");
    }
    self.emit_frame_teardown();
    Ok(())
  }

  fn output(&self) -> &Output {
    &self.output
  }

  fn render(&self) -> String {
    let mut asm = String::from(HEADER);
    asm.push_str(&Line::new("global", ENTRY).to_string());

    for name in self.output.externs.keys() {
      asm.push_str(&Line::new("extern", name.as_str()).to_string());
    }

    asm.push_str(&Line::new("section", ".text").to_string());
    for (name, lines) in &self.output.functions {
      asm.push_str(&Line::labeled(format!("{name}:"), "", "").to_string());
      for line in lines {
        asm.push_str(&line.to_string());
      }
      if name == ENTRY {
        asm.push_str(&Line::new("push", "0").to_string());
        asm.push_str(&Line::new("call", EXIT).to_string());
      }
    }

    asm.push_str(&Line::new("section", ".data").to_string());
    for (label, directive) in &self.output.data {
      asm.push_str(&Line::labeled(format!("{label}: "), "", "").to_string());
      asm.push_str(&directive.to_string());
    }

    asm
  }
}

/// Memory operand for a slot at `position` below the frame base in `base`.
fn frame_slot(base: &str, position: i64) -> String {
  format!("[{base}-{}]", -position)
}

/// `db` operands for a null-terminated string. NASM strings have no escapes,
/// so literals containing a double quote are written out byte by byte.
fn string_directive(value: &str) -> String {
  if value.contains('"') {
    let bytes: Vec<String> = value.bytes().map(|byte| byte.to_string()).collect();
    format!("{}, 0", bytes.join(", "))
  } else {
    format!("\"{value}\", 0")
  }
}
