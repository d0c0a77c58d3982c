//! Interactive shell: feeds lines into one long-lived parser and generator
//! and prints the assembly of everything compiled so far.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use log::{debug, error, warn};

use crate::codegen::Generator;
use crate::ir;
use crate::lexer::tokenize;
use crate::parser::Parser;

const BANNER: &str = "U r o b o r o s\nToy programming language with self-hosting as its goal.\n";

#[derive(Debug, Clone)]
pub struct ShellConfig {
  pub prompt: String,
  pub continuation_prompt: String,
  /// Where entered lines are kept between sessions; `None` disables history.
  pub history_file: Option<PathBuf>,
  pub history_length: usize,
}

impl Default for ShellConfig {
  fn default() -> Self {
    Self {
      prompt: ">>>".to_string(),
      continuation_prompt: "...".to_string(),
      history_file: std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".uro_history")),
      history_length: 1000,
    }
  }
}

/// Result of feeding one line to the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
  /// The buffered statements compiled; holds the full assembly so far.
  Compiled(String),
  /// The statement is not finished yet.
  Incomplete,
  /// The input was discarded after an error.
  Rejected,
}

pub struct Shell {
  config: ShellConfig,
  parser: Parser,
  generator: Generator,
  history: Vec<String>,
}

impl Shell {
  pub fn new(config: ShellConfig) -> Self {
    let history = config
      .history_file
      .as_ref()
      .and_then(|path| fs::read_to_string(path).ok())
      .map(|text| text.lines().map(str::to_string).collect())
      .unwrap_or_default();

    Self {
      config,
      parser: Parser::new(),
      generator: Generator::default(),
      history,
    }
  }

  /// Read, compile, print until end of input.
  pub fn run(&mut self) -> io::Result<()> {
    println!("{BANNER}");
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut continuation = false;

    loop {
      let prompt = if continuation {
        &self.config.continuation_prompt
      } else {
        &self.config.prompt
      };
      print!("{prompt} ");
      stdout.flush()?;

      let mut line = String::new();
      if stdin.lock().read_line(&mut line)? == 0 {
        println!("Bye!");
        break;
      }
      let line = line.trim_end_matches(['\n', '\r']);
      if !line.trim().is_empty() {
        self.history.push(line.to_string());
      }

      let outcome = self.evaluate(line);
      continuation = outcome == Outcome::Incomplete;
      if let Outcome::Compiled(asm) = outcome {
        println!("{asm}");
      }
    }

    self.save_history();
    Ok(())
  }

  /// Feed one line of source to the shell.
  pub fn evaluate(&mut self, line: &str) -> Outcome {
    self.parser.add_tokens(tokenize(line));

    match self.parser.parse() {
      Ok(_) => {}
      Err(err) if err.is_unexpected_eof() => {
        debug!("statement incomplete, lines {:?}", self.parser.line_range());
        return Outcome::Incomplete;
      }
      Err(err) => {
        self.parser.reset();
        error!("{err}");
        return Outcome::Rejected;
      }
    }

    let compiled = ir::lower(&self.parser.ast)
      .map_err(|err| err.to_string())
      .and_then(|ir| self.generator.compile(&ir).map_err(|err| err.to_string()));

    match compiled {
      Ok(()) => Outcome::Compiled(self.generator.render()),
      Err(message) => {
        error!("{message}");
        Outcome::Rejected
      }
    }
  }

  fn save_history(&self) {
    let Some(path) = &self.config.history_file else {
      return;
    };
    let skip = self.history.len().saturating_sub(self.config.history_length);
    let mut text = self.history[skip..].join("\n");
    text.push('\n');
    if let Err(err) = fs::write(path, text) {
      warn!("could not write history to {}: {err}", path.display());
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn shell() -> Shell {
    Shell::new(ShellConfig {
      history_file: None,
      ..ShellConfig::default()
    })
  }

  #[test]
  fn multi_line_statement() {
    let mut shell = shell();
    assert_eq!(shell.evaluate("f = fn(x) {"), Outcome::Incomplete);
    assert_eq!(shell.evaluate("  return x;"), Outcome::Incomplete);
    let Outcome::Compiled(asm) = shell.evaluate("};") else {
      panic!("expected the function to compile");
    };
    assert!(asm.contains("f_000001:"));
  }

  #[test]
  fn syntax_error_keeps_earlier_program() {
    let mut shell = shell();
    let Outcome::Compiled(first) = shell.evaluate("x = 5;") else {
      panic!("expected x = 5 to compile");
    };
    assert_eq!(shell.evaluate("y = );"), Outcome::Rejected);

    let Outcome::Compiled(second) = shell.evaluate("y = x;") else {
      panic!("expected y = x to compile");
    };
    assert!(second.len() > first.len());
    assert!(second.contains("rax, [rbp-8]"));
  }

  #[test]
  fn generation_error_is_rejected() {
    let mut shell = shell();
    assert_eq!(shell.evaluate("missing(1);"), Outcome::Rejected);
    assert!(matches!(shell.evaluate("1;"), Outcome::Compiled(_)));
  }

  #[test]
  fn top_level_return_is_rejected() {
    let mut shell = shell();
    assert_eq!(shell.evaluate("return 1;"), Outcome::Rejected);
    assert!(matches!(shell.evaluate("x = 1;"), Outcome::Compiled(_)));
  }

  #[test]
  fn history_is_trimmed_on_save() {
    let path = std::env::temp_dir().join(format!("uro_history_test_{}", std::process::id()));
    let mut shell = Shell::new(ShellConfig {
      history_file: Some(path.clone()),
      history_length: 2,
      ..ShellConfig::default()
    });
    shell.history = vec!["a;".into(), "b;".into(), "c;".into()];
    shell.save_history();
    assert_eq!(fs::read_to_string(&path).unwrap(), "b;\nc;\n");

    let reloaded = Shell::new(ShellConfig {
      history_file: Some(path.clone()),
      ..ShellConfig::default()
    });
    assert_eq!(reloaded.history, vec!["b;", "c;"]);
    fs::remove_file(path).unwrap();
  }
}
