use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use log::LevelFilter;

use uroboros::repl::{Shell, ShellConfig};

/// Compile Uroboros source to x86-64 assembly, or start the interactive shell
#[derive(Parser)]
#[command(name = "uro", version, about, long_about = None)]
struct Cli {
  /// Source file; the shell starts when omitted
  filename: Option<PathBuf>,

  /// Enable debug logs
  #[arg(long)]
  debug: bool,
}

fn init_logging(debug: bool) {
  let mut builder = env_logger::Builder::new();
  if debug {
    builder
      .filter_level(LevelFilter::Debug)
      .format(|buf, record| {
        writeln!(
          buf,
          "[{:>16}:{:<4}] {}",
          record.file().unwrap_or("?"),
          record.line().unwrap_or(0),
          record.args()
        )
      });
  } else {
    builder
      .filter_level(LevelFilter::Info)
      .format(|buf, record| writeln!(buf, "{}", record.args()));
  }
  builder.parse_default_env().init();
}

fn main() {
  let cli = Cli::parse();
  init_logging(cli.debug);

  let Some(filename) = cli.filename else {
    if let Err(err) = Shell::new(ShellConfig::default()).run() {
      eprintln!("{err}");
      process::exit(1);
    }
    return;
  };

  let source = match fs::read_to_string(&filename) {
    Ok(source) => source,
    Err(err) => {
      eprintln!("{}: {err}", filename.display());
      process::exit(1);
    }
  };

  match uroboros::compile_source(&source) {
    Ok(asm) => print!("{asm}"),
    Err(err) => {
      eprintln!("{err}");
      process::exit(1);
    }
  }
}
