use std::{fs, path::PathBuf};

use clap::{Parser, Subcommand};

use easel::{DirSource, EaselError, Machine, Registry, Repl};

#[derive(Parser)]
#[command(author, version, about = "Easel language interpreter")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run an Easel script file
    Run { script: PathBuf },
    /// Start an interactive REPL session
    Repl,
    /// Evaluate a snippet of Easel code
    Eval { source: String },
}

fn main() -> Result<(), EaselError> {
    let args = Args::parse();
    match args.command.unwrap_or(Command::Repl) {
        Command::Run { script } => run_script(script),
        Command::Repl => {
            let mut repl = Repl::new();
            repl.run()
        }
        Command::Eval { source } => {
            let mut machine = Machine::new(Registry::new(), DirSource::new("."));
            machine.eval_source(&source)
        }
    }
}

fn run_script(path: PathBuf) -> Result<(), EaselError> {
    let source = fs::read_to_string(&path)?;
    // Imports resolve relative to the script's directory.
    let root = path.parent().filter(|p| !p.as_os_str().is_empty());
    let provider = match root {
        Some(dir) => DirSource::new(dir),
        None => DirSource::new("."),
    };
    let mut machine = Machine::new(Registry::new(), provider);
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    machine.compile_source(&filename, &source)?.run()
}
