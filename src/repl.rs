use rustyline::{error::ReadlineError, DefaultEditor};

use crate::{
    diagnostics::{EaselError, Result},
    machine::Machine,
    package::Registry,
    source::DirSource,
};

pub struct Repl {
    machine: Machine,
}

impl Repl {
    pub fn new() -> Self {
        Self {
            machine: Machine::new(Registry::new(), DirSource::new(".")),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        let mut editor = DefaultEditor::new()
            .map_err(|err| EaselError::from(std::io::Error::other(err)))?;
        loop {
            match editor.readline(">> ") {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed == ":quit" || trimmed == ":exit" {
                        break;
                    }
                    if trimmed.is_empty() {
                        continue;
                    }
                    editor.add_history_entry(trimmed).ok();
                    match self.machine.eval_source(trimmed) {
                        Ok(()) => {}
                        Err(EaselError::Diagnostic(diag)) => {
                            eprintln!("{:?}: {}", diag.kind, diag.message);
                        }
                        Err(other) => eprintln!("error: {other}"),
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => {
                    return Err(EaselError::from(std::io::Error::other(err)));
                }
            }
        }
        Ok(())
    }
}

impl Default for Repl {
    fn default() -> Self {
        Self::new()
    }
}
