//! Core library for the Easel scripting language: lexing, parsing,
//! lowering to evaluator/invoker closures, and the execution machinery
//! (packages, imports, REPL).

pub mod ast;
pub mod codegen;
pub mod diagnostics;
pub mod environment;
pub mod lexer;
pub mod machine;
pub mod number;
pub mod package;
pub mod parser;
pub mod repl;
pub mod source;
pub mod stdlib;
pub mod value;

pub use diagnostics::{Diagnostic, DiagnosticKind, EaselError, SourceSpan};
pub use machine::{CompiledProgram, Machine};
pub use package::{Package, Registry};
pub use repl::Repl;
pub use source::{DirSource, MemorySource, SourceProvider};
pub use value::Value;
