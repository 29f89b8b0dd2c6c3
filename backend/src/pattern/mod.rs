//! Pattern language: compile a template once, render it per row.
//!
//! This module provides:
//! - `ast`: Compiled program tree (`Literal | Variable | Call`)
//! - `compiler`: Pattern string to program, with diagnostics
//! - `functions`: The fixed function table
//! - `evaluator`: Bind a program to the table and render rows
//!
//! ## Usage Flow
//!
//! ```text
//! pattern → compiler::compile → PatternProgram → PreparedProgram → one line per row
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use rowcast::pattern::{compile, evaluate};
//!
//! let program = compile("$(name) is @upper($(1))");
//! let headers = vec!["name".to_string(), "mood".to_string()];
//! let row = vec!["Ada".to_string(), "calm".to_string()];
//! assert_eq!(evaluate(&program, &headers, &row), "Ada is CALM");
//! ```

pub mod ast;
pub mod compiler;
pub mod evaluator;
pub mod functions;

pub use ast::{PatternProgram, Segment};
pub use compiler::{compile, compile_strict, diagnose};
pub use evaluator::{
    evaluate, render, render_report, EvaluationContext, PreparedProgram, RenderReport, ERR,
};
pub use functions::{functions, functions_description, lookup, Arity, Function};
