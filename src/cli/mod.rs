//! CLI support for symql
//!
//! Provides programmatic access to the `run` and `compile` commands so other
//! tools can embed them.

mod run;

pub use run::{CompileOptions, RunOptions, execute_compile, execute_run, read_context};

use std::io;

use thiserror::Error;

/// Errors that can occur during CLI operations
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Parse error: {0}")]
    Parse(#[from] crate::ParseError),

    #[error("Evaluation error: {0}")]
    Eval(#[from] crate::EvalError),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
