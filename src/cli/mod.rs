//! CLI support for rql
//!
//! Provides programmatic access to the `rql` commands so that other tools
//! can embed them.

mod check;
mod convert;
mod query;

pub use check::{CheckOptions, CheckResult, execute_check};
pub use convert::{json_to_value, parse_parameter};
pub use query::{format_query, normalize_query};

use std::io;

use thiserror::Error;

/// Errors that can occur during CLI operations
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Parse error: {0}")]
    Parse(#[from] crate::ParseError),

    #[error("Evaluation error: {0}")]
    Eval(#[from] crate::EvalError),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("No input provided. Use --input or pipe JSON to stdin.")]
    NoInput,
}
