//! Execute queries against JSON input

use crate::{Evaluator, ExecuteOptions, Parser, ParserOptions, Value};

use super::{CliError, json_to_value, parse_parameter};

/// Options for the check command
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// The query to execute
    pub query: String,
    /// JSON input string
    pub input: Option<String>,
    /// Values for `$1`, `$2`, ... (JSON, or plain text)
    pub params: Vec<String>,
    /// Only validate syntax, don't execute
    pub syntax_only: bool,
    /// Attribute whose `eq` value is the primary-key hint
    pub primary_key: Option<String>,
}

/// Result of a check operation
#[derive(Debug)]
pub enum CheckResult {
    /// Syntax validation passed; carries the canonical form of the query
    SyntaxValid(String),
    /// Query executed successfully
    Success(Value),
}

/// Execute an rql check operation
pub fn execute_check(options: &CheckOptions) -> Result<CheckResult, CliError> {
    let mut parser_options = ParserOptions::default().allow_leading_question_mark(true);
    if let Some(primary_key) = &options.primary_key {
        parser_options = parser_options.primary_key(primary_key.as_str());
    }
    let evaluator = Evaluator::with_parser(Parser::with_options(parser_options));

    let parameters: Vec<Value> = options.params.iter().map(|p| parse_parameter(p)).collect();
    let query = evaluator.parser().parse(options.query.as_str(), &parameters)?;

    if options.syntax_only {
        return Ok(CheckResult::SyntaxValid(query.to_string()));
    }

    let input = options.input.as_deref().ok_or(CliError::NoInput)?;
    let target = json_to_value(input)?;

    let result = evaluator.execute(query, &ExecuteOptions::new().parameters(parameters), &target)?;
    Ok(CheckResult::Success(result))
}
