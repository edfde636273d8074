//! Query inspection commands: canonical formatting and normalization

use crate::{NormalizeOptions, Parser, ParserOptions};

use super::CliError;

/// Canonical text of a query.
///
/// ```
/// use rql::cli::format_query;
///
/// assert_eq!(format_query("?price>=10&sort(-price)").unwrap(), "ge(price,10)&sort(-price)");
/// ```
pub fn format_query(query: &str) -> Result<String, CliError> {
    let parser = Parser::with_options(ParserOptions::default().allow_leading_question_mark(true));
    Ok(parser.parse(query, &[])?.to_string())
}

/// Store-facing metadata of a query, as JSON.
pub fn normalize_query(query: &str, options: &NormalizeOptions) -> Result<serde_json::Value, CliError> {
    let parser = Parser::with_options(
        ParserOptions::default()
            .primary_key(options.primary_key.as_str())
            .allow_leading_question_mark(true),
    );
    let query = parser.parse(query, &[])?;
    Ok(query.normalize(options).to_json())
}
