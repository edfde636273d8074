//! JSON text to query values

use crate::Value;

use super::CliError;

/// Parses JSON input text into a [`Value`].
pub fn json_to_value(text: &str) -> Result<Value, CliError> {
    let json: serde_json::Value = serde_json::from_str(text)?;
    Ok(Value::from(json))
}

/// Reads a `--param` value: JSON when it parses as JSON, plain text
/// otherwise.
///
/// ```
/// use rql::{Value, cli::parse_parameter};
///
/// assert_eq!(parse_parameter("42"), Value::Integer(42));
/// assert_eq!(parse_parameter("\"42\""), Value::from("42"));
/// assert_eq!(parse_parameter("Bob"), Value::from("Bob"));
/// ```
pub fn parse_parameter(text: &str) -> Value {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(json) => Value::from(json),
        Err(_) => Value::from(text),
    }
}
