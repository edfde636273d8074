//! Encoding of argument values back into query text.
//!
//! A value is written plainly when the `auto` converter reads the plain
//! text back as the same value. Otherwise it is tagged with the converter
//! that restores it: `string:30`, `epoch:1704067200000`, `re:%5Eab`.

use crate::{converter::Converter, output::to_json, value::Value};

/// Query text for one argument value.
///
/// # Examples
///
/// ```
/// use rql::{Value, encode::encode_value};
///
/// assert_eq!(encode_value(&Value::Integer(30)), "30");
/// assert_eq!(encode_value(&Value::from("30")), "string:30");
/// assert_eq!(encode_value(&Value::from("a b")), "a%20b");
/// ```
pub fn encode_value(value: &Value) -> String {
    if let Some(items) = value.as_array() {
        let items: Vec<String> = items.iter().map(encode_value).collect();
        return format!("({})", items.join(","));
    }

    let text = value.to_text();
    let round_trips = Converter::Auto
        .convert(&text)
        .is_ok_and(|read| read.same_as(value));
    if round_trips {
        return match value {
            Value::String(s) => encode_string(s),
            _ => text,
        };
    }

    match value {
        Value::Regex(pattern) => {
            let tag = if pattern.is_case_insensitive() { "re" } else { "RE" };
            format!("{}:{}", tag, encode_string(pattern.source()))
        }
        Value::Date(date) => format!("epoch:{}", date.timestamp_millis()),
        Value::String(s) => format!("string:{}", encode_string(s)),
        Value::Object(_) => format!("string:{}", encode_string(&to_json(value))),
        other => format!("{}:{}", other.type_name(), text),
    }
}

/// Percent-encodes text. Parentheses are always escaped since they are
/// part of the grammar.
pub fn encode_string(s: &str) -> String {
    urlencoding::encode(s)
        .replace('(', "%28")
        .replace(')', "%29")
}
