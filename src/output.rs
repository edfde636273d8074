//! JSON output for query results.
//!
//! Results are printed the way a JSON consumer expects to read them:
//!
//! - record attributes keep their insertion order
//! - undefined attributes are left out, undefined array slots print `null`
//! - dates print as ISO 8601 strings, regular expressions as `{}`
//! - NaN and the infinities print as `null`
//! - a `limit()` page prints as its items
//!
//! # Examples
//!
//! ```
//! use rql::Value;
//! use rql::output::{to_json, to_json_pretty};
//! use serde_json::json;
//!
//! let value = Value::from(json!({ "name": "Alice", "tags": ["a", "b"] }));
//!
//! assert_eq!(to_json(&value), r#"{"name":"Alice","tags":["a","b"]}"#);
//! assert_eq!(to_json_pretty(&Value::Integer(42)), "42");
//! ```

use chrono::SecondsFormat;

use crate::value::{Record, Value, format_number};

pub struct JsonPrinter {
    pretty: bool,
}

impl JsonPrinter {
    pub fn new(pretty: bool) -> Self {
        JsonPrinter { pretty }
    }

    pub fn print(&self, value: &Value) -> String {
        self.print_value(value, 0)
    }

    fn print_value(&self, value: &Value, indent: usize) -> String {
        match value {
            Value::Undefined | Value::Null => "null".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Integer(n) => n.to_string(),
            Value::Float(n) if n.is_finite() => format_number(*n),
            Value::Float(_) => "null".to_string(),
            Value::String(s) => format!("\"{}\"", self.escape_string(s)),
            Value::Date(d) => format!("\"{}\"", d.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Value::Regex(_) => "{}".to_string(),
            Value::Array(_) | Value::Page(_) => {
                self.print_array(value.as_array().unwrap_or_default(), indent)
            }
            Value::Object(record) => self.print_object(record, indent),
        }
    }

    fn print_array(&self, arr: &[Value], indent: usize) -> String {
        if arr.is_empty() {
            return "[]".to_string();
        }

        let items: Vec<String> = arr.iter().map(|v| self.print_value(v, indent + 1)).collect();
        self.wrap('[', ']', items, indent)
    }

    fn print_object(&self, record: &Record, indent: usize) -> String {
        let separator = if self.pretty { ": " } else { ":" };
        let items: Vec<String> = record
            .iter()
            .filter(|(_, v)| !v.is_undefined())
            .map(|(k, v)| {
                format!(
                    "\"{}\"{}{}",
                    self.escape_string(k),
                    separator,
                    self.print_value(v, indent + 1)
                )
            })
            .collect();

        if items.is_empty() {
            return "{}".to_string();
        }
        self.wrap('{', '}', items, indent)
    }

    fn wrap(&self, open: char, close: char, items: Vec<String>, indent: usize) -> String {
        if !self.pretty {
            return format!("{}{}{}", open, items.join(","), close);
        }

        let inner = self.indent(indent + 1);
        let body: Vec<String> = items.into_iter().map(|item| format!("{}{}", inner, item)).collect();
        format!("{}\n{}\n{}{}", open, body.join(",\n"), self.indent(indent), close)
    }

    fn indent(&self, level: usize) -> String {
        "  ".repeat(level)
    }

    fn escape_string(&self, s: &str) -> String {
        s.chars()
            .flat_map(|c| match c {
                '"' => vec!['\\', '"'],
                '\\' => vec!['\\', '\\'],
                '\n' => vec!['\\', 'n'],
                '\r' => vec!['\\', 'r'],
                '\t' => vec!['\\', 't'],
                c if c.is_control() => format!("\\u{:04x}", c as u32).chars().collect(),
                c => vec![c],
            })
            .collect()
    }
}

/// Compact JSON.
pub fn to_json(value: &Value) -> String {
    JsonPrinter::new(false).print(value)
}

/// JSON with two-space indentation.
///
/// ```
/// use rql::Value;
/// use rql::output::to_json_pretty;
/// use serde_json::json;
///
/// let value = Value::from(json!({ "name": "Alice", "age": 30 }));
/// assert_eq!(to_json_pretty(&value), "{\n  \"name\": \"Alice\",\n  \"age\": 30\n}");
/// ```
pub fn to_json_pretty(value: &Value) -> String {
    JsonPrinter::new(true).print(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_undefined_attributes_are_omitted() {
        let record: Record = [("a", Value::Undefined), ("b", Value::Integer(1))]
            .into_iter()
            .collect();
        assert_eq!(to_json(&Value::object(record)), r#"{"b":1}"#);
    }

    #[test]
    fn test_non_finite_numbers_print_null() {
        let value = Value::array(vec![Value::Float(f64::NAN), Value::Undefined, Value::Float(0.5)]);
        assert_eq!(to_json(&value), "[null,null,0.5]");
    }

    #[test]
    fn test_nested_pretty() {
        let value = Value::from(json!({ "a": [1] }));
        assert_eq!(to_json_pretty(&value), "{\n  \"a\": [\n    1\n  ]\n}");
    }
}
