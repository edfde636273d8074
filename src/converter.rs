//! Value converters: the functions that turn a raw query token into a typed
//! [`Value`].
//!
//! A token picks its converter with a `name:` prefix (`number:42`,
//! `date:2024-01-01`, `re:^ab`). Untagged tokens go through [`Converter::Auto`],
//! which recognises keywords and numbers and falls back to a decoded string.
//!
//! # Examples
//!
//! ```
//! use rql::{Converter, Value};
//!
//! assert_eq!(Converter::Auto.convert("30").unwrap(), Value::Integer(30));
//! assert_eq!(Converter::Auto.convert("030").unwrap(), Value::from("030"));
//! assert_eq!(Converter::String.convert("30").unwrap(), Value::from("30"));
//! ```

use std::borrow::Cow;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::value::{MAX_SAFE_INTEGER, Pattern, Value, format_number, parse_number};

/// Strict UTC timestamp: `YYYY-MM-DDTHH:MM:SS[.fff]Z`
static ISO_INSTANT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9]{4})-([0-9]{2})-([0-9]{2})T([0-9]{2}):([0-9]{2}):([0-9]{2})(\.[0-9]*)?Z$")
        .expect("valid ISO instant pattern")
});

/// Template that partial `isodate:` values are completed from.
const ISO_TEMPLATE: &str = "0000-01-01T00:00:00Z";

/// Dates beyond +/- 100,000,000 days of the epoch are not representable.
const MAX_EPOCH_MILLIS: f64 = 8.64e15;

/// Errors raised while converting a token into a value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    #[error("Unknown converter {0}")]
    UnknownConverter(String),

    #[error("Invalid number {0}")]
    InvalidNumber(String),

    #[error("Invalid date {0}")]
    InvalidDate(String),

    #[error("Invalid regular expression {pattern}: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Malformed percent-encoding in {0}")]
    InvalidEncoding(String),

    #[error("Invalid quoted string {0}")]
    InvalidQuotedString(String),
}

/// The fixed set of converters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Converter {
    /// Keywords, round-tripping numbers, quoted strings, plain strings
    Auto,
    /// Strict number
    Number,
    /// Milliseconds since the epoch
    Epoch,
    /// Partial ISO date, completed to a full instant
    IsoDate,
    /// ISO instant, or any other recognised date format
    Date,
    /// `true`, anything else is false
    Boolean,
    /// Decoded text, never reinterpreted
    String,
    /// Case-insensitive regular expression (`re:`)
    Re,
    /// Case-sensitive regular expression (`RE:`)
    CaseSensitiveRe,
    /// Shell glob (`*`, `?`) as an anchored case-insensitive regex
    Glob,
}

impl Converter {
    pub const ALL: [Converter; 10] = [
        Converter::Auto,
        Converter::Number,
        Converter::Epoch,
        Converter::IsoDate,
        Converter::Date,
        Converter::Boolean,
        Converter::String,
        Converter::Re,
        Converter::CaseSensitiveRe,
        Converter::Glob,
    ];

    /// Looks a converter up by its prefix name. `default` is an alias of `auto`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "default" => Some(Converter::Auto),
            _ => Self::ALL.into_iter().find(|c| c.name() == name),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Converter::Auto => "auto",
            Converter::Number => "number",
            Converter::Epoch => "epoch",
            Converter::IsoDate => "isodate",
            Converter::Date => "date",
            Converter::Boolean => "boolean",
            Converter::String => "string",
            Converter::Re => "re",
            Converter::CaseSensitiveRe => "RE",
            Converter::Glob => "glob",
        }
    }

    pub fn convert(self, raw: &str) -> Result<Value, ConversionError> {
        match self {
            Converter::Auto => auto(raw),
            Converter::Number => {
                // Integers past 2^53 keep their exact digits.
                if let Ok(n) = raw.trim().parse::<i64>()
                    && n.unsigned_abs() as f64 > MAX_SAFE_INTEGER
                {
                    return Ok(Value::Integer(n));
                }
                let n = parse_number(raw);
                if n.is_nan() {
                    return Err(ConversionError::InvalidNumber(raw.to_string()));
                }
                Ok(Value::from_number(n))
            }
            Converter::Epoch => epoch(&decode(raw)?),
            Converter::IsoDate => {
                let text = decode(raw)?;
                let mut date = "0".repeat(4usize.saturating_sub(text.len()));
                date.push_str(&text);
                if date.len() < ISO_TEMPLATE.len() {
                    date.push_str(&ISO_TEMPLATE[date.len()..]);
                }
                date_value(&date)
            }
            Converter::Date => date_value(&decode(raw)?),
            Converter::Boolean => Ok(Value::Boolean(raw == "true")),
            Converter::String => Ok(Value::String(decode(raw)?.into_owned())),
            Converter::Re => pattern(&decode(raw)?, true),
            Converter::CaseSensitiveRe => pattern(&decode(raw)?, false),
            Converter::Glob => pattern(&glob_to_regex(&decode(raw)?), true),
        }
    }
}

/// Percent-decodes a token. `+` is left alone.
pub fn decode(raw: &str) -> Result<Cow<'_, str>, ConversionError> {
    urlencoding::decode(raw).map_err(|_| ConversionError::InvalidEncoding(raw.to_string()))
}

fn auto(raw: &str) -> Result<Value, ConversionError> {
    match raw {
        "true" => return Ok(Value::Boolean(true)),
        "false" => return Ok(Value::Boolean(false)),
        "null" => return Ok(Value::Null),
        "undefined" => return Ok(Value::Undefined),
        "Infinity" => return Ok(Value::Float(f64::INFINITY)),
        "-Infinity" => return Ok(Value::Float(f64::NEG_INFINITY)),
        _ => {}
    }

    // Only numbers that print back exactly as written; `030` or `1.0` stay text.
    let n = parse_number(raw);
    if !n.is_nan() && format_number(n) == raw {
        return Ok(Value::from_number(n));
    }

    let text = decode(raw)?;
    if text.starts_with('\'') && text.ends_with('\'') {
        let inner = if text.len() >= 2 { &text[1..text.len() - 1] } else { "" };
        return serde_json::from_str::<String>(&format!("\"{}\"", inner))
            .map(Value::String)
            .map_err(|_| ConversionError::InvalidQuotedString(text.to_string()));
    }
    Ok(Value::String(text.into_owned()))
}

fn epoch(text: &str) -> Result<Value, ConversionError> {
    let millis = parse_number(text);
    if millis.is_nan() || millis.abs() > MAX_EPOCH_MILLIS {
        return Err(ConversionError::InvalidDate(text.to_string()));
    }
    DateTime::from_timestamp_millis(millis.trunc() as i64)
        .map(Value::Date)
        .ok_or_else(|| ConversionError::InvalidDate(text.to_string()))
}

fn date_value(text: &str) -> Result<Value, ConversionError> {
    let invalid = || ConversionError::InvalidDate(text.to_string());

    if let Some(caps) = ISO_INSTANT.captures(text) {
        let field = |i: usize| caps[i].parse::<u32>().map_err(|_| invalid());
        let year = caps[1].parse::<i32>().map_err(|_| invalid())?;
        let (month, day) = (field(2)?, field(3)?);
        let (hour, minute, second) = (field(4)?, field(5)?, field(6)?);
        let millis = match caps.get(7) {
            Some(m) => {
                let digits: String = m.as_str()[1..].chars().chain("000".chars()).take(3).collect();
                digits.parse::<u32>().map_err(|_| invalid())?
            }
            None => 0,
        };
        let instant = NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_milli_opt(hour, minute, second, millis))
            .ok_or_else(invalid)?;
        return Ok(Value::Date(Utc.from_utc_datetime(&instant)));
    }

    fallback_date(text).map(Value::Date).ok_or_else(invalid)
}

fn fallback_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(d) = DateTime::parse_from_rfc3339(text) {
        return Some(d.with_timezone(&Utc));
    }
    if let Ok(d) = DateTime::parse_from_rfc2822(text) {
        return Some(d.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(d) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Utc.from_utc_datetime(&d));
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| Utc.from_utc_datetime(&d))
}

fn pattern(source: &str, case_insensitive: bool) -> Result<Value, ConversionError> {
    Pattern::new(source, case_insensitive)
        .map(Value::Regex)
        .map_err(|e| ConversionError::InvalidPattern {
            pattern: source.to_string(),
            message: e.to_string(),
        })
}

/// `a*b?` becomes `^a.*b.?$`. A leading or trailing `*` drops the anchor on
/// that end instead of emitting `.*`.
pub fn glob_to_regex(glob: &str) -> String {
    let mut s = String::new();
    for ch in glob.chars() {
        match ch {
            '*' => s.push_str(".*"),
            '?' => s.push_str(".?"),
            c => s.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    s = match s.strip_prefix(".*") {
        Some(rest) => rest.to_string(),
        None => format!("^{}", s),
    };
    match s.strip_suffix(".*") {
        Some(rest) => rest.to_string(),
        None => format!("{}$", s),
    }
}

#[test]
fn test_glob_anchors() {
    assert_eq!(glob_to_regex("ab*"), "^ab");
    assert_eq!(glob_to_regex("*ab"), "ab$");
    assert_eq!(glob_to_regex("a?b"), "^a.?b$");
    assert_eq!(glob_to_regex("a.b"), r"^a\.b$");
}
