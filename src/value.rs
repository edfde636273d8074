use std::{cmp::Ordering, fmt, rc::Rc};

use chrono::{DateTime, SecondsFormat, Utc};
use regex::{Regex, RegexBuilder};
use rust_decimal::{Decimal, prelude::FromPrimitive, prelude::ToPrimitive};

/// Largest integer a double represents exactly. Integral numbers above it
/// stay floats.
pub(crate) const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// A value flowing through the query language: query literals, parameters,
/// the records being queried and the results of a query.
///
/// Integers and floats are kept apart. Numbers produced from query text or
/// arithmetic collapse to [`Value::Integer`] whenever they are integral.
///
/// Arrays and records are reference counted. Cloning a value shares the
/// underlying record, and the pointer doubles as the record's *identity*:
/// `or()` unions and `distinct()` compare records by identity, never by
/// content.
///
/// # Examples
///
/// ```
/// use rql::Value;
/// use serde_json::json;
///
/// let records = Value::from(json!([{ "name": "Alice", "age": 30 }]));
/// assert_eq!(records.as_array().map(|a| a.len()), Some(1));
///
/// let age = Value::Integer(30);
/// assert!(age.same_as(&Value::Float(30.0)));
/// ```
#[derive(Debug, Clone)]
pub enum Value {
    /// Absent value: a missing attribute or an unbound `$N` parameter
    Undefined,

    /// JSON null
    Null,

    /// true/false
    Boolean(bool),

    /// Integer number (preserved separately from floats)
    Integer(i64),

    /// Floating-point number, including the infinities and NaN
    Float(f64),

    /// UTF-8 string (already percent-decoded)
    String(String),

    /// UTC instant
    Date(DateTime<Utc>),

    /// Compiled regular expression
    Regex(Pattern),

    /// Ordered list of values
    Array(Rc<Vec<Value>>),

    /// Record with named attributes
    Object(Rc<Record>),

    /// Array slice produced by `limit()` with paging metadata attached
    Page(Page),
}

/// A regular expression that remembers its source text and case flag.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    case_insensitive: bool,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: &str, case_insensitive: bool) -> Result<Self, regex::Error> {
        let regex = RegexBuilder::new(source)
            .case_insensitive(case_insensitive)
            .build()?;
        Ok(Pattern {
            source: source.to_string(),
            case_insensitive,
            regex,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.case_insensitive == other.case_insensitive
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags = if self.case_insensitive { "i" } else { "" };
        write!(f, "/{}/{}", self.source, flags)
    }
}

/// Attributes of a record, kept in insertion order.
///
/// Equality ignores attribute order.
#[derive(Debug, Clone, Default)]
pub struct Record {
    entries: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Sets an attribute, keeping its original position when it already exists.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(k, v)| other.get(k).is_some_and(|o| o == v))
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

/// Result of `limit(count, start, maxCount)`: the sliced items plus paging
/// metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Rc<Vec<Value>>,
    /// Offset of the first item in the unsliced input
    pub start: usize,
    /// Offset of the last item (`start - 1` for an empty page)
    pub end: i64,
    /// `min(input length, maxCount)`
    pub total_count: usize,
}

impl Value {
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(items))
    }

    pub fn object(record: Record) -> Self {
        Value::Object(Rc::new(record))
    }

    /// Builds a number, preferring [`Value::Integer`] for integral values.
    pub fn from_number(n: f64) -> Self {
        let negative_zero = n == 0.0 && n.is_sign_negative();
        if n.is_finite() && n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER && !negative_zero {
            Value::Integer(n as i64)
        } else {
            Value::Float(n)
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    /// Items of an array or page.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items.as_slice()),
            Value::Page(page) => Some(page.items.as_slice()),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Object(record) => Some(record.as_ref()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Paging metadata, present only on `limit()` results with a `maxCount`.
    pub fn page(&self) -> Option<&Page> {
        match self {
            Value::Page(page) => Some(page),
            _ => None,
        }
    }

    /// Get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) | Value::Float(_) => "number",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::Regex(_) => "regex",
            Value::Array(_) | Value::Page(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// Check if the value is truthy (for conditions)
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Integer(n) => *n != 0,
            Value::Float(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Pointer identity of arrays, records and pages. Scalars have none.
    pub fn identity(&self) -> Option<usize> {
        match self {
            Value::Array(items) => Some(Rc::as_ptr(items) as *const () as usize),
            Value::Object(record) => Some(Rc::as_ptr(record) as *const () as usize),
            Value::Page(page) => Some(Rc::as_ptr(&page.items) as *const () as usize),
            _ => None,
        }
    }

    /// Canonical text form, as used for grouping keys, regex matching and
    /// string concatenation.
    pub fn to_text(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Integer(n) => n.to_string(),
            Value::Float(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Date(d) => d.to_rfc3339_opts(SecondsFormat::Millis, true),
            Value::Regex(p) => p.to_string(),
            Value::Array(_) | Value::Page(_) => self
                .as_array()
                .unwrap_or_default()
                .iter()
                .map(|v| match v {
                    Value::Undefined | Value::Null => String::new(),
                    v => v.to_text(),
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => "[object Object]".to_string(),
        }
    }

    /// Numeric coercion used by relational comparisons and reducers.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined | Value::Regex(_) | Value::Object(_) => f64::NAN,
            Value::Null => 0.0,
            Value::Boolean(b) => f64::from(u8::from(*b)),
            Value::Integer(n) => *n as f64,
            Value::Float(n) => *n,
            Value::String(s) => parse_number(s),
            Value::Date(d) => d.timestamp_millis() as f64,
            Value::Array(_) | Value::Page(_) => parse_number(&self.to_text()),
        }
    }

    /// Strict equality: numbers by value, dates by instant (or against a
    /// millisecond timestamp), regexes by source and flag, arrays and
    /// records by identity.
    pub fn same_as(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (a, b) if a.is_number() && b.is_number() => a.as_float() == b.as_float(),
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Date(d), n) | (n, Value::Date(d)) if n.is_number() => {
                n.as_float() == Some(d.timestamp_millis() as f64)
            }
            (Value::Regex(a), Value::Regex(b)) => a == b,
            _ => match (self.identity(), other.identity()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }

    /// Relational ordering. Two strings compare lexically, anything else is
    /// coerced to numbers; `None` when either side is NaN.
    pub fn partial_compare(&self, other: &Value) -> Option<Ordering> {
        let left = self.to_primitive();
        let right = other.to_primitive();
        match (&left, &right) {
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => left.to_number().partial_cmp(&right.to_number()),
        }
    }

    fn to_primitive(&self) -> Value {
        match self {
            Value::Array(_) | Value::Page(_) | Value::Object(_) | Value::Regex(_) => {
                Value::String(self.to_text())
            }
            other => other.clone(),
        }
    }

    /// `+` as used by the `sum` reducer: string concatenation when either side
    /// is textual, otherwise numeric addition that keeps integers integral.
    pub fn add(&self, other: &Value) -> Value {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => match a.checked_add(*b) {
                Some(n) => Value::Integer(n),
                None => Value::Float(*a as f64 + *b as f64),
            },
            (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => {
                add_mixed(*a, *b)
            }
            (Value::Float(a), Value::Float(b)) => Value::Float(a + b),
            (a, b) if a.is_textual() || b.is_textual() => {
                Value::String(format!("{}{}", a.to_text(), b.to_text()))
            }
            (a, b) => Value::from_number(a.to_number() + b.to_number()),
        }
    }

    fn is_textual(&self) -> bool {
        matches!(
            self,
            Value::String(_)
                | Value::Date(_)
                | Value::Regex(_)
                | Value::Array(_)
                | Value::Page(_)
                | Value::Object(_)
        )
    }
}

/// Integer + float through decimal arithmetic, so that e.g. `1 + 0.1 + 0.2`
/// style sums stay exact when the result is representable.
fn add_mixed(a: i64, b: f64) -> Value {
    if let Some(ad) = Decimal::from_i64(a)
        && let Some(bd) = Decimal::from_f64(b)
        && let Some(rd) = ad.checked_add(bd)
    {
        if rd.is_integer()
            && let Some(r) = rd.to_i64()
        {
            return Value::Integer(r);
        } else if let Some(r) = rd.to_f64() {
            return Value::Float(r);
        }
    }
    Value::Float(a as f64 + b)
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (a, b) if a.is_number() && b.is_number() => a.as_float() == b.as_float(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Regex(a), Value::Regex(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Page(a), Value::Page(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(arr) => {
                Value::array(arr.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(obj) => {
                Value::object(obj.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

/// Shortest text form of a number that reads back to the same number.
/// Very large and very small magnitudes use exponent notation (`1e+21`).
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    let abs = n.abs();
    if (1e-6..1e21).contains(&abs) {
        return n.to_string();
    }
    let s = format!("{:e}", n);
    match s.split_once('e') {
        Some((mantissa, exp)) if !exp.starts_with('-') => format!("{}e+{}", mantissa, exp),
        _ => s,
    }
}

/// Lenient numeric parse of text: surrounding whitespace is ignored, empty
/// text is zero, `Infinity` and `0x`/`0o`/`0b` prefixes are understood.
/// Returns NaN for anything else that is not a decimal literal.
pub fn parse_number(text: &str) -> f64 {
    let t = text.trim();
    if t.is_empty() {
        return 0.0;
    }
    match t {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    for (prefix, radix) in [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)] {
        if let Some(digits) = t.strip_prefix(prefix) {
            return u64::from_str_radix(digits, radix)
                .map(|n| n as f64)
                .unwrap_or(f64::NAN);
        }
    }
    let decimal = t
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'));
    if !decimal {
        return f64::NAN;
    }
    t.parse::<f64>().unwrap_or(f64::NAN)
}

#[test]
fn test_format_number() {
    assert_eq!(format_number(30.0), "30");
    assert_eq!(format_number(0.5), "0.5");
    assert_eq!(format_number(1e21), "1e+21");
    assert_eq!(format_number(1.5e-7), "1.5e-7");
    assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
}

#[test]
fn test_parse_number() {
    assert_eq!(parse_number(" 12 "), 12.0);
    assert_eq!(parse_number(""), 0.0);
    assert_eq!(parse_number("0x1F"), 31.0);
    assert!(parse_number("inf").is_nan());
    assert!(parse_number("12abc").is_nan());
}

#[test]
fn test_relational_coercion() {
    assert_eq!(
        Value::from("10").partial_compare(&Value::Integer(9)),
        Some(Ordering::Greater)
    );
    assert_eq!(
        Value::from("10").partial_compare(&Value::from("9")),
        Some(Ordering::Less)
    );
    assert_eq!(Value::Undefined.partial_compare(&Value::Integer(1)), None);
}
