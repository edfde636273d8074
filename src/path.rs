use crate::{converter::decode, value::Value};

/// A segment of an attribute path.
#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    /// Record attribute by name (percent-decoded)
    ///
    /// # Examples
    /// - `eq(name,Bob)` → `[Field("name")]`
    /// - `eq(first%20name,Bob)` → `[Field("first name")]`
    Field(String),

    /// Array element by position
    ///
    /// # Examples
    /// - `eq(tags/0,red)` → `[Field("tags"), Index(0)]`
    Index(usize),
}

/// Attribute path. Empty means the item itself.
///
/// A plain string argument is always a single attribute, dots included.
/// Nested access uses the tuple or slash form:
///
/// - `eq(address,x)` → `[Field("address")]`
/// - `eq(address/city,Oslo)` → `[Field("address"), Field("city")]`
/// - `eq((orders,0,total),10)` → `[Field("orders"), Index(0), Field("total")]`
pub type Path = Vec<PathSegment>;

/// Builds a path from an argument value.
pub fn path_of(value: &Value) -> Path {
    match value {
        Value::Undefined => Path::new(),
        _ => match value.as_array() {
            Some(parts) => parts.iter().map(segment).collect(),
            None => vec![segment(value)],
        },
    }
}

fn segment(part: &Value) -> PathSegment {
    match part {
        Value::Integer(n) if *n >= 0 => PathSegment::Index(*n as usize),
        other => {
            let text = other.to_text();
            match decode(&text) {
                Ok(name) => PathSegment::Field(name.into_owned()),
                Err(_) => PathSegment::Field(text.clone()),
            }
        }
    }
}

/// Looks `path` up in `target`.
///
/// Returns `None` when a falsy value sits anywhere along the way, which
/// filters treat as "exclude this item". A missing final attribute yields
/// `Some(Value::Undefined)`.
pub fn resolve(target: &Value, path: &[PathSegment]) -> Option<Value> {
    let mut current = target.clone();
    for segment in path {
        if !current.is_truthy() {
            return None;
        }
        current = step(&current, segment).unwrap_or(Value::Undefined);
    }
    Some(current)
}

/// Like [`resolve`], but an unreachable attribute is simply undefined.
pub fn lookup(target: &Value, path: &[PathSegment]) -> Value {
    resolve(target, path).unwrap_or(Value::Undefined)
}

fn step(value: &Value, segment: &PathSegment) -> Option<Value> {
    match (value, segment) {
        (Value::Object(record), PathSegment::Field(name)) => record.get(name).cloned(),
        (Value::Object(record), PathSegment::Index(i)) => record.get(&i.to_string()).cloned(),
        (_, PathSegment::Index(i)) => value.as_array()?.get(*i).cloned(),
        (_, PathSegment::Field(name)) => {
            let index = name.parse::<usize>().ok()?;
            value.as_array()?.get(index).cloned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_lookup() {
        let record = Value::from(json!({"a": {"b": [10, 20]}}));
        let path = path_of(&Value::array(vec![Value::from("a"), Value::from("b"), Value::from(1)]));
        assert_eq!(resolve(&record, &path), Some(Value::from(20)));
    }

    #[test]
    fn test_falsy_intermediate_is_unreachable() {
        let record = Value::from(json!({"a": null}));
        let path = path_of(&Value::array(vec![Value::from("a"), Value::from("b")]));
        assert_eq!(resolve(&record, &path), None);
        assert_eq!(lookup(&record, &path), Value::Undefined);
    }

    #[test]
    fn test_string_path_keeps_dots() {
        assert_eq!(path_of(&Value::from("a.b")), vec![PathSegment::Field("a.b".to_string())]);
    }
}
