//! The built-in operator library.
//!
//! Every operator receives the current context (normally an array of
//! records) and its compiled arguments, and returns the next context.
//! Filters keep the records an attribute test accepts; projections reshape
//! records; reducers (`count`, `first`, `one`, `sum`, `mean`, `min`, `max`)
//! collapse the array into a single value and therefore end a pipeline.
//!
//! Filters take their arguments as `(path, value)`. With a single argument
//! the value is compared against the item itself, which is how queries
//! over arrays of scalars are written: `values(age)&gt(30)`.

use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
};

use crate::{
    evaluator::{EvalError, Operand, OperatorRegistry, Stage},
    path::{Path, PathSegment, lookup, path_of, resolve},
    value::{Page, Pattern, Record, Value},
};

/// Installs every built-in operator.
pub fn register_defaults(registry: &mut OperatorRegistry) {
    for relation in [
        Relation::Eq,
        Relation::Ne,
        Relation::Lt,
        Relation::Le,
        Relation::Gt,
        Relation::Ge,
    ] {
        registry.register(relation.name(), move |input: &Value, args: &[Operand]| {
            compare(relation, input, args)
        });
    }

    registry
        .register("match", |input: &Value, args: &[Operand]| matches("match", true, input, args))
        .register("matchcase", |input: &Value, args: &[Operand]| {
            matches("matchcase", false, input, args)
        })
        .register("in", |input: &Value, args: &[Operand]| member("in", true, input, args))
        .register("out", |input: &Value, args: &[Operand]| member("out", false, input, args))
        .register("contains", |input: &Value, args: &[Operand]| {
            contains("contains", true, input, args)
        })
        .register("excludes", |input: &Value, args: &[Operand]| {
            contains("excludes", false, input, args)
        })
        .register("between", between)
        .register("or", or)
        .register("and", and)
        .register("select", select)
        .register("unselect", unselect)
        .register("values", values)
        .register("limit", limit)
        .register("distinct", distinct)
        .register("recurse", recurse)
        .register("aggregate", aggregate)
        .register("sort", sort)
        .register("sum", sum)
        .register("mean", mean)
        .register("min", |input: &Value, args: &[Operand]| extreme("min", Ordering::Less, input, args))
        .register("max", |input: &Value, args: &[Operand]| {
            extreme("max", Ordering::Greater, input, args)
        })
        .register("count", count)
        .register("first", first)
        .register("one", one);
}

/// Items of the context, or `ExpectedArray`.
fn items<'a>(operator: &str, input: &'a Value) -> Result<&'a [Value], EvalError> {
    input.as_array().ok_or_else(|| EvalError::ExpectedArray {
        operator: operator.to_string(),
        found: input.type_name(),
    })
}

fn path_arg(operator: &str, operand: &Operand) -> Result<Path, EvalError> {
    Ok(path_of(&operand.literal(operator)?))
}

/// Splits filter arguments into the attribute path and the expected value.
fn filter_args<'a>(
    operator: &str,
    args: &'a [Operand],
    undefined: &'a Operand,
) -> Result<(Path, &'a Operand), EvalError> {
    match args {
        [] => Ok((Path::new(), undefined)),
        [expected] => Ok((Path::new(), expected)),
        [path, expected, ..] => Ok((path_arg(operator, path)?, expected)),
    }
}

/// Keeps the items whose attribute at `path` satisfies `keep`. Items where
/// the path cannot be followed are dropped.
fn retain<F>(operator: &str, input: &Value, path: &[PathSegment], mut keep: F) -> Result<Value, EvalError>
where
    F: FnMut(&Value) -> Result<bool, EvalError>,
{
    let mut kept = Vec::new();
    for item in items(operator, input)? {
        let Some(value) = resolve(item, path) else { continue };
        if keep(&value)? {
            kept.push(item.clone());
        }
    }
    Ok(Value::array(kept))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relation {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Relation {
    fn name(self) -> &'static str {
        match self {
            Relation::Eq => "eq",
            Relation::Ne => "ne",
            Relation::Lt => "lt",
            Relation::Le => "le",
            Relation::Gt => "gt",
            Relation::Ge => "ge",
        }
    }

    fn holds(self, value: &Value, expected: &Value) -> bool {
        let ordering = || value.partial_compare(expected);
        match self {
            Relation::Eq => value.same_as(expected),
            Relation::Ne => !value.same_as(expected),
            Relation::Lt => ordering() == Some(Ordering::Less),
            Relation::Le => matches!(ordering(), Some(Ordering::Less | Ordering::Equal)),
            Relation::Gt => ordering() == Some(Ordering::Greater),
            Relation::Ge => matches!(ordering(), Some(Ordering::Greater | Ordering::Equal)),
        }
    }
}

fn compare(relation: Relation, input: &Value, args: &[Operand]) -> Result<Value, EvalError> {
    let operator = relation.name();
    let undefined = Operand::Value(Value::Undefined);
    let (path, expected) = filter_args(operator, args, &undefined)?;
    let expected = expected.literal(operator)?;
    retain(operator, input, &path, |value| Ok(relation.holds(value, &expected)))
}

/// `match`/`matchcase`: the attribute's text against a regular expression.
/// A regex argument contributes only its source; the flag comes from the
/// operator.
fn matches(operator: &str, case_insensitive: bool, input: &Value, args: &[Operand]) -> Result<Value, EvalError> {
    let undefined = Operand::Value(Value::Undefined);
    let (path, expected) = filter_args(operator, args, &undefined)?;
    let source = match expected.literal(operator)? {
        Value::Regex(pattern) => pattern.source().to_string(),
        other => other.to_text(),
    };
    let pattern = Pattern::new(&source, case_insensitive).map_err(|e| EvalError::InvalidPattern {
        pattern: source.clone(),
        message: e.to_string(),
    })?;
    retain(operator, input, &path, |value| Ok(pattern.is_match(&value.to_text())))
}

/// `in`/`out`. A scalar argument counts as a one-element list.
fn member(operator: &str, inside: bool, input: &Value, args: &[Operand]) -> Result<Value, EvalError> {
    let undefined = Operand::Value(Value::Undefined);
    let (path, expected) = filter_args(operator, args, &undefined)?;
    let expected = expected.literal(operator)?;
    let candidates = match expected.as_array() {
        Some(items) => items.to_vec(),
        None => vec![expected.clone()],
    };
    retain(operator, input, &path, |value| {
        Ok(candidates.iter().any(|c| c.same_as(value)) == inside)
    })
}

/// `contains`/`excludes` on array attributes. A query-term argument is run
/// on each element alone; the element counts when the result is non-empty.
fn contains(operator: &str, wanted: bool, input: &Value, args: &[Operand]) -> Result<Value, EvalError> {
    let undefined = Operand::Value(Value::Undefined);
    let (path, expected) = filter_args(operator, args, &undefined)?;
    let expected = match expected {
        Operand::Stage(stage) => Needle::Predicate(stage),
        other => Needle::Value(other.literal(operator)?),
    };
    retain(operator, input, &path, |value| {
        let Some(elements) = value.as_array() else {
            return Ok(!wanted);
        };
        let mut found = false;
        for element in elements {
            if expected.found_in(element)? {
                found = true;
                break;
            }
        }
        Ok(found == wanted)
    })
}

enum Needle<'a> {
    Value(Value),
    Predicate(&'a Stage),
}

impl Needle<'_> {
    fn found_in(&self, element: &Value) -> Result<bool, EvalError> {
        match self {
            Needle::Value(value) => Ok(value.same_as(element)),
            Needle::Predicate(stage) => {
                let result = stage.run(&Value::array(vec![element.clone()]))?;
                Ok(result.as_array().is_some_and(|items| !items.is_empty()))
            }
        }
    }
}

/// `between(path, (lo, hi))`: `lo <= value < hi`.
fn between(input: &Value, args: &[Operand]) -> Result<Value, EvalError> {
    let undefined = Operand::Value(Value::Undefined);
    let (path, range) = filter_args("between", args, &undefined)?;
    let range = range.literal("between")?;
    let (lo, hi) = match range.as_array() {
        Some([lo, hi, ..]) => (lo.clone(), hi.clone()),
        _ => {
            return Err(EvalError::invalid_argument(
                "between",
                format!("expected a (low,high) range, got {}", range.type_name()),
            ));
        }
    };
    retain("between", input, &path, |value| {
        let above = matches!(value.partial_compare(&lo), Some(Ordering::Greater | Ordering::Equal));
        Ok(above && value.partial_compare(&hi) == Some(Ordering::Less))
    })
}

/// Union of every branch run against the same input, first occurrence
/// first. Records and arrays are told apart by identity; scalars are never
/// merged.
fn or(input: &Value, args: &[Operand]) -> Result<Value, EvalError> {
    let mut seen = HashSet::new();
    let mut union = Vec::new();
    for arg in args {
        let branch = arg.stage("or")?.run(input)?;
        for item in items("or", &branch)? {
            if item.identity().is_none_or(|id| seen.insert(id)) {
                union.push(item.clone());
            }
        }
    }
    Ok(Value::array(union))
}

fn and(input: &Value, args: &[Operand]) -> Result<Value, EvalError> {
    let mut current = input.clone();
    for arg in args {
        current = arg.stage("and")?.run(&current)?;
    }
    Ok(current)
}

fn attribute_names(operator: &str, args: &[Operand]) -> Result<Vec<(String, Path)>, EvalError> {
    args.iter()
        .map(|arg| {
            let value = arg.literal(operator)?;
            Ok((value.to_text(), path_of(&value)))
        })
        .collect()
}

fn select(input: &Value, args: &[Operand]) -> Result<Value, EvalError> {
    let attributes = attribute_names("select", args)?;
    let projected = items("select", input)?
        .iter()
        .map(|item| {
            let record: Record = attributes
                .iter()
                .filter_map(|(name, path)| {
                    let value = lookup(item, path);
                    (!value.is_undefined()).then(|| (name.clone(), value))
                })
                .collect();
            Value::object(record)
        })
        .collect();
    Ok(Value::array(projected))
}

fn unselect(input: &Value, args: &[Operand]) -> Result<Value, EvalError> {
    let excluded = args
        .iter()
        .map(|arg| arg.literal("unselect").map(|value| value.to_text()))
        .collect::<Result<HashSet<_>, _>>()?;
    let projected = items("unselect", input)?
        .iter()
        .map(|item| {
            let record: Record = item
                .as_record()
                .map(|record| {
                    record
                        .iter()
                        .filter(|(key, _)| !excluded.contains(*key))
                        .map(|(key, value)| (key, value.clone()))
                        .collect()
                })
                .unwrap_or_default();
            Value::object(record)
        })
        .collect();
    Ok(Value::array(projected))
}

/// One name: the attribute value itself. Zero names: all own values. More:
/// an array of the named values.
fn values(input: &Value, args: &[Operand]) -> Result<Value, EvalError> {
    let attributes = attribute_names("values", args)?;
    let projected = items("values", input)?
        .iter()
        .map(|item| match attributes.as_slice() {
            [(_, path)] => lookup(item, path),
            [] => Value::array(
                item.as_record()
                    .map(|record| record.values().cloned().collect())
                    .unwrap_or_default(),
            ),
            many => Value::array(many.iter().map(|(_, path)| lookup(item, path)).collect()),
        })
        .collect();
    Ok(Value::array(projected))
}

/// Position of a (possibly negative, counted from the end) slice bound.
fn slice_index(n: f64, len: usize) -> usize {
    if n.is_nan() {
        return 0;
    }
    let n = n.trunc();
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        n.min(len as f64) as usize
    }
}

/// `limit(count, start, maxCount)`. A truthy `maxCount` turns the result
/// into a [`Page`].
fn limit(input: &Value, args: &[Operand]) -> Result<Value, EvalError> {
    let arg = |i: usize| -> Result<Value, EvalError> {
        args.get(i).map_or(Ok(Value::Undefined), |operand| operand.literal("limit"))
    };
    let (count, start, max_count) = (arg(0)?, arg(1)?, arg(2)?);

    let all = items("limit", input)?;
    let start = if start.is_truthy() { start.to_number() } else { 0.0 };
    let from = slice_index(start, all.len());
    let to = slice_index(start + count.to_number(), all.len()).max(from);
    let sliced = all[from..to].to_vec();

    if !max_count.is_truthy() {
        return Ok(Value::array(sliced));
    }

    let total_count = match max_count.as_float() {
        Some(max) => (all.len() as f64).min(max).max(0.0) as usize,
        None => all.len(),
    };
    let start = if start.is_finite() && start > 0.0 { start as usize } else { 0 };
    let end = i64::try_from(start)
        .unwrap_or(i64::MAX)
        .saturating_add(sliced.len() as i64)
        .saturating_sub(1);
    Ok(Value::Page(Page {
        items: sliced.into(),
        start,
        end,
        total_count,
    }))
}

/// Drops repeated values. Scalars compare by type and value, records and
/// arrays by identity only: two equal-looking records both survive.
fn distinct(input: &Value, _args: &[Operand]) -> Result<Value, EvalError> {
    let mut identities = HashSet::new();
    let mut scalars = HashSet::new();
    let kept = items("distinct", input)?
        .iter()
        .filter(|item| match item.identity() {
            Some(id) => identities.insert(id),
            None => scalars.insert((item.type_name(), item.to_text())),
        })
        .cloned()
        .collect();
    Ok(Value::array(kept))
}

/// Depth-first flattening. Arrays are walked but not emitted; every other
/// value is emitted, followed by its `property` child (or, without one,
/// every record or array attribute).
fn recurse(input: &Value, args: &[Operand]) -> Result<Value, EvalError> {
    fn is_container(value: &Value) -> bool {
        matches!(value, Value::Array(_) | Value::Page(_) | Value::Object(_))
    }

    fn walk(value: &Value, property: Option<&str>, out: &mut Vec<Value>) {
        if let Some(items) = value.as_array() {
            for item in items {
                walk(item, property, out);
            }
            return;
        }
        out.push(value.clone());
        let Some(record) = value.as_record() else { return };
        match property {
            Some(property) => {
                if let Some(child) = record.get(property)
                    && is_container(child)
                {
                    walk(child, Some(property), out);
                }
            }
            None => {
                for child in record.values().filter(|child| is_container(child)) {
                    walk(child, None, out);
                }
            }
        }
    }

    let property = match args.first() {
        Some(arg) => Some(arg.literal("recurse")?).filter(Value::is_truthy).map(|v| v.to_text()),
        None => None,
    };
    let mut out = Vec::new();
    walk(input, property.as_deref(), &mut out);
    Ok(Value::array(out))
}

/// `aggregate(keys..., reducers...)`: one record per distinct combination
/// of the key attributes, in first-seen order. Reducer results are stored
/// under `"0"`, `"1"`, ... in declaration order.
fn aggregate(input: &Value, args: &[Operand]) -> Result<Value, EvalError> {
    let mut keys = Vec::new();
    let mut reducers = Vec::new();
    for arg in args {
        match arg {
            Operand::Stage(stage) => reducers.push(stage),
            other => keys.push(other.literal("aggregate")?.to_text()),
        }
    }

    let attribute = |item: &Value, key: &str| {
        item.as_record()
            .and_then(|record| record.get(key))
            .cloned()
            .unwrap_or(Value::Undefined)
    };

    let mut index: HashMap<Vec<String>, usize> = HashMap::new();
    let mut groups: Vec<Vec<Value>> = Vec::new();
    for item in items("aggregate", input)? {
        let group_key: Vec<String> = keys.iter().map(|key| attribute(item, key).to_text()).collect();
        let slot = *index.entry(group_key).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(item.clone());
    }

    let mut results = Vec::with_capacity(groups.len());
    for group in groups {
        let mut record = Record::new();
        if let Some(head) = group.first() {
            for key in &keys {
                record.insert(key.as_str(), attribute(head, key));
            }
        }
        let group = Value::array(group);
        for (i, reducer) in reducers.iter().enumerate() {
            record.insert(i.to_string(), reducer.run(&group)?);
        }
        results.push(Value::object(record));
    }
    Ok(Value::array(results))
}

struct SortKey {
    path: Path,
    descending: bool,
}

fn sort_key(arg: &Operand) -> Result<SortKey, EvalError> {
    fn split_sign(text: &str) -> (bool, &str) {
        match text.as_bytes().first() {
            Some(b'-') => (true, &text[1..]),
            Some(b'+') => (false, &text[1..]),
            _ => (false, text),
        }
    }

    let value = arg.literal("sort")?;
    match value.as_array() {
        Some([Value::String(head), rest @ ..]) => {
            let (descending, head) = split_sign(head);
            let mut parts = vec![Value::from(head)];
            parts.extend(rest.iter().cloned());
            Ok(SortKey {
                path: path_of(&Value::array(parts)),
                descending,
            })
        }
        Some(_) => Ok(SortKey {
            path: path_of(&value),
            descending: false,
        }),
        None => {
            let text = value.to_text();
            let (descending, attribute) = split_sign(&text);
            Ok(SortKey {
                path: path_of(&Value::from(attribute)),
                descending,
            })
        }
    }
}

/// Stable multi-key sort. Incomparable values tie on that key.
fn sort(input: &Value, args: &[Operand]) -> Result<Value, EvalError> {
    let keys = args.iter().map(sort_key).collect::<Result<Vec<_>, _>>()?;
    let mut rows: Vec<(Vec<Value>, Value)> = items("sort", input)?
        .iter()
        .map(|item| (keys.iter().map(|key| lookup(item, &key.path)).collect(), item.clone()))
        .collect();

    rows.sort_by(|(a, _), (b, _)| {
        for (key, (x, y)) in keys.iter().zip(a.iter().zip(b.iter())) {
            let ordering = x.partial_compare(y).unwrap_or(Ordering::Equal);
            let ordering = if key.descending { ordering.reverse() } else { ordering };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });

    Ok(Value::array(rows.into_iter().map(|(_, item)| item).collect()))
}

/// Values a reducer folds over: the items, or their `property` attribute.
fn reduced_values(operator: &str, input: &Value, args: &[Operand]) -> Result<Vec<Value>, EvalError> {
    let all = items(operator, input)?;
    let property = match args.first() {
        Some(arg) => Some(arg.literal(operator)?).filter(Value::is_truthy),
        None => None,
    };
    Ok(match property {
        Some(property) => {
            let path = path_of(&property);
            all.iter().map(|item| lookup(item, &path)).collect()
        }
        None => all.to_vec(),
    })
}

/// Folds seeded by the first value; undefined for an empty context.
fn fold<F>(values: Vec<Value>, step: F) -> Value
where
    F: Fn(Value, &Value) -> Value,
{
    let mut values = values.into_iter();
    let Some(seed) = values.next() else {
        return Value::Undefined;
    };
    values.fold(seed, |acc, next| step(acc, &next))
}

fn sum(input: &Value, args: &[Operand]) -> Result<Value, EvalError> {
    let values = reduced_values("sum", input, args)?;
    Ok(fold(values, |acc, next| acc.add(next)))
}

fn mean(input: &Value, args: &[Operand]) -> Result<Value, EvalError> {
    let values = reduced_values("mean", input, args)?;
    let len = values.len() as f64;
    let total = fold(values, |acc, next| acc.add(next));
    Ok(Value::from_number(total.to_number() / len))
}

/// `min`/`max` by numeric value. The winning value is returned as given;
/// anything non-numeric makes the result NaN.
fn extreme(operator: &str, wanted: Ordering, input: &Value, args: &[Operand]) -> Result<Value, EvalError> {
    let values = reduced_values(operator, input, args)?;
    Ok(fold(values, |acc, next| {
        let (a, b) = (acc.to_number(), next.to_number());
        if a.is_nan() || b.is_nan() {
            Value::Float(f64::NAN)
        } else if b.partial_cmp(&a) == Some(wanted) {
            next.clone()
        } else {
            acc
        }
    }))
}

fn count(input: &Value, _args: &[Operand]) -> Result<Value, EvalError> {
    Ok(Value::Integer(items("count", input)?.len() as i64))
}

fn first(input: &Value, _args: &[Operand]) -> Result<Value, EvalError> {
    Ok(items("first", input)?.first().cloned().unwrap_or(Value::Undefined))
}

fn one(input: &Value, _args: &[Operand]) -> Result<Value, EvalError> {
    let all = items("one", input)?;
    if all.len() > 1 {
        return Err(EvalError::Cardinality { count: all.len() });
    }
    Ok(all.first().cloned().unwrap_or(Value::Undefined))
}
