//! Extraction of store-facing metadata from a parsed query.
//!
//! A backing store that runs its own lookups only needs a handful of facts
//! from a query: the sort order, the projected attributes, the page window
//! and whether the query is a point lookup by primary key. `normalize`
//! collects them in one pass.
//!
//! ```
//! use rql::{NormalizeOptions, parse};
//!
//! let query = parse("eq(id,42)&sort(-price,name)&limit(10,20)", &[]).unwrap();
//! let normalized = query.normalize(&NormalizeOptions::default());
//!
//! assert_eq!(normalized.primary_key.as_deref(), Some("42"));
//! assert_eq!(normalized.sort_fields[0].attribute, "price");
//! assert_eq!(normalized.sort_fields[0].weight, -1);
//! assert_eq!(normalized.limit, Some(10));
//! assert_eq!(normalized.skip, 20);
//! ```

use std::collections::{BTreeMap, HashMap};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

use crate::{
    ast::{Arg, QueryNode},
    value::Value,
};

static SIGNED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([-+]*)(.+)$").expect("valid sign pattern"));

/// Settings for [`QueryNode::normalize`].
#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    /// Attribute recognised in `eq(<primary key>, value)`
    pub primary_key: String,

    /// Query attribute name to store attribute name, applied to the
    /// derived sort and select fields
    pub map: HashMap<String, String>,

    /// Ceiling applied to `limit()` counts
    pub hard_limit: Option<usize>,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        NormalizeOptions {
            primary_key: "id".to_string(),
            map: HashMap::new(),
            hard_limit: None,
        }
    }
}

impl NormalizeOptions {
    pub fn primary_key(mut self, name: impl Into<String>) -> Self {
        self.primary_key = name.into();
        self
    }

    pub fn rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.map.insert(from.into(), to.into());
        self
    }

    pub fn hard_limit(mut self, limit: usize) -> Self {
        self.hard_limit = Some(limit);
        self
    }
}

/// One signed attribute of a `sort()` or `select()` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub attribute: String,
    /// `1`/`-1` for sort order, `1`/`0` for included/excluded in a select
    pub weight: i64,
}

/// Metadata collected by [`QueryNode::normalize`].
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedQuery {
    pub original: QueryNode,

    /// Raw arguments of the last `sort()`
    pub sort: Vec<Arg>,
    pub sort_fields: Vec<FieldSpec>,
    pub sort_weights: BTreeMap<String, i64>,

    /// Raw arguments of the last `select()`
    pub select: Vec<Arg>,
    pub select_fields: Vec<FieldSpec>,
    pub select_weights: BTreeMap<String, i64>,

    /// Page size; `None` without a `limit()` call
    pub limit: Option<usize>,
    pub skip: usize,

    /// A `limit()` call was seen
    pub need_count: bool,

    /// A `values()` call was seen
    pub values: bool,

    /// Value of `eq(<primary key>, value)` as text
    pub primary_key: Option<String>,
}

impl NormalizedQuery {
    fn new(original: QueryNode) -> Self {
        NormalizedQuery {
            original,
            sort: Vec::new(),
            sort_fields: Vec::new(),
            sort_weights: BTreeMap::new(),
            select: Vec::new(),
            select_fields: Vec::new(),
            select_weights: BTreeMap::new(),
            limit: None,
            skip: 0,
            need_count: false,
            values: false,
            primary_key: None,
        }
    }

    /// JSON rendering, as printed by `rql normalize`.
    pub fn to_json(&self) -> serde_json::Value {
        fn fields(specs: &[FieldSpec]) -> serde_json::Value {
            specs
                .iter()
                .map(|spec| {
                    let mut field = serde_json::Map::new();
                    field.insert(spec.attribute.clone(), json!(spec.weight));
                    serde_json::Value::Object(field)
                })
                .collect()
        }
        fn raw(args: &[Arg]) -> serde_json::Value {
            args.iter().map(|arg| serde_json::Value::String(arg.to_string())).collect()
        }

        json!({
            "original": self.original.to_string(),
            "sort": raw(&self.sort),
            "sortFields": fields(&self.sort_fields),
            "sortWeights": self.sort_weights,
            "select": raw(&self.select),
            "selectFields": fields(&self.select_fields),
            "selectWeights": self.select_weights,
            "limit": self.limit,
            "skip": self.skip,
            "needCount": self.need_count,
            "values": self.values,
            "primaryKey": self.primary_key,
        })
    }
}

impl QueryNode {
    /// Collects sort, select, paging and primary-key facts from the leaf
    /// terms of the query. Later calls override earlier ones.
    pub fn normalize(&self, options: &NormalizeOptions) -> NormalizedQuery {
        let mut result = NormalizedQuery::new(self.clone());

        self.visit(|name, args| match name {
            "sort" => {
                result.sort = args.to_vec();
                result.sort_fields = signed_fields(args, options, -1);
                result.sort_weights = weights(&result.sort_fields);
            }
            "select" => {
                result.select = args.to_vec();
                result.select_fields = signed_fields(args, options, 0);
                result.select_weights = weights(&result.select_fields);
            }
            "limit" => {
                let mut limit = coerce_count(args.first());
                if let Some(hard_limit) = options.hard_limit {
                    limit = limit.min(hard_limit);
                }
                result.limit = Some(limit);
                result.skip = coerce_count(args.get(1));
                result.need_count = true;
            }
            "values" => result.values = true,
            "eq" => {
                let key = args.first().and_then(Arg::as_value).and_then(Value::as_str);
                if key == Some(options.primary_key.as_str())
                    && let Some(value) = args.get(1).and_then(Arg::as_value)
                    && (value.is_number() || value.as_str().is_some())
                {
                    result.primary_key = Some(value.to_text());
                }
            }
            _ => {}
        });

        result
    }
}

/// Splits `-name`/`+name` arguments. A tuple argument is a path joined
/// with `.`.
fn signed_fields(args: &[Arg], options: &NormalizeOptions, negative: i64) -> Vec<FieldSpec> {
    args.iter()
        .filter_map(|arg| {
            let text = attribute_text(arg);
            let caps = SIGNED.captures(&text)?;
            let weight = if caps[1].starts_with('-') { negative } else { 1 };
            let attribute = &caps[2];
            let attribute = options.map.get(attribute).cloned().unwrap_or_else(|| attribute.to_string());
            Some(FieldSpec { attribute, weight })
        })
        .collect()
}

fn attribute_text(arg: &Arg) -> String {
    match arg {
        Arg::Value(value) => value.to_text(),
        Arg::Tuple(items) => items.iter().map(attribute_text).collect::<Vec<_>>().join("."),
        Arg::Node(node) => node.to_string(),
    }
}

fn weights(fields: &[FieldSpec]) -> BTreeMap<String, i64> {
    fields
        .iter()
        .map(|field| (field.attribute.clone(), field.weight))
        .collect()
}

/// Non-negative whole count; anything non-numeric is 0.
fn coerce_count(arg: Option<&Arg>) -> usize {
    let n = arg
        .and_then(Arg::to_value)
        .map_or(f64::NAN, |value| value.to_number());
    if n.is_nan() || n <= 0.0 {
        0
    } else if n.is_infinite() {
        usize::MAX
    } else {
        n.floor() as usize
    }
}
