use std::{collections::HashMap, fmt};

use crate::{encode::encode_value, value::Value};

/// Name of the implicit root combinator.
pub const ROOT_NAME: &str = "and";

/// A node of the query tree: an operator call.
///
/// Nodes own their arguments outright; the tree never holds references
/// back to a parent.
///
/// # Examples
///
/// ```
/// use rql::{Arg, QueryNode};
///
/// let mut query = QueryNode::root();
/// query.push(QueryNode::call("lt", vec![Arg::from("age"), Arg::from(30)]));
/// query.push(QueryNode::call("sort", vec![Arg::from("-age")]));
/// assert_eq!(query.to_string(), "lt(age,30)&sort(-age)");
/// ```
#[derive(Debug, Clone)]
pub struct QueryNode {
    /// Operator name (`and` for the root)
    pub name: String,

    /// Positional arguments
    pub args: Vec<Arg>,

    /// Hints recorded while parsing. Only the root's cache is populated.
    pub cache: QueryCache,

    /// Parse failure captured by `Parser::parse_gently`
    pub error: Option<String>,
}

/// One positional argument of a [`QueryNode`].
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// Nested operator call
    Node(QueryNode),

    /// Scalar (or parameter supplied) value
    Value(Value),

    /// Parenthesised literal list: `(1,2,3)` or `a/b/c`
    Tuple(Vec<Arg>),
}

/// Lookups the parser records on the root while scanning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryCache {
    /// Argument list of the last `sort`, `select`, `values` and `limit` call
    pub last_seen: HashMap<String, Vec<Arg>>,

    /// Value of the last `eq(<primary key>, value)` term
    pub primary_key: Option<Value>,
}

impl QueryNode {
    pub fn new(name: impl Into<String>) -> Self {
        QueryNode {
            name: name.into(),
            args: Vec::new(),
            cache: QueryCache::default(),
            error: None,
        }
    }

    /// Empty top-level conjunction.
    pub fn root() -> Self {
        Self::new(ROOT_NAME)
    }

    pub fn call(name: impl Into<String>, args: Vec<Arg>) -> Self {
        let mut node = Self::new(name);
        node.args = args;
        node
    }

    /// Appends a term.
    pub fn push(&mut self, arg: impl Into<Arg>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    /// Calls `visitor` with the name and arguments of every leaf term.
    ///
    /// Terms whose first argument is itself a call (`and(...)`, `or(...)`)
    /// are descended into instead of visited. Tuples and scalars are never
    /// descended into.
    pub fn visit<F>(&self, mut visitor: F)
    where
        F: FnMut(&str, &[Arg]),
    {
        fn visit_args<F: FnMut(&str, &[Arg])>(args: &[Arg], visitor: &mut F) {
            for arg in args {
                let Arg::Node(node) = arg else { continue };
                if node.name.is_empty() {
                    continue;
                }
                if matches!(node.args.first(), Some(Arg::Node(_))) {
                    visit_args(&node.args, visitor);
                } else {
                    visitor(&node.name, &node.args);
                }
            }
        }
        visit_args(&self.args, &mut visitor);
    }

    /// Like [`QueryNode::visit`], but a visitor returning `Some(node)`
    /// replaces the visited term in place.
    pub fn walk<F>(&mut self, mut visitor: F)
    where
        F: FnMut(&str, &[Arg]) -> Option<QueryNode>,
    {
        fn walk_args<F>(args: &mut [Arg], visitor: &mut F)
        where
            F: FnMut(&str, &[Arg]) -> Option<QueryNode>,
        {
            for arg in args.iter_mut() {
                let Arg::Node(node) = arg else { continue };
                if node.name.is_empty() {
                    continue;
                }
                if matches!(node.args.first(), Some(Arg::Node(_))) {
                    walk_args(&mut node.args, visitor);
                } else if let Some(replacement) = visitor(&node.name, &node.args) {
                    *node = replacement;
                }
            }
        }
        walk_args(&mut self.args, &mut visitor);
    }
}

impl Default for QueryNode {
    fn default() -> Self {
        Self::root()
    }
}

/// Structural equality: name and arguments. Cache and error are derived
/// data and ignored.
impl PartialEq for QueryNode {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.args == other.args
    }
}

impl Arg {
    pub fn as_node(&self) -> Option<&QueryNode> {
        match self {
            Arg::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Arg::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Scalar view of the argument: tuples become arrays, calls have none.
    pub fn to_value(&self) -> Option<Value> {
        match self {
            Arg::Node(_) => None,
            Arg::Value(value) => Some(value.clone()),
            Arg::Tuple(items) => items
                .iter()
                .map(Arg::to_value)
                .collect::<Option<Vec<_>>>()
                .map(Value::array),
        }
    }
}

impl From<QueryNode> for Arg {
    fn from(node: QueryNode) -> Self {
        Arg::Node(node)
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Arg::Value(value)
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::Value(Value::from(s))
    }
}

impl From<i64> for Arg {
    fn from(n: i64) -> Self {
        Arg::Value(Value::Integer(n))
    }
}

/// Canonical query text. The root `and` is written as `&`-joined terms,
/// every other call as `name(args)`.
impl fmt::Display for QueryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name == ROOT_NAME {
            write_args(f, &self.args, "&")
        } else {
            write_call(f, self)
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Node(node) => write_call(f, node),
            Arg::Value(value) => f.write_str(&encode_value(value)),
            Arg::Tuple(items) => {
                f.write_str("(")?;
                write_args(f, items, ",")?;
                f.write_str(")")
            }
        }
    }
}

fn write_call(f: &mut fmt::Formatter<'_>, node: &QueryNode) -> fmt::Result {
    write!(f, "{}(", node.name)?;
    write_args(f, &node.args, ",")?;
    f.write_str(")")
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[Arg], delimiter: &str) -> fmt::Result {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            f.write_str(delimiter)?;
        }
        write!(f, "{}", arg)?;
    }
    Ok(())
}
