use std::{collections::HashMap, fmt, sync::Arc};

use once_cell::sync::Lazy;
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::{
    ast::{Arg, QueryNode, ROOT_NAME, SCALAR_OPERATORS},
    operators,
    parser::{ParseError, Parser, QuerySource},
    value::Value,
};

/// Errors raised while compiling or running a query.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// No operator registered under the name
    #[error("Operator {0} is not defined")]
    UnknownOperator(String),

    /// `one()` over more than one element
    #[error("More than one object found ({count} elements)")]
    Cardinality { count: usize },

    /// An array operator applied to a scalar, usually a stage placed after
    /// `count()`, `first()` or another reducer
    #[error("{operator}() requires an array, got {found}")]
    ExpectedArray { operator: String, found: &'static str },

    #[error("Invalid argument to {operator}(): {message}")]
    InvalidArgument { operator: String, message: String },

    #[error("Invalid regular expression {pattern}: {message}")]
    InvalidPattern { pattern: String, message: String },
}

impl EvalError {
    pub(crate) fn invalid_argument(operator: &str, message: impl Into<String>) -> Self {
        EvalError::InvalidArgument {
            operator: operator.to_string(),
            message: message.into(),
        }
    }
}

/// An operator implementation.
///
/// `input` is the context flowing through the pipeline, normally an array
/// of records. Arguments arrive compiled: nested calls are [`Stage`]s the
/// operator may run against whatever context it chooses.
///
/// Plain functions and closures with the matching signature are operators:
///
/// ```
/// use rql::{EvalError, ExecuteOptions, Operand, Value, execute_query};
/// use serde_json::json;
///
/// let options = ExecuteOptions::new().operator("reverse", |input: &Value, _: &[Operand]| {
///     let mut items = input.as_array().unwrap_or_default().to_vec();
///     items.reverse();
///     Ok::<_, EvalError>(Value::array(items))
/// });
///
/// let target = Value::from(json!([1, 2, 3]));
/// let result = execute_query("reverse()", &options, &target).unwrap();
/// assert_eq!(result, Value::from(json!([3, 2, 1])));
/// ```
pub trait Operator: Send + Sync {
    fn apply(&self, input: &Value, args: &[Operand]) -> Result<Value, EvalError>;
}

impl<F> Operator for F
where
    F: Fn(&Value, &[Operand]) -> Result<Value, EvalError> + Send + Sync,
{
    fn apply(&self, input: &Value, args: &[Operand]) -> Result<Value, EvalError> {
        self(input, args)
    }
}

/// A compiled argument.
#[derive(Clone)]
pub enum Operand {
    /// Literal or parameter value
    Value(Value),

    /// Nested operator call
    Stage(Stage),

    /// Tuple literal
    List(Vec<Operand>),
}

impl Operand {
    pub fn as_stage(&self) -> Option<&Stage> {
        match self {
            Operand::Stage(stage) => Some(stage),
            _ => None,
        }
    }

    /// The literal value; tuples become arrays. `None` if a nested call is
    /// involved.
    pub fn to_value(&self) -> Option<Value> {
        match self {
            Operand::Value(value) => Some(value.clone()),
            Operand::Stage(_) => None,
            Operand::List(items) => items
                .iter()
                .map(Operand::to_value)
                .collect::<Option<Vec<_>>>()
                .map(Value::array),
        }
    }

    /// Like [`Operand::to_value`], failing with `InvalidArgument` for
    /// `operator` when the operand is a call.
    pub fn literal(&self, operator: &str) -> Result<Value, EvalError> {
        self.to_value()
            .ok_or_else(|| EvalError::invalid_argument(operator, "expected a value, found a query term"))
    }

    /// The nested call, failing with `InvalidArgument` for `operator`
    /// otherwise.
    pub fn stage(&self, operator: &str) -> Result<&Stage, EvalError> {
        self.as_stage()
            .ok_or_else(|| EvalError::invalid_argument(operator, "expected a query term"))
    }
}

impl fmt::Debug for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Value(value) => write!(f, "{:?}", value),
            Operand::Stage(stage) => write!(f, "{:?}", stage),
            Operand::List(items) => f.debug_list().entries(items).finish(),
        }
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Value(value)
    }
}

/// One compiled operator call: the resolved operator and its compiled
/// arguments.
#[derive(Clone)]
pub struct Stage {
    name: String,
    operator: Arc<dyn Operator>,
    args: Vec<Operand>,
}

impl Stage {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[Operand] {
        &self.args
    }

    /// Applies the operator to `input`.
    pub fn run(&self, input: &Value) -> Result<Value, EvalError> {
        trace!(operator = %self.name, input = input.type_name(), "running stage");
        self.operator.apply(input, &self.args)
    }
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tuple = f.debug_tuple(&self.name);
        for arg in &self.args {
            tuple.field(arg);
        }
        tuple.finish()
    }
}

/// Operator implementations by name.
#[derive(Clone, Default)]
pub struct OperatorRegistry {
    operators: HashMap<String, Arc<dyn Operator>>,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `operator` under `name`, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, operator: impl Operator + 'static) -> &mut Self {
        self.operators.insert(name.into(), Arc::new(operator));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Operator>> {
        self.operators.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operators.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.operators.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}

impl fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

static DEFAULT_OPERATORS: Lazy<OperatorRegistry> = Lazy::new(|| {
    let mut registry = OperatorRegistry::new();
    operators::register_defaults(&mut registry);
    registry
});

/// The built-in operator library, shared by every evaluator.
pub fn default_operators() -> &'static OperatorRegistry {
    &DEFAULT_OPERATORS
}

/// Per-call settings for [`Evaluator::execute`].
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Operators looked up before the defaults
    pub operators: OperatorRegistry,

    /// Values of `$1`, `$2`, ...
    pub parameters: Vec<Value>,
}

impl ExecuteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn operator(mut self, name: impl Into<String>, operator: impl Operator + 'static) -> Self {
        self.operators.register(name, operator);
        self
    }

    pub fn parameters(mut self, parameters: Vec<Value>) -> Self {
        self.parameters = parameters;
        self
    }
}

/// Operator lookup for one call: caller operators first, then defaults.
struct Scope<'a> {
    local: &'a OperatorRegistry,
    defaults: &'a OperatorRegistry,
}

impl Scope<'_> {
    fn resolve(&self, name: &str) -> Result<Arc<dyn Operator>, EvalError> {
        self.local
            .get(name)
            .or_else(|| self.defaults.get(name))
            .cloned()
            .ok_or_else(|| EvalError::UnknownOperator(name.to_string()))
    }

    fn compile(&self, node: &QueryNode) -> Result<Stage, EvalError> {
        let operator = self.resolve(&node.name)?;
        let args = node
            .args
            .iter()
            .map(|arg| self.compile_arg(arg))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Stage {
            name: node.name.clone(),
            operator,
            args,
        })
    }

    fn compile_arg(&self, arg: &Arg) -> Result<Operand, EvalError> {
        match arg {
            Arg::Node(node) => Ok(Operand::Stage(self.compile(node)?)),
            Arg::Value(value) => Ok(Operand::Value(value.clone())),
            Arg::Tuple(items) => Ok(Operand::List(
                items
                    .iter()
                    .map(|item| self.compile_arg(item))
                    .collect::<Result<Vec<_>, _>>()?,
            )),
        }
    }
}

/// Runs queries against in-memory values.
///
/// # Examples
///
/// ```
/// use rql::{Evaluator, ExecuteOptions, Value};
/// use serde_json::json;
///
/// let people = Value::from(json!([
///     { "name": "Alice", "age": 30 },
///     { "name": "Bob", "age": 25 },
/// ]));
///
/// let evaluator = Evaluator::new();
/// let result = evaluator.execute("age=lt=28&values(name)", &ExecuteOptions::new(), &people).unwrap();
/// assert_eq!(result, Value::from(json!(["Bob"])));
/// ```
#[derive(Debug, Clone)]
pub struct Evaluator {
    parser: Parser,
    defaults: &'static OperatorRegistry,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Self::with_parser(Parser::new())
    }

    pub fn with_parser(parser: Parser) -> Self {
        Evaluator {
            parser,
            defaults: default_operators(),
        }
    }

    pub fn parser(&self) -> &Parser {
        &self.parser
    }

    /// Resolves every operator of `query` and compiles its arguments.
    /// Nothing runs; an unknown operator anywhere fails here.
    pub fn compile(&self, query: &QueryNode, operators: &OperatorRegistry) -> Result<Stage, EvalError> {
        let scope = Scope {
            local: operators,
            defaults: self.defaults,
        };
        let stage = scope.compile(query)?;
        debug!(query = %query, "compiled query");
        if let Some(reducer) = reducer_before_end(query) {
            warn!(query = %query, reducer, "terms after a reducer run against its scalar result");
        }
        Ok(stage)
    }

    /// Parses (unless already parsed), compiles and runs `query` against
    /// `target`.
    pub fn execute(
        &self,
        query: impl Into<QuerySource>,
        options: &ExecuteOptions,
        target: &Value,
    ) -> Result<Value, EvalError> {
        let query = self.parser.parse(query, &options.parameters)?;
        let stage = self.compile(&query, &options.operators)?;
        stage.run(target)
    }
}

/// Name of a top-level reducer that is not the last term.
fn reducer_before_end(query: &QueryNode) -> Option<&str> {
    if query.name != ROOT_NAME {
        return None;
    }
    let (_, leading) = query.args.split_last()?;
    leading
        .iter()
        .filter_map(Arg::as_node)
        .map(|node| node.name.as_str())
        .find(|name| SCALAR_OPERATORS.contains(name))
}

/// Runs `query` against `target` with the built-in operators plus
/// `options.operators`.
pub fn execute_query(
    query: impl Into<QuerySource>,
    options: &ExecuteOptions,
    target: &Value,
) -> Result<Value, EvalError> {
    Evaluator::new().execute(query, options, target)
}
