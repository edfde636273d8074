//! # rql
//!
//! Resource Query Language: a compact, URL-safe grammar for filtering,
//! sorting, projecting and paging collections, plus an engine that runs
//! those queries against in-memory JSON-like data.
//!
//! ```
//! use rql::{ExecuteOptions, Value, execute_query};
//! use serde_json::json;
//!
//! let people = Value::from(json!([
//!     { "name": "Alice", "age": 30 },
//!     { "name": "Bob", "age": 25 },
//!     { "name": "Carol", "age": 35 },
//! ]));
//!
//! let result = execute_query("age=gt=26&sort(-age)&values(name)", &ExecuteOptions::new(), &people).unwrap();
//! assert_eq!(result, Value::from(json!(["Carol", "Alice"])));
//! ```
pub mod ast;
pub mod converter;
pub mod encode;
pub mod evaluator;
pub mod lexer;
pub mod normalize;
pub mod operators;
pub mod output;
pub mod parser;
pub mod path;
pub mod value;

#[cfg(feature = "cli")]
pub mod cli;

pub use ast::{Arg, QueryCache, QueryNode, Token};
pub use converter::{ConversionError, Converter};
pub use evaluator::{
    EvalError, Evaluator, ExecuteOptions, Operand, Operator, OperatorRegistry, Stage, default_operators,
    execute_query,
};
pub use lexer::Lexer;
pub use normalize::{FieldSpec, NormalizeOptions, NormalizedQuery};
pub use output::{to_json, to_json_pretty};
pub use parser::{Parenthesis, ParseError, Parser, ParserOptions, QuerySource, parse, parse_gently};
pub use value::{Page, Pattern, Record, Value};
