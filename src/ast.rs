//! # Resource Query Language - Abstract Syntax Tree
//!
//! A query is a tree of operator calls. The root is an implicit
//! conjunction whose terms run one after another against the input:
//!
//! ```text
//! age=lt=30&sort(-age)&limit(10)
//! ```
//!
//! parses to
//!
//! ```text
//! and(lt(age,30),sort(-age),limit(10))
//! ```
//!
//! ## Submodules
//!
//! - **[tokens]** - structural tokens produced by the lexer
//! - **[node]** - [`QueryNode`] and its arguments, traversal and canonical text
//! - **[operators]** - conjunctions and the FIQL symbol table
//!
//! ## Arguments
//!
//! Every argument is one of
//!
//! - a nested call: `or(eq(a,1),eq(b,2))`
//! - a scalar produced by a converter: `30`, `date:2024-01-01`, `re:^bo`
//! - a tuple literal: `(1,2,3)` or the slash form `a/b/c`
//!
//! Tuples are what a parenthesised group without a leading operator name
//! becomes, which is how `between(age,(20,30))` gets its range.
pub mod node;
pub mod operators;
pub mod tokens;

pub use node::{Arg, QueryCache, QueryNode, ROOT_NAME};
pub use operators::{Conjunction, LAST_SEEN, SCALAR_OPERATORS, fiql_operator};
pub use tokens::Token;
