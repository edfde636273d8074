use std::fmt;

use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    ast::{Arg, LAST_SEEN, QueryCache, QueryNode, ROOT_NAME, Token},
    converter::{ConversionError, Converter},
    lexer::{self, Lexer},
    value::Value,
};

/// Errors raised while parsing query text.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("Query must not start with ?")]
    IllegalLeadingQuestionMark,

    #[error("Illegal operator {0}")]
    IllegalOperator(String),

    #[error("Cannot mix conjunctions within a group, use parentheses around each set of same conjunctions (& and |)")]
    MixedConjunction,

    #[error("{0}")]
    UnbalancedParenthesis(Parenthesis),

    #[error("Illegal character in query string encountered {0}")]
    IllegalCharacter(String),

    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

/// Which side of a parenthesis pair is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parenthesis {
    /// `(` that is never closed
    Unclosed,
    /// `)` with no `(` to close
    Unopened,
}

impl fmt::Display for Parenthesis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parenthesis::Unclosed => f.write_str("Opening parenthesis without a closing parenthesis"),
            Parenthesis::Unopened => f.write_str("Closing parenthesis without an opening parenthesis"),
        }
    }
}

/// Parser settings.
#[derive(Debug, Clone)]
pub struct ParserOptions {
    /// Attribute whose `eq` value is cached as the primary-key hint
    pub primary_key: String,

    /// Operators whose last argument list is cached on the root
    pub last_seen: Vec<String>,

    /// Strip a single leading `?` instead of rejecting the query
    pub allow_leading_question_mark: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        ParserOptions {
            primary_key: "id".to_string(),
            last_seen: LAST_SEEN.iter().map(|name| name.to_string()).collect(),
            allow_leading_question_mark: false,
        }
    }
}

impl ParserOptions {
    pub fn primary_key(mut self, name: impl Into<String>) -> Self {
        self.primary_key = name.into();
        self
    }

    pub fn last_seen<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.last_seen = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn allow_leading_question_mark(mut self, allow: bool) -> Self {
        self.allow_leading_question_mark = allow;
        self
    }
}

/// Anything a query can be parsed from.
#[derive(Debug, Clone)]
pub enum QuerySource {
    /// RQL text
    Text(String),

    /// Already parsed; returned as is
    Node(QueryNode),

    /// Attribute/value pairs, each becoming an `eq` term
    Pairs(Vec<(String, Value)>),
}

impl From<&str> for QuerySource {
    fn from(text: &str) -> Self {
        QuerySource::Text(text.to_string())
    }
}

impl From<String> for QuerySource {
    fn from(text: String) -> Self {
        QuerySource::Text(text)
    }
}

impl From<&String> for QuerySource {
    fn from(text: &String) -> Self {
        QuerySource::Text(text.clone())
    }
}

impl From<QueryNode> for QuerySource {
    fn from(node: QueryNode) -> Self {
        QuerySource::Node(node)
    }
}

impl From<Vec<(String, Value)>> for QuerySource {
    fn from(pairs: Vec<(String, Value)>) -> Self {
        QuerySource::Pairs(pairs)
    }
}

impl From<&serde_json::Map<String, serde_json::Value>> for QuerySource {
    fn from(map: &serde_json::Map<String, serde_json::Value>) -> Self {
        QuerySource::Pairs(
            map.iter()
                .map(|(key, value)| (key.clone(), Value::from(value.clone())))
                .collect(),
        )
    }
}

/// Turns RQL text into a [`QueryNode`] tree.
///
/// # Examples
///
/// ```
/// use rql::Parser;
///
/// let query = Parser::new().parse("age=lt=30&name=Bob", &[]).unwrap();
/// assert_eq!(query.to_string(), "lt(age,30)&eq(name,Bob)");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Parser {
    options: ParserOptions,
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ParserOptions) -> Self {
        Parser { options }
    }

    /// Parses a query. `parameters` supplies the values of `$1`, `$2`, ...
    pub fn parse(
        &self,
        query: impl Into<QuerySource>,
        parameters: &[Value],
    ) -> Result<QueryNode, ParseError> {
        match query.into() {
            QuerySource::Node(node) => Ok(node),
            QuerySource::Pairs(pairs) => {
                let mut root = QueryNode::root();
                for (key, value) in pairs {
                    root.push(QueryNode::call("eq", vec![Arg::from(key.as_str()), Arg::Value(value)]));
                }
                Ok(root)
            }
            QuerySource::Text(text) => self.parse_text(&text, parameters),
        }
    }

    /// Like [`Parser::parse`], but a failure yields an empty root whose
    /// `error` holds the message.
    pub fn parse_gently(&self, query: impl Into<QuerySource>, parameters: &[Value]) -> QueryNode {
        match self.parse(query, parameters) {
            Ok(node) => node,
            Err(error) => {
                warn!(%error, "query failed to parse");
                let mut node = QueryNode::root();
                node.error = Some(error.to_string());
                node
            }
        }
    }

    fn parse_text(&self, query: &str, parameters: &[Value]) -> Result<QueryNode, ParseError> {
        let query = match query.strip_prefix('?') {
            Some(rest) if self.options.allow_leading_question_mark => rest,
            Some(_) => return Err(ParseError::IllegalLeadingQuestionMark),
            None => query,
        };

        let canonical = lexer::canonicalize(query)?;
        debug!(query, canonical = %canonical, "parsing query");

        let mut lexer = Lexer::new(canonical);
        let mut root = QueryNode::new("");
        let mut open: Vec<QueryNode> = Vec::new();
        let mut cache = QueryCache::default();

        loop {
            match lexer.next_token() {
                Token::Eof => break,
                Token::Open(name) => open.push(QueryNode::new(name)),
                Token::Close => {
                    let Some(node) = open.pop() else {
                        return Err(ParseError::UnbalancedParenthesis(Parenthesis::Unopened));
                    };
                    self.remember(&mut cache, &node);
                    let parent = open.last_mut().unwrap_or(&mut root);
                    if node.name.is_empty() {
                        parent.args.push(Arg::Tuple(node.args));
                    } else {
                        parent.args.push(Arg::Node(node));
                    }
                }
                Token::Conjunction(conjunction) => {
                    let current = open.last_mut().unwrap_or(&mut root);
                    if current.name.is_empty() {
                        current.name = conjunction.name().to_string();
                    } else if current.name != conjunction.name() {
                        return Err(ParseError::MixedConjunction);
                    }
                }
                Token::Value(token) => {
                    let value = string_to_value(&token, parameters)?;
                    open.last_mut().unwrap_or(&mut root).args.push(Arg::Value(value));
                }
            }
        }

        if !open.is_empty() {
            return Err(ParseError::UnbalancedParenthesis(Parenthesis::Unclosed));
        }
        if !lexer.residue().is_empty() {
            return Err(ParseError::IllegalCharacter(lexer.residue().to_string()));
        }

        if root.name.is_empty() {
            root.name = ROOT_NAME.to_string();
        }
        root.cache = cache;
        Ok(root)
    }

    /// Records last-seen argument lists and the primary-key hint for a
    /// closed call.
    fn remember(&self, cache: &mut QueryCache, node: &QueryNode) {
        if self.options.last_seen.iter().any(|name| *name == node.name) {
            cache.last_seen.insert(node.name.clone(), node.args.clone());
        }

        let first = node.args.first().and_then(Arg::as_value).and_then(Value::as_str);
        if node.name == "eq" && first == Some(self.options.primary_key.as_str()) {
            let id = node.args.get(1).and_then(Arg::to_value).unwrap_or(Value::Undefined);
            let id = if id.is_truthy() && !matches!(id, Value::Regex(_)) {
                Value::String(id.to_text())
            } else {
                id
            };
            cache.primary_key = Some(id);
        }
    }
}

/// Converts one argument token.
///
/// `$N` reads the N-th (1-based) parameter, `name:raw` applies the named
/// converter to `raw`, and anything else goes through [`Converter::Auto`].
///
/// # Examples
///
/// ```
/// use rql::{Value, parser::string_to_value};
///
/// assert_eq!(string_to_value("$2", &[Value::from(1), Value::from(2)]).unwrap(), Value::from(2));
/// assert_eq!(string_to_value("$3", &[]).unwrap(), Value::Undefined);
/// assert_eq!(string_to_value("number:42", &[]).unwrap(), Value::from(42));
/// ```
pub fn string_to_value(token: &str, parameters: &[Value]) -> Result<Value, ParseError> {
    if let Some(reference) = token.strip_prefix('$') {
        let digits: String = reference.chars().take_while(char::is_ascii_digit).collect();
        let value = digits
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|index| parameters.get(index))
            .cloned()
            .unwrap_or(Value::Undefined);
        return Ok(value);
    }

    if let Some((prefix, raw)) = token.split_once(':') {
        let converter = Converter::from_name(prefix)
            .ok_or_else(|| ConversionError::UnknownConverter(prefix.to_string()))?;
        return Ok(converter.convert(raw)?);
    }

    Ok(Converter::Auto.convert(token)?)
}

/// Parses with default options.
pub fn parse(query: impl Into<QuerySource>, parameters: &[Value]) -> Result<QueryNode, ParseError> {
    Parser::new().parse(query, parameters)
}

/// [`Parser::parse_gently`] with default options.
pub fn parse_gently(query: impl Into<QuerySource>, parameters: &[Value]) -> QueryNode {
    Parser::new().parse_gently(query, parameters)
}
