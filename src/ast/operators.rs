/// Implicit combinator of a group's terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conjunction {
    /// `&`
    And,
    /// `|`
    Or,
}

impl Conjunction {
    pub fn from_delimiter(delimiter: char) -> Option<Self> {
        match delimiter {
            '&' => Some(Conjunction::And),
            '|' => Some(Conjunction::Or),
            _ => None,
        }
    }

    /// Operator name the group node takes.
    pub fn name(self) -> &'static str {
        match self {
            Conjunction::And => "and",
            Conjunction::Or => "or",
        }
    }
}

/// Operator names whose most recent argument list the parser keeps on the
/// root node.
pub const LAST_SEEN: [&str; 4] = ["sort", "select", "values", "limit"];

/// Operators that reduce an array to a single value. Nothing may follow
/// them in a pipeline.
pub const SCALAR_OPERATORS: [&str; 7] = ["mean", "sum", "min", "max", "count", "first", "one"];

/// Resolves a FIQL comparison symbol to its operator name.
///
/// # Examples
/// ```
/// use rql::ast::fiql_operator;
///
/// assert_eq!(fiql_operator(">="), Some("ge"));
/// assert_eq!(fiql_operator("=="), Some("eq"));
/// assert_eq!(fiql_operator("=~"), None);
/// ```
pub fn fiql_operator(symbol: &str) -> Option<&'static str> {
    match symbol {
        "=" | "==" => Some("eq"),
        ">" => Some("gt"),
        ">=" => Some("ge"),
        "<" => Some("lt"),
        "<=" => Some("le"),
        "!=" => Some("ne"),
        _ => None,
    }
}
