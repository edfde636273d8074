use crate::ast::Conjunction;

/// Structural tokens of a query in canonical call syntax.
///
/// The lexer only produces these after the shorthand forms (FIQL
/// comparisons, slash arrays, encoded angle brackets) have been rewritten.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Opening parenthesis together with the name written before it
    ///
    /// # Examples
    /// ```text
    /// eq(        // Open("eq")
    /// (          // Open("")  - group or tuple literal
    /// ```
    Open(String),

    /// Closing parenthesis
    Close,

    /// `&` or `|` between terms of the current group
    Conjunction(Conjunction),

    /// Raw, still encoded, argument text
    ///
    /// A bare comma produces an empty value, so `f(a,)` has two arguments.
    ///
    /// # Examples
    /// ```text
    /// age
    /// 30
    /// date:2024-01-01
    /// $1
    /// ```
    Value(String),

    /// End of input
    Eof,
}
