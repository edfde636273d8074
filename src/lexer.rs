use std::collections::VecDeque;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    ast::{Conjunction, Token, fiql_operator},
    parser::ParseError,
};

/// Runs containing a `/` outside parentheses: `a/b/c`
static SLASHED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[+*$\-:A-Za-z0-9_%.]*/[+*$\-:A-Za-z0-9_%./]*").expect("valid slash pattern")
});

/// `<property><operator><value>` where the operator is a comparison symbol
/// or an explicit `=name=`.
static FIQL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(\([+*$\-:A-Za-z0-9_%.,]+\)|[+*$\-:A-Za-z0-9_%.]*|)",
        r"([<>!]?=(?:[A-Za-z0-9_]*=)?|>|<)",
        r"(\([+*$\-:A-Za-z0-9_%.,]+\)|[+*$\-:A-Za-z0-9_%.]*|)",
    ))
    .expect("valid FIQL pattern")
});

/// One structural step: `)`, or an optional delimiter, a word and an
/// optional `(`.
static STRUCTURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\))|([&|,])?([+*$\-:A-Za-z0-9_%.]*)(\(?)").expect("valid structure pattern")
});

/// Rewrites every shorthand form into plain call syntax.
///
/// ```
/// use rql::lexer::canonicalize;
///
/// assert_eq!(canonicalize("age=lt=30&name=Bob").unwrap(), "lt(age,30)&eq(name,Bob)");
/// assert_eq!(canonicalize("price%3E=10").unwrap(), "ge(price,10)");
/// assert_eq!(canonicalize("sort(a/b)").unwrap(), "sort((a,b))");
/// ```
pub fn canonicalize(query: &str) -> Result<String, ParseError> {
    let query = substitute_symbols(query);
    let query = expand_slashes(&query);
    canonicalize_fiql(&query)
}

/// Encoded angle brackets become explicit operators: `%3C=` is `=le=`.
pub fn substitute_symbols(query: &str) -> String {
    query
        .replace("%3C=", "=le=")
        .replace("%3E=", "=ge=")
        .replace("%3C", "=lt=")
        .replace("%3E", "=gt=")
}

/// `a/b/c` becomes the tuple `(a,b,c)`.
pub fn expand_slashes(query: &str) -> String {
    if !query.contains('/') {
        return query.to_string();
    }
    SLASHED
        .replace_all(query, |caps: &regex::Captures| format!("({})", caps[0].replace('/', ",")))
        .into_owned()
}

/// `property<op>value` becomes `name(property,value)`.
pub fn canonicalize_fiql(query: &str) -> Result<String, ParseError> {
    let mut out = String::with_capacity(query.len() + 8);
    let mut last = 0;
    for caps in FIQL.captures_iter(query) {
        let Some(whole) = caps.get(0) else { continue };
        let symbol = &caps[2];
        let operator = if symbol.len() < 3 {
            fiql_operator(symbol).ok_or_else(|| ParseError::IllegalOperator(symbol.to_string()))?
        } else {
            &symbol[1..symbol.len() - 1]
        };
        out.push_str(&query[last..whole.start()]);
        out.push_str(&format!("{}({},{})", operator, &caps[1], &caps[3]));
        last = whole.end();
    }
    out.push_str(&query[last..]);
    Ok(out)
}

/// Splits a canonical query into structural tokens.
///
/// Characters that fit no token are skipped and collected; after
/// [`Token::Eof`] they are available from [`Lexer::residue`].
pub struct Lexer {
    input: String,
    position: usize,
    pending: VecDeque<Token>,
    residue: String,
}

impl Lexer {
    pub fn new(canonical: impl Into<String>) -> Self {
        Lexer {
            input: canonical.into(),
            position: 0,
            pending: VecDeque::new(),
            residue: String::new(),
        }
    }

    /// Characters the scan could not consume so far.
    pub fn residue(&self) -> &str {
        &self.residue
    }

    pub fn next_token(&mut self) -> Token {
        loop {
            if let Some(token) = self.pending.pop_front() {
                return token;
            }
            if self.position >= self.input.len() {
                return Token::Eof;
            }
            self.scan();
        }
    }

    fn scan(&mut self) {
        let Some(caps) = STRUCTURE.captures_at(&self.input, self.position) else {
            self.residue.push_str(&self.input[self.position..]);
            self.position = self.input.len();
            return;
        };
        let Some(whole) = caps.get(0) else { return };

        if whole.is_empty() {
            // Nothing matches here: the character is illegal.
            let ch = self.input[whole.start()..].chars().next().unwrap_or_default();
            self.residue.push_str(&self.input[self.position..whole.start()]);
            self.residue.push(ch);
            self.position = whole.start() + ch.len_utf8().max(1);
            return;
        }

        self.residue.push_str(&self.input[self.position..whole.start()]);
        self.position = whole.end();

        if caps.get(1).is_some() {
            self.pending.push_back(Token::Close);
            return;
        }

        let delimiter = caps.get(2).map(|m| m.as_str());
        let word = caps.get(3).map_or("", |m| m.as_str()).to_string();
        let open = caps.get(4).is_some_and(|m| !m.is_empty());

        if let Some(conjunction) = delimiter
            .and_then(|d| d.chars().next())
            .and_then(Conjunction::from_delimiter)
        {
            self.pending.push_back(Token::Conjunction(conjunction));
        }
        if open {
            self.pending.push_back(Token::Open(word));
        } else if !word.is_empty() || delimiter == Some(",") {
            self.pending.push_back(Token::Value(word));
        }
    }
}

#[cfg(test)]
fn tokens(input: &str) -> Vec<Token> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        match lexer.next_token() {
            Token::Eof => return tokens,
            token => tokens.push(token),
        }
    }
}

#[test]
fn test_call_tokens() {
    assert_eq!(
        tokens("eq(a,1)&sort(-b)"),
        vec![
            Token::Open("eq".into()),
            Token::Value("a".into()),
            Token::Value("1".into()),
            Token::Close,
            Token::Conjunction(Conjunction::And),
            Token::Open("sort".into()),
            Token::Value("-b".into()),
            Token::Close,
        ]
    );
}

#[test]
fn test_trailing_comma_is_empty_value() {
    assert_eq!(
        tokens("f(a,)"),
        vec![
            Token::Open("f".into()),
            Token::Value("a".into()),
            Token::Value("".into()),
            Token::Close,
        ]
    );
}

#[test]
fn test_residue() {
    let mut lexer = Lexer::new("eq(a b)");
    while lexer.next_token() != Token::Eof {}
    assert_eq!(lexer.residue(), " ");
}

#[test]
fn test_fiql_explicit_operator() {
    assert_eq!(canonicalize_fiql("a=in=(1,2)").unwrap(), "in(a,(1,2))");
    assert_eq!(canonicalize_fiql("a!=b").unwrap(), "ne(a,b)");
}
