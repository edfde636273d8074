// tests/cli_tests.rs
#![cfg(feature = "cli")]

use rql::{
    NormalizeOptions, Value,
    cli::{CheckOptions, CheckResult, CliError, execute_check, format_query, normalize_query},
};
use serde_json::json;

const INPUT: &str = r#"[
    { "id": 1, "name": "Alice", "age": 30 },
    { "id": 2, "name": "Bob", "age": 25 }
]"#;

fn check(query: &str) -> CheckOptions {
    CheckOptions {
        query: query.to_string(),
        input: Some(INPUT.to_string()),
        ..CheckOptions::default()
    }
}

// ============================================================================
// check
// ============================================================================

#[test]
fn test_check_executes() {
    let result = execute_check(&check("age=lt=28&values(name)")).unwrap();
    match result {
        CheckResult::Success(value) => assert_eq!(value, Value::from(json!(["Bob"]))),
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn test_check_accepts_leading_question_mark() {
    let result = execute_check(&check("?count()")).unwrap();
    assert!(matches!(result, CheckResult::Success(Value::Integer(2))));
}

#[test]
fn test_check_parameters() {
    let mut options = check("eq(name,$1)&values(id)");
    options.params = vec!["Alice".to_string()];
    let result = execute_check(&options).unwrap();
    assert!(matches!(result, CheckResult::Success(ref v) if *v == Value::from(json!([1]))));
}

#[test]
fn test_check_syntax_only() {
    let options = CheckOptions {
        query: "age>20&sort(-age)".to_string(),
        syntax_only: true,
        ..CheckOptions::default()
    };
    match execute_check(&options).unwrap() {
        CheckResult::SyntaxValid(canonical) => assert_eq!(canonical, "gt(age,20)&sort(-age)"),
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn test_check_without_input() {
    let options = CheckOptions {
        query: "count()".to_string(),
        ..CheckOptions::default()
    };
    assert!(matches!(execute_check(&options), Err(CliError::NoInput)));
}

#[test]
fn test_check_errors() {
    assert!(matches!(execute_check(&check("eq(a,1")), Err(CliError::Parse(_))));
    assert!(matches!(execute_check(&check("nope()")), Err(CliError::Eval(_))));

    let mut options = check("count()");
    options.input = Some("{not json".to_string());
    assert!(matches!(execute_check(&options), Err(CliError::Json(_))));
}

// ============================================================================
// format / normalize
// ============================================================================

#[test]
fn test_format_query() {
    assert_eq!(format_query("name=Bob&tags/0=red").unwrap(), "eq(name,Bob)&eq((tags,0),red)");
    assert!(format_query("a=1&b=2|c=3").is_err());
}

#[test]
fn test_normalize_query() {
    let normalized = normalize_query("sku=A1&limit(500,10)", &NormalizeOptions::default().primary_key("sku").hard_limit(100)).unwrap();
    assert_eq!(normalized["primaryKey"], json!("A1"));
    assert_eq!(normalized["limit"], json!(100));
    assert_eq!(normalized["skip"], json!(10));
    assert_eq!(normalized["needCount"], json!(true));
}
