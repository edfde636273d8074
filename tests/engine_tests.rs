// tests/engine_tests.rs

use rql::{
    EvalError, Evaluator, ExecuteOptions, Operand, OperatorRegistry, Value, default_operators,
    execute_query, parse, to_json,
};
use serde_json::json;

fn people() -> Value {
    Value::from(json!([
        { "name": "Alice", "age": 30, "city": "Oslo", "tags": ["admin", "dev"], "salary": 100 },
        { "name": "Bob", "age": 25, "city": "Bergen", "tags": ["dev"], "salary": 80 },
        { "name": "Carol", "age": 35, "city": "Oslo", "tags": [], "salary": 120 },
        {
            "name": "Dave", "age": 25, "city": "Bergen", "tags": ["ops"], "salary": 90,
            "address": { "city": "Tromso", "zip": "9008" }
        },
    ]))
}

fn run(query: &str, target: &Value) -> Value {
    execute_query(query, &ExecuteOptions::new(), target).unwrap()
}

fn run_err(query: &str, target: &Value) -> EvalError {
    execute_query(query, &ExecuteOptions::new(), target).unwrap_err()
}

fn names(query: &str) -> Value {
    run(&format!("{}&values(name)", query), &people())
}

fn strings(items: &[&str]) -> Value {
    Value::array(items.iter().map(|s| Value::from(*s)).collect())
}

// ============================================================================
// Comparison filters
// ============================================================================

#[test]
fn test_eq_and_ne() {
    assert_eq!(names("city=Oslo"), strings(&["Alice", "Carol"]));
    assert_eq!(names("ne(city,Oslo)"), strings(&["Bob", "Dave"]));
}

#[test]
fn test_relational_filters() {
    assert_eq!(names("age=ge=30"), strings(&["Alice", "Carol"]));
    assert_eq!(names("age=lt=30"), strings(&["Bob", "Dave"]));
    assert_eq!(names("age=le=25"), strings(&["Bob", "Dave"]));
    assert_eq!(names("age>30"), strings(&["Carol"]));
}

#[test]
fn test_strings_compare_lexically() {
    assert_eq!(names("name=gt=Bob"), strings(&["Carol", "Dave"]));
}

#[test]
fn test_filter_on_scalars() {
    let result = run("values(age)&gt(26)", &people());
    assert_eq!(result, Value::from(json!([30, 35])));
}

#[test]
fn test_missing_attribute_equals_undefined() {
    assert_eq!(names("eq(nickname,undefined)"), strings(&["Alice", "Bob", "Carol", "Dave"]));
}

#[test]
fn test_nested_path() {
    assert_eq!(names("eq(address/city,Tromso)"), strings(&["Dave"]));
    assert_eq!(names("eq((address,zip),string:9008)"), strings(&["Dave"]));
}

#[test]
fn test_array_index_path() {
    assert_eq!(names("eq(tags/0,dev)"), strings(&["Bob"]));
}

#[test]
fn test_between_is_half_open() {
    assert_eq!(names("between(age,(25,35))"), strings(&["Alice", "Bob", "Dave"]));
}

#[test]
fn test_between_requires_range() {
    assert!(matches!(
        run_err("between(age,5)", &people()),
        EvalError::InvalidArgument { .. }
    ));
}

#[test]
fn test_match() {
    assert_eq!(names("match(name,a)"), strings(&["Alice", "Carol", "Dave"]));
    assert_eq!(names("matchcase(name,A)"), strings(&["Alice"]));
    assert_eq!(names("match(name,glob:*o*)"), strings(&["Bob", "Carol"]));
}

#[test]
fn test_match_invalid_pattern() {
    assert!(matches!(
        run_err("match(name,%28)", &people()),
        EvalError::InvalidPattern { .. }
    ));
}

#[test]
fn test_in_and_out() {
    assert_eq!(names("in(name,(Alice,Bob))"), strings(&["Alice", "Bob"]));
    assert_eq!(names("out(name,(Alice,Bob))"), strings(&["Carol", "Dave"]));
    assert_eq!(names("in(name,Bob)"), strings(&["Bob"]));
    assert_eq!(names("age=in=(25,35)"), strings(&["Bob", "Carol", "Dave"]));
}

#[test]
fn test_contains_and_excludes() {
    assert_eq!(names("contains(tags,dev)"), strings(&["Alice", "Bob"]));
    assert_eq!(names("excludes(tags,dev)"), strings(&["Carol", "Dave"]));
}

#[test]
fn test_contains_with_query_term() {
    assert_eq!(names("contains(tags,eq(ops))"), strings(&["Dave"]));
    assert_eq!(names("contains(tags,match(ad))"), strings(&["Alice"]));
}

// ============================================================================
// Conjunctions
// ============================================================================

#[test]
fn test_and() {
    assert_eq!(names("and(city=Oslo,age=gt=30)"), strings(&["Carol"]));
    assert_eq!(names("city=Oslo&age=gt=30"), strings(&["Carol"]));
}

#[test]
fn test_or_keeps_branch_order() {
    assert_eq!(
        names("or(city=Oslo,age=lt=26)"),
        strings(&["Alice", "Carol", "Bob", "Dave"])
    );
}

#[test]
fn test_or_drops_repeated_records() {
    assert_eq!(names("or(city=Oslo,name=Alice)"), strings(&["Alice", "Carol"]));
    assert_eq!(names("(city=Oslo|name=Alice)"), strings(&["Alice", "Carol"]));
}

#[test]
fn test_top_level_or() {
    let result = run("name=Bob|name=Carol", &people());
    assert_eq!(result.as_array().map(<[Value]>::len), Some(2));
}

// ============================================================================
// Projections
// ============================================================================

#[test]
fn test_select() {
    let result = run("select(name,age)&limit(1)", &people());
    assert_eq!(result, Value::from(json!([{ "name": "Alice", "age": 30 }])));
}

#[test]
fn test_select_skips_missing_attributes() {
    let result = run("select(name,nickname)&first()", &people());
    assert_eq!(result, Value::from(json!({ "name": "Alice" })));
}

#[test]
fn test_unselect() {
    let result = run("unselect(tags,salary,city)&first()", &people());
    assert_eq!(result, Value::from(json!({ "name": "Alice", "age": 30 })));
}

#[test]
fn test_values() {
    assert_eq!(
        run("eq(name,Bob)&values()", &people()),
        Value::from(json!([["Bob", 25, "Bergen", ["dev"], 80]]))
    );
    assert_eq!(
        run("values(name,age)&first()", &people()),
        Value::from(json!(["Alice", 30]))
    );
}

#[test]
fn test_select_keeps_attribute_order() {
    let result = run("select(age,name)&first()", &people());
    assert_eq!(to_json(&result), r#"{"age":30,"name":"Alice"}"#);
}

// ============================================================================
// Sort, limit, distinct, recurse
// ============================================================================

#[test]
fn test_sort_multiple_keys() {
    assert_eq!(names("sort(-age,name)"), strings(&["Carol", "Alice", "Bob", "Dave"]));
    assert_eq!(names("sort(+age,-name)"), strings(&["Dave", "Bob", "Alice", "Carol"]));
}

#[test]
fn test_sort_is_stable() {
    assert_eq!(names("sort(city)"), strings(&["Bob", "Dave", "Alice", "Carol"]));
}

#[test]
fn test_later_sort_wins() {
    assert_eq!(names("sort(-age)&sort(+age)"), names("sort(+age)"));
    assert_eq!(names("sort(+age)"), strings(&["Bob", "Dave", "Alice", "Carol"]));
}

#[test]
fn test_sort_leaves_input_alone() {
    let target = people();
    run("sort(-age)", &target);
    assert_eq!(target, people());
}

#[test]
fn test_sort_by_nested_path() {
    let target = Value::from(json!([
        { "id": 1, "meta": { "rank": 3 } },
        { "id": 2, "meta": { "rank": 1 } },
        { "id": 3, "meta": { "rank": 2 } },
    ]));
    let result = run("sort(-meta/rank)&values(id)", &target);
    assert_eq!(result, Value::from(json!([1, 3, 2])));
}

#[test]
fn test_limit() {
    let letters = strings(&["a", "b", "c", "d"]);
    assert_eq!(run("limit(2)", &letters), strings(&["a", "b"]));
    assert_eq!(run("limit(2,1)", &letters), strings(&["b", "c"]));
    assert_eq!(run("limit(10,3)", &letters), strings(&["d"]));
}

#[test]
fn test_limit_page() {
    let letters = strings(&["a", "b", "c", "d"]);
    let result = run("limit(2,1,10)", &letters);

    let page = result.page().unwrap();
    assert_eq!(page.start, 1);
    assert_eq!(page.end, 2);
    assert_eq!(page.total_count, 4);
    assert_eq!(result.as_array().unwrap(), strings(&["b", "c"]).as_array().unwrap());
    assert_eq!(to_json(&result), r#"["b","c"]"#);
}

#[test]
fn test_limit_page_past_the_end() {
    let letters = strings(&["a", "b"]);
    let page = run("limit(2,10,5)", &letters);
    let page = page.page().unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.start, 10);
    assert_eq!(page.end, 9);
}

#[test]
fn test_limit_page_huge_start() {
    let letters = strings(&["a", "b"]);
    let result = run("limit(1,9223372036854775808,10)", &letters);
    let page = result.page().unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.end, i64::MAX - 1);
    assert_eq!(page.total_count, 2);
}

#[test]
fn test_limit_page_total_capped_by_max_count() {
    let letters = strings(&["a", "b", "c", "d"]);
    let result = run("limit(1,0,3)", &letters);
    assert_eq!(result.page().unwrap().total_count, 3);
}

#[test]
fn test_distinct_scalars_keep_type() {
    let target = Value::from(json!([1, 1, 2, "2", "a", "a"]));
    assert_eq!(run("distinct()", &target), Value::from(json!([1, 2, "2", "a"])));
}

#[test]
fn test_distinct_records_by_identity() {
    let target = Value::from(json!([{ "a": 1 }, { "a": 1 }]));
    assert_eq!(run("distinct()", &target), target);

    let doubled = run("or(eq(a,1),eq(a,1))&count()", &target);
    assert_eq!(doubled, Value::Integer(2));
}

#[test]
fn test_recurse() {
    let tree = Value::from(json!({
        "name": "root",
        "children": [
            { "name": "a", "children": [{ "name": "b" }] },
            { "name": "c" },
        ],
    }));
    assert_eq!(run("recurse(children)&values(name)", &tree), strings(&["root", "a", "b", "c"]));
    assert_eq!(run("recurse()&values(name)", &tree), strings(&["root", "a", "b", "c"]));
}

// ============================================================================
// Reducers
// ============================================================================

#[test]
fn test_count_and_first() {
    assert_eq!(run("city=Oslo&count()", &people()), Value::Integer(2));
    let oldest = run("sort(-age)&first()", &people());
    assert_eq!(oldest.as_record().and_then(|r| r.get("name")), Some(&Value::from("Carol")));
    assert_eq!(run("name=Zed&first()", &people()), Value::Undefined);
}

#[test]
fn test_one() {
    let bob = run("name=Bob&one()", &people());
    assert_eq!(bob.as_record().and_then(|r| r.get("age")), Some(&Value::Integer(25)));
    assert_eq!(run("name=Zed&one()", &people()), Value::Undefined);
    assert_eq!(run_err("city=Oslo&one()", &people()), EvalError::Cardinality { count: 2 });
}

#[test]
fn test_sum_and_mean() {
    assert_eq!(run("sum(salary)", &people()), Value::Integer(390));
    assert_eq!(run("values(salary)&sum()", &people()), Value::Integer(390));
    assert_eq!(run("city=Oslo&mean(salary)", &people()), Value::Integer(110));
    assert_eq!(run("name=Zed&sum(salary)", &people()), Value::Undefined);
    assert!(run("name=Zed&mean(salary)", &people()).as_float().unwrap().is_nan());
}

#[test]
fn test_sum_of_decimals() {
    let target = Value::from(json!([1, 0.25, 0.5]));
    assert_eq!(run("sum()", &target), Value::Float(1.75));
}

#[test]
fn test_min_and_max() {
    assert_eq!(run("min(age)", &people()), Value::Integer(25));
    assert_eq!(run("max(age)", &people()), Value::Integer(35));
    let mixed = Value::from(json!([1, "x", 3]));
    assert!(run("max()", &mixed).as_float().unwrap().is_nan());
}

#[test]
fn test_aggregate() {
    let result = run("aggregate(city,mean(salary),count())", &people());
    assert_eq!(
        result,
        Value::from(json!([
            { "city": "Oslo", "0": 110, "1": 2 },
            { "city": "Bergen", "0": 85, "1": 2 },
        ]))
    );
}

#[test]
fn test_aggregate_multiple_keys() {
    let result = run("aggregate(city,age,count())&values(1)", &people());
    assert_eq!(result, Value::from(json!([1, 2, 1])));
    let result = run("aggregate(city,age,sum(salary))&eq(city,Bergen)&values(0)", &people());
    assert_eq!(result, Value::from(json!([170])));
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_reducer_ends_pipeline() {
    let error = run_err("count()&limit(1)", &people());
    assert_eq!(
        error,
        EvalError::ExpectedArray {
            operator: "limit".to_string(),
            found: "number",
        }
    );
    assert_eq!(error.to_string(), "limit() requires an array, got number");
}

#[test]
fn test_unknown_operator() {
    let error = run_err("eq(a,1)&frobnicate(x)", &people());
    assert_eq!(error, EvalError::UnknownOperator("frobnicate".to_string()));
    assert_eq!(error.to_string(), "Operator frobnicate is not defined");
}

#[test]
fn test_unknown_operator_fails_before_running() {
    let options = ExecuteOptions::new().operator(
        "explode",
        |_: &Value, _: &[Operand]| -> Result<Value, EvalError> { panic!("stage ran before compilation finished") },
    );
    let error = execute_query("explode()&nope()", &options, &people()).unwrap_err();
    assert_eq!(error, EvalError::UnknownOperator("nope".to_string()));
}

#[test]
fn test_parse_error_surfaces() {
    assert!(matches!(run_err("eq(a,1", &people()), EvalError::Parse(_)));
}

// ============================================================================
// Options
// ============================================================================

#[test]
fn test_parameters() {
    let options = ExecuteOptions::new().parameters(vec![Value::from("Oslo"), Value::from(30)]);
    let result = execute_query("eq(city,$1)&ge(age,$2)&values(name)", &options, &people()).unwrap();
    assert_eq!(result, strings(&["Alice", "Carol"]));
}

#[test]
fn test_custom_operator() {
    let options = ExecuteOptions::new().operator("adults", |input: &Value, _: &[Operand]| {
        let kept = input
            .as_array()
            .unwrap_or_default()
            .iter()
            .filter(|item| {
                item.as_record()
                    .and_then(|r| r.get("age"))
                    .is_some_and(|age| age.to_number() >= 30.0)
            })
            .cloned()
            .collect();
        Ok::<_, EvalError>(Value::array(kept))
    });
    let result = execute_query("adults()&values(name)", &options, &people()).unwrap();
    assert_eq!(result, strings(&["Alice", "Carol"]));
}

#[test]
fn test_custom_operator_overrides_default() {
    let options = ExecuteOptions::new()
        .operator("count", |_: &Value, _: &[Operand]| Ok::<_, EvalError>(Value::from("many")));
    let result = execute_query("count()", &options, &people()).unwrap();
    assert_eq!(result, Value::from("many"));

    assert_eq!(run("count()", &people()), Value::Integer(4));
}

#[test]
fn test_custom_operator_runs_nested_stage() {
    let options = ExecuteOptions::new().operator("twice", |input: &Value, args: &[Operand]| -> Result<Value, EvalError> {
        let stage = args[0].stage("twice")?;
        let once = stage.run(input)?;
        stage.run(&once)
    });
    let target = Value::from(json!([5, 4, 3, 2, 1]));
    let result = execute_query("twice(limit(3,1))", &options, &target).unwrap();
    assert_eq!(result, Value::from(json!([3, 2])));
}

#[test]
fn test_execute_parsed_query() {
    let query = parse("city=Bergen&count()", &[]).unwrap();
    let result = Evaluator::new().execute(query, &ExecuteOptions::new(), &people()).unwrap();
    assert_eq!(result, Value::Integer(2));
}

#[test]
fn test_compile() {
    let query = parse("sort(a)&limit(1)", &[]).unwrap();
    let stage = Evaluator::new().compile(&query, &OperatorRegistry::new()).unwrap();
    assert_eq!(stage.name(), "and");
    assert_eq!(stage.args().len(), 2);
    assert_eq!(stage.args()[0].as_stage().map(|s| s.name()), Some("sort"));
}

#[test]
fn test_default_operators() {
    let defaults = default_operators();
    for name in ["eq", "between", "or", "aggregate", "recurse", "one"] {
        assert!(defaults.contains(name), "{}", name);
    }
    assert!(!defaults.contains("reverse"));
}
