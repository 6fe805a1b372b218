use futures::executor::block_on;
use symql::{Context, DataParser, EvalError, Expr, Record, Value};

fn eval(json: &str) -> Result<Value, EvalError> {
    eval_with(json, &Context::new())
}

fn eval_with(json: &str, ctx: &Context) -> Result<Value, EvalError> {
    let expr = Expr::from_json(json).expect("valid expression JSON");
    block_on(DataParser::evaluate(&expr, ctx))
}

fn json_object(pairs: Vec<(&str, Value)>) -> Value {
    let mut map = Record::new();
    for (k, v) in pairs {
        map.insert(k.to_string(), v);
    }
    Value::Object(map)
}

// ============================================================================
// Literals and symbols
// ============================================================================

#[test]
fn test_scalar_literals_evaluate_to_themselves() {
    assert_eq!(eval("42").unwrap(), Value::Integer(42));
    assert_eq!(eval("1.5").unwrap(), Value::Float(1.5));
    assert_eq!(eval("true").unwrap(), Value::Boolean(true));
    assert_eq!(eval("null").unwrap(), Value::Null);
}

#[test]
fn test_symbol_without_namespace_is_a_string() {
    assert_eq!(eval(r#""plain""#).unwrap(), Value::String("plain".into()));
}

#[test]
fn test_context_symbol_resolves() {
    let ctx = Context::new().var("user", json_object(vec![("id", Value::Integer(7))]));
    assert_eq!(eval_with(r##""#user.id""##, &ctx).unwrap(), Value::Integer(7));
}

#[test]
fn test_missing_binding_is_null() {
    assert_eq!(eval(r##""#nobody""##).unwrap(), Value::Null);
    assert_eq!(eval(r#"":field""#).unwrap(), Value::Null);
}

#[test]
fn test_context_from_json_shape() {
    let json = serde_json::json!({"#": {"limit": 3}, "@": {"t": [{"id": 1}]}});
    let ctx = Context::from_value(symql::json_to_value(json)).unwrap();
    assert_eq!(eval_with(r##""#limit""##, &ctx).unwrap(), Value::Integer(3));
    assert_eq!(
        eval_with(r#"["_size", "@t"]"#, &ctx).unwrap(),
        Value::Integer(1)
    );
}

// ============================================================================
// Quoting
// ============================================================================

#[test]
fn test_quote_returns_operand_unevaluated() {
    let result = eval(r#"["$quote", ["=", ":a", 1]]"#).unwrap();
    assert_eq!(
        result,
        Value::Array(vec![
            Value::String("=".into()),
            Value::String(":a".into()),
            Value::Integer(1),
        ])
    );
}

#[test]
fn test_quoted_list_is_data() {
    let result = eval(r#"{"": [1, ["$nope"]]}"#).unwrap();
    assert_eq!(
        result,
        Value::Array(vec![
            Value::Integer(1),
            Value::Array(vec![Value::String("$nope".into())]),
        ])
    );
}

#[test]
fn test_unknown_operator_is_named() {
    assert_eq!(
        eval(r#"["$nope", 1]"#).unwrap_err(),
        EvalError::UnknownOperator("$nope".to_string())
    );
}

// ============================================================================
// Comparison and logic
// ============================================================================

#[test]
fn test_equality() {
    assert_eq!(eval(r#"["=", 5, 5]"#).unwrap(), Value::Boolean(true));
    assert_eq!(eval(r#"["!=", 5, 5]"#).unwrap(), Value::Boolean(false));
    assert_eq!(eval(r#"["=", 5, 5.0]"#).unwrap(), Value::Boolean(true));
}

#[test]
fn test_multi_operand_equality_compares_against_first() {
    assert_eq!(eval(r#"["=", 1, 1, 1]"#).unwrap(), Value::Boolean(true));
    assert_eq!(eval(r#"["=", 1, 1, 2]"#).unwrap(), Value::Boolean(false));
}

#[test]
fn test_like_and_ilike() {
    assert_eq!(eval(r#"["$like", "Hello", "%ell%"]"#).unwrap(), Value::Boolean(true));
    assert_eq!(eval(r#"["$like", "Hello", "%ELL%"]"#).unwrap(), Value::Boolean(false));
    assert_eq!(eval(r#"["$ilike", "Hello", "%ELL%"]"#).unwrap(), Value::Boolean(true));
}

#[test]
fn test_dates_compare_by_instant() {
    let result = eval(r#"["<", ["$date", "2024-01-01"], ["$date", "2024-02-01T00:00:00Z"]]"#);
    assert_eq!(result.unwrap(), Value::Boolean(true));
}

#[test]
fn test_incompatible_comparison_is_type_error() {
    assert!(matches!(
        eval(r#"["<", "a", 1]"#),
        Err(EvalError::TypeError(_))
    ));
}

#[test]
fn test_logic_operators() {
    assert_eq!(
        eval(r#"["$and", true, ["$or", false, ["$not", false]]]"#).unwrap(),
        Value::Boolean(true)
    );
    assert_eq!(eval(r#"["$isnull", null]"#).unwrap(), Value::Boolean(true));
    assert_eq!(
        eval(r#"["$in", 2, {"": [1, 2, 3]}]"#).unwrap(),
        Value::Boolean(true)
    );
}

// ============================================================================
// Arithmetic, strings and dates
// ============================================================================

#[test]
fn test_arithmetic_reduces_flattened_operands() {
    assert_eq!(eval(r#"["+", 1, {"": [2, 3]}]"#).unwrap(), Value::Integer(6));
    assert_eq!(eval(r#"["-", 10, 4, 1]"#).unwrap(), Value::Integer(5));
    assert_eq!(eval(r#"["/", 7, 2]"#).unwrap(), Value::Float(3.5));
}

#[test]
fn test_integer_division_by_zero() {
    assert_eq!(eval(r#"["/", 1, 0]"#).unwrap_err(), EvalError::DivisionByZero);
}

#[test]
fn test_concat_skips_null() {
    assert_eq!(
        eval(r#"["$concat", "a", null, "b", 1]"#).unwrap(),
        Value::String("ab1".into())
    );
}

#[test]
fn test_extract_year_and_unsupported_part() {
    assert_eq!(
        eval(r#"["$extract", "year", ["$date", "2024-03-09"]]"#).unwrap(),
        Value::Integer(2024)
    );
    assert_eq!(
        eval(r#"["$extract", "quarter", 0]"#).unwrap_err(),
        EvalError::UnsupportedExtractField("quarter".to_string())
    );
}

// ============================================================================
// Utilities, scoping and concurrency
// ============================================================================

#[test]
fn test_get_map_unique_size() {
    let ctx = Context::new().var(
        "items",
        Value::Array(vec![
            json_object(vec![("tag", Value::from("a"))]),
            json_object(vec![("tag", Value::from("b"))]),
            json_object(vec![("tag", Value::from("a"))]),
        ]),
    );
    assert_eq!(
        eval_with(r##"["_unique", ["_map", "#items", "tag"]]"##, &ctx).unwrap(),
        Value::Array(vec![Value::from("a"), Value::from("b")])
    );
    assert_eq!(eval_with(r##"["_size", "#items"]"##, &ctx).unwrap(), Value::Integer(3));
    assert_eq!(
        eval_with(r##"["_get", "#items", "5.tag", "none"]"##, &ctx).unwrap(),
        Value::from("none")
    );
}

#[test]
fn test_define_scopes_a_binding() {
    assert_eq!(
        eval(r##"["_define", "#x", 5, ["+", "#x", 1]]"##).unwrap(),
        Value::Integer(6)
    );
    // the binding does not leak outside the body
    assert_eq!(
        eval(r##"["_wait", ["_define", "#x", 5, "#x"], "#x"]"##).unwrap(),
        Value::Array(vec![Value::Integer(5), Value::Null])
    );
}

#[test]
fn test_define_requires_a_namespace() {
    assert_eq!(
        eval(r#"["_define", "x", 5, "x"]"#).unwrap_err(),
        EvalError::UnknownNamespace("x".to_string())
    );
}

#[test]
fn test_wait_keeps_operand_order() {
    assert_eq!(
        eval(r#"["$wait", ["+", 1, 1], ["*", 2, 3], "c"]"#).unwrap(),
        Value::Array(vec![Value::Integer(2), Value::Integer(6), Value::from("c")])
    );
}

#[test]
fn test_independent_evaluations_run_concurrently() {
    let a = Expr::from_json(r#"["+", 1, 2]"#).unwrap();
    let b = Expr::from_json(r#"["*", 2, 5]"#).unwrap();
    let ctx = Context::new();
    let (x, y) = block_on(futures::future::join(
        DataParser::evaluate(&a, &ctx),
        DataParser::evaluate(&b, &ctx),
    ));
    assert_eq!(x.unwrap(), Value::Integer(3));
    assert_eq!(y.unwrap(), Value::Integer(10));
}
