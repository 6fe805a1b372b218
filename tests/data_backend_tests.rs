use futures::executor::block_on;
use symql::{Context, DataParser, EvalError, Expr, Record, Value};

fn json_object(pairs: Vec<(&str, Value)>) -> Value {
    let mut map = Record::new();
    for (k, v) in pairs {
        map.insert(k.to_string(), v);
    }
    Value::Object(map)
}

fn user(id: i64, name: &str, city: &str, age: i64) -> Value {
    json_object(vec![
        ("id", Value::Integer(id)),
        ("name", Value::from(name)),
        ("city", Value::from(city)),
        ("age", Value::Integer(age)),
    ])
}

fn order(id: i64, user_id: i64, total: i64, paid: bool) -> Value {
    json_object(vec![
        ("id", Value::Integer(id)),
        ("user_id", Value::Integer(user_id)),
        ("total", Value::Integer(total)),
        ("paid", Value::Boolean(paid)),
    ])
}

fn fixture() -> Context {
    Context::new()
        .table(
            "users",
            Value::Array(vec![
                user(1, "Ada", "A", 10),
                user(2, "Bo", "A", 20),
                user(3, "Cy", "B", 5),
            ]),
        )
        .table(
            "orders",
            Value::Array(vec![
                order(10, 1, 5, true),
                order(11, 1, 7, false),
                order(12, 3, 1, true),
            ]),
        )
        .table("empty", Value::Array(vec![]))
}

fn run(json: &str) -> Result<Value, EvalError> {
    let expr = Expr::from_json(json).expect("valid expression JSON");
    block_on(DataParser::evaluate(&expr, &fixture()))
}

fn rows(json: &str) -> Vec<Value> {
    match run(json).unwrap() {
        Value::Array(items) => items,
        other => panic!("expected rows, got {:?}", other),
    }
}

fn names(json: &str) -> Vec<String> {
    rows(json)
        .iter()
        .map(|r| r.field("name").as_string())
        .collect()
}

// ============================================================================
// Sources and filtering
// ============================================================================

#[test]
fn test_from_materializes_records() {
    let result = rows(r#"["$from", "@users"]"#);
    assert_eq!(result.len(), 3);
    assert_eq!(result[0], user(1, "Ada", "A", 10));
}

#[test]
fn test_where_filters_rows() {
    assert_eq!(
        names(r#"["$where", [">=", ":age", 10], ["$from", "@users"]]"#),
        vec!["Ada", "Bo"]
    );
}

#[test]
fn test_where_with_empty_condition_keeps_everything() {
    assert_eq!(rows(r#"["$where", [], ["$from", "@users"]]"#).len(), 3);
    assert_eq!(rows(r#"["$where", null, ["$from", "@users"]]"#).len(), 3);
}

#[test]
fn test_select_projects_fields() {
    assert_eq!(
        rows(r#"["$select", [":name", ["$as", "years", ":age"]], ["$where", ["=", ":city", "B"], ["$from", "@users"]]]"#),
        vec![json_object(vec![
            ("name", Value::from("Cy")),
            ("years", Value::Integer(5)),
        ])]
    );
}

#[test]
fn test_select_wildcards() {
    let bare = rows(r#"["$select", ["*"], ["$from", "@users"]]"#);
    assert_eq!(bare[1], user(2, "Bo", "A", 20));

    let qualified = rows(r#"["$select", ["users:*"], ["$where", ["=", ":id", 3], ["$from", "@users"]]]"#);
    assert_eq!(
        qualified,
        vec![json_object(vec![
            ("users:id", Value::Integer(3)),
            ("users:name", Value::from("Cy")),
            ("users:city", Value::from("B")),
            ("users:age", Value::Integer(5)),
        ])]
    );
}

// ============================================================================
// Joins
// ============================================================================

#[test]
fn test_inner_join() {
    let result = rows(
        r#"["$select", ["users:name", "orders:total"],
            ["$join", "@orders", ["=", "users:id", "orders:user_id"], ["$from", "@users"]]]"#,
    );
    assert_eq!(
        result,
        vec![
            json_object(vec![("name", Value::from("Ada")), ("total", Value::Integer(5))]),
            json_object(vec![("name", Value::from("Ada")), ("total", Value::Integer(7))]),
            json_object(vec![("name", Value::from("Cy")), ("total", Value::Integer(1))]),
        ]
    );
}

#[test]
fn test_left_join_keeps_unmatched_rows_with_null_side() {
    let result = rows(
        r#"["$select", ["u:name", "o:total"],
            ["$leftJoin", ["$as", "o", "@orders"], ["=", "u:id", "o:user_id"],
                ["$from", ["$as", "u", "@users"]]]]"#,
    );
    assert_eq!(result.len(), 4);
    assert_eq!(
        result[2],
        json_object(vec![("name", Value::from("Bo")), ("total", Value::Null)])
    );
}

// ============================================================================
// Grouping and aggregates
// ============================================================================

#[test]
fn test_group_with_aggregates() {
    let result = rows(
        r#"["$select", [":city", ["$count", "*"], ["$sum", ":age"], ["$avg", ":age"]],
            ["$group", [":city"], ["$from", "@users"]]]"#,
    );
    assert_eq!(
        result,
        vec![
            json_object(vec![
                ("city", Value::from("A")),
                ("count", Value::Integer(2)),
                ("sum", Value::Integer(30)),
                ("avg", Value::Integer(15)),
            ]),
            json_object(vec![
                ("city", Value::from("B")),
                ("count", Value::Integer(1)),
                ("sum", Value::Integer(5)),
                ("avg", Value::Integer(5)),
            ]),
        ]
    );
}

#[test]
fn test_min_max() {
    let result = rows(r#"["$select", [["$min", ":age"], ["$max", ":name"]], ["$from", "@users"]]"#);
    assert_eq!(
        result,
        vec![json_object(vec![
            ("min", Value::Integer(5)),
            ("max", Value::from("Cy")),
        ])]
    );
}

#[test]
fn test_having_filters_groups() {
    let result = rows(
        r#"["$select", [":city", ["$as", "n", ["$count", "*"]]],
            ["$having", [">", ["$count", "*"], 1],
                ["$group", [":city"], ["$from", "@users"]]]]"#,
    );
    assert_eq!(
        result,
        vec![json_object(vec![("city", Value::from("A")), ("n", Value::Integer(2))])]
    );
}

#[test]
fn test_aggregate_without_group_is_one_implicit_group() {
    assert_eq!(
        rows(r#"["$select", [["$count", "*"]], ["$from", "@users"]]"#),
        vec![json_object(vec![("count", Value::Integer(3))])]
    );
    assert_eq!(
        rows(r#"["$select", [["$count", "*"]], ["$from", "@empty"]]"#),
        vec![json_object(vec![("count", Value::Integer(0))])]
    );
}

#[test]
fn test_count_star_skips_rows_without_id() {
    let ctx = Context::new().table(
        "events",
        Value::Array(vec![
            json_object(vec![("id", Value::Integer(1)), ("kind", Value::from("a"))]),
            json_object(vec![("id", Value::Null), ("kind", Value::from("a"))]),
            json_object(vec![("kind", Value::from("b"))]),
            json_object(vec![("id", Value::Integer(4)), ("kind", Value::from("b"))]),
        ]),
    );
    let expr = Expr::from_json(
        r#"["$select", [["$as", "n", ["$count", "*"]], ["$as", "kinds", ["$count", ":kind"]]],
            ["$from", "@events"]]"#,
    )
    .unwrap();
    let result = block_on(DataParser::evaluate(&expr, &ctx)).unwrap();
    assert_eq!(
        result,
        Value::Array(vec![json_object(vec![
            ("n", Value::Integer(2)),
            ("kinds", Value::Integer(4)),
        ])])
    );
}

#[test]
fn test_define_binds_parameter_for_body() {
    assert_eq!(
        names(r##"["_define", "#limit", 10, ["$where", [">=", ":age", "#limit"], ["$from", "@users"]]]"##),
        vec!["Ada", "Bo"]
    );
}

#[test]
fn test_avg_of_nothing_is_nan() {
    let result = rows(r#"["$select", [["$avg", ":age"]], ["$from", "@empty"]]"#);
    assert!(matches!(result[0].field("avg"), Value::Float(f) if f.is_nan()));
}

#[test]
fn test_filtered_aggregate() {
    let result = rows(
        r#"["$select", [["$as", "paid", ["$count", ["$filter", ":id", ["=", ":paid", true]]]],
                        ["$as", "paid_total", ["$sum", ["$filter", ":total", ":paid"]]]],
            ["$from", "@orders"]]"#,
    );
    assert_eq!(
        result,
        vec![json_object(vec![
            ("paid", Value::Integer(2)),
            ("paid_total", Value::Integer(6)),
        ])]
    );
}

#[test]
fn test_group_by_qualified_key() {
    let result = rows(
        r#"["$select", ["users:name", ["$as", "orders", ["$count", "*"]]],
            ["$group", ["users:name"],
                ["$join", "@orders", ["=", "users:id", "orders:user_id"], ["$from", "@users"]]]]"#,
    );
    assert_eq!(
        result,
        vec![
            json_object(vec![("name", Value::from("Ada")), ("orders", Value::Integer(2))]),
            json_object(vec![("name", Value::from("Cy")), ("orders", Value::Integer(1))]),
        ]
    );
}

// ============================================================================
// Ordering, paging and union
// ============================================================================

#[test]
fn test_order_mixed_directions() {
    assert_eq!(
        names(r#"["$order", [":city", {"field": ":age", "direction": "desc"}], ["$from", "@users"]]"#),
        vec!["Bo", "Ada", "Cy"]
    );
}

#[test]
fn test_order_is_numeric_aware_and_stable() {
    let ctx = Context::new().table(
        "items",
        Value::Array(vec![
            json_object(vec![("code", Value::from("item10")), ("n", Value::Integer(1))]),
            json_object(vec![("code", Value::from("item2")), ("n", Value::Integer(2))]),
            json_object(vec![("code", Value::from("item10")), ("n", Value::Integer(3))]),
        ]),
    );
    let expr = Expr::from_json(r#"["$select", [":n"], ["$order", ":code", ["$from", "@items"]]]"#).unwrap();
    let result = block_on(DataParser::evaluate(&expr, &ctx)).unwrap();
    assert_eq!(
        result,
        Value::Array(vec![
            json_object(vec![("n", Value::Integer(2))]),
            json_object(vec![("n", Value::Integer(1))]),
            json_object(vec![("n", Value::Integer(3))]),
        ])
    );
}

#[test]
fn test_limit_with_offset() {
    assert_eq!(
        names(r#"["$limit", {"offset": 1, "limit": 2}, ["$order", [":id"], ["$from", "@users"]]]"#),
        vec!["Bo", "Cy"]
    );
    assert_eq!(names(r#"["$limit", 1, ["$from", "@users"]]"#), vec!["Ada"]);
}

#[test]
fn test_zero_limit_reads_as_no_limit() {
    assert_eq!(rows(r#"["$limit", 0, ["$from", "@users"]]"#).len(), 3);
}

#[test]
fn test_union_concatenates() {
    let result = names(
        r#"["$union",
            ["$select", [":name"], ["$where", ["=", ":city", "B"], ["$from", "@users"]]],
            ["$select", [":name"], ["$where", ["=", ":id", 1], ["$from", "@users"]]]]"#,
    );
    assert_eq!(result, vec!["Cy", "Ada"]);
}

#[test]
fn test_full_pipeline() {
    let result = rows(
        r#"["$select", [":city", ["$as", "n", ["$count", "*"]]],
            ["$limit", {"offset": 0, "limit": 10},
                ["$order", [{"field": ":city", "direction": "desc"}],
                    ["$having", [">", ["$count", "*"], 0],
                        ["$group", [":city"], ["$from", "@users"]]]]]]"#,
    );
    assert_eq!(
        result,
        vec![
            json_object(vec![("city", Value::from("B")), ("n", Value::Integer(1))]),
            json_object(vec![("city", Value::from("A")), ("n", Value::Integer(2))]),
        ]
    );
}

#[test]
fn test_non_row_source_is_type_error() {
    assert!(matches!(
        run(r#"["$from", 42]"#),
        Err(EvalError::TypeError(_))
    ));
}

#[test]
fn test_unknown_table_namespace_in_wildcard() {
    assert_eq!(
        run(r#"["$select", ["nope:*"], ["$from", "@users"]]"#).unwrap_err(),
        EvalError::UnknownNamespace("nope:".to_string())
    );
}
