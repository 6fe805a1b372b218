use futures::executor::block_on;
use symql::{
    CompileOptions, Compiled, Context, EvalError, Expr, PlaceholderStyle, Record, SqlParser,
    SqlQuery, Value,
};

fn compile_with(json: &str, ctx: &Context) -> Result<Compiled, EvalError> {
    let expr = Expr::from_json(json).expect("valid expression JSON");
    block_on(SqlParser::compile(&expr, ctx))
}

fn query_with(json: &str, ctx: &Context) -> SqlQuery {
    match compile_with(json, ctx).unwrap() {
        Compiled::Query(query) => query,
        Compiled::Value(v) => panic!("expected a query, got value {:?}", v),
    }
}

fn query(json: &str) -> SqlQuery {
    query_with(json, &Context::new())
}

fn assert_sql(json: &str, statement: &str, values: Vec<Value>) {
    let q = query(json);
    assert_eq!(q.statement, statement);
    assert_eq!(q.values, values);
}

// ============================================================================
// Sources and conditions
// ============================================================================

#[test]
fn test_select_where() {
    assert_sql(
        r#"["$select", [":id", ":name"], ["$where", ["=", ":name", "Ada"], ["$from", "@users"]]]"#,
        r#"SELECT "id", "name" FROM "users" WHERE "name" = $1"#,
        vec![Value::from("Ada")],
    );
}

#[test]
fn test_define_binds_parameter_for_body() {
    assert_sql(
        r##"["_define", "#limit", 5, ["$where", [">", ":age", "#limit"], ["$from", "@users"]]]"##,
        r#"FROM "users" WHERE "age" > $1"#,
        vec![Value::Integer(5)],
    );
}

#[test]
fn test_select_star() {
    assert_sql(
        r#"["$select", ["*"], ["$from", "@users"]]"#,
        r#"SELECT * FROM "users""#,
        vec![],
    );
    assert_sql(
        r#"["$select", [], ["$from", "@users"]]"#,
        r#"SELECT * FROM "users""#,
        vec![],
    );
}

#[test]
fn test_table_binding_is_quoted_or_verbatim() {
    let ctx = Context::new().table("users", Value::from("app_users"));
    assert_eq!(
        query_with(r#"["$from", "@users"]"#, &ctx).statement,
        r#"FROM "app_users""#
    );

    let ctx = Context::new().table("users", Value::from(r#""auth"."users""#));
    assert_eq!(
        query_with(r#"["$from", "@users"]"#, &ctx).statement,
        r#"FROM "auth"."users""#
    );
}

#[test]
fn test_columns_against_values_expand_column_major() {
    assert_sql(
        r#"["=", ":a", ":b", 1, 2]"#,
        r#""a" = $1 AND "a" = $2 AND "b" = $3 AND "b" = $4"#,
        vec![
            Value::Integer(1),
            Value::Integer(2),
            Value::Integer(1),
            Value::Integer(2),
        ],
    );
}

#[test]
fn test_columns_only_compare_against_first() {
    assert_sql(
        r#"["=", ":a", ":b", ":c"]"#,
        r#""a" = "b" AND "a" = "c""#,
        vec![],
    );
}

#[test]
fn test_value_first_mirrors_operator() {
    assert_sql(r#"["<", 5, ":a"]"#, r#""a" > $1"#, vec![Value::Integer(5)]);
    assert_sql(r#"["!=", ":a", 5]"#, r#""a" <> $1"#, vec![Value::Integer(5)]);
}

#[test]
fn test_in_list_and_contains() {
    let ctx = Context::new().var(
        "ids",
        Value::Array(vec![Value::Integer(1), Value::Integer(2)]),
    );
    let q = query_with(r##"["$in", ":id", "#ids"]"##, &ctx);
    assert_eq!(q.statement, r#""id" = ANY($1)"#);
    assert_eq!(
        q.values,
        vec![Value::Array(vec![Value::Integer(1), Value::Integer(2)])]
    );

    assert_sql(
        r#"["$contains", ":tags", {"": ["a"]}]"#,
        r#""tags" @> $1"#,
        vec![Value::Array(vec![Value::from("a")])],
    );
}

#[test]
fn test_like_and_null_checks() {
    assert_sql(
        r#"["$and", ["$ilike", ":name", "a%"], ["$isnull", ":deleted_at"]]"#,
        r#"("name" ILIKE $1) AND ("deleted_at" IS NULL)"#,
        vec![Value::from("a%")],
    );
}

#[test]
fn test_logic_nesting_is_parenthesized() {
    assert_sql(
        r#"["$and", ["=", ":a", 1], ["$or", ["=", ":b", 2], ["$not", ["=", ":c", 3]]]]"#,
        r#"("a" = $1) AND (("b" = $2) OR (NOT ("c" = $3)))"#,
        vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)],
    );
}

#[test]
fn test_arithmetic_and_concat() {
    assert_sql(
        r#"[">", ["*", ":price", 2], ["-", ":cost"]]"#,
        r#"("price" * $1) > (-"cost")"#,
        vec![Value::Integer(2)],
    );
    assert_sql(
        r#"["$concat", ":first", " ", ":last"]"#,
        r#"CONCAT("first", $1, "last")"#,
        vec![Value::from(" ")],
    );
}

#[test]
fn test_context_symbol_becomes_parameter() {
    let mut user = Record::new();
    user.insert("id".to_string(), Value::Integer(7));
    let ctx = Context::new().var("user", Value::Object(user));
    let q = query_with(
        r##"["$where", ["=", ":owner", "#user.id"], ["$from", "@notes"]]"##,
        &ctx,
    );
    assert_eq!(q.statement, r#"FROM "notes" WHERE "owner" = $1"#);
    assert_eq!(q.values, vec![Value::Integer(7)]);
}

#[test]
fn test_date_literal_is_inlined() {
    assert_sql(
        r#"[">", ":created", ["$date", "2024-01-01"]]"#,
        r#""created" > '2024-01-01T00:00:00.000Z'::TIMESTAMPTZ"#,
        vec![],
    );
}

#[test]
fn test_extract() {
    assert_sql(
        r#"["=", ["$extract", "year", ":created"], 2024]"#,
        r#"EXTRACT(YEAR FROM "created") = $1"#,
        vec![Value::Integer(2024)],
    );
    assert_eq!(
        compile_with(r#"["$extract", "quarter", ":created"]"#, &Context::new()).unwrap_err(),
        EvalError::UnsupportedExtractField("quarter".to_string())
    );
}

#[test]
fn test_pure_data_compiles_to_value() {
    assert_eq!(
        compile_with(r#"["+", 1, 2]"#, &Context::new()).unwrap(),
        Compiled::Value(Value::Integer(3))
    );
}

#[test]
fn test_bare_column_compiles_to_statement() {
    assert_sql(r#"":name""#, r#""name""#, vec![]);
}

// ============================================================================
// Joins, grouping and paging
// ============================================================================

#[test]
fn test_join_with_aliases() {
    assert_sql(
        r#"["$select", ["u:name", "o:total"],
            ["$leftJoin", ["$as", "o", "@orders"], ["=", "o:user_id", "u:id"],
                ["$from", ["$as", "u", "@users"]]]]"#,
        r#"SELECT "u"."name", "o"."total" FROM "users" AS "u" LEFT JOIN "orders" AS "o" ON "o"."user_id" = "u"."id""#,
        vec![],
    );
}

#[test]
fn test_join_without_condition() {
    assert_sql(
        r#"["$join", "@b", [], ["$from", "@a"]]"#,
        r#"FROM "a" JOIN "b" ON TRUE"#,
        vec![],
    );
}

#[test]
fn test_group_having_order_limit() {
    assert_sql(
        r#"["$select", [":city", ["$as", "n", ["$count", "*"]]],
            ["$limit", {"offset": 0, "limit": 10},
                ["$order", [{"field": ":city", "direction": "desc"}],
                    ["$having", [">", ["$count", "*"], 1],
                        ["$group", [":city"], ["$from", "@users"]]]]]]"#,
        r#"SELECT "city", COUNT(*) AS "n" FROM "users" GROUP BY "city" HAVING COUNT(*) > $1 ORDER BY "city" DESC LIMIT $2"#,
        vec![Value::Integer(1), Value::Integer(10)],
    );
}

#[test]
fn test_limit_with_offset() {
    assert_sql(
        r#"["$limit", {"offset": 20, "limit": 10}, ["$order", ":id", ["$from", "@users"]]]"#,
        r#"FROM "users" ORDER BY "id" ASC LIMIT $1 OFFSET $2"#,
        vec![Value::Integer(10), Value::Integer(20)],
    );
}

#[test]
fn test_filtered_aggregate_and_case() {
    assert_sql(
        r#"["$select", [["$as", "paid", ["$count", ["$filter", ":id", ["=", ":paid", true]]]]],
            ["$from", "@orders"]]"#,
        r#"SELECT COUNT("id") FILTER (WHERE "paid" = $1) AS "paid" FROM "orders""#,
        vec![Value::Boolean(true)],
    );
    assert_sql(
        r#"["$filter", ":total", ["=", ":paid", true]]"#,
        r#"CASE WHEN "paid" = $1 THEN "total" END"#,
        vec![Value::Boolean(true)],
    );
}

#[test]
fn test_single_branch_union_is_the_branch() {
    let branch = r#"["$select", [":id"], ["$where", ["=", ":kind", "a"], ["$from", "@things"]]]"#;
    let union = format!(r#"["$union", {}]"#, branch);
    assert_eq!(query(&union), query(branch));
}

#[test]
fn test_nested_queries_number_placeholders_in_text_order() {
    assert_sql(
        r#"["$union",
            ["$select", [":id"],
                ["$where", ["=", ":kind", "a"],
                    ["$join",
                        ["$as", "s", ["$select", [":id"], ["$where", [">", ":score", 10], ["$from", "@scores"]]]],
                        ["=", "s:id", "t:id"],
                        ["$from", ["$as", "t", "@things"]]]]],
            ["$select", [":id"],
                ["$where", ["$in", ":id", ["$select", [":id"], ["$where", ["<", ":score", 3], ["$from", "@scores"]]]],
                    ["$from", "@things"]]]]"#,
        concat!(
            r#"(SELECT "id" FROM "things" AS "t" JOIN (SELECT "id" FROM "scores" WHERE "score" > $1) AS "s" ON "s"."id" = "t"."id" WHERE "kind" = $2)"#,
            r#" UNION ALL "#,
            r#"(SELECT "id" FROM "things" WHERE "id" IN (SELECT "id" FROM "scores" WHERE "score" < $3))"#,
        ),
        vec![Value::Integer(10), Value::from("a"), Value::Integer(3)],
    );
}

#[test]
fn test_question_placeholders() {
    let expr = Expr::from_json(r#"["$and", ["=", ":a", 1], ["=", ":b", 2]]"#).unwrap();
    let options = CompileOptions {
        placeholder: PlaceholderStyle::Question,
    };
    let compiled = block_on(SqlParser::compile_with(&expr, &Context::new(), &options)).unwrap();
    assert_eq!(compiled.statement(), Some(r#"("a" = ?) AND ("b" = ?)"#));
}

#[test]
fn test_compiled_json_shape() {
    let expr = Expr::from_json(r#"["=", ":a", 1]"#).unwrap();
    let compiled = block_on(SqlParser::compile(&expr, &Context::new())).unwrap();
    assert_eq!(
        compiled.to_json(),
        serde_json::json!({"statement": "\"a\" = $1", "values": [1]})
    );
}

// ============================================================================
// Windows
// ============================================================================

#[test]
fn test_row_number_over_partition() {
    assert_sql(
        r#"["$select", [":id", ["$as", "n", ["$over", ["$row_number"],
                {"partition": [":dept"], "order": [{"field": ":amount", "direction": "desc"}]}]]],
            ["$from", "@sales"]]"#,
        r#"SELECT "id", ROW_NUMBER() OVER (PARTITION BY "dept" ORDER BY "amount" DESC ROWS BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW) AS "n" FROM "sales""#,
        vec![],
    );
}

#[test]
fn test_explicit_frame_is_written() {
    assert_sql(
        r#"["$over", ["$sum", ":amount"],
            {"order": [":id"],
             "frame": {"start": {"type": "preceding", "offset": 1}, "end": {"type": "current"}}}]"#,
        r#"SUM("amount") OVER (ORDER BY "id" ASC ROWS BETWEEN 1 PRECEDING AND CURRENT ROW)"#,
        vec![],
    );
    assert_sql(
        r#"["$over", ["$count", "*"], {"frame": {"end": {"type": "unbounded"}}}]"#,
        r#"COUNT(*) OVER (ROWS BETWEEN UNBOUNDED PRECEDING AND UNBOUNDED FOLLOWING)"#,
        vec![],
    );
}

#[test]
fn test_ordered_window_without_frame_writes_rows_frame() {
    assert_sql(
        r#"["$select", [["$as", "running", ["$over", ["$sum", ":id"], {"order": [":x"]}]]],
            ["$from", "@points"]]"#,
        r#"SELECT SUM("id") OVER (ORDER BY "x" ASC ROWS BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW) AS "running" FROM "points""#,
        vec![],
    );
}

#[test]
fn test_lag_arguments_are_parameters() {
    assert_sql(
        r#"["$over", ["$lag", ":amount", 1, 0], {"order": [":id"]}]"#,
        r#"LAG("amount", $1, $2) OVER (ORDER BY "id" ASC ROWS BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW)"#,
        vec![Value::Integer(1), Value::Integer(0)],
    );
}

#[test]
fn test_ranking_outside_over_is_misuse() {
    assert!(matches!(
        compile_with(r#"["$select", [["$rank"]], ["$from", "@sales"]]"#, &Context::new()),
        Err(EvalError::WindowMisuse(_))
    ));
}
