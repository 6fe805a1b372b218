//! Scalar operators rendered as SQL expressions.
//!
//! When no operand is SQL (a column or a fragment) the operator is computed
//! on the spot with the in-memory semantics, so constant subexpressions
//! never reach the statement.

use crate::{
    ast::Expr,
    data::scalar as local,
    environment::{Environment, EvalFuture, EvalResult, FunctionFn},
    evaluator::EvalError,
    operators::common::two,
    sql::{fragment::Fragment, is_sql, operand},
    value::Value,
};

fn any_sql(args: &[Value]) -> bool {
    args.iter().any(is_sql)
}

fn binary(left: Value, op: &str, right: Value) -> Result<Fragment, EvalError> {
    let mut out = operand(left)?;
    out.push_sql(&format!(" {} ", op));
    out.push(operand(right)?);
    Ok(out)
}

fn mirror(op: &str) -> &str {
    match op {
        ">" => "<",
        "<" => ">",
        ">=" => "<=",
        "<=" => ">=",
        other => other,
    }
}

/// Columns are compared against every value, in column-major order. With
/// columns only, the first is compared against the rest. A value written
/// first flips the operator so the column stays on the left.
fn comparison(args: Vec<Value>, op: &str, fallback: FunctionFn) -> EvalResult {
    if !any_sql(&args) {
        return fallback(args);
    }
    if args.len() < 2 {
        return Err(EvalError::TypeError(format!(
            "'{}' requires at least two operands",
            op
        )));
    }
    let value_first = !is_sql(&args[0]);
    let (columns, values): (Vec<Value>, Vec<Value>) = args.into_iter().partition(is_sql);

    let mut clauses = Vec::new();
    if values.is_empty() {
        let mut iter = columns.into_iter();
        if let Some(first) = iter.next() {
            for other in iter {
                clauses.push(binary(first.clone(), op, other)?);
            }
        }
    } else {
        let op = if value_first { mirror(op) } else { op };
        for column in &columns {
            for value in &values {
                clauses.push(binary(column.clone(), op, value.clone())?);
            }
        }
    }
    Ok(Value::Fragment(Fragment::join(clauses, " AND ")))
}

pub fn equal(args: Vec<Value>) -> EvalResult {
    comparison(args, "=", local::equal)
}

pub fn not_equal(args: Vec<Value>) -> EvalResult {
    comparison(args, "<>", local::not_equal)
}

pub fn greater_than(args: Vec<Value>) -> EvalResult {
    comparison(args, ">", local::greater_than)
}

pub fn less_than(args: Vec<Value>) -> EvalResult {
    comparison(args, "<", local::less_than)
}

pub fn greater_equal(args: Vec<Value>) -> EvalResult {
    comparison(args, ">=", local::greater_equal)
}

pub fn less_equal(args: Vec<Value>) -> EvalResult {
    comparison(args, "<=", local::less_equal)
}

fn infix(args: Vec<Value>, op: &str, fallback: FunctionFn) -> EvalResult {
    if !any_sql(&args) {
        return fallback(args);
    }
    let (left, right) = two(args, op)?;
    Ok(Value::Fragment(binary(left, op, right)?))
}

pub fn like_match(args: Vec<Value>) -> EvalResult {
    infix(args, "LIKE", local::like_match)
}

pub fn ilike_match(args: Vec<Value>) -> EvalResult {
    infix(args, "ILIKE", local::ilike_match)
}

pub fn contains(args: Vec<Value>) -> EvalResult {
    infix(args, "@>", local::contains)
}

/// `"col" = ANY($n)`, or `"col" IN (subquery)`.
pub fn in_list(args: Vec<Value>) -> EvalResult {
    if !any_sql(&args) {
        return local::in_list(args);
    }
    let (value, list) = two(args, "$in")?;
    let mut out = operand(value)?;
    match list {
        Value::Fragment(query) if query.is_query() => {
            out.push_sql(" IN ");
            out.push(query.wrapped("(", ")"));
        }
        other => {
            out.push_sql(" = ANY(");
            out.push(operand(other)?);
            out.push_sql(")");
        }
    }
    Ok(Value::Fragment(out))
}

pub fn is_null(args: Vec<Value>) -> EvalResult {
    if !any_sql(&args) {
        return local::is_null(args);
    }
    let clauses = args
        .into_iter()
        .map(|arg| {
            let mut f = operand(arg)?;
            f.push_sql(" IS NULL");
            Ok(f)
        })
        .collect::<Result<Vec<_>, EvalError>>()?;
    Ok(Value::Fragment(Fragment::join(clauses, " AND ")))
}

fn logical(args: Vec<Value>, op: &str, fallback: FunctionFn) -> EvalResult {
    if !any_sql(&args) {
        return fallback(args);
    }
    let children = args
        .into_iter()
        .map(|arg| Ok(operand(arg)?.wrapped("(", ")")))
        .collect::<Result<Vec<_>, EvalError>>()?;
    Ok(Value::Fragment(Fragment::join(children, &format!(" {} ", op))))
}

pub fn and(args: Vec<Value>) -> EvalResult {
    logical(args, "AND", local::and)
}

pub fn or(args: Vec<Value>) -> EvalResult {
    logical(args, "OR", local::or)
}

pub fn not(args: Vec<Value>) -> EvalResult {
    if !any_sql(&args) {
        return local::not(args);
    }
    let [value] = <[Value; 1]>::try_from(args)
        .map_err(|_| EvalError::TypeError("$not takes exactly one operand".to_string()))?;
    let mut out = Fragment::sql("NOT ");
    out.push(operand(value)?.wrapped("(", ")"));
    Ok(Value::Fragment(out))
}

fn arithmetic(args: Vec<Value>, op: &str, fallback: FunctionFn) -> EvalResult {
    if !any_sql(&args) {
        return fallback(args);
    }
    let inner = if args.len() == 1 && op == "-" {
        let mut f = Fragment::sql("-");
        f.push(operand(args.into_iter().next().unwrap_or(Value::Null))?);
        f
    } else {
        let parts = args
            .into_iter()
            .map(operand)
            .collect::<Result<Vec<_>, EvalError>>()?;
        Fragment::join(parts, &format!(" {} ", op))
    };
    Ok(Value::Fragment(inner.wrapped("(", ")")))
}

pub fn add(args: Vec<Value>) -> EvalResult {
    arithmetic(args, "+", local::add)
}

pub fn subtract(args: Vec<Value>) -> EvalResult {
    arithmetic(args, "-", local::subtract)
}

pub fn multiply(args: Vec<Value>) -> EvalResult {
    arithmetic(args, "*", local::multiply)
}

pub fn divide(args: Vec<Value>) -> EvalResult {
    arithmetic(args, "/", local::divide)
}

/// `NAME(a, b, ...)`
pub(crate) fn function_call(name: &str, args: Vec<Value>) -> Result<Fragment, EvalError> {
    let parts = args
        .into_iter()
        .map(operand)
        .collect::<Result<Vec<_>, EvalError>>()?;
    Ok(Fragment::join(parts, ", ").wrapped(&format!("{}(", name), ")"))
}

pub fn concat(args: Vec<Value>) -> EvalResult {
    if !any_sql(&args) {
        return local::concat(args);
    }
    Ok(Value::Fragment(function_call("CONCAT", args)?))
}

/// `EXTRACT(PART FROM expr)`
pub fn extract(args: Vec<Value>) -> EvalResult {
    let (part, value) = two(args, "$extract")?;
    let field = local::extract_field(&part)?;
    if !is_sql(&value) {
        return local::extract(vec![part, value]);
    }
    let mut out = Fragment::sql(format!("EXTRACT({} FROM ", field.to_ascii_uppercase()));
    out.push(operand(value)?);
    out.push_sql(")");
    Ok(Value::Fragment(out))
}

/// `$filter(field, predicate)` outside an aggregate:
/// `CASE WHEN predicate THEN field END`.
pub fn filter<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(async move {
        let [field, predicate] = args else {
            return Err(EvalError::TypeError(
                "$filter requires a field and a predicate".to_string(),
            ));
        };
        let predicate = env.evaluate(predicate).await?;
        if !is_sql(&predicate) {
            return if predicate.as_bool() {
                env.evaluate(field).await
            } else {
                Ok(Value::Null)
            };
        }
        let mut out = Fragment::sql("CASE WHEN ");
        out.push(operand(predicate)?);
        out.push_sql(" THEN ");
        out.push(operand(env.evaluate(field).await?)?);
        out.push_sql(" END");
        Ok(Value::Fragment(out))
    })
}

