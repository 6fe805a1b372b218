//! Aggregates over the members of the current group (or window frame).
//!
//! Each aggregate evaluates its operand once per member row and skips
//! nulls, so `$filter` inside an aggregate drops non-matching members.

use crate::{
    ast::Expr,
    environment::{Environment, EvalFuture},
    evaluator::EvalError,
    operators::{
        arith::{self, ArithOp},
        compare::compare,
    },
    row::Row,
    value::Value,
};

fn single<'a>(args: &'a [Expr], op: &str) -> Result<&'a Expr, EvalError> {
    match args {
        [arg] => Ok(arg),
        _ => Err(EvalError::TypeError(format!(
            "{} takes exactly one operand, got {}",
            op,
            args.len()
        ))),
    }
}

fn members(env: &Environment) -> Vec<Row> {
    env.row().map(Row::members).unwrap_or_default()
}

/// Non-null values of `field` across the members.
async fn member_values(field: &Expr, env: &Environment) -> Result<Vec<Value>, EvalError> {
    let mut values = Vec::new();
    for member in members(env) {
        let value = env.surround(member).evaluate(field).await?;
        if !value.is_null() {
            values.push(value);
        }
    }
    Ok(values)
}

/// Counts the non-null values of the operand across the members.
/// `$count("*")` counts by the `id` field, so rows without one are skipped.
pub fn count<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(async move {
        let field = single(args, "$count")?;
        let id = Expr::symbol(":id");
        let field = if field.as_name() == Some("*") { &id } else { field };
        let n = member_values(field, env).await?.len();
        Ok(Value::Integer(n as i64))
    })
}

pub fn sum<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(async move {
        let values = member_values(single(args, "$sum")?, env).await?;
        if values.is_empty() {
            return Ok(Value::Null);
        }
        arith::reduce(ArithOp::Add, values)
    })
}

/// Average of the non-null values; `NaN` when there are none.
pub fn avg<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(async move {
        let values = member_values(single(args, "$avg")?, env).await?;
        if values.is_empty() {
            return Ok(Value::Float(f64::NAN));
        }
        let n = Value::Integer(values.len() as i64);
        let total = arith::reduce(ArithOp::Add, values)?;
        arith::apply(ArithOp::Divide, &total, &n)
    })
}

async fn extreme(
    args: &[Expr],
    env: &Environment,
    op: &str,
    keep_new: fn(std::cmp::Ordering) -> bool,
) -> Result<Value, EvalError> {
    let values = member_values(single(args, op)?, env).await?;
    let mut best: Option<Value> = None;
    for value in values {
        best = match best {
            None => Some(value),
            Some(current) => {
                if compare(&value, &current)?.is_some_and(keep_new) {
                    Some(value)
                } else {
                    Some(current)
                }
            }
        };
    }
    Ok(best.unwrap_or(Value::Null))
}

pub fn min<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(extreme(args, env, "$min", std::cmp::Ordering::is_lt))
}

pub fn max<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(extreme(args, env, "$max", std::cmp::Ordering::is_gt))
}
