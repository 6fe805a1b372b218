//! `OVER (...)` clauses and the ranking functions.

use crate::{
    ast::{Expr, window::WindowSpec},
    environment::{Environment, EvalFuture, WindowState},
    evaluator::EvalError,
    sql::{fragment::Fragment, operand, relational::order_by, scalar::function_call},
    value::Value,
};

/// `FN(...) OVER (PARTITION BY ... ORDER BY ... ROWS BETWEEN ... AND ...)`
///
/// An ordered window without a frame gets an explicit
/// `ROWS BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW`, so peers with equal
/// order keys are not folded together the way the `RANGE` default would.
pub fn over<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(async move {
        let [function, rest @ ..] = args else {
            return Err(EvalError::TypeError("$over requires a function".to_string()));
        };
        let spec = WindowSpec::parse(rest.first())?;

        let compiling = env.with_window(WindowState::Compiling);
        let mut out = operand(compiling.evaluate(function).await?)?;

        let mut clauses = Vec::new();
        if !spec.partition.is_empty() {
            let mut keys = Vec::with_capacity(spec.partition.len());
            for key in &spec.partition {
                keys.push(operand(env.evaluate(key).await?)?);
            }
            let mut clause = Fragment::sql("PARTITION BY ");
            clause.push(Fragment::join(keys, ", "));
            clauses.push(clause);
        }
        if !spec.order.is_empty() {
            clauses.push(order_by(&spec.order, env).await?);
        }
        let frame = spec
            .frame
            .or_else(|| (!spec.order.is_empty()).then(|| spec.effective_frame()));
        if let Some(frame) = frame {
            clauses.push(Fragment::sql(format!(
                "ROWS BETWEEN {} AND {}",
                frame.start.to_sql(true),
                frame.end.to_sql(false)
            )));
        }

        out.push_sql(" OVER (");
        out.push(Fragment::join(clauses, " "));
        out.push_sql(")");
        Ok(Value::Fragment(out))
    })
}

fn require_over(env: &Environment, op: &str) -> Result<(), EvalError> {
    match env.window() {
        Some(WindowState::Compiling) => Ok(()),
        _ => Err(EvalError::WindowMisuse(format!(
            "{} must be the function of an $over",
            op
        ))),
    }
}

async fn window_call(args: &[Expr], env: &Environment, op: &str, name: &str) -> Result<Value, EvalError> {
    require_over(env, op)?;
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        values.push(env.evaluate(arg).await?);
    }
    Ok(Value::Fragment(function_call(name, values)?))
}

pub fn row_number<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(window_call(args, env, "$row_number", "ROW_NUMBER"))
}

pub fn rank<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(window_call(args, env, "$rank", "RANK"))
}

pub fn dense_rank<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(window_call(args, env, "$dense_rank", "DENSE_RANK"))
}

/// `LAG(expr, offset, default)`
pub fn lag<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(window_call(args, env, "$lag", "LAG"))
}

pub fn lead<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(window_call(args, env, "$lead", "LEAD"))
}
