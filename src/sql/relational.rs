//! Query clauses. Each stage renders its source first and appends its own
//! clause, so parameters stay in the order they appear in the text.

use crate::{
    ast::{Expr, OperatorName, window::OrderSpec},
    environment::{Environment, EvalFuture},
    evaluator::EvalError,
    operators::common::Pagination,
    sql::{fragment::{Fragment, quote_ident}, operand},
    value::Value,
};

async fn render(expr: &Expr, env: &Environment) -> Result<Fragment, EvalError> {
    operand(env.evaluate(expr).await?)
}

/// The source of a clause as SQL text; plain statements are not
/// parenthesized here.
async fn source(expr: &Expr, env: &Environment) -> Result<Fragment, EvalError> {
    match env.evaluate(expr).await? {
        Value::Fragment(f) => Ok(f),
        other => operand(other),
    }
}

fn split<'a>(args: &'a [Expr], op: &str) -> Result<(&'a Expr, &'a Expr), EvalError> {
    match args {
        [first, rest] => Ok((first, rest)),
        _ => Err(EvalError::TypeError(format!(
            "{} requires two operands, got {}",
            op,
            args.len()
        ))),
    }
}

async fn list(expr: &Expr, env: &Environment) -> Result<Vec<Fragment>, EvalError> {
    if expr.is_empty() {
        return Ok(Vec::new());
    }
    let mut parts = Vec::new();
    for item in expr.items() {
        parts.push(render(item, env).await?);
    }
    Ok(parts)
}

/// `FROM "table"`
pub fn from<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(async move {
        let [table] = args else {
            return Err(EvalError::TypeError("$from takes exactly one source".to_string()));
        };
        let mut out = Fragment::sql("FROM ");
        out.push(render(table, env).await?);
        Ok(Value::Fragment(out))
    })
}

/// `expr AS "alias"`; a subquery is parenthesized.
pub fn alias<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(async move {
        let (name, expr) = split(args, "$as")?;
        let alias = name
            .as_name()
            .ok_or_else(|| EvalError::TypeError("$as alias must be a name".to_string()))?;
        let mut out = render(expr, env).await?;
        out.push_sql(" AS ");
        out.push_sql(&quote_ident(alias));
        Ok(Value::Fragment(out))
    })
}

async fn join_clause(args: &[Expr], env: &Environment, keyword: &str) -> Result<Value, EvalError> {
    let [right, condition, left] = args else {
        return Err(EvalError::TypeError(
            "join requires a source, a condition and a left source".to_string(),
        ));
    };
    let mut out = source(left, env).await?;
    out.push_sql(&format!(" {} ", keyword));
    out.push(render(right, env).await?);
    out.push_sql(" ON ");
    if condition.is_empty() {
        out.push_sql("TRUE");
    } else {
        out.push(render(condition, env).await?);
    }
    Ok(Value::Fragment(out))
}

pub fn join<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(join_clause(args, env, "JOIN"))
}

pub fn left_join<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(join_clause(args, env, "LEFT JOIN"))
}

async fn condition_clause(args: &[Expr], env: &Environment, op: &str, keyword: &str) -> Result<Value, EvalError> {
    let (condition, from) = split(args, op)?;
    let mut out = source(from, env).await?;
    if !condition.is_empty() {
        out.push_sql(keyword);
        out.push(render(condition, env).await?);
    }
    Ok(Value::Fragment(out))
}

/// `... WHERE condition`; an empty condition adds nothing.
pub fn filter_rows<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(condition_clause(args, env, "$where", " WHERE "))
}

pub fn having<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(condition_clause(args, env, "$having", " HAVING "))
}

pub fn group<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(async move {
        let (keys, from) = split(args, "$group")?;
        let mut out = source(from, env).await?;
        let keys = list(keys, env).await?;
        if !keys.is_empty() {
            out.push_sql(" GROUP BY ");
            out.push(Fragment::join(keys, ", "));
        }
        Ok(Value::Fragment(out))
    })
}

/// `ORDER BY expr ASC|DESC, ...`
pub(crate) async fn order_by(specs: &[OrderSpec<'_>], env: &Environment) -> Result<Fragment, EvalError> {
    let mut parts = Vec::with_capacity(specs.len());
    for spec in specs {
        let mut part = render(spec.expr, env).await?;
        part.push_sql(if spec.descending { " DESC" } else { " ASC" });
        parts.push(part);
    }
    let mut out = Fragment::sql("ORDER BY ");
    out.push(Fragment::join(parts, ", "));
    Ok(out)
}

pub fn order<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(async move {
        let (specs, from) = split(args, "$order")?;
        let specs = OrderSpec::parse_list(specs)?;
        let mut out = source(from, env).await?;
        if !specs.is_empty() {
            out.push_sql(" ");
            out.push(order_by(&specs, env).await?);
        }
        Ok(Value::Fragment(out))
    })
}

/// `... LIMIT $n OFFSET $m`; zero counts are left out.
pub fn limit<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(async move {
        let (spec, from) = split(args, "$limit")?;
        let page = Pagination::from_value(&env.evaluate(spec).await?)?;
        let mut out = source(from, env).await?;
        if let Some(limit) = page.limit {
            out.push_sql(" LIMIT ");
            out.push_param(Value::Integer(limit as i64));
        }
        if let Some(offset) = page.offset {
            out.push_sql(" OFFSET ");
            out.push_param(Value::Integer(offset as i64));
        }
        Ok(Value::Fragment(out))
    })
}

/// `(a) UNION ALL (b)`; a single branch is returned as it is.
pub fn union<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(async move {
        let mut branches = Vec::with_capacity(args.len());
        for branch in args {
            branches.push(source(branch, env).await?);
        }
        if branches.len() == 1 {
            return Ok(Value::Fragment(branches.remove(0)));
        }
        let parts = branches.into_iter().map(|b| b.wrapped("(", ")"));
        Ok(Value::Fragment(Fragment::join(parts, " UNION ALL ").into_query()))
    })
}

/// `SELECT fields FROM ...`
pub fn select<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(async move {
        let (fields, from) = match args {
            [fields] => (fields, None),
            [fields, from] => (fields, Some(from)),
            _ => {
                return Err(EvalError::TypeError(
                    "$select requires fields and an optional source".to_string(),
                ));
            }
        };

        let mut columns = Vec::new();
        if !fields.is_empty() {
            for field in fields.items() {
                columns.push(match field.as_name() {
                    Some("*") => Fragment::sql("*"),
                    _ => render(field, env).await?,
                });
            }
        }
        if columns.is_empty() {
            columns.push(Fragment::sql("*"));
        }

        let mut out = Fragment::sql("SELECT ");
        out.push(Fragment::join(columns, ", "));
        if let Some(from) = from {
            out.push_sql(" ");
            out.push(source(from, env).await?);
        }
        Ok(Value::Fragment(out.into_query()))
    })
}

/// `FN(expr)`, `COUNT(*)`, and `FN(expr) FILTER (WHERE predicate)` when the
/// operand is a `$filter`.
async fn aggregate(args: &[Expr], env: &Environment, name: &str) -> Result<Value, EvalError> {
    let [arg] = args else {
        return Err(EvalError::TypeError(format!(
            "{} takes exactly one operand, got {}",
            name,
            args.len()
        )));
    };
    let (field, predicate) = if arg.is_call(OperatorName::Filter) {
        match arg.operands() {
            [field, predicate] => (field, Some(predicate)),
            _ => {
                return Err(EvalError::TypeError(
                    "$filter requires a field and a predicate".to_string(),
                ));
            }
        }
    } else {
        (arg, None)
    };

    let mut out = Fragment::sql(format!("{}(", name));
    if field.as_name() == Some("*") {
        out.push_sql("*");
    } else {
        out.push(render(field, env).await?);
    }
    out.push_sql(")");
    if let Some(predicate) = predicate {
        out.push_sql(" FILTER (WHERE ");
        out.push(render(predicate, env).await?);
        out.push_sql(")");
    }
    Ok(Value::Fragment(out))
}

pub fn count<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(aggregate(args, env, "COUNT"))
}

pub fn sum<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(aggregate(args, env, "SUM"))
}

pub fn avg<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(aggregate(args, env, "AVG"))
}

pub fn min<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(aggregate(args, env, "MIN"))
}

pub fn max<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(aggregate(args, env, "MAX"))
}
