//! Relational pipeline stages over in-memory rows.
//!
//! Every stage takes its source as its last operand and produces
//! [`Value::Rows`]; `$select` turns rows back into plain records.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::{
    ast::{Expr, OperatorName, window::OrderSpec},
    data::window::compare_keys,
    environment::{Environment, EvalFuture, ROW, WindowState},
    evaluator::EvalError,
    operators::common::Pagination,
    output::to_json,
    row::{Row, to_rows},
    value::{Record, Value},
};

/// Alias a source expression introduces: `@users` -> `users`,
/// `["$as", "u", ...]` -> `u`.
pub(crate) fn source_alias(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Symbol(s) => s.strip_prefix('@'),
        _ if expr.is_call(OperatorName::As) => expr.operands().first()?.as_name(),
        _ if expr.is_call(OperatorName::From) => source_alias(expr.operands().first()?),
        _ => None,
    }
}

async fn source_rows(expr: &Expr, env: &Environment) -> Result<Vec<Row>, EvalError> {
    let alias = source_alias(expr).unwrap_or_default();
    let value = env.evaluate(expr).await?;
    to_rows(value, alias).map_err(|v| {
        EvalError::TypeError(format!("Expected a row source, got {}", v.type_name()))
    })
}

fn split_source<'a>(args: &'a [Expr], op: &str) -> Result<(&'a Expr, &'a Expr), EvalError> {
    match args {
        [first, source] => Ok((first, source)),
        _ => Err(EvalError::TypeError(format!(
            "{} requires two operands, got {}",
            op,
            args.len()
        ))),
    }
}

async fn keep_matching(
    rows: Vec<Row>,
    condition: &Expr,
    env: &Environment,
) -> Result<Vec<Row>, EvalError> {
    if condition.is_empty() {
        return Ok(rows);
    }
    let mut kept = Vec::new();
    for row in rows {
        let scoped = env.surround(row);
        if scoped.evaluate(condition).await?.as_bool() {
            kept.extend(scoped.row().cloned());
        }
    }
    Ok(kept)
}

/// `$from(@table)`
pub fn from<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(async move {
        let [source] = args else {
            return Err(EvalError::TypeError("$from takes exactly one source".to_string()));
        };
        Ok(Value::Rows(source_rows(source, env).await?))
    })
}

/// `$as(alias, source)` re-tags a relation under a new alias. Applied to a
/// scalar it returns the scalar; `$select` reads the alias itself.
pub fn alias<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(async move {
        let (name, source) = split_source(args, "$as")?;
        let alias = name
            .as_name()
            .ok_or_else(|| EvalError::TypeError("$as alias must be a name".to_string()))?;
        Ok(match env.evaluate(source).await? {
            Value::Rows(rows) => Value::Rows(
                rows.into_iter()
                    .map(|row| match row.tables.len() {
                        1 if !row.is_grouped() => {
                            Row::single(alias, row.tables.into_values().next().unwrap_or(Value::Null))
                        }
                        _ => Row::single(alias, Value::Object(row.flatten())),
                    })
                    .collect(),
            ),
            Value::Array(items) => Value::Rows(
                items
                    .into_iter()
                    .map(|record| Row::single(alias, record))
                    .collect(),
            ),
            other => other,
        })
    })
}

async fn join_rows(args: &[Expr], env: &Environment, outer: bool) -> Result<Value, EvalError> {
    let [right, condition, left] = args else {
        return Err(EvalError::TypeError(
            "join requires a source, a condition and a left source".to_string(),
        ));
    };
    let left_rows = source_rows(left, env).await?;
    let right_rows = source_rows(right, env).await?;

    let right_aliases: Vec<String> = match right_rows.first() {
        Some(row) => row.tables.keys().cloned().collect(),
        None => source_alias(right).map(str::to_string).into_iter().collect(),
    };

    let mut out = Vec::new();
    for l in &left_rows {
        let mut matched = false;
        for r in &right_rows {
            let merged = l.merge(r);
            let keep = condition.is_empty()
                || env.surround(merged.clone()).evaluate(condition).await?.as_bool();
            if keep {
                matched = true;
                out.push(merged);
            }
        }
        if outer && !matched {
            let mut missing = Row::default();
            for alias in &right_aliases {
                missing.tables.insert(alias.clone(), Value::Null);
            }
            out.push(l.merge(&missing));
        }
    }
    Ok(Value::Rows(out))
}

/// `$join(right, on, left)` - inner nested-loop join.
pub fn join<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(join_rows(args, env, false))
}

/// `$leftJoin(right, on, left)` - unmatched left rows bind the right
/// aliases to null.
pub fn left_join<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(join_rows(args, env, true))
}

/// `$where(condition, source)`; an empty condition keeps every row.
pub fn filter_rows<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(async move {
        let (condition, source) = split_source(args, "$where")?;
        let rows = source_rows(source, env).await?;
        Ok(Value::Rows(keep_matching(rows, condition, env).await?))
    })
}

/// `$having(condition, groups)`
pub fn having<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(async move {
        let (condition, source) = split_source(args, "$having")?;
        let rows = source_rows(source, env).await?;
        Ok(Value::Rows(keep_matching(rows, condition, env).await?))
    })
}

/// Name a group key is stored under: `:city` -> `city`,
/// `users:city` -> `users:city`.
fn group_key_name(expr: &Expr, env: &Environment) -> String {
    if let Some(symbol) = expr.as_name()
        && let Some((token, name)) = env.split_symbol(symbol)
        && token != ROW
        && token.ends_with(':')
    {
        return format!("{token}{name}");
    }
    output_name(expr, env)
}

/// Column name of an unaliased projection.
pub(crate) fn output_name(expr: &Expr, env: &Environment) -> String {
    if let Some(alias) = expr.is_call(OperatorName::As).then(|| expr.operands().first()).flatten()
        && let Some(name) = alias.as_name()
    {
        return name.to_string();
    }
    match expr {
        Expr::Symbol(s) => match env.split_symbol(s) {
            Some((_, name)) => name.to_string(),
            None => s.clone(),
        },
        _ => match expr.head().and_then(OperatorName::from_name) {
            Some(op) => op.column_name().to_string(),
            None => "?column?".to_string(),
        },
    }
}

/// `$group(keys, source)` - one group row per distinct key tuple, in
/// first-seen order.
pub fn group<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(async move {
        let (keys, source) = split_source(args, "$group")?;
        let keys = if keys.is_empty() { &[][..] } else { keys.items() };
        let rows = source_rows(source, env).await?;

        let mut groups: IndexMap<String, (Vec<Value>, Vec<Row>)> = IndexMap::new();
        for row in rows {
            let scoped = env.surround(row.clone());
            let mut values = Vec::with_capacity(keys.len());
            for key in keys {
                values.push(scoped.evaluate(key).await?);
            }
            let id = to_json(&Value::Array(values.clone()));
            groups.entry(id).or_insert_with(|| (values, Vec::new())).1.push(row);
        }

        let names: Vec<String> = keys.iter().map(|k| group_key_name(k, env)).collect();
        Ok(Value::Rows(
            groups
                .into_values()
                .map(|(values, members)| {
                    let record: Record = names.iter().cloned().zip(values).collect();
                    Row::group(record, members)
                })
                .collect(),
        ))
    })
}

/// `$order(specs, source)` - stable sort with numeric-aware collation.
pub fn order<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(async move {
        let (specs, source) = split_source(args, "$order")?;
        let specs = OrderSpec::parse_list(specs)?;
        let descending: Vec<bool> = specs.iter().map(|s| s.descending).collect();
        let rows = source_rows(source, env).await?;

        let mut keyed = Vec::with_capacity(rows.len());
        for row in rows {
            let scoped = env.surround(row.clone());
            let mut keys = Vec::with_capacity(specs.len());
            for spec in &specs {
                keys.push(scoped.evaluate(spec.expr).await?);
            }
            keyed.push((keys, row));
        }
        keyed.sort_by(|(a, _), (b, _)| compare_keys(a, b, &descending));
        Ok(Value::Rows(keyed.into_iter().map(|(_, row)| row).collect()))
    })
}

/// `$limit(n | {offset, limit}, source)`
pub fn limit<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(async move {
        let (spec, source) = split_source(args, "$limit")?;
        let page = Pagination::from_value(&env.evaluate(spec).await?)?;
        Ok(match env.evaluate(source).await? {
            Value::Array(items) => Value::Array(page.apply(items)),
            other => {
                let rows = to_rows(other, "").map_err(|v| {
                    EvalError::TypeError(format!("$limit requires rows, got {}", v.type_name()))
                })?;
                Value::Rows(page.apply(rows))
            }
        })
    })
}

/// `$union(a, b, ...)` - concatenation, duplicates kept.
pub fn union<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(async move {
        let mut branches = Vec::with_capacity(args.len());
        for branch in args {
            branches.push(env.evaluate(branch).await?);
        }
        if branches.iter().all(|b| matches!(b, Value::Array(_) | Value::Null)) {
            let mut out = Vec::new();
            for branch in branches {
                if let Value::Array(items) = branch {
                    out.extend(items);
                }
            }
            return Ok(Value::Array(out));
        }
        let mut out = Vec::new();
        for (branch, expr) in branches.into_iter().zip(args) {
            let rows = to_rows(branch, source_alias(expr).unwrap_or_default()).map_err(|v| {
                EvalError::TypeError(format!("$union requires rows, got {}", v.type_name()))
            })?;
            out.extend(rows);
        }
        Ok(Value::Rows(out))
    })
}

fn not_nested(op: OperatorName) -> bool {
    matches!(op, OperatorName::Over | OperatorName::Select)
}

/// `$select(fields, source?)` - project each row into a plain record.
///
/// Aggregates over an ungrouped source collapse it into a single group,
/// even when it is empty. Projections containing `$over` give every row
/// access to the full row list for its window.
pub fn select<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(async move {
        let (fields, source) = match args {
            [fields] => (fields, None),
            [fields, source] => (fields, Some(source)),
            _ => {
                return Err(EvalError::TypeError(
                    "$select requires fields and an optional source".to_string(),
                ));
            }
        };
        let fields = if fields.is_empty() { &[][..] } else { fields.items() };

        let mut rows = match source {
            Some(source) => source_rows(source, env).await?,
            None => vec![env.row().cloned().unwrap_or_default()],
        };

        let aggregated = fields
            .iter()
            .any(|f| f.contains_call(&OperatorName::is_aggregate, &not_nested));
        if aggregated && !rows.iter().any(Row::is_grouped) {
            rows = vec![Row::group(Record::new(), rows)];
        }
        let windowed = fields
            .iter()
            .any(|f| f.contains_call(&|op| op == OperatorName::Over, &|op| op == OperatorName::Select));
        let shared = windowed.then(|| Arc::new(rows.clone()));

        let mut out = Vec::with_capacity(rows.len());
        for (index, row) in rows.into_iter().enumerate() {
            let mut scoped = env.surround(row);
            if let Some(rows) = &shared {
                scoped = scoped.with_window(WindowState::Source {
                    rows: Arc::clone(rows),
                    index,
                });
            }
            let mut record = Record::new();
            if fields.is_empty() {
                record.extend(scoped.row().map(Row::flatten).unwrap_or_default());
            }
            for field in fields {
                project(field, &scoped, &mut record).await?;
            }
            out.push(Value::Object(record));
        }
        Ok(Value::Array(out))
    })
}

async fn project(field: &Expr, env: &Environment, record: &mut Record) -> Result<(), EvalError> {
    if field.is_call(OperatorName::As) {
        let (alias, value) = split_source(field.operands(), "$as")?;
        let name = alias
            .as_name()
            .ok_or_else(|| EvalError::TypeError("$as alias must be a name".to_string()))?;
        record.insert(name.to_string(), env.evaluate(value).await?);
        return Ok(());
    }

    if let Some(symbol) = field.as_name() {
        if symbol == "*" || symbol == ":*" {
            let first = env.row().and_then(|row| row.tables.values().next());
            if let Some(Value::Object(map)) = first {
                record.extend(map.clone());
            }
            return Ok(());
        }
        if let Some(table) = symbol.strip_suffix(":*") {
            if !env.has_token(&format!("{table}:")) {
                return Err(EvalError::UnknownNamespace(format!("{table}:")));
            }
            if let Some(Value::Object(map)) = env.row().and_then(|row| row.tables.get(table)) {
                for (k, v) in map {
                    record.insert(format!("{table}:{k}"), v.clone());
                }
            }
            return Ok(());
        }
    }

    let value = env.evaluate(field).await?;
    record.insert(output_name(field, env), value);
    Ok(())
}

