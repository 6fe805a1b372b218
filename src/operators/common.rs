//! Operators that behave identically in both backends: plain-value
//! utilities, date parsing, the `_wait` fan-out and scoped `_define`.

use chrono::{DateTime, NaiveDate, Utc};
use futures::future::try_join_all;

use crate::{
    ast::Expr,
    environment::{Environment, EvalFuture, EvalResult},
    evaluator::EvalError,
    operators::compare::loose_eq,
    value::Value,
};

/// `_get(object, path, default?)` - dotted-path lookup with a fallback.
pub fn get(args: Vec<Value>) -> EvalResult {
    let mut args = args.into_iter();
    let object = args.next().unwrap_or(Value::Null);
    let path = args.next().unwrap_or(Value::Null);
    let default = args.next().unwrap_or(Value::Null);

    let found = match &path {
        Value::String(p) => object.lookup_path(p),
        Value::Integer(i) => match &object {
            Value::Array(arr) => usize::try_from(*i).ok().and_then(|i| arr.get(i).cloned()),
            _ => object.lookup_path(&i.to_string()),
        },
        other => {
            return Err(EvalError::TypeError(format!(
                "_get path must be a string or index, got {}",
                other.type_name()
            )));
        }
    };

    Ok(match found {
        Some(Value::Null) | None => default,
        Some(v) => v,
    })
}

/// `_map(list, field)` - project one field out of every record.
pub fn map(args: Vec<Value>) -> EvalResult {
    let (list, field) = two(args, "_map")?;
    let Value::String(field) = field else {
        return Err(EvalError::TypeError(format!(
            "_map field must be a string, got {}",
            field.type_name()
        )));
    };
    match list {
        Value::Array(items) => Ok(Value::Array(
            items
                .iter()
                .map(|item| item.lookup_path(&field).unwrap_or(Value::Null))
                .collect(),
        )),
        Value::Null => Ok(Value::Array(Vec::new())),
        other => Err(EvalError::TypeError(format!(
            "_map requires array, got {}",
            other.type_name()
        ))),
    }
}

/// `_unique(list)` - drop duplicates, keeping first occurrences in order.
pub fn unique(args: Vec<Value>) -> EvalResult {
    let list = args.into_iter().next().unwrap_or(Value::Null);
    let Value::Array(items) = list else {
        return Err(EvalError::TypeError(format!(
            "_unique requires array, got {}",
            list.type_name()
        )));
    };
    let mut result: Vec<Value> = Vec::new();
    for item in items {
        if !result.iter().any(|seen| loose_eq(seen, &item)) {
            result.push(item);
        }
    }
    Ok(Value::Array(result))
}

/// `_size(x)` - length of an array, string, record or relation.
pub fn size(args: Vec<Value>) -> EvalResult {
    let value = args.into_iter().next().unwrap_or(Value::Null);
    let n = match &value {
        Value::Null => 0,
        Value::Array(arr) => arr.len(),
        Value::String(s) => s.chars().count(),
        Value::Object(obj) => obj.len(),
        Value::Rows(rows) => rows.len(),
        other => {
            return Err(EvalError::TypeError(format!(
                "_size requires array, string or object, got {}",
                other.type_name()
            )));
        }
    };
    Ok(Value::Integer(n as i64))
}

/// `_concat(a, b, ...)` - concatenate lists; scalars are appended as-is.
pub fn concat_lists(args: Vec<Value>) -> EvalResult {
    let mut out = Vec::new();
    for arg in args {
        match arg {
            Value::Array(items) => out.extend(items),
            Value::Null => {}
            other => out.push(other),
        }
    }
    Ok(Value::Array(out))
}

/// `$date(x)` - RFC 3339 / ISO-8601 text, a plain `YYYY-MM-DD` day, or
/// epoch milliseconds.
pub fn date(args: Vec<Value>) -> EvalResult {
    let value = args.into_iter().next().unwrap_or(Value::Null);
    match &value {
        Value::Date(_) | Value::Null => Ok(value),
        Value::Integer(ms) => DateTime::<Utc>::from_timestamp_millis(*ms)
            .map(Value::Date)
            .ok_or_else(|| EvalError::TypeError(format!("Timestamp out of range: {}", ms))),
        Value::Float(ms) => DateTime::<Utc>::from_timestamp_millis(ms.round() as i64)
            .map(Value::Date)
            .ok_or_else(|| EvalError::TypeError(format!("Timestamp out of range: {}", ms))),
        Value::String(s) => parse_date(s)
            .map(Value::Date)
            .ok_or_else(|| EvalError::TypeError(format!("Invalid date: '{}'", s))),
        other => Err(EvalError::TypeError(format!(
            "$date requires string or number, got {}",
            other.type_name()
        ))),
    }
}

pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(d) = DateTime::parse_from_rfc3339(s) {
        return Some(d.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()?
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
}

/// `_wait(a, b, ...)` - evaluate every operand concurrently and resolve to
/// their results in operand order.
pub fn wait<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(async move {
        let results = try_join_all(args.iter().map(|arg| env.evaluate(arg))).await?;
        Ok(Value::Array(results))
    })
}

/// `_define(symbol, value, body?)` - evaluate `body` with `symbol` bound to
/// `value` in its namespace. Without a body the value itself is returned.
pub fn define<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(async move {
        let [target, value_expr, rest @ ..] = args else {
            return Err(EvalError::TypeError(
                "_define requires a symbol and a value".to_string(),
            ));
        };
        let symbol = target.as_name().ok_or_else(|| {
            EvalError::TypeError("_define target must be a symbol".to_string())
        })?;
        let (token, name) = env
            .split_symbol(symbol)
            .ok_or_else(|| EvalError::UnknownNamespace(symbol.to_string()))?;

        let value = env.evaluate(value_expr).await?;
        match rest {
            [] => Ok(value),
            [body] => {
                let scoped = env.extend(token, name, value)?;
                scoped.evaluate(body).await
            }
            _ => Err(EvalError::TypeError(
                "_define takes at most one body expression".to_string(),
            )),
        }
    })
}

/// Row window of `$limit`: `n` or `{offset, limit}`. Zero reads as absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pagination {
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl Pagination {
    pub fn from_value(value: &Value) -> Result<Self, EvalError> {
        let count = |v: Option<Value>, what: &str| -> Result<Option<usize>, EvalError> {
            match v {
                None | Some(Value::Null) => Ok(None),
                Some(Value::Integer(n)) if n >= 0 => Ok((n > 0).then_some(n as usize)),
                Some(other) => Err(EvalError::TypeError(format!(
                    "$limit {} must be a non-negative integer, got {}",
                    what,
                    other.type_name()
                ))),
            }
        };
        match value {
            Value::Object(map) => Ok(Pagination {
                offset: count(map.get("offset").cloned(), "offset")?,
                limit: count(map.get("limit").cloned(), "limit")?,
            }),
            other => Ok(Pagination {
                offset: None,
                limit: count(Some(other.clone()), "count")?,
            }),
        }
    }

    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset.unwrap_or(0))
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }
}

/// Split a two-operand function's arguments.
pub(crate) fn two(args: Vec<Value>, op: &str) -> Result<(Value, Value), EvalError> {
    let mut iter = args.into_iter();
    match (iter.next(), iter.next(), iter.next()) {
        (Some(a), Some(b), None) => Ok((a, b)),
        _ => Err(EvalError::TypeError(format!(
            "{} requires exactly two operands",
            op
        ))),
    }
}
