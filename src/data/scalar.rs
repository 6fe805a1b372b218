//! Scalar operators over plain values: comparison, logic, arithmetic and
//! string/date helpers. The SQL backend falls back to these when none of
//! the operands is SQL.

use std::cmp::Ordering;

use chrono::{DateTime, Datelike, Utc};

use crate::{
    ast::Expr,
    environment::{Environment, EvalFuture, EvalResult},
    evaluator::EvalError,
    operators::{
        arith::{self, ArithOp},
        common::two,
        compare::{compare, like, loose_eq},
    },
    value::Value,
};

/// Every operand after the first is tested against the first.
fn comparison(
    args: Vec<Value>,
    op: &str,
    test: fn(&Value, &Value) -> Result<bool, EvalError>,
) -> EvalResult {
    let Some((first, rest)) = args.split_first() else {
        return Err(EvalError::TypeError(format!("'{}' requires operands", op)));
    };
    if rest.is_empty() {
        return Err(EvalError::TypeError(format!(
            "'{}' requires at least two operands",
            op
        )));
    }
    for other in rest {
        if !test(first, other)? {
            return Ok(Value::Boolean(false));
        }
    }
    Ok(Value::Boolean(true))
}

fn ordered(a: &Value, b: &Value, accept: fn(Ordering) -> bool) -> Result<bool, EvalError> {
    Ok(compare(a, b)?.is_some_and(accept))
}

pub fn equal(args: Vec<Value>) -> EvalResult {
    comparison(args, "=", |a, b| Ok(loose_eq(a, b)))
}

pub fn not_equal(args: Vec<Value>) -> EvalResult {
    comparison(args, "!=", |a, b| Ok(!loose_eq(a, b)))
}

pub fn greater_than(args: Vec<Value>) -> EvalResult {
    comparison(args, ">", |a, b| ordered(a, b, Ordering::is_gt))
}

pub fn less_than(args: Vec<Value>) -> EvalResult {
    comparison(args, "<", |a, b| ordered(a, b, Ordering::is_lt))
}

pub fn greater_equal(args: Vec<Value>) -> EvalResult {
    comparison(args, ">=", |a, b| ordered(a, b, Ordering::is_ge))
}

pub fn less_equal(args: Vec<Value>) -> EvalResult {
    comparison(args, "<=", |a, b| ordered(a, b, Ordering::is_le))
}

fn like_with(args: Vec<Value>, op: &str, case_insensitive: bool) -> EvalResult {
    let (value, pattern) = two(args, op)?;
    let Value::String(pattern) = pattern else {
        return Err(EvalError::TypeError(format!(
            "{} pattern must be a string, got {}",
            op,
            pattern.type_name()
        )));
    };
    if value.is_null() {
        return Ok(Value::Boolean(false));
    }
    Ok(Value::Boolean(like(&value.as_string(), &pattern, case_insensitive)?))
}

pub fn like_match(args: Vec<Value>) -> EvalResult {
    like_with(args, "$like", false)
}

pub fn ilike_match(args: Vec<Value>) -> EvalResult {
    like_with(args, "$ilike", true)
}

/// `$in(value, list)`
pub fn in_list(args: Vec<Value>) -> EvalResult {
    let (value, list) = two(args, "$in")?;
    match list {
        Value::Array(items) => Ok(Value::Boolean(items.iter().any(|i| loose_eq(i, &value)))),
        Value::Null => Ok(Value::Boolean(false)),
        other => Err(EvalError::TypeError(format!(
            "$in requires an array, got {}",
            other.type_name()
        ))),
    }
}

/// `$contains(haystack, needle)` - array superset or substring.
pub fn contains(args: Vec<Value>) -> EvalResult {
    let (haystack, needle) = two(args, "$contains")?;
    let found = match (&haystack, &needle) {
        (Value::Null, _) => false,
        (Value::Array(items), Value::Array(wanted)) => wanted
            .iter()
            .all(|w| items.iter().any(|i| loose_eq(i, w))),
        (Value::Array(items), single) => items.iter().any(|i| loose_eq(i, single)),
        (Value::String(text), Value::String(part)) => text.contains(part.as_str()),
        (Value::Object(map), Value::Object(wanted)) => wanted
            .iter()
            .all(|(k, w)| map.get(k).is_some_and(|v| loose_eq(v, w))),
        (h, n) => {
            return Err(EvalError::TypeError(format!(
                "$contains cannot search {} for {}",
                h.type_name(),
                n.type_name()
            )));
        }
    };
    Ok(Value::Boolean(found))
}

pub fn is_null(args: Vec<Value>) -> EvalResult {
    if args.is_empty() {
        return Err(EvalError::TypeError("$isnull requires an operand".to_string()));
    }
    Ok(Value::Boolean(args.iter().all(Value::is_null)))
}

pub fn and(args: Vec<Value>) -> EvalResult {
    Ok(Value::Boolean(args.iter().all(Value::as_bool)))
}

pub fn or(args: Vec<Value>) -> EvalResult {
    Ok(Value::Boolean(args.iter().any(Value::as_bool)))
}

pub fn not(args: Vec<Value>) -> EvalResult {
    match args.as_slice() {
        [value] => Ok(Value::Boolean(!value.as_bool())),
        _ => Err(EvalError::TypeError("$not takes exactly one operand".to_string())),
    }
}

pub fn add(args: Vec<Value>) -> EvalResult {
    arith::reduce(ArithOp::Add, args)
}

pub fn subtract(args: Vec<Value>) -> EvalResult {
    arith::reduce(ArithOp::Subtract, args)
}

pub fn multiply(args: Vec<Value>) -> EvalResult {
    arith::reduce(ArithOp::Multiply, args)
}

pub fn divide(args: Vec<Value>) -> EvalResult {
    arith::reduce(ArithOp::Divide, args)
}

/// `$concat(a, b, ...)` - string concatenation; null reads as empty.
pub fn concat(args: Vec<Value>) -> EvalResult {
    let mut out = String::new();
    for arg in args {
        push_text(&arg, &mut out);
    }
    Ok(Value::String(out))
}

fn push_text(value: &Value, out: &mut String) {
    match value {
        Value::Null => {}
        Value::Array(items) => items.iter().for_each(|i| push_text(i, out)),
        other => out.push_str(&other.as_string()),
    }
}

/// Date parts `$extract` understands, in both backends.
pub const EXTRACT_FIELDS: [&str; 4] = ["epoch", "day", "month", "year"];

/// Normalize an `$extract` part name, rejecting unknown ones.
pub fn extract_field(part: &Value) -> Result<String, EvalError> {
    let name = part.as_string().to_ascii_lowercase();
    if EXTRACT_FIELDS.contains(&name.as_str()) {
        Ok(name)
    } else {
        Err(EvalError::UnsupportedExtractField(part.as_string()))
    }
}

/// `$extract(part, date)`. Epoch is in seconds; a date may also be given
/// as epoch milliseconds.
pub fn extract(args: Vec<Value>) -> EvalResult {
    let (part, value) = two(args, "$extract")?;
    let field = extract_field(&part)?;
    if value.is_null() {
        return Ok(Value::Null);
    }
    let millis = match &value {
        Value::Date(_) | Value::Integer(_) | Value::Float(_) => value.epoch_millis(),
        _ => None,
    }
    .ok_or_else(|| {
        EvalError::TypeError(format!("$extract requires a date, got {}", value.type_name()))
    })?;

    if field == "epoch" {
        return Ok(if millis % 1000 == 0 {
            Value::Integer(millis / 1000)
        } else {
            Value::Float(millis as f64 / 1000.0)
        });
    }

    let date = DateTime::<Utc>::from_timestamp_millis(millis)
        .ok_or_else(|| EvalError::TypeError(format!("Timestamp out of range: {}", millis)))?;
    Ok(Value::Integer(match field.as_str() {
        "day" => date.day() as i64,
        "month" => date.month() as i64,
        _ => date.year() as i64,
    }))
}

/// `$filter(field, predicate)` - the field where the predicate holds,
/// otherwise null. Aggregates skip the nulls.
pub fn filter<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(async move {
        let [field, predicate] = args else {
            return Err(EvalError::TypeError(
                "$filter requires a field and a predicate".to_string(),
            ));
        };
        if env.evaluate(predicate).await?.as_bool() {
            env.evaluate(field).await
        } else {
            Ok(Value::Null)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_nary_comparison_against_first() {
        let args = vec![Value::Integer(10), Value::Integer(3), Value::Integer(5)];
        assert_eq!(greater_than(args).unwrap(), Value::Boolean(true));
        let args = vec![Value::Integer(4), Value::Integer(3), Value::Integer(5)];
        assert_eq!(greater_than(args).unwrap(), Value::Boolean(false));
    }

    #[test]
    fn test_ordered_comparison_with_null_is_false() {
        let args = vec![Value::Null, Value::Integer(3)];
        assert_eq!(less_than(args).unwrap(), Value::Boolean(false));
    }

    #[test]
    fn test_extract_parts() {
        let d = Value::Date(Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap());
        assert_eq!(
            extract(vec!["month".into(), d.clone()]).unwrap(),
            Value::Integer(3)
        );
        assert_eq!(
            extract(vec!["epoch".into(), d]).unwrap(),
            Value::Integer(1_709_985_600)
        );
    }

    #[test]
    fn test_extract_unknown_part() {
        let err = extract(vec!["week".into(), Value::Integer(0)]).unwrap_err();
        assert_eq!(err, EvalError::UnsupportedExtractField("week".to_string()));
    }

    #[test]
    fn test_contains_array_superset() {
        let tags = Value::Array(vec!["a".into(), "b".into(), "c".into()]);
        let wanted = Value::Array(vec!["c".into(), "a".into()]);
        assert_eq!(contains(vec![tags, wanted]).unwrap(), Value::Boolean(true));
    }
}
