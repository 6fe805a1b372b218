//! Value comparison shared by the comparison operators, `$order` and the
//! window functions.

use std::cmp::Ordering;

use regex::Regex;

use crate::{evaluator::EvalError, output::to_json, value::Value};

/// Equality with numeric and date normalization: `5 == 5.0`, and a date
/// equals its epoch-millisecond value.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => x == y,
        (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
            a.as_float() == b.as_float()
        }
        (Value::Date(_), Value::Date(_) | Value::Integer(_) | Value::Float(_))
        | (Value::Integer(_) | Value::Float(_), Value::Date(_)) => {
            a.epoch_millis() == b.epoch_millis()
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| loose_eq(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, l)| y.get(k).is_some_and(|r| loose_eq(l, r)))
        }
        _ => a == b,
    }
}

/// Ordering for `<`, `>`, `<=`, `>=`.
///
/// `None` when either side is null (the comparison is then false).
/// Incompatible types are a type error.
pub fn compare(a: &Value, b: &Value) -> Result<Option<Ordering>, EvalError> {
    let ordering = match (a, b) {
        (Value::Null, _) | (_, Value::Null) => return Ok(None),
        (Value::Integer(x), Value::Integer(y)) => x.cmp(y),
        (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
            match a.as_float().partial_cmp(&b.as_float()) {
                Some(o) => o,
                None => return Ok(None),
            }
        }
        (Value::Date(_), Value::Date(_) | Value::Integer(_) | Value::Float(_))
        | (Value::Integer(_) | Value::Float(_), Value::Date(_)) => {
            a.epoch_millis().cmp(&b.epoch_millis())
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Boolean(x), Value::Boolean(y)) => x.cmp(y),
        (a, b) => {
            return Err(EvalError::TypeError(format!(
                "Cannot compare {} with {}",
                a.type_name(),
                b.type_name()
            )));
        }
    };
    Ok(Some(ordering))
}

/// Ordering used by `$order` and window ordering: both values serialized to
/// JSON and compared with numeric-aware collation, so `2 < 10` and
/// `"item2" < "item10"`.
pub fn collate(a: &Value, b: &Value) -> Ordering {
    natural_cmp(&to_json(a), &to_json(b))
}

/// Compare strings treating each run of ASCII digits as a number.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (mut ai, mut bi) = (a.chars().peekable(), b.chars().peekable());
    loop {
        match (ai.peek().copied(), bi.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let left = take_digits(&mut ai);
                let right = take_digits(&mut bi);
                let ordering = compare_digit_runs(&left, &right);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(&y);
                }
                ai.next();
                bi.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(c) = chars.peek().copied() {
        if !c.is_ascii_digit() {
            break;
        }
        run.push(c);
        chars.next();
    }
    run
}

fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a_trim = a.trim_start_matches('0');
    let b_trim = b.trim_start_matches('0');
    a_trim
        .len()
        .cmp(&b_trim.len())
        .then_with(|| a_trim.cmp(b_trim))
        .then_with(|| a.len().cmp(&b.len()))
}

/// Convert SQL LIKE pattern to regex
///
/// % matches zero or more characters
/// _ matches exactly one character
/// \ escapes the next character
pub fn like_to_regex(pattern: &str, case_insensitive: bool) -> String {
    let mut regex = String::with_capacity(pattern.len() * 2 + 6);

    if case_insensitive {
        regex.push_str("(?i)");
    }
    regex.push_str("(?s)^");

    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '%' => regex.push_str(".*"),
            '_' => regex.push('.'),
            '\\' => {
                if let Some(next) = chars.next() {
                    regex.push_str(&regex::escape(&next.to_string()));
                }
            }
            other => regex.push_str(&regex::escape(&other.to_string())),
        }
    }

    regex.push('$');
    regex
}

/// Match `text` against a LIKE pattern.
pub fn like(text: &str, pattern: &str, case_insensitive: bool) -> Result<bool, EvalError> {
    let re = Regex::new(&like_to_regex(pattern, case_insensitive))
        .map_err(|e| EvalError::TypeError(format!("Invalid LIKE pattern: {}", e)))?;
    Ok(re.is_match(text))
}
