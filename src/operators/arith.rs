//! Arithmetic with integer preservation.
//!
//! Integer operands stay integers. Mixed integer/float operands go through
//! `rust_decimal` so `100 * 1.1` is `110`, not `110.00000000000001`.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, prelude::FromPrimitive, prelude::ToPrimitive};

use crate::{evaluator::EvalError, value::Value};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArithOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl ArithOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Subtract => "-",
            ArithOp::Multiply => "*",
            ArithOp::Divide => "/",
        }
    }
}

/// Fold `op` over the operands, flattening nested arrays first.
///
/// A single operand to `-` is negated. Any null operand makes the result
/// null.
pub fn reduce(op: ArithOp, values: Vec<Value>) -> Result<Value, EvalError> {
    let mut operands = Vec::new();
    flatten_into(values, &mut operands);

    let mut iter = operands.into_iter();
    let Some(first) = iter.next() else {
        return match op {
            ArithOp::Add => Ok(Value::Integer(0)),
            ArithOp::Multiply => Ok(Value::Integer(1)),
            _ => Err(EvalError::TypeError(format!(
                "'{}' requires at least one operand",
                op.symbol()
            ))),
        };
    };

    let mut rest = iter.peekable();
    if op == ArithOp::Subtract && rest.peek().is_none() {
        return apply(ArithOp::Subtract, &Value::Integer(0), &first);
    }

    rest.try_fold(first, |acc, v| apply(op, &acc, &v))
}

fn flatten_into(values: Vec<Value>, out: &mut Vec<Value>) {
    for v in values {
        match v {
            Value::Array(inner) => flatten_into(inner, out),
            other => out.push(other),
        }
    }
}

/// Apply a binary arithmetic operator.
pub fn apply(op: ArithOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::Integer(a), Value::Integer(b)) => integer_op(op, *a, *b),
        (Value::Float(a), Value::Float(b)) => Ok(Value::Float(float_op(op, *a, *b))),
        (Value::Integer(_), Value::Float(_)) | (Value::Float(_), Value::Integer(_)) => {
            if let Some(result) = decimal_op(op, left, right) {
                return Ok(result);
            }
            let (a, b) = (left.as_float().unwrap_or(0.0), right.as_float().unwrap_or(0.0));
            Ok(Value::Float(float_op(op, a, b)))
        }
        (Value::Date(a), Value::Date(b)) if op == ArithOp::Subtract => {
            Ok(Value::Integer(a.timestamp_millis() - b.timestamp_millis()))
        }
        (Value::Date(d), Value::Integer(ms)) if matches!(op, ArithOp::Add | ArithOp::Subtract) => {
            let delta = if op == ArithOp::Add { Some(*ms) } else { ms.checked_neg() };
            delta
                .and_then(|delta| d.timestamp_millis().checked_add(delta))
                .and_then(DateTime::<Utc>::from_timestamp_millis)
                .map(Value::Date)
                .ok_or_else(|| EvalError::TypeError("Date arithmetic out of range".to_string()))
        }
        (Value::String(a), b) if op == ArithOp::Add => Ok(Value::String(format!("{}{}", a, b.as_string()))),
        (a, Value::String(b)) if op == ArithOp::Add => Ok(Value::String(format!("{}{}", a.as_string(), b))),
        (a, b) => Err(EvalError::TypeError(format!(
            "Cannot apply '{}' to {} and {}",
            op.symbol(),
            a.type_name(),
            b.type_name()
        ))),
    }
}

fn integer_op(op: ArithOp, a: i64, b: i64) -> Result<Value, EvalError> {
    let checked = match op {
        ArithOp::Add => a.checked_add(b),
        ArithOp::Subtract => a.checked_sub(b),
        ArithOp::Multiply => a.checked_mul(b),
        ArithOp::Divide => {
            if b == 0 {
                return Err(EvalError::DivisionByZero);
            }
            // Check if division is exact; if not, return Float
            if a % b == 0 {
                Some(a / b)
            } else {
                return Ok(Value::Float(a as f64 / b as f64));
            }
        }
    };
    Ok(checked
        .map(Value::Integer)
        .unwrap_or_else(|| Value::Float(float_op(op, a as f64, b as f64))))
}

fn float_op(op: ArithOp, a: f64, b: f64) -> f64 {
    match op {
        ArithOp::Add => a + b,
        ArithOp::Subtract => a - b,
        ArithOp::Multiply => a * b,
        ArithOp::Divide => a / b,
    }
}

fn to_decimal(v: &Value) -> Option<Decimal> {
    match v {
        Value::Integer(n) => Decimal::from_i64(*n),
        Value::Float(n) => Decimal::from_f64(*n),
        _ => None,
    }
}

fn decimal_op(op: ArithOp, left: &Value, right: &Value) -> Option<Value> {
    let (ad, bd) = (to_decimal(left)?, to_decimal(right)?);
    let rd = match op {
        ArithOp::Add => ad.checked_add(bd)?,
        ArithOp::Subtract => ad.checked_sub(bd)?,
        ArithOp::Multiply => ad.checked_mul(bd)?,
        ArithOp::Divide => ad.checked_div(bd)?,
    };
    if rd.is_integer()
        && let Some(r) = rd.to_i64()
    {
        return Some(Value::Integer(r));
    }
    rd.to_f64().map(Value::Float)
}
