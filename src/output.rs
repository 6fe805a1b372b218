//! JSON conversion for values.
//!
//! Values map onto JSON one-to-one except for the variants JSON lacks:
//!
//! - dates are written as RFC 3339 strings with millisecond precision
//! - in-memory rows are written as their flattened records
//! - SQL columns are written as their quoted text
//! - SQL fragments are written as `{"statement": ..., "values": [...]}`
//! - non-finite floats are written as `null`
//!
//! Record keys keep their insertion order.
//!
//! # Examples
//!
//! ```
//! use symql::Value;
//! use symql::output::{to_json, to_json_pretty};
//!
//! let value = Value::Array(vec![Value::Integer(1), Value::Float(2.5)]);
//! assert_eq!(to_json(&value), "[1,2.5]");
//! assert_eq!(to_json_pretty(&Value::Integer(42)), "42");
//! ```

use chrono::SecondsFormat;
use serde_json::{Map, Number};

use crate::{sql::PlaceholderStyle, value::Value};

/// Convert a value to `serde_json::Value`.
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Boolean(b) => serde_json::Value::Bool(*b),
        Value::Integer(i) => serde_json::Value::Number((*i).into()),
        Value::Float(f) => Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Date(d) => serde_json::Value::String(d.to_rfc3339_opts(SecondsFormat::Millis, true)),
        Value::Array(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
        Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), value_to_json(v)))
                .collect::<Map<_, _>>(),
        ),
        Value::Rows(rows) => serde_json::Value::Array(
            rows.iter()
                .map(|row| value_to_json(&Value::Object(row.flatten())))
                .collect(),
        ),
        Value::Column(column) => serde_json::Value::String(column.to_string()),
        Value::Fragment(fragment) => {
            let query = fragment.render(PlaceholderStyle::Dollar);
            serde_json::json!({
                "statement": query.statement,
                "values": query.values.iter().map(value_to_json).collect::<Vec<_>>(),
            })
        }
    }
}

/// Convert parsed JSON to a value. Whole numbers become integers.
pub fn json_to_value(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
        },
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(items) => Value::Array(items.into_iter().map(json_to_value).collect()),
        serde_json::Value::Object(map) => {
            Value::Object(map.into_iter().map(|(k, v)| (k, json_to_value(v))).collect())
        }
    }
}

/// Compact JSON text.
pub fn to_json(value: &Value) -> String {
    value_to_json(value).to_string()
}

/// JSON text with 2-space indentation.
pub fn to_json_pretty(value: &Value) -> String {
    let json = value_to_json(value);
    serde_json::to_string_pretty(&json).unwrap_or_else(|_| json.to_string())
}
