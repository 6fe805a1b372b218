use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::{
    row::Row,
    sql::fragment::{ColumnRef, Fragment},
};

/// An ordered record: field name to value, in insertion order.
pub type Record = IndexMap<String, Value>;

/// A value produced by evaluating an expression.
///
/// Scalars, arrays and records are shared by both backends. The remaining
/// variants only ever come out of one of them:
///
/// - [`Value::Rows`] is the intermediate relation flowing between the
///   in-memory pipeline stages (`$from`, `$join`, `$where`, `$group`, ...).
/// - [`Value::Column`] and [`Value::Fragment`] are the SQL tokens the SQL
///   backend composes into a statement.
///
/// # Type Preservation
///
/// Integers and floats stay distinct. Arithmetic keeps integer results when
/// they are whole, using decimal arithmetic for mixed operands.
///
/// # Examples
///
/// ```
/// use symql::{Record, Value};
///
/// let mut user = Record::new();
/// user.insert("name".to_string(), Value::String("Ada".to_string()));
/// user.insert("age".to_string(), Value::Integer(36));
///
/// let table = Value::Array(vec![Value::Object(user)]);
/// assert_eq!(table.type_name(), "array");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// JSON null
    Null,

    /// JSON boolean (true/false)
    Boolean(bool),

    /// Floating-point number
    Float(f64),

    /// Integer number (preserved separately from floats)
    Integer(i64),

    /// UTF-8 string
    String(String),

    /// Instant in time, always normalized to UTC
    Date(DateTime<Utc>),

    /// Array of values
    Array(Vec<Value>),

    /// Record with ordered string keys
    Object(Record),

    /// Relation of rows produced by the in-memory pipeline stages
    Rows(Vec<Row>),

    /// Column reference produced by the SQL backend
    Column(ColumnRef),

    /// SQL text with its positional parameters
    Fragment(Fragment),
}

impl Value {
    /// Check if the value is truthy (for conditions)
    pub fn is_truthy(&self) -> bool {
        use Value::*;
        match self {
            Null => false,
            Boolean(b) => *b,
            Float(n) => *n != 0.0 && !n.is_nan(),
            Integer(n) => *n != 0,
            String(s) => !s.is_empty(),
            Date(_) => true,
            Array(arr) => !arr.is_empty(),
            Object(obj) => !obj.is_empty(),
            Rows(rows) => !rows.is_empty(),
            Column(_) | Fragment(_) => true,
        }
    }

    /// Convert to boolean for conditions
    pub fn as_bool(&self) -> bool {
        match self {
            Value::Boolean(b) => *b,
            _ => self.is_truthy(),
        }
    }

    /// Get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Get as integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            Value::Float(n) => Some(n.round() as i64),
            _ => None,
        }
    }

    /// Get as string (concatenation)
    pub fn as_string(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Float(n) => n.to_string(),
            Value::Integer(n) => n.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Date(d) => d.to_rfc3339(),
            Value::Null => "null".to_string(),
            _ => format!("{:?}", self),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Milliseconds since the Unix epoch for dates; numbers pass through.
    ///
    /// Comparisons normalize dates through this so a date and its epoch
    /// millisecond value compare equal.
    pub fn epoch_millis(&self) -> Option<i64> {
        match self {
            Value::Date(d) => Some(d.timestamp_millis()),
            Value::Integer(n) => Some(*n),
            Value::Float(n) => Some(n.round() as i64),
            _ => None,
        }
    }

    /// Human-readable type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Rows(_) => "rows",
            Value::Column(_) => "column",
            Value::Fragment(_) => "fragment",
        }
    }

    /// Field lookup on a record. Missing fields and non-records give `Null`.
    pub fn field(&self, name: &str) -> Value {
        match self {
            Value::Object(map) => map.get(name).cloned().unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }

    /// Dotted-path lookup (`user.address.city`, `items.0`).
    ///
    /// An exact key match wins over path splitting, so records whose keys
    /// contain dots stay reachable.
    pub fn lookup_path(&self, path: &str) -> Option<Value> {
        if let Value::Object(map) = self
            && let Some(v) = map.get(path)
        {
            return Some(v.clone());
        }

        let mut current = self;
        for segment in path.split('.') {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(arr) => arr.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current.clone())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Value::Date(d)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Object(r)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}
