use crate::{
    ast::OperatorName,
    value::{Record, Value},
};

/// Abstract Syntax Tree node representing a query expression.
///
/// Expressions are immutable once built; evaluation only ever derives new
/// environments from the one it is given.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Scalar literal: number, boolean, null, string or date.
    ///
    /// # Example
    /// ```text
    /// 42
    /// ```
    Literal(Value),

    /// A name, optionally namespace-prefixed.
    ///
    /// # Examples
    /// ```text
    /// ":age"        // field of the current row
    /// "@users"      // named source
    /// "#user.id"    // context value
    /// "users:id"    // table-qualified field
    /// ```
    Symbol(String),

    /// Call form. The head names the operator, the tail holds operands.
    ///
    /// # Example
    /// ```text
    /// ["=", ":age", 30]
    /// ```
    List(Vec<Expr>),

    /// Already-evaluated array, passed through without interpretation.
    ///
    /// # Example
    /// ```text
    /// {"": [1, 2, 3]}
    /// ```
    Quoted(Vec<Value>),

    /// Record literal. Fields are evaluated; structural macros such as
    /// `$over` and `$limit` read the fields directly.
    ///
    /// # Example
    /// ```text
    /// {"offset": 10, "limit": 5}
    /// ```
    Object(Vec<(String, Expr)>),
}

impl Expr {
    pub fn symbol(name: impl Into<String>) -> Self {
        Expr::Symbol(name.into())
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    /// The bare text of a symbol or string literal.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Expr::Symbol(s) => Some(s),
            Expr::Literal(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// The operator name at the head of a call form.
    pub fn head(&self) -> Option<&str> {
        match self {
            Expr::List(items) => items.first().and_then(Expr::as_name),
            _ => None,
        }
    }

    /// The operands of a call form (everything after the head).
    pub fn operands(&self) -> &[Expr] {
        match self {
            Expr::List(items) if !items.is_empty() => &items[1..],
            _ => &[],
        }
    }

    /// True if this is a call to the given operator.
    pub fn is_call(&self, op: OperatorName) -> bool {
        self.head().and_then(OperatorName::from_name) == Some(op)
    }

    /// Field of a record literal.
    pub fn get(&self, key: &str) -> Option<&Expr> {
        match self {
            Expr::Object(fields) => fields.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Elements of a list-shaped operand. A lone expression (including a
    /// call form) counts as a one-element list, so `":city"` and
    /// `[":city"]` mean the same thing.
    pub fn elements(&self) -> &[Expr] {
        match self {
            Expr::List(items) if self.head().and_then(OperatorName::from_name).is_none() => items,
            other => std::slice::from_ref(other),
        }
    }

    /// Items of an operand that is always a list (`$select` fields, `$group`
    /// keys). Unlike [`Expr::elements`], `["*"]` is a one-field list here.
    pub fn items(&self) -> &[Expr] {
        match self {
            Expr::List(items) => items,
            other => std::slice::from_ref(other),
        }
    }

    /// True when the expression is an empty placeholder: null, `[]` or `{}`.
    pub fn is_empty(&self) -> bool {
        match self {
            Expr::Literal(Value::Null) => true,
            Expr::List(items) => items.is_empty(),
            Expr::Object(fields) => fields.is_empty(),
            Expr::Quoted(items) => items.is_empty(),
            _ => false,
        }
    }

    /// Walk the tree looking for a call that satisfies `pred`, without
    /// descending into calls for which `stop` holds.
    pub fn contains_call(
        &self,
        pred: &dyn Fn(OperatorName) -> bool,
        stop: &dyn Fn(OperatorName) -> bool,
    ) -> bool {
        match self {
            Expr::List(items) => {
                if let Some(op) = self.head().and_then(OperatorName::from_name) {
                    if pred(op) {
                        return true;
                    }
                    if stop(op) {
                        return false;
                    }
                }
                items.iter().any(|e| e.contains_call(pred, stop))
            }
            Expr::Object(fields) => fields.iter().any(|(_, e)| e.contains_call(pred, stop)),
            _ => false,
        }
    }

    /// Render the expression as plain data, the way `$quote` hands it back.
    ///
    /// Symbols become strings, call forms become arrays and quoted lists keep
    /// their `{"": [...]}` shape, so the result reads back into the same tree.
    pub fn to_value(&self) -> Value {
        match self {
            Expr::Literal(v) => v.clone(),
            Expr::Symbol(s) => Value::String(s.clone()),
            Expr::List(items) => Value::Array(items.iter().map(Expr::to_value).collect()),
            Expr::Quoted(items) => {
                let mut map = Record::new();
                map.insert(String::new(), Value::Array(items.clone()));
                Value::Object(map)
            }
            Expr::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_value()))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for Expr {
    /// Read plain data as an expression: strings are symbols, arrays are
    /// call forms, `{"": [...]}` is a quoted list.
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => Expr::Symbol(s),
            Value::Array(items) => Expr::List(items.into_iter().map(Expr::from).collect()),
            Value::Object(mut map) => {
                if map.len() == 1
                    && let Some(Value::Array(_)) = map.get("")
                    && let Some(Value::Array(items)) = map.shift_remove("")
                {
                    return Expr::Quoted(items);
                }
                Expr::Object(map.into_iter().map(|(k, v)| (k, Expr::from(v))).collect())
            }
            other => Expr::Literal(other),
        }
    }
}
