//! In-memory backend: evaluates expressions directly against the records
//! bound in the context.

pub mod aggregate;
pub mod relational;
pub mod scalar;
pub mod window;

use tracing::debug;

use crate::{
    ast::{Expr, OperatorName},
    environment::{Backend, Context, Environment, EvalResult, Operator, ROW},
    evaluator::EvalError,
    operators,
    value::Value,
};

/// The in-memory evaluator.
///
/// # Examples
///
/// ```
/// use symql::{Context, DataParser, Expr, Record, Value};
///
/// let mut ada = Record::new();
/// ada.insert("name".to_string(), Value::from("Ada"));
/// ada.insert("age".to_string(), Value::Integer(36));
/// let ctx = Context::new().table("users", Value::Array(vec![Value::Object(ada)]));
///
/// let expr = Expr::from_json(r#"["$select", [":name"], ["$from", "@users"]]"#).unwrap();
/// let rows = futures::executor::block_on(DataParser::evaluate(&expr, &ctx)).unwrap();
/// assert_eq!(rows, Value::Array(vec![Value::Object(
///     [("name".to_string(), Value::from("Ada"))].into_iter().collect(),
/// )]));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct DataParser;

static BACKEND: DataParser = DataParser;

impl DataParser {
    /// Evaluate `expr` against `context`. Relations come back as arrays of
    /// plain records.
    pub async fn evaluate(expr: &Expr, context: &Context) -> Result<Value, EvalError> {
        let env = Self::environment(context).declare_tables(expr);
        debug!(backend = BACKEND.name(), tokens = ?env.tokens(), "evaluating expression");
        let value = env.evaluate(expr).await?;
        Ok(materialize(value))
    }

    /// A root environment for this backend.
    pub fn environment(context: &Context) -> Environment {
        Environment::new(&BACKEND, context)
    }
}

/// Flatten intermediate rows into records.
fn materialize(value: Value) -> Value {
    match value {
        Value::Rows(rows) => Value::Array(
            rows.iter()
                .map(|row| Value::Object(row.flatten()))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(materialize).collect()),
        Value::Object(map) => {
            Value::Object(map.into_iter().map(|(k, v)| (k, materialize(v))).collect())
        }
        other => other,
    }
}

impl Backend for DataParser {
    fn name(&self) -> &'static str {
        "data"
    }

    fn operator(&self, op: OperatorName) -> Option<Operator> {
        use OperatorName::*;
        use Operator::{Function, Macro};
        if let Some(shared) = operators::shared(op) {
            return Some(shared);
        }
        Some(match op {
            Equal => Function(scalar::equal),
            NotEqual => Function(scalar::not_equal),
            GreaterThan => Function(scalar::greater_than),
            LessThan => Function(scalar::less_than),
            GreaterEqual => Function(scalar::greater_equal),
            LessEqual => Function(scalar::less_equal),
            Like => Function(scalar::like_match),
            ILike => Function(scalar::ilike_match),
            In => Function(scalar::in_list),
            Contains => Function(scalar::contains),
            IsNull => Function(scalar::is_null),
            And => Function(scalar::and),
            Or => Function(scalar::or),
            Not => Function(scalar::not),
            Add => Function(scalar::add),
            Subtract => Function(scalar::subtract),
            Multiply => Function(scalar::multiply),
            Divide => Function(scalar::divide),
            Extract => Function(scalar::extract),
            Concat => Function(scalar::concat),
            Filter => Macro(scalar::filter),

            From => Macro(relational::from),
            As => Macro(relational::alias),
            Join => Macro(relational::join),
            LeftJoin => Macro(relational::left_join),
            Where => Macro(relational::filter_rows),
            Group => Macro(relational::group),
            Having => Macro(relational::having),
            Order => Macro(relational::order),
            Limit => Macro(relational::limit),
            Union => Macro(relational::union),
            Select => Macro(relational::select),

            Count => Macro(aggregate::count),
            Sum => Macro(aggregate::sum),
            Avg => Macro(aggregate::avg),
            Min => Macro(aggregate::min),
            Max => Macro(aggregate::max),

            Over => Macro(window::over),
            RowNumber => Macro(window::row_number),
            Rank => Macro(window::rank),
            DenseRank => Macro(window::dense_rank),
            Lag => Macro(window::lag),
            Lead => Macro(window::lead),

            Quote | Get | Map | Unique | Size | ConcatLists | Wait | Define | Date => return None,
        })
    }

    /// `:field` reads the current row (falling back to a `:` binding),
    /// `Alias:field` one table of it, any other token its bindings.
    fn resolve(&self, env: &Environment, token: &str, name: &str) -> EvalResult {
        if token == ROW {
            let value = env.row().map(|row| row.lookup(name)).unwrap_or(Value::Null);
            return Ok(match value {
                Value::Null => env.binding(ROW, name).unwrap_or(Value::Null),
                found => found,
            });
        }
        if let Some(alias) = token.strip_suffix(':') {
            return Ok(env
                .row()
                .map(|row| row.lookup_qualified(alias, name))
                .unwrap_or(Value::Null));
        }
        Ok(env.binding(token, name).unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    fn eval(json: &str) -> Value {
        let expr = Expr::from_json(json).unwrap();
        block_on(DataParser::evaluate(&expr, &Context::new())).unwrap()
    }

    #[test]
    fn test_plain_arithmetic() {
        assert_eq!(eval(r#"["+", 1, 2, 3]"#), Value::Integer(6));
    }

    #[test]
    fn test_unknown_prefix_is_a_string() {
        assert_eq!(eval(r#""hello""#), Value::from("hello"));
    }

    #[test]
    fn test_row_binding_fallback() {
        let ctx = Context::new().bind(ROW, "age", Value::Integer(20));
        let expr = Expr::from_json(r#"[">", ":age", 18]"#).unwrap();
        assert_eq!(
            block_on(DataParser::evaluate(&expr, &ctx)).unwrap(),
            Value::Boolean(true)
        );
    }

    #[test]
    fn test_every_operator_is_registered() {
        for name in ["$select", "$over", "$rank", "$filter", "_wait", "$date", "$concat"] {
            let op = OperatorName::from_name(name).unwrap();
            assert!(
                BACKEND.operator(op).is_some() || op == OperatorName::Quote,
                "{} missing",
                name
            );
        }
    }
}
