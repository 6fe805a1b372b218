//! SQL backend: compiles expressions into a parameterized statement.
//!
//! Column references, table references and clauses come back as
//! [`Value::Column`] and [`Value::Fragment`] tokens; every plain value an
//! operator meets becomes a positional parameter. Only the root renders,
//! so placeholders are numbered once across the whole statement.

pub mod fragment;
pub mod relational;
pub mod scalar;
pub mod window;

use chrono::SecondsFormat;
use tracing::debug;

use crate::{
    ast::{Expr, OperatorName},
    environment::{Backend, Context, Environment, EvalResult, Operator, ROW, SOURCE},
    evaluator::EvalError,
    operators,
    output::value_to_json,
    value::Value,
};

pub use fragment::{ColumnRef, Fragment, PlaceholderStyle, SqlQuery, quote_ident};

/// How the compiled statement is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileOptions {
    pub placeholder: PlaceholderStyle,
}

/// Result of compiling an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Compiled {
    /// A statement (or statement fragment) with its parameters.
    Query(SqlQuery),
    /// The expression never touched SQL, e.g. pure arithmetic.
    Value(Value),
}

impl Compiled {
    pub fn statement(&self) -> Option<&str> {
        match self {
            Compiled::Query(q) => Some(&q.statement),
            Compiled::Value(_) => None,
        }
    }

    /// `{"statement": ..., "values": [...]}` for queries, the raw value
    /// otherwise.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Compiled::Query(q) => serde_json::json!({
                "statement": q.statement,
                "values": q.values.iter().map(value_to_json).collect::<Vec<_>>(),
            }),
            Compiled::Value(v) => value_to_json(v),
        }
    }
}

/// True for values that only exist as SQL.
pub(crate) fn is_sql(value: &Value) -> bool {
    matches!(value, Value::Column(_) | Value::Fragment(_))
}

/// Turn a value into SQL text: columns and fragments as written, subqueries
/// parenthesized, dates inlined as timestamps, anything else a parameter.
pub(crate) fn operand(value: Value) -> Result<Fragment, EvalError> {
    Ok(match value {
        Value::Column(column) => Fragment::sql(column.to_string()),
        Value::Fragment(f) if f.is_query() => f.wrapped("(", ")"),
        Value::Fragment(f) => f,
        Value::Date(d) => Fragment::sql(format!(
            "'{}'::TIMESTAMPTZ",
            d.to_rfc3339_opts(SecondsFormat::Millis, true)
        )),
        Value::Rows(_) => {
            return Err(EvalError::TypeError(
                "In-memory rows cannot be used in SQL".to_string(),
            ));
        }
        other => Fragment::param(other),
    })
}

/// The SQL compiler.
///
/// # Examples
///
/// ```
/// use symql::{Compiled, Context, Expr, SqlParser, Value};
///
/// let expr = Expr::from_json(
///     r#"["$select", [":name"], ["$where", [">", ":age", 18], ["$from", "@users"]]]"#,
/// ).unwrap();
/// let compiled = futures::executor::block_on(SqlParser::compile(&expr, &Context::new())).unwrap();
/// let Compiled::Query(query) = compiled else { panic!("expected a query") };
/// assert_eq!(query.statement, r#"SELECT "name" FROM "users" WHERE "age" > $1"#);
/// assert_eq!(query.values, vec![Value::Integer(18)]);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlParser;

static BACKEND: SqlParser = SqlParser;

impl SqlParser {
    pub async fn compile(expr: &Expr, context: &Context) -> Result<Compiled, EvalError> {
        Self::compile_with(expr, context, &CompileOptions::default()).await
    }

    pub async fn compile_with(
        expr: &Expr,
        context: &Context,
        options: &CompileOptions,
    ) -> Result<Compiled, EvalError> {
        let env = Self::environment(context).declare_tables(expr);
        debug!(backend = BACKEND.name(), tokens = ?env.tokens(), "compiling expression");

        match env.evaluate(expr).await? {
            Value::Fragment(fragment) => {
                let query = fragment.render(options.placeholder);
                debug!(statement = %query.statement, params = query.values.len(), "compiled statement");
                Ok(Compiled::Query(query))
            }
            Value::Column(column) => Ok(Compiled::Query(SqlQuery {
                statement: column.to_string(),
                values: Vec::new(),
            })),
            other => Ok(Compiled::Value(other)),
        }
    }

    /// A root environment for this backend.
    pub fn environment(context: &Context) -> Environment {
        Environment::new(&BACKEND, context)
    }
}

/// `@name` as a table reference. A bound name that starts with a quote is
/// used verbatim; anything else is quoted as an identifier.
fn table_ref(env: &Environment, name: &str) -> EvalResult {
    let text = match env.binding(SOURCE, name) {
        Some(Value::String(s)) if s.starts_with('"') => s,
        Some(Value::String(s)) => quote_ident(&s),
        None | Some(Value::Null) => quote_ident(name),
        Some(other) => {
            return Err(EvalError::TypeError(format!(
                "Table '{}' must be bound to a name, got {}",
                name,
                other.type_name()
            )));
        }
    };
    Ok(Value::Fragment(Fragment::sql(text)))
}

impl Backend for SqlParser {
    fn name(&self) -> &'static str {
        "sql"
    }

    fn operator(&self, op: OperatorName) -> Option<Operator> {
        use Operator::{Function, Macro};
        use OperatorName::*;
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

            Count => Macro(relational::count),
            Sum => Macro(relational::sum),
            Avg => Macro(relational::avg),
            Min => Macro(relational::min),
            Max => Macro(relational::max),

            Over => Macro(window::over),
            RowNumber => Macro(window::row_number),
            Rank => Macro(window::rank),
            DenseRank => Macro(window::dense_rank),
            Lag => Macro(window::lag),
            Lead => Macro(window::lead),

            Quote | Get | Map | Unique | Size | ConcatLists | Wait | Define | Date => return None,
        })
    }

    /// `:field` and `Alias:field` are columns, `@name` a table, anything
    /// else its bound value.
    fn resolve(&self, env: &Environment, token: &str, name: &str) -> EvalResult {
        if token == ROW {
            return Ok(Value::Column(ColumnRef::new(None, name)));
        }
        if token == SOURCE {
            return table_ref(env, name);
        }
        if let Some(alias) = token.strip_suffix(':') {
            return Ok(Value::Column(ColumnRef::new(Some(alias), name)));
        }
        Ok(env.binding(token, name).unwrap_or(Value::Null))
    }
}
