use thiserror::Error;

use crate::{
    ast::{Expr, OperatorName},
    environment::{Environment, EvalFuture, EvalResult, Operator},
    value::{Record, Value},
};

/// Errors that can occur during query evaluation.
///
/// Every error aborts the whole evaluation; nothing is retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    /// Call form names an operator the active backend does not provide
    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    /// Namespace token that the environment never declared
    #[error("Unknown namespace: {0}")]
    UnknownNamespace(String),

    /// Window function used outside a row/window context
    #[error("Window misuse: {0}")]
    WindowMisuse(String),

    /// `$extract` part name that is not epoch, day, month or year
    #[error("Unsupported extract field: {0}")]
    UnsupportedExtractField(String),

    /// Operand type unsuitable for the operator
    #[error("Type error: {0}")]
    TypeError(String),

    /// Integer division by zero
    #[error("Division by zero")]
    DivisionByZero,
}

/// Evaluate an expression in an environment.
///
/// - Literals evaluate to themselves.
/// - Symbols with a known namespace prefix resolve through the backend;
///   other symbols are plain strings.
/// - Quoted lists hand back their items.
/// - `["$quote", x]` returns `x` as data, unevaluated.
/// - Other call forms dispatch on the head: macros get the raw operands,
///   functions get the operands evaluated left to right.
///
/// # Examples
///
/// ```
/// use symql::{Context, DataParser, Expr, Value};
///
/// let expr = Expr::from_json(r#"["=", 5, 5]"#).unwrap();
/// let result = futures::executor::block_on(DataParser::evaluate(&expr, &Context::new()));
/// assert_eq!(result.unwrap(), Value::Boolean(true));
/// ```
pub fn evaluate<'a>(expr: &'a Expr, env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(async move {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Symbol(name) => env.resolve_symbol(name),
            Expr::Quoted(items) => Ok(Value::Array(items.clone())),
            Expr::Object(fields) => {
                let mut map = Record::new();
                for (key, e) in fields {
                    let value = evaluate(e, env).await?;
                    map.insert(key.clone(), value);
                }
                Ok(Value::Object(map))
            }
            Expr::List(items) => call(items, env).await,
        }
    })
}

async fn call(items: &[Expr], env: &Environment) -> EvalResult {
    let Some((head, args)) = items.split_first() else {
        return Ok(Value::Array(Vec::new()));
    };

    let name = head.as_name().ok_or_else(|| {
        EvalError::TypeError(format!(
            "Call form must start with an operator name, got {:?}",
            head
        ))
    })?;
    let op = OperatorName::from_name(name)
        .ok_or_else(|| EvalError::UnknownOperator(name.to_string()))?;

    if op == OperatorName::Quote {
        return match args {
            [quoted] => Ok(quoted.to_value()),
            _ => Err(EvalError::TypeError(format!(
                "$quote takes exactly one operand, got {}",
                args.len()
            ))),
        };
    }

    tracing::trace!(operator = %op, backend = env.backend_name(), "dispatch");

    match env.operator(op)? {
        Operator::Macro(expand_macro) => expand_macro(args, env).await,
        Operator::Function(apply) => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(evaluate(arg, env).await?);
            }
            apply(values)
        }
    }
}
