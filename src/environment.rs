//! Operator tables, namespace bindings and per-row scoping.
//!
//! An [`Environment`] is cheap to clone: every field is shared behind an
//! `Arc`. Scoping never mutates; [`Environment::surround`] and
//! [`Environment::extend`] hand back a new environment that shares
//! everything it does not override.

use std::{fmt, future::Future, pin::Pin, sync::Arc};

use indexmap::IndexMap;

use crate::{
    ast::{Expr, OperatorName},
    data::window::Frame,
    evaluator::{self, EvalError},
    row::Row,
    value::{Record, Value},
};

/// Namespace of the current row or record.
pub const ROW: &str = ":";
/// Namespace of named sources (tables, collections).
pub const SOURCE: &str = "@";
/// Namespace of caller-supplied context.
pub const CONTEXT: &str = "#";

pub type EvalResult = Result<Value, EvalError>;

/// Boxed future returned by every evaluation step.
pub type EvalFuture<'a> = Pin<Box<dyn Future<Output = EvalResult> + Send + 'a>>;

/// Receives evaluated operands.
pub type FunctionFn = fn(Vec<Value>) -> EvalResult;

/// Receives raw operands and decides what to evaluate, and where.
pub type MacroFn = for<'a> fn(&'a [Expr], &'a Environment) -> EvalFuture<'a>;

#[derive(Clone, Copy)]
pub enum Operator {
    Function(FunctionFn),
    Macro(MacroFn),
}

/// An execution backend: its operator set and how it resolves symbols.
pub trait Backend: Send + Sync {
    fn name(&self) -> &'static str;

    /// The implementation of `op`, or `None` if this backend lacks it.
    fn operator(&self, op: OperatorName) -> Option<Operator>;

    /// Resolve `name` inside the namespace introduced by `token`.
    fn resolve(&self, env: &Environment, token: &str, name: &str) -> EvalResult;
}

/// Window state visible to `$over` and the ranking functions.
#[derive(Debug, Clone)]
pub enum WindowState {
    /// Full ordered row list of a projection and the current row's index.
    Source { rows: Arc<Vec<Row>>, index: usize },
    /// Resolved partition and frame of the current row, inside `$over`.
    Frame(Arc<Frame>),
    /// Compiling the function operand of a SQL `OVER` clause.
    Compiling,
}

/// Named values the caller binds to namespace tokens.
///
/// # Examples
///
/// ```
/// use symql::{Context, Value};
///
/// let ctx = Context::new()
///     .table("users", Value::Array(vec![]))
///     .var("user", Value::Integer(7));
/// assert!(ctx.namespaces().contains_key("@"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Context {
    namespaces: IndexMap<String, Record>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` under an arbitrary namespace token.
    pub fn bind(mut self, token: &str, name: impl Into<String>, value: Value) -> Self {
        self.namespaces
            .entry(token.to_string())
            .or_default()
            .insert(name.into(), value);
        self
    }

    /// Bind a named source under `@`.
    pub fn table(self, name: impl Into<String>, value: Value) -> Self {
        self.bind(SOURCE, name, value)
    }

    /// Bind a context value under `#`.
    pub fn var(self, name: impl Into<String>, value: Value) -> Self {
        self.bind(CONTEXT, name, value)
    }

    pub fn namespaces(&self) -> &IndexMap<String, Record> {
        &self.namespaces
    }

    /// Build a context from `{"@": {...}, "#": {...}}`.
    pub fn from_value(value: Value) -> Result<Self, EvalError> {
        let Value::Object(map) = value else {
            return Err(EvalError::TypeError(format!(
                "Context must be an object of namespaces, got {}",
                value.type_name()
            )));
        };
        let mut ctx = Context::new();
        for (token, bindings) in map {
            match bindings {
                Value::Object(names) => {
                    for (name, v) in names {
                        ctx = ctx.bind(&token, name, v);
                    }
                }
                other => {
                    return Err(EvalError::TypeError(format!(
                        "Namespace '{}' must bind an object, got {}",
                        token,
                        other.type_name()
                    )));
                }
            }
        }
        Ok(ctx)
    }
}

#[derive(Clone)]
pub struct Environment {
    backend: &'static dyn Backend,
    tokens: Arc<Vec<String>>,
    bindings: Arc<IndexMap<String, Record>>,
    row: Option<Arc<Row>>,
    window: Option<WindowState>,
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("backend", &self.backend.name())
            .field("tokens", &self.tokens)
            .field("row", &self.row)
            .finish_non_exhaustive()
    }
}

impl Environment {
    /// An environment for `backend` with the default tokens, every token the
    /// context binds, and a `Name:` token per named source.
    pub fn new(backend: &'static dyn Backend, context: &Context) -> Self {
        let mut tokens: Vec<String> = [ROW, SOURCE, CONTEXT].iter().map(|t| t.to_string()).collect();
        for (token, names) in context.namespaces() {
            if !tokens.contains(token) {
                tokens.push(token.clone());
            }
            if token == SOURCE {
                for name in names.keys() {
                    let table = format!("{name}:");
                    if !tokens.contains(&table) {
                        tokens.push(table);
                    }
                }
            }
        }
        Environment {
            backend,
            tokens: Arc::new(tokens),
            bindings: Arc::new(context.namespaces().clone()),
            row: None,
            window: None,
        }
    }

    /// Declare a `Name:` token for every alias the expression introduces
    /// through `$as` or references through `@Name`.
    pub fn declare_tables(&self, expr: &Expr) -> Self {
        let mut tokens = (*self.tokens).clone();
        collect_table_tokens(expr, &mut tokens);
        Environment {
            tokens: Arc::new(tokens),
            ..self.clone()
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn has_token(&self, token: &str) -> bool {
        self.tokens.iter().any(|t| t == token)
    }

    /// Split a symbol into its namespace token and the rest, preferring the
    /// longest matching token.
    pub fn split_symbol<'s>(&self, symbol: &'s str) -> Option<(&str, &'s str)> {
        self.tokens
            .iter()
            .filter(|t| symbol.starts_with(t.as_str()))
            .max_by_key(|t| t.len())
            .map(|t| (t.as_str(), &symbol[t.len()..]))
    }

    /// Resolve a symbol. Without a known prefix it is a literal string.
    pub fn resolve_symbol(&self, symbol: &str) -> EvalResult {
        match self.split_symbol(symbol) {
            Some((token, name)) => self.backend.resolve(self, token, name),
            None => Ok(Value::String(symbol.to_string())),
        }
    }

    /// Bound value of `name` in the namespace `token`; dotted names walk
    /// into nested records. Missing bindings are `None`.
    pub fn binding(&self, token: &str, name: &str) -> Option<Value> {
        let names = self.bindings.get(token)?;
        if let Some(v) = names.get(name) {
            return Some(v.clone());
        }
        let (head, rest) = name.split_once('.')?;
        names.get(head)?.lookup_path(rest)
    }

    pub fn operator(&self, op: OperatorName) -> Result<Operator, EvalError> {
        self.backend
            .operator(op)
            .ok_or_else(|| EvalError::UnknownOperator(op.name().to_string()))
    }

    /// Evaluate `expr` in this environment.
    pub fn evaluate<'a>(&'a self, expr: &'a Expr) -> EvalFuture<'a> {
        evaluator::evaluate(expr, self)
    }

    /// A new environment whose `:` namespace is `row`.
    pub fn surround(&self, row: Row) -> Self {
        self.surround_shared(Arc::new(row))
    }

    pub fn surround_shared(&self, row: Arc<Row>) -> Self {
        Environment {
            row: Some(row),
            ..self.clone()
        }
    }

    pub fn row(&self) -> Option<&Row> {
        self.row.as_deref()
    }

    pub fn with_window(&self, window: WindowState) -> Self {
        Environment {
            window: Some(window),
            ..self.clone()
        }
    }

    pub fn window(&self) -> Option<&WindowState> {
        self.window.as_ref()
    }

    /// A new environment with `name` bound to `value` under `token`, layered
    /// over this one.
    pub fn extend(&self, token: &str, name: &str, value: Value) -> Result<Self, EvalError> {
        if !self.has_token(token) {
            return Err(EvalError::UnknownNamespace(token.to_string()));
        }
        let mut bindings = (*self.bindings).clone();
        bindings
            .entry(token.to_string())
            .or_default()
            .insert(name.to_string(), value);
        Ok(Environment {
            bindings: Arc::new(bindings),
            ..self.clone()
        })
    }
}

fn collect_table_tokens(expr: &Expr, tokens: &mut Vec<String>) {
    let mut declare = |name: &str| {
        let token = format!("{name}:");
        if !name.is_empty() && !tokens.contains(&token) {
            tokens.push(token);
        }
    };
    match expr {
        Expr::Symbol(s) => {
            if let Some(name) = s.strip_prefix(SOURCE) {
                declare(name);
            }
        }
        Expr::List(items) => {
            if expr.is_call(OperatorName::As)
                && let Some(alias) = items.get(1).and_then(Expr::as_name)
            {
                declare(alias);
            }
            for item in items {
                collect_table_tokens(item, tokens);
            }
        }
        Expr::Object(fields) => {
            for (_, e) in fields {
                collect_table_tokens(e, tokens);
            }
        }
        Expr::Literal(_) | Expr::Quoted(_) => {}
    }
}
