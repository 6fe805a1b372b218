//! # symql - Abstract Syntax Tree
//!
//! Queries are S-expressions: a list whose head names an operator and whose
//! tail holds the operands.
//!
//! ```text
//! ["$select", [":name", ["$as", "n", ["$count", "*"]]],
//!     ["$group", [":name"],
//!         ["$where", [">", ":age", 18], ["$from", "@users"]]]]
//! ```
//!
//! ## Symbols and namespaces
//!
//! A string operand is a [`Expr::Symbol`]. When it starts with a namespace
//! token the environment knows about, it resolves against that namespace:
//!
//! - `:field` - the current row
//! - `@table` - a named source (rows in memory, a table reference in SQL)
//! - `#path` - caller-supplied context, e.g. the current user
//! - `Alias:field` - a field of one specific table alias
//!
//! A symbol with no known prefix evaluates to itself as a plain string.
//!
//! ## Quoted lists
//!
//! `{"": [1, 2, 3]}` is an [`Expr::Quoted`] array literal. It is passed as a
//! value and never treated as a call form.
pub mod expressions;
pub mod operators;
pub mod window;

pub use expressions::Expr;
pub use operators::OperatorName;
