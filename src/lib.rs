pub mod ast;
pub mod data;
pub mod environment;
pub mod evaluator;
pub mod operators;
pub mod output;
pub mod parser;
pub mod row;
pub mod sql;
pub mod value;

#[cfg(feature = "cli")]
pub mod cli;

pub use ast::{Expr, OperatorName};
pub use data::DataParser;
pub use environment::{Backend, Context, Environment};
pub use evaluator::EvalError;
pub use output::{json_to_value, to_json, to_json_pretty, value_to_json};
pub use parser::ParseError;
pub use sql::{CompileOptions, Compiled, PlaceholderStyle, SqlParser, SqlQuery};
pub use value::{Record, Value};
