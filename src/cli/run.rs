//! Evaluate or compile an expression against a JSON context

use futures::executor::block_on;

use super::CliError;
use crate::{
    Compiled, Context, DataParser, Expr, PlaceholderStyle, SqlParser,
    output::{json_to_value, value_to_json},
};

/// Options for the run command
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// The expression, as JSON
    pub expr: String,
    /// Context JSON: `{"@": {...}, "#": {...}}`
    pub input: Option<String>,
}

/// Options for the compile command
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// The expression, as JSON
    pub expr: String,
    /// Context JSON: `{"@": {...}, "#": {...}}`
    pub input: Option<String>,
    pub placeholder: PlaceholderStyle,
}

/// Parse the context JSON. No input means an empty context.
pub fn read_context(input: Option<&str>) -> Result<Context, CliError> {
    let Some(text) = input.filter(|t| !t.trim().is_empty()) else {
        return Ok(Context::new());
    };
    let json: serde_json::Value = serde_json::from_str(text)?;
    Ok(Context::from_value(json_to_value(json))?)
}

/// Evaluate with the in-memory backend.
pub fn execute_run(options: &RunOptions) -> Result<serde_json::Value, CliError> {
    let expr = Expr::from_json(&options.expr)?;
    let context = read_context(options.input.as_deref())?;
    let result = block_on(DataParser::evaluate(&expr, &context))?;
    Ok(value_to_json(&result))
}

/// Compile with the SQL backend.
pub fn execute_compile(options: &CompileOptions) -> Result<serde_json::Value, CliError> {
    let expr = Expr::from_json(&options.expr)?;
    let context = read_context(options.input.as_deref())?;
    let compile_options = crate::CompileOptions {
        placeholder: options.placeholder,
    };
    let compiled: Compiled = block_on(SqlParser::compile_with(&expr, &context, &compile_options))?;
    Ok(compiled.to_json())
}
