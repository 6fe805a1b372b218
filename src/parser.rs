//! Reading expressions from JSON.
//!
//! Expressions travel as plain JSON:
//!
//! - a string is a symbol (`":age"`, `"@users"`, `"$count"`)
//! - numbers, booleans and null are literals
//! - an array is a call form, head first
//! - `{"": [...]}` is a quoted list, passed through as data
//! - any other object is a record literal

use thiserror::Error;

use crate::{ast::Expr, output::json_to_value};

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl Expr {
    /// Parse an expression from JSON text.
    ///
    /// # Examples
    ///
    /// ```
    /// use symql::Expr;
    ///
    /// let expr = Expr::from_json(r#"["=", ":age", 30]"#).unwrap();
    /// assert_eq!(expr.head(), Some("="));
    /// assert!(Expr::from_json("[1,").is_err());
    /// ```
    pub fn from_json(text: &str) -> Result<Expr, ParseError> {
        let json: serde_json::Value = serde_json::from_str(text)?;
        Ok(Expr::from_json_value(json))
    }

    pub fn from_json_value(json: serde_json::Value) -> Expr {
        Expr::from(json_to_value(json))
    }
}
