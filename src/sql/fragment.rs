//! SQL text with positional parameters.
//!
//! A [`Fragment`] keeps its placeholders symbolic while fragments are
//! composed. Numbering happens once, in [`Fragment::render`], so every
//! placeholder of the final statement is numbered by its position in the
//! text, however deeply the fragment was nested.

use std::fmt;

use crate::value::Value;

/// Quote an identifier, doubling embedded quotes.
pub fn quote_ident(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

/// A reference to a column, optionally qualified by a table alias.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub namespace: Option<String>,
    pub name: String,
}

impl ColumnRef {
    pub fn new(namespace: Option<&str>, name: &str) -> Self {
        ColumnRef {
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let column = if self.name == "*" {
            "*".to_string()
        } else {
            quote_ident(&self.name)
        };
        match &self.namespace {
            Some(ns) => write!(f, "{}.{}", quote_ident(ns), column),
            None => f.write_str(&column),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Piece {
    Sql(String),
    Placeholder,
}

/// Placeholder syntax of the rendered statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `$1`, `$2`, ... (PostgreSQL)
    #[default]
    Dollar,
    /// `?` (SQLite, MySQL)
    Question,
}

/// A rendered statement and its parameters in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub statement: String,
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Fragment {
    pieces: Vec<Piece>,
    values: Vec<Value>,
    query: bool,
}

impl Fragment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Literal SQL text.
    pub fn sql(text: impl Into<String>) -> Self {
        let mut fragment = Fragment::new();
        fragment.push_sql(&text.into());
        fragment
    }

    /// A single parameter.
    pub fn param(value: Value) -> Self {
        let mut fragment = Fragment::new();
        fragment.push_param(value);
        fragment
    }

    pub fn push_sql(&mut self, text: &str) -> &mut Self {
        if text.is_empty() {
            return self;
        }
        match self.pieces.last_mut() {
            Some(Piece::Sql(last)) => last.push_str(text),
            _ => self.pieces.push(Piece::Sql(text.to_string())),
        }
        self
    }

    pub fn push_param(&mut self, value: Value) -> &mut Self {
        self.pieces.push(Piece::Placeholder);
        self.values.push(value);
        self
    }

    /// Append another fragment, text and parameters both.
    pub fn push(&mut self, other: Fragment) -> &mut Self {
        for piece in other.pieces {
            match piece {
                Piece::Sql(text) => {
                    self.push_sql(&text);
                }
                Piece::Placeholder => self.pieces.push(Piece::Placeholder),
            }
        }
        self.values.extend(other.values);
        self
    }

    /// Join fragments with a separator.
    pub fn join(parts: impl IntoIterator<Item = Fragment>, separator: &str) -> Fragment {
        let mut out = Fragment::new();
        for (i, part) in parts.into_iter().enumerate() {
            if i > 0 {
                out.push_sql(separator);
            }
            out.push(part);
        }
        out
    }

    /// `open` + this fragment + `close`. The result is an expression, not a
    /// query.
    pub fn wrapped(self, open: &str, close: &str) -> Fragment {
        let mut out = Fragment::sql(open);
        out.push(self);
        out.push_sql(close);
        out
    }

    /// Mark the fragment as a complete query (`SELECT ...`, `UNION ...`),
    /// which gets parenthesized when used as an operand.
    pub fn into_query(mut self) -> Fragment {
        self.query = true;
        self
    }

    pub fn is_query(&self) -> bool {
        self.query
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    /// Number placeholders in text order and hand back the statement.
    pub fn render(&self, style: PlaceholderStyle) -> SqlQuery {
        let mut statement = String::new();
        let mut n = 0;
        for piece in &self.pieces {
            match piece {
                Piece::Sql(text) => statement.push_str(text),
                Piece::Placeholder => {
                    n += 1;
                    match style {
                        PlaceholderStyle::Dollar => {
                            statement.push('$');
                            statement.push_str(&n.to_string());
                        }
                        PlaceholderStyle::Question => statement.push('?'),
                    }
                }
            }
        }
        SqlQuery {
            statement,
            values: self.values.clone(),
        }
    }
}
