//! Ordering and window specifications, read structurally from expressions.
//!
//! ```text
//! {"partition": [":dept"],
//!  "order": [{"field": ":salary", "direction": "desc"}],
//!  "frame": {"start": {"type": "preceding", "offset": 1},
//!            "end": {"type": "current"}}}
//! ```

use crate::{ast::Expr, evaluator::EvalError, value::Value};

/// One ordering key: an expression and its direction.
#[derive(Debug, Clone, Copy)]
pub struct OrderSpec<'a> {
    pub expr: &'a Expr,
    pub descending: bool,
}

impl<'a> OrderSpec<'a> {
    /// `{"field": expr, "direction": "asc" | "desc"}`, or a bare expression
    /// for ascending order.
    pub fn parse(expr: &'a Expr) -> Result<Self, EvalError> {
        if !matches!(expr, Expr::Object(_)) {
            return Ok(OrderSpec {
                expr,
                descending: false,
            });
        }
        let field = expr.get("field").ok_or_else(|| {
            EvalError::TypeError("Order spec requires a 'field'".to_string())
        })?;
        let descending = match expr.get("direction").map(|d| d.as_name()) {
            None => false,
            Some(Some(d)) if d.eq_ignore_ascii_case("asc") => false,
            Some(Some(d)) if d.eq_ignore_ascii_case("desc") => true,
            Some(other) => {
                return Err(EvalError::TypeError(format!(
                    "Order direction must be 'asc' or 'desc', got {:?}",
                    other
                )));
            }
        };
        Ok(OrderSpec {
            expr: field,
            descending,
        })
    }

    pub fn parse_list(expr: &'a Expr) -> Result<Vec<Self>, EvalError> {
        if expr.is_empty() {
            return Ok(Vec::new());
        }
        expr.elements().iter().map(OrderSpec::parse).collect()
    }
}

/// One edge of a window frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    /// Partition start (as a start bound) or partition end (as an end bound)
    Unbounded,
    Current,
    Preceding(usize),
    Following(usize),
}

impl Bound {
    /// `{"type": "unbounded" | "current" | "preceding" | "following",
    ///   "offset": n}`
    pub fn parse(expr: &Expr) -> Result<Self, EvalError> {
        let kind = expr
            .get("type")
            .and_then(Expr::as_name)
            .ok_or_else(|| EvalError::TypeError("Frame bound requires a 'type'".to_string()))?;
        let offset = || -> Result<usize, EvalError> {
            match expr.get("offset") {
                Some(Expr::Literal(Value::Integer(n))) if *n >= 0 => Ok(*n as usize),
                Some(other) => Err(EvalError::TypeError(format!(
                    "Frame offset must be a non-negative integer, got {:?}",
                    other
                ))),
                None => Err(EvalError::TypeError(format!(
                    "Frame bound '{}' requires an 'offset'",
                    kind
                ))),
            }
        };
        match kind {
            "unbounded" => Ok(Bound::Unbounded),
            "current" => Ok(Bound::Current),
            "preceding" => Ok(Bound::Preceding(offset()?)),
            "following" => Ok(Bound::Following(offset()?)),
            other => Err(EvalError::TypeError(format!(
                "Unknown frame bound type: '{}'",
                other
            ))),
        }
    }

    /// Row position of this bound within a partition of `len` rows. May fall
    /// outside `0..len`; callers clamp. Huge offsets saturate.
    pub fn position(self, current: usize, len: usize, is_start: bool) -> isize {
        let offset = |n: usize| isize::try_from(n).unwrap_or(isize::MAX);
        let current = offset(current);
        match self {
            Bound::Unbounded if is_start => 0,
            Bound::Unbounded => offset(len) - 1,
            Bound::Current => current,
            Bound::Preceding(n) => current.saturating_sub(offset(n)),
            Bound::Following(n) => current.saturating_add(offset(n)),
        }
    }

    /// SQL text of the bound inside `ROWS BETWEEN ... AND ...`.
    pub fn to_sql(self, is_start: bool) -> String {
        match self {
            Bound::Unbounded if is_start => "UNBOUNDED PRECEDING".to_string(),
            Bound::Unbounded => "UNBOUNDED FOLLOWING".to_string(),
            Bound::Current => "CURRENT ROW".to_string(),
            Bound::Preceding(n) => format!("{} PRECEDING", n),
            Bound::Following(n) => format!("{} FOLLOWING", n),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSpec {
    pub start: Bound,
    pub end: Bound,
}

impl FrameSpec {
    /// Inclusive `(start, end)` positions clamped to the partition, or
    /// `None` when the frame is empty.
    pub fn resolve(&self, current: usize, len: usize) -> Option<(usize, usize)> {
        if len == 0 {
            return None;
        }
        let start = self.start.position(current, len, true).max(0);
        let end = self.end.position(current, len, false).min(len as isize - 1);
        if start > end {
            return None;
        }
        Some((start as usize, end as usize))
    }
}

/// `{partition, order, frame}` operand of `$over`.
#[derive(Debug, Clone, Default)]
pub struct WindowSpec<'a> {
    pub partition: Vec<&'a Expr>,
    pub order: Vec<OrderSpec<'a>>,
    /// Frame as written; `None` when the expression gives none.
    pub frame: Option<FrameSpec>,
}

impl<'a> WindowSpec<'a> {
    pub fn parse(expr: Option<&'a Expr>) -> Result<Self, EvalError> {
        let Some(expr) = expr else {
            return Ok(WindowSpec::default());
        };
        if !matches!(expr, Expr::Object(_)) {
            return Err(EvalError::TypeError(
                "$over window must be an object with partition, order and frame".to_string(),
            ));
        }

        let partition = match expr.get("partition") {
            Some(p) if !p.is_empty() => p.elements().iter().collect(),
            _ => Vec::new(),
        };
        let order = match expr.get("order") {
            Some(o) => OrderSpec::parse_list(o)?,
            None => Vec::new(),
        };
        let frame = match expr.get("frame") {
            Some(f) if !f.is_empty() => Some(FrameSpec {
                start: f.get("start").map(Bound::parse).transpose()?.unwrap_or(Bound::Unbounded),
                end: f.get("end").map(Bound::parse).transpose()?.unwrap_or(Bound::Current),
            }),
            _ => None,
        };

        Ok(WindowSpec {
            partition,
            order,
            frame,
        })
    }

    /// The frame in effect: as written, otherwise `[unbounded preceding,
    /// current row]` with an order and the whole partition without one.
    pub fn effective_frame(&self) -> FrameSpec {
        self.frame.unwrap_or(FrameSpec {
            start: Bound::Unbounded,
            end: if self.order.is_empty() {
                Bound::Unbounded
            } else {
                Bound::Current
            },
        })
    }
}
