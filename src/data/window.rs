//! `$over` and the ranking functions for the in-memory backend.
//!
//! `$select` hands every projected row the full row list and its own index.
//! `$over` then rebuilds the row's partition, orders it, resolves the frame
//! and evaluates its function operand with the frame rows as the members
//! aggregates walk.

use std::{cmp::Ordering, sync::Arc};

use crate::{
    ast::{Expr, window::WindowSpec},
    environment::{Environment, EvalFuture, WindowState},
    evaluator::EvalError,
    operators::compare::collate,
    output::to_json,
    row::Row,
    value::Value,
};

/// The window of one row: its ordered partition and resolved frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Partition rows in window order.
    pub partition: Vec<Row>,
    /// Order key values of each partition row, aligned with `partition`.
    pub order_keys: Vec<Vec<Value>>,
    /// Descending flag per order key.
    pub descending: Vec<bool>,
    /// Position of the current row within `partition`.
    pub position: usize,
    /// Inclusive frame bounds, `None` for an empty frame.
    pub bounds: Option<(usize, usize)>,
}

impl Frame {
    pub fn rows(&self) -> Vec<Row> {
        match self.bounds {
            Some((start, end)) => self.partition[start..=end].to_vec(),
            None => Vec::new(),
        }
    }

    fn peers(&self, a: usize, b: usize) -> bool {
        compare_keys(&self.order_keys[a], &self.order_keys[b], &self.descending) == Ordering::Equal
    }

    /// 1-based rank with gaps: the position of the first peer plus one.
    pub fn rank(&self) -> usize {
        (0..self.position)
            .find(|&i| self.peers(i, self.position))
            .unwrap_or(self.position)
            + 1
    }

    /// 1-based rank without gaps.
    pub fn dense_rank(&self) -> usize {
        1 + (1..=self.position)
            .filter(|&i| !self.peers(i - 1, i))
            .count()
    }
}

pub(crate) fn compare_keys(a: &[Value], b: &[Value], descending: &[bool]) -> Ordering {
    for (i, (x, y)) in a.iter().zip(b).enumerate() {
        let ordering = collate(x, y);
        let ordering = if descending.get(i).copied().unwrap_or(false) {
            ordering.reverse()
        } else {
            ordering
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

async fn evaluate_all(exprs: &[&Expr], env: &Environment) -> Result<Vec<Value>, EvalError> {
    let mut values = Vec::with_capacity(exprs.len());
    for expr in exprs {
        values.push(env.evaluate(expr).await?);
    }
    Ok(values)
}

/// `$over(function, {partition, order, frame})`
pub fn over<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(async move {
        let [function, rest @ ..] = args else {
            return Err(EvalError::TypeError("$over requires a function".to_string()));
        };
        let spec = WindowSpec::parse(rest.first())?;
        let Some(WindowState::Source { rows, index }) = env.window() else {
            return Err(EvalError::WindowMisuse(
                "$over is only valid inside a $select projection".to_string(),
            ));
        };
        let (rows, index) = (Arc::clone(rows), *index);

        let mut partition_keys = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            let keys = evaluate_all(&spec.partition, &env.surround(row.clone())).await?;
            partition_keys.push(to_json(&Value::Array(keys)));
        }

        let order_exprs: Vec<&Expr> = spec.order.iter().map(|o| o.expr).collect();
        let descending: Vec<bool> = spec.order.iter().map(|o| o.descending).collect();
        let mut members = Vec::new();
        for (i, row) in rows.iter().enumerate() {
            if partition_keys[i] == partition_keys[index] {
                let keys = evaluate_all(&order_exprs, &env.surround(row.clone())).await?;
                members.push((i, keys));
            }
        }
        members.sort_by(|(_, a), (_, b)| compare_keys(a, b, &descending));

        let position = members
            .iter()
            .position(|(i, _)| *i == index)
            .ok_or_else(|| EvalError::WindowMisuse("row is missing from its partition".to_string()))?;
        let bounds = spec.effective_frame().resolve(position, members.len());

        let (indices, order_keys): (Vec<usize>, Vec<Vec<Value>>) = members.into_iter().unzip();
        let frame = Frame {
            partition: indices.into_iter().map(|i| rows[i].clone()).collect(),
            order_keys,
            descending,
            position,
            bounds,
        };

        let mut current = rows[index].clone();
        current.items = Some(frame.rows());
        let scoped = env
            .surround(current)
            .with_window(WindowState::Frame(Arc::new(frame)));
        scoped.evaluate(function).await
    })
}

fn frame<'a>(env: &'a Environment, op: &str) -> Result<&'a Frame, EvalError> {
    match env.window() {
        Some(WindowState::Frame(frame)) => Ok(frame),
        _ => Err(EvalError::WindowMisuse(format!(
            "{} must be the function of an $over",
            op
        ))),
    }
}

pub fn row_number<'a>(_args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(async move {
        let frame = frame(env, "$row_number")?;
        Ok(Value::Integer(frame.position as i64 + 1))
    })
}

pub fn rank<'a>(_args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(async move { Ok(Value::Integer(frame(env, "$rank")?.rank() as i64)) })
}

pub fn dense_rank<'a>(_args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(async move { Ok(Value::Integer(frame(env, "$dense_rank")?.dense_rank() as i64)) })
}

/// `$lag(field, offset = 1, default = null)` and `$lead(...)`: the field
/// evaluated on the partition row `offset` positions back or ahead.
async fn shifted(args: &[Expr], env: &Environment, op: &str, forward: bool) -> Result<Value, EvalError> {
    let frame = frame(env, op)?;
    let [field, rest @ ..] = args else {
        return Err(EvalError::TypeError(format!("{} requires a field", op)));
    };
    let offset = match rest.first() {
        Some(expr) => {
            let value = env.evaluate(expr).await?;
            value.as_int().filter(|n| *n >= 0).ok_or_else(|| {
                EvalError::TypeError(format!(
                    "{} offset must be a non-negative integer, got {}",
                    op,
                    value.type_name()
                ))
            })? as usize
        }
        None => 1,
    };

    let target = if forward {
        frame.position.checked_add(offset)
    } else {
        frame.position.checked_sub(offset)
    };
    match target.and_then(|t| frame.partition.get(t)) {
        Some(row) => env.surround(row.clone()).evaluate(field).await,
        None => match rest.get(1) {
            Some(default) => env.evaluate(default).await,
            None => Ok(Value::Null),
        },
    }
}

pub fn lag<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(shifted(args, env, "$lag", false))
}

pub fn lead<'a>(args: &'a [Expr], env: &'a Environment) -> EvalFuture<'a> {
    Box::pin(shifted(args, env, "$lead", true))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with_keys(keys: &[i64], position: usize) -> Frame {
        Frame {
            partition: keys.iter().map(|_| Row::default()).collect(),
            order_keys: keys.iter().map(|k| vec![Value::Integer(*k)]).collect(),
            descending: vec![false],
            position,
            bounds: Some((0, position)),
        }
    }

    #[test]
    fn test_rank_has_gaps_after_ties() {
        let keys = [10, 20, 20, 30];
        assert_eq!(frame_with_keys(&keys, 0).rank(), 1);
        assert_eq!(frame_with_keys(&keys, 2).rank(), 2);
        assert_eq!(frame_with_keys(&keys, 3).rank(), 4);
    }

    #[test]
    fn test_dense_rank_has_no_gaps() {
        let keys = [10, 20, 20, 30];
        assert_eq!(frame_with_keys(&keys, 2).dense_rank(), 2);
        assert_eq!(frame_with_keys(&keys, 3).dense_rank(), 3);
    }

    #[test]
    fn test_descending_keys_compare_reversed() {
        let a = [Value::Integer(1)];
        let b = [Value::Integer(2)];
        assert_eq!(compare_keys(&a, &b, &[true]), Ordering::Greater);
        assert_eq!(compare_keys(&a, &b, &[false]), Ordering::Less);
    }

    #[test]
    fn test_empty_frame_has_no_rows() {
        let mut frame = frame_with_keys(&[1, 2], 1);
        frame.bounds = None;
        assert!(frame.rows().is_empty());
    }
}
