//! Building blocks shared by the in-memory and SQL backends.

pub mod arith;
pub mod common;
pub mod compare;

use crate::{ast::OperatorName, environment::Operator};

/// Operators both backends register unchanged.
pub fn shared(op: OperatorName) -> Option<Operator> {
    use OperatorName::*;
    Some(match op {
        Get => Operator::Function(common::get),
        Map => Operator::Function(common::map),
        Unique => Operator::Function(common::unique),
        Size => Operator::Function(common::size),
        ConcatLists => Operator::Function(common::concat_lists),
        Date => Operator::Function(common::date),
        Wait => Operator::Macro(common::wait),
        Define => Operator::Macro(common::define),
        _ => return None,
    })
}
