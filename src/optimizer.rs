use std::sync::Arc;

use crate::bound::{Bound, BoundKind};
use crate::host::Conversion;
use crate::value::{BinaryOp, Value, arith};

// Semantics-preserving constant folding. Host members and calls are treated as impure.
pub(crate) fn optimize(node: Arc<Bound>) -> Arc<Bound> {
    rewrite(&node).unwrap_or(node)
}

fn constant(node: &Bound) -> Option<&Value> {
    match &node.kind {
        BoundKind::Const(v) => Some(v),
        _ => None,
    }
}

/// `None` when the node stays as it is.
fn rewrite(node: &Arc<Bound>) -> Option<Arc<Bound>> {
    match &node.kind {
        BoundKind::Convert {
            operand,
            conversion,
        } => {
            let inner = optimize(operand.clone());
            let folded = match (constant(&inner), conversion) {
                (Some(v), Conversion::Numeric(kind)) => v.convert_numeric(*kind).ok(),
                (Some(v), Conversion::Identity) => Some(v.clone()),
                _ => None,
            };
            if let Some(v) = folded {
                return Some(Bound::constant(v, node.ty.clone()));
            }
            changed(&inner, operand).then(|| {
                Bound::new(
                    node.ty.clone(),
                    BoundKind::Convert {
                        operand: inner,
                        conversion: conversion.clone(),
                    },
                )
            })
        }
        BoundKind::Negate(operand) => {
            let inner = optimize(operand.clone());
            if let Some(v) = constant(&inner).and_then(|v| v.negate().ok()) {
                return Some(Bound::constant(v, node.ty.clone()));
            }
            match &inner.kind {
                BoundKind::Negate(x) if x.ty == node.ty => Some(x.clone()),
                _ if changed(&inner, operand) => {
                    Some(Bound::new(node.ty.clone(), BoundKind::Negate(inner)))
                }
                _ => None,
            }
        }
        BoundKind::Binary { op, left, right } => {
            let l = optimize(left.clone());
            let r = optimize(right.clone());
            if let (Some(a), Some(b)) = (constant(&l), constant(&r)) {
                // a failing fold (division by zero) stays for evaluation to report
                if let Ok(v) = arith(*op, a, b) {
                    return Some(Bound::constant(v, node.ty.clone()));
                }
            }
            if let Some(x) = integer_identity(*op, &l, &r) {
                return Some(x);
            }
            (changed(&l, left) || changed(&r, right)).then(|| {
                Bound::new(
                    node.ty.clone(),
                    BoundKind::Binary {
                        op: *op,
                        left: l,
                        right: r,
                    },
                )
            })
        }
        _ => None,
    }
}

fn changed(new: &Arc<Bound>, old: &Arc<Bound>) -> bool {
    !Arc::ptr_eq(new, old)
}

/// `x + 0`, `0 + x`, `x - 0`, `x * 1`, `1 * x`, `x / 1` on integer kinds.
fn integer_identity(op: BinaryOp, l: &Arc<Bound>, r: &Arc<Bound>) -> Option<Arc<Bound>> {
    if !l.ty.numeric().is_some_and(|k| k.is_integer()) {
        return None;
    }
    let is = |node: &Arc<Bound>, n: i64| constant(node).and_then(Value::as_i64) == Some(n);
    match op {
        BinaryOp::Add if is(r, 0) => Some(l.clone()),
        BinaryOp::Add if is(l, 0) => Some(r.clone()),
        BinaryOp::Sub if is(r, 0) => Some(l.clone()),
        BinaryOp::Mul | BinaryOp::Div if is(r, 1) => Some(l.clone()),
        BinaryOp::Mul if is(l, 1) => Some(r.clone()),
        _ => None,
    }
}
