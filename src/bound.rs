use std::sync::Arc;

use smallvec::SmallVec;

use crate::error::EvalError;
use crate::host::{Conversion, IndexerDescriptor, MemberDescriptor, MethodDescriptor};
use crate::types::Ty;
use crate::value::{BinaryOp, Value, arith};

pub type Args = SmallVec<[Arc<Bound>; 4]>;

/// A resolved, typed node of the computation graph.
#[derive(Debug)]
pub struct Bound {
    pub ty: Ty,
    pub kind: BoundKind,
    depth: usize,
}

#[derive(Debug)]
pub enum BoundKind {
    Const(Value),
    /// Positional parameter.
    Param(usize),
    /// The receiver instance.
    This,
    Member {
        target: Option<Arc<Bound>>,
        member: MemberDescriptor,
    },
    Call {
        target: Option<Arc<Bound>>,
        method: MethodDescriptor,
        args: Args,
    },
    Index {
        target: Arc<Bound>,
        indexer: IndexerDescriptor,
        args: Args,
    },
    Convert {
        operand: Arc<Bound>,
        conversion: Conversion,
    },
    Negate(Arc<Bound>),
    Binary {
        op: BinaryOp,
        left: Arc<Bound>,
        right: Arc<Bound>,
    },
}

impl BoundKind {
    fn child_depth(&self) -> usize {
        let deepest = |args: &Args| args.iter().map(|a| a.depth).max().unwrap_or(0);
        match self {
            BoundKind::Const(_) | BoundKind::Param(_) | BoundKind::This => 0,
            BoundKind::Member { target, .. } => target.as_ref().map_or(0, |t| t.depth),
            BoundKind::Call { target, args, .. } => {
                target.as_ref().map_or(0, |t| t.depth).max(deepest(args))
            }
            BoundKind::Index { target, args, .. } => target.depth.max(deepest(args)),
            BoundKind::Convert { operand, .. } | BoundKind::Negate(operand) => operand.depth,
            BoundKind::Binary { left, right, .. } => left.depth.max(right.depth),
        }
    }
}

/// Inputs of one evaluation.
pub(crate) struct Frame<'a> {
    pub(crate) receiver: Option<&'a Value>,
    pub(crate) args: &'a [Value],
}

impl Bound {
    pub(crate) fn new(ty: Ty, kind: BoundKind) -> Arc<Bound> {
        let depth = 1 + kind.child_depth();
        Arc::new(Bound { ty, kind, depth })
    }

    /// Length of the longest path from this node to a leaf, counting both ends.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn constant(value: Value, ty: Ty) -> Arc<Bound> {
        Bound::new(ty, BoundKind::Const(value))
    }

    /// `true` when the computation reads the receiver anywhere.
    pub fn uses_receiver(&self) -> bool {
        match &self.kind {
            BoundKind::This => true,
            BoundKind::Const(_) | BoundKind::Param(_) => false,
            BoundKind::Member { target, .. } => target.as_ref().is_some_and(|t| t.uses_receiver()),
            BoundKind::Call { target, args, .. } => {
                target.as_ref().is_some_and(|t| t.uses_receiver())
                    || args.iter().any(|a| a.uses_receiver())
            }
            BoundKind::Index { target, args, .. } => {
                target.uses_receiver() || args.iter().any(|a| a.uses_receiver())
            }
            BoundKind::Convert { operand, .. } | BoundKind::Negate(operand) => {
                operand.uses_receiver()
            }
            BoundKind::Binary { left, right, .. } => left.uses_receiver() || right.uses_receiver(),
        }
    }

    pub(crate) fn eval(&self, frame: &Frame<'_>) -> Result<Value, EvalError> {
        match &self.kind {
            BoundKind::Const(v) => Ok(v.clone()),
            BoundKind::Param(i) => frame.args.get(*i).cloned().ok_or(EvalError::ValuesLen {
                expected: *i + 1,
                got: frame.args.len(),
            }),
            BoundKind::This => frame.receiver.cloned().ok_or(EvalError::MissingReceiver),
            BoundKind::Member { target, member } => match target {
                Some(target) => {
                    let recv = non_null(target.eval(frame)?, &member.name)?;
                    (member.get)(Some(&recv))
                }
                None => (member.get)(None),
            },
            BoundKind::Call {
                target,
                method,
                args,
            } => {
                let recv = match target {
                    Some(target) => Some(non_null(target.eval(frame)?, &method.name)?),
                    None => None,
                };
                let values = eval_args(args, frame)?;
                (method.invoke)(recv.as_ref(), &values)
            }
            BoundKind::Index {
                target,
                indexer,
                args,
            } => {
                let recv = non_null(target.eval(frame)?, "indexer")?;
                let values = eval_args(args, frame)?;
                (indexer.get)(Some(&recv), &values)
            }
            BoundKind::Convert {
                operand,
                conversion,
            } => {
                let v = operand.eval(frame)?;
                match conversion {
                    Conversion::Identity => Ok(v),
                    Conversion::Numeric(kind) => v.convert_numeric(*kind),
                    Conversion::Custom(f) => f(v),
                }
            }
            BoundKind::Negate(operand) => operand.eval(frame)?.negate(),
            BoundKind::Binary { op, left, right } => {
                let l = left.eval(frame)?;
                let r = right.eval(frame)?;
                arith(*op, &l, &r)
            }
        }
    }
}

fn non_null(v: Value, what: &str) -> Result<Value, EvalError> {
    match v {
        Value::Null => Err(EvalError::NullReference(what.to_string())),
        v => Ok(v),
    }
}

fn eval_args(args: &Args, frame: &Frame<'_>) -> Result<SmallVec<[Value; 4]>, EvalError> {
    args.iter().map(|a| a.eval(frame)).collect()
}
