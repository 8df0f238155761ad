use std::fmt::Write as _;
use std::sync::Arc;

use log::trace;
use smallvec::SmallVec;

use crate::ast::{Ast, Node, NodeId, Operator};
use crate::bound::{Args, Bound, BoundKind};
use crate::cache::ResolveCache;
use crate::context::Context;
use crate::error::CompileError;
use crate::host::{Conversion, TypeSystem};
use crate::prepared::PreparedExpr;
use crate::typeref::TypeRef;
use crate::types::{NumericKind, Ty, max_type};
use crate::value::{BinaryOp, Value};

/// Turns normalized nodes into typed [`Bound`] trees, one context at a time.
pub(crate) struct Compiler<'a, T: ?Sized> {
    ast: &'a Ast,
    cache: &'a ResolveCache,
    types: &'a T,
    context: &'a Context,
    max_tree_depth: usize,
}

impl<'a, T: TypeSystem + ?Sized> Compiler<'a, T> {
    pub(crate) fn new(
        prepared: &'a PreparedExpr,
        types: &'a T,
        context: &'a Context,
        max_tree_depth: usize,
    ) -> Self {
        Self {
            ast: &prepared.ast,
            cache: &prepared.cache,
            types,
            context,
            max_tree_depth,
        }
    }

    pub(crate) fn resolve(&self, id: NodeId) -> Result<Arc<Bound>, CompileError> {
        self.cache.resolve_with(id, || self.resolve_node(id).and_then(|b| self.bounded(b)))
    }

    /// Checked on every node as it is built.
    fn bounded(&self, node: Arc<Bound>) -> Result<Arc<Bound>, CompileError> {
        if node.depth() > self.max_tree_depth {
            return Err(CompileError::LimitExceeded {
                what: "expression depth",
                limit: self.max_tree_depth,
            });
        }
        Ok(node)
    }

    fn resolve_node(&self, id: NodeId) -> Result<Arc<Bound>, CompileError> {
        match self.ast.get(id) {
            Node::Constant(v) => Ok(Bound::constant(v.clone(), literal_type(v))),
            Node::Block(children) => self.fold_block(children),
            Node::Route(segments) => {
                let head = self.route_head(id, segments)?;
                self.resolve_route(id, segments, head)
            }
            Node::TypeRoute(segments) => {
                let head = self.static_head(segments)?;
                self.resolve_route(id, segments, head)
            }
            Node::Identifier(op) => Err(CompileError::parse(
                self.ast.offset(id),
                format!("unexpected operator '{}'", op.symbol()),
            )),
            Node::Convert(target) => Err(CompileError::Unsupported(format!(
                "cast to '{}' outside of an expression",
                target
            ))),
            Node::Member { .. } | Node::Method { .. } | Node::Indexer { .. } => {
                Err(CompileError::Unsupported(format!(
                    "detached route segment '{}'",
                    self.ast.render(id)
                )))
            }
            Node::Unresolved(raw) => Err(unrecognized(raw)),
        }
    }

    /// Fold an operand/operator stream left to right.
    fn fold_block(&self, children: &[NodeId]) -> Result<Arc<Bound>, CompileError> {
        let mut i = 0;
        let cast = match children.first().map(|id| self.ast.get(*id)) {
            Some(Node::Convert(target)) => {
                i += 1;
                Some(target)
            }
            _ => None,
        };
        let mut negate = false;
        if let Some(op) = children.get(i).and_then(|id| self.ast.operator(*id)) {
            if op.is_sign() {
                negate = op == Operator::Sub;
                i += 1;
            }
        }
        let Some(&first) = children.get(i) else {
            let offset = children.last().map_or(0, |id| self.ast.offset(*id));
            return Err(CompileError::parse(offset, "missing operand"));
        };
        if let Some(op) = self.ast.operator(first) {
            return Err(CompileError::parse(
                self.ast.offset(first),
                format!("unexpected operator '{}'", op.symbol()),
            ));
        }

        let mut acc = self.resolve(first)?;
        if negate {
            acc = negate_bound(acc)?;
        }
        if let Some(target) = cast {
            acc = self.cast(acc, target)?;
        }

        i += 1;
        while i < children.len() {
            let op_id = children[i];
            let offset = self.ast.offset(op_id);
            let Some(op) = self.ast.operator(op_id) else {
                if let Node::Unresolved(raw) = self.ast.get(op_id) {
                    return Err(unrecognized(raw));
                }
                return Err(CompileError::parse(offset, "missing operator between operands"));
            };
            let Some(op) = op.binary() else {
                return Err(CompileError::parse(offset, "unexpected '|'"));
            };
            let Some(&rhs) = children.get(i + 1) else {
                return Err(CompileError::parse(
                    offset,
                    format!("operator '{}' has no right operand", op.symbol()),
                ));
            };
            if self.ast.is_operator(rhs) {
                return Err(CompileError::parse(
                    self.ast.offset(rhs),
                    "two operators in a row",
                ));
            }
            let rhs = self.resolve(rhs)?;
            acc = self.bounded(binary(op, acc, rhs)?)?;
            i += 2;
        }

        #[cfg(feature = "optimize")]
        let acc = crate::optimizer::optimize(acc);
        Ok(acc)
    }

    fn cast(&self, operand: Arc<Bound>, target: &TypeRef) -> Result<Arc<Bound>, CompileError> {
        let to = target
            .resolve(self.types)
            .ok_or_else(|| CompileError::UnknownIdentifier(target.to_string()))?;
        if operand.ty == to {
            return Ok(operand);
        }
        let conversion = match (&operand.ty, &to) {
            (Ty::Numeric(_), Ty::Numeric(kind)) => Conversion::Numeric(*kind),
            (from, _) => self.types.implicit_conversion(from, &to).ok_or_else(|| {
                CompileError::InvalidCast {
                    from: from.clone(),
                    to: to.clone(),
                }
            })?,
        };
        Ok(convert(operand, to, conversion))
    }

    /// Bind the segments after an already bound head.
    fn resolve_route(
        &self,
        id: NodeId,
        segments: &[NodeId],
        (mut acc, consumed): (Arc<Bound>, usize),
    ) -> Result<Arc<Bound>, CompileError> {
        for &seg in &segments[consumed..] {
            let target = acc;
            acc = self.cache.resolve_with(seg, || {
                self.instance_segment(target, seg).and_then(|b| self.bounded(b))
            })?;
        }
        trace!("route '{}' bound to {}", self.ast.render(id), acc.ty);
        Ok(acc)
    }

    /// Bind the leading segment(s) of a route; returns how many segments were consumed.
    fn route_head(
        &self,
        id: NodeId,
        segments: &[NodeId],
    ) -> Result<(Arc<Bound>, usize), CompileError> {
        let Some(&first) = segments.first() else {
            return Err(CompileError::parse(self.ast.offset(id), "empty route"));
        };
        match self.ast.get(first) {
            Node::Member { name, generic_args } if generic_args.is_empty() => {
                if let Some(head) = self.member_head(first, name)? {
                    return Ok((head, 1));
                }
            }
            Node::Method {
                name,
                generic_args,
                args,
            } => {
                let Some(base) = self.context.base_type() else {
                    return Err(CompileError::UnknownIdentifier(name.clone()));
                };
                let this = Bound::new(base.clone(), BoundKind::This);
                let call = self.cache.resolve_with(first, || {
                    self.call(Some(this), base, name, generic_args, args)
                })?;
                return Ok((call, 1));
            }
            _ => {}
        }
        self.static_head(segments)
    }

    /// Parameter, `this`, or instance member of the base type.
    fn member_head(&self, id: NodeId, name: &str) -> Result<Option<Arc<Bound>>, CompileError> {
        if let Some((index, param)) = self.context.parameter(name) {
            return self
                .cache
                .resolve_with(id, || Ok(Bound::new(param.ty.clone(), BoundKind::Param(index))))
                .map(Some);
        }
        let base = self.context.base_type();
        if name == "this" {
            let base = base.ok_or_else(|| {
                CompileError::Unsupported("'this' without a base type".to_string())
            })?;
            return self
                .cache
                .resolve_with(id, || Ok(Bound::new(base.clone(), BoundKind::This)))
                .map(Some);
        }
        let Some(base) = base else {
            return Ok(None);
        };
        match self.types.find_member(base, name) {
            Some(member) if !member.is_static => self
                .cache
                .resolve_with(id, || {
                    let this = Bound::new(base.clone(), BoundKind::This);
                    Ok(Bound::new(
                        member.ty.clone(),
                        BoundKind::Member {
                            target: Some(this),
                            member,
                        },
                    ))
                })
                .map(Some),
            _ => Ok(None),
        }
    }

    /// The shortest dotted prefix naming a type, followed by a static member or method.
    fn static_head(&self, segments: &[NodeId]) -> Result<(Arc<Bound>, usize), CompileError> {
        let mut path: Vec<&str> = Vec::new();
        for (k, &seg) in segments.iter().enumerate() {
            let Node::Member { name, generic_args } = self.ast.get(seg) else {
                break;
            };
            path.push(name);
            let Some(ty) = TypeRef::from_path(&path, generic_args.clone())
                .and_then(|t| t.resolve(self.types))
            else {
                continue;
            };
            let Some(&next) = segments.get(k + 1) else {
                return Err(CompileError::Unsupported(format!(
                    "type '{}' used as a value",
                    ty
                )));
            };
            let bound = self
                .cache
                .resolve_with(next, || self.static_segment(&ty, next))?;
            return Ok((bound, k + 2));
        }
        let name = path.first().copied().unwrap_or_default();
        Err(CompileError::UnknownIdentifier(name.to_string()))
    }

    fn static_segment(&self, ty: &Ty, seg: NodeId) -> Result<Arc<Bound>, CompileError> {
        match self.ast.get(seg) {
            Node::Member { name, .. } => {
                let member = self
                    .types
                    .find_member(ty, name)
                    .filter(|m| m.is_static)
                    .ok_or_else(|| CompileError::UnknownIdentifier(format!("{}.{}", ty, name)))?;
                Ok(Bound::new(
                    member.ty.clone(),
                    BoundKind::Member {
                        target: None,
                        member,
                    },
                ))
            }
            Node::Method {
                name,
                generic_args,
                args,
            } => self.call(None, ty, name, generic_args, args),
            _ => Err(CompileError::Unsupported(format!(
                "'{}' cannot follow the type '{}'",
                self.ast.render(seg),
                ty
            ))),
        }
    }

    fn instance_segment(&self, target: Arc<Bound>, seg: NodeId) -> Result<Arc<Bound>, CompileError> {
        let ty = target.ty.clone();
        match self.ast.get(seg) {
            Node::Member { name, .. } => {
                let member = self
                    .types
                    .find_member(&ty, name)
                    .filter(|m| !m.is_static)
                    .ok_or_else(|| CompileError::UnknownIdentifier(format!("{}.{}", ty, name)))?;
                Ok(Bound::new(
                    member.ty.clone(),
                    BoundKind::Member {
                        target: Some(target),
                        member,
                    },
                ))
            }
            Node::Method {
                name,
                generic_args,
                args,
            } => self.call(Some(target), &ty, name, generic_args, args),
            Node::Indexer { args } => self.index(target, args),
            _ => Err(CompileError::Unsupported(format!(
                "'{}' is not a route segment",
                self.ast.render(seg)
            ))),
        }
    }

    fn call(
        &self,
        target: Option<Arc<Bound>>,
        ty: &Ty,
        name: &str,
        generic_args: &[TypeRef],
        args: &[NodeId],
    ) -> Result<Arc<Bound>, CompileError> {
        let generics = generic_args
            .iter()
            .map(|g| {
                g.resolve(self.types)
                    .ok_or_else(|| CompileError::UnknownIdentifier(g.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let args = self.resolve_args(args)?;
        let arg_types: Vec<Ty> = args.iter().map(|a| a.ty.clone()).collect();
        let signature = || {
            let mut s = format!("{}.{}", ty, name);
            if !generics.is_empty() {
                s.push('<');
                s.push_str(&join(&generics));
                s.push('>');
            }
            let _ = write!(s, "({})", join(&arg_types));
            s
        };
        let not_found = || CompileError::OverloadNotFound {
            signature: signature(),
        };

        let (method, params) = self
            .types
            .find_method(ty, name, &generics, &arg_types)
            .ok_or_else(not_found)?;
        if method.is_static != target.is_none() {
            return Err(not_found());
        }
        let args = self.coerce(args, &params).ok_or_else(not_found)?;
        Ok(Bound::new(
            method.return_type.clone(),
            BoundKind::Call {
                target,
                method,
                args,
            },
        ))
    }

    fn index(&self, target: Arc<Bound>, args: &[NodeId]) -> Result<Arc<Bound>, CompileError> {
        let args = self.resolve_args(args)?;
        let arg_types: Vec<Ty> = args.iter().map(|a| a.ty.clone()).collect();
        let not_found = || CompileError::OverloadNotFound {
            signature: format!("{}[{}]", target.ty, join(&arg_types)),
        };
        let (indexer, params) = self
            .types
            .find_indexer(&target.ty, &arg_types)
            .ok_or_else(not_found)?;
        let args = self.coerce(args, &params).ok_or_else(not_found)?;
        Ok(Bound::new(
            indexer.return_type.clone(),
            BoundKind::Index {
                target,
                indexer,
                args,
            },
        ))
    }

    fn resolve_args(&self, args: &[NodeId]) -> Result<Args, CompileError> {
        args.iter().map(|a| self.resolve(*a)).collect()
    }

    /// Convert each argument to its matched parameter type.
    fn coerce(&self, args: Args, params: &[Ty]) -> Option<Args> {
        if args.len() != params.len() {
            return None;
        }
        args.into_iter()
            .zip(params)
            .map(|(arg, param)| {
                if arg.ty == *param {
                    return Some(arg);
                }
                let conversion = self.types.implicit_conversion(&arg.ty, param)?;
                Some(convert(arg, param.clone(), conversion))
            })
            .collect::<Option<SmallVec<_>>>()
    }
}

fn unrecognized(raw: &str) -> CompileError {
    CompileError::Unsupported(format!("unrecognized input '{}'", raw))
}

fn literal_type(v: &Value) -> Ty {
    match v {
        Value::Bool(_) => Ty::Bool,
        Value::Str(_) => Ty::String,
        v => v.numeric_kind().map_or(Ty::Object, Ty::Numeric),
    }
}

fn convert(operand: Arc<Bound>, to: Ty, conversion: Conversion) -> Arc<Bound> {
    Bound::new(
        to,
        BoundKind::Convert {
            operand,
            conversion,
        },
    )
}

fn to_kind(operand: Arc<Bound>, kind: NumericKind) -> Arc<Bound> {
    if operand.ty == Ty::Numeric(kind) {
        return operand;
    }
    convert(operand, kind.into(), Conversion::Numeric(kind))
}

/// Unary minus. Narrow unsigned kinds widen first; `ulong` has no negation.
fn negate_bound(operand: Arc<Bound>) -> Result<Arc<Bound>, CompileError> {
    let mismatch = || CompileError::TypeMismatch {
        op: '-',
        left: operand.ty.clone(),
        right: operand.ty.clone(),
    };
    let kind = match operand.ty.numeric().ok_or_else(mismatch)? {
        NumericKind::U8 | NumericKind::U16 => NumericKind::I32,
        NumericKind::U32 => NumericKind::I64,
        NumericKind::U64 => return Err(mismatch()),
        kind => kind,
    };
    let operand = to_kind(operand, kind);
    Ok(Bound::new(kind.into(), BoundKind::Negate(operand)))
}

fn binary(op: BinaryOp, left: Arc<Bound>, right: Arc<Bound>) -> Result<Arc<Bound>, CompileError> {
    let mismatch = || CompileError::TypeMismatch {
        op: op.symbol(),
        left: left.ty.clone(),
        right: right.ty.clone(),
    };
    let kind = match op {
        BinaryOp::Pow if left.ty.is_numeric() && right.ty.is_numeric() => NumericKind::F64,
        BinaryOp::Pow => return Err(mismatch()),
        _ => max_type(&left.ty, &right.ty).ok_or_else(mismatch)?,
    };
    Ok(Bound::new(
        kind.into(),
        BoundKind::Binary {
            op,
            left: to_kind(left, kind),
            right: to_kind(right, kind),
        },
    ))
}

fn join(types: &[Ty]) -> String {
    types
        .iter()
        .map(Ty::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
