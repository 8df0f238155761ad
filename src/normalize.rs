use log::trace;

use crate::ast::{Ast, Node, NodeId, Operator};
use crate::context::Context;
use crate::error::CompileError;
use crate::host::TypeSystem;
use crate::typeref::TypeRef;

/// Rewrites flat blocks into the shape the folder expects.
///
/// Every block goes through the same three passes, in order: cast detection, absolute-value
/// extraction, multiplicative grouping. Blocks created by a pass are visited afterwards.
///
/// Nesting is counted like the parser counts it: parentheses, argument lists, casts and
/// absolute values each open one level; grouped runs do not.
pub(crate) struct Normalizer<'a, T: ?Sized> {
    ast: &'a mut Ast,
    types: &'a T,
    context: &'a Context,
    max_depth: usize,
}

impl<'a, T: TypeSystem + ?Sized> Normalizer<'a, T> {
    pub(crate) fn new(
        ast: &'a mut Ast,
        types: &'a T,
        context: &'a Context,
        max_depth: usize,
    ) -> Self {
        Self {
            ast,
            types,
            context,
            max_depth,
        }
    }

    pub(crate) fn run(&mut self, root: NodeId) -> Result<(), CompileError> {
        let mut stack = vec![(root, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            let mut grouped = Vec::new();
            if matches!(self.ast.get(id), Node::Block(_)) {
                if depth > self.max_depth {
                    return Err(self.too_deep());
                }
                grouped = self.normalize_block(id, depth)?;
            }
            match self.ast.get(id) {
                Node::Block(children) => stack.extend(children.iter().map(|c| {
                    let nests = matches!(self.ast.get(*c), Node::Block(_))
                        && grouped.binary_search(c).is_err();
                    (*c, if nests { depth + 1 } else { depth })
                })),
                Node::Route(segments) | Node::TypeRoute(segments) => {
                    stack.extend(segments.iter().map(|s| (*s, depth)))
                }
                Node::Method { args, .. } | Node::Indexer { args } => {
                    stack.extend(args.iter().map(|a| (*a, depth + 1)))
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn too_deep(&self) -> CompileError {
        CompileError::LimitExceeded {
            what: "nesting depth",
            limit: self.max_depth,
        }
    }

    /// Returns the runs grouped into new sub-blocks, in ascending id order.
    fn normalize_block(&mut self, id: NodeId, depth: usize) -> Result<Vec<NodeId>, CompileError> {
        let children = match self.ast.get(id) {
            Node::Block(children) => children.clone(),
            _ => return Ok(Vec::new()),
        };
        let children = self.detect_casts(children)?;
        let (mut children, _) = self.extract_abs(&children, 0, None, depth)?;
        let mut runs = Vec::new();
        while let Some((grouped, run)) = self.group_first_run(&children) {
            children = grouped;
            runs.push(run);
        }
        trace!("normalized block {:?}: {} children", id, children.len());
        *self.ast.get_mut(id) = Node::Block(children);
        Ok(runs)
    }

    /// `(TypeName)` followed by an operand becomes `[Convert, operand]`.
    ///
    /// Runs right to left so that chained casts nest: `(double)(int)x`.
    fn detect_casts(&mut self, mut list: Vec<NodeId>) -> Result<Vec<NodeId>, CompileError> {
        let mut i = list.len();
        while i > 0 {
            i -= 1;
            let Some(target) = self.cast_target(list[i]) else {
                continue;
            };
            let offset = self.ast.offset(list[i]);
            let mut j = i + 1;
            while j < list.len() && self.ast.is_operator(list[j]) {
                j += 1;
            }
            if j >= list.len() {
                return Err(CompileError::parse(
                    offset,
                    format!("cast to '{}' has no operand", target),
                ));
            }
            let absorbed: Vec<NodeId> = list.drain(i + 1..=j).collect();
            let convert = self.ast.push(Node::Convert(target), offset);
            let mut block = Vec::with_capacity(absorbed.len() + 1);
            block.push(convert);
            block.extend(absorbed);
            list[i] = self.ast.push(Node::Block(block), offset);
        }
        Ok(list)
    }

    /// A parenthesized bare route that names a type. Never fails.
    fn cast_target(&self, id: NodeId) -> Option<TypeRef> {
        let [inner] = self.ast.children(id)? else {
            return None;
        };
        let Node::Route(segments) = self.ast.get(*inner) else {
            return None;
        };
        let mut path = Vec::with_capacity(segments.len());
        let mut generics = Vec::new();
        for seg in segments {
            match self.ast.get(*seg) {
                Node::Member { name, generic_args } => {
                    path.push(name.as_str());
                    generics = generic_args.clone();
                }
                _ => return None,
            }
        }
        let first = *path.first()?;
        if self.context.parameter(first).is_some() {
            return None;
        }
        if path.len() == 1 && generics.is_empty() {
            if let Some(base) = self.context.base_type() {
                if self.types.find_member(base, first).is_some_and(|m| !m.is_static) {
                    return None;
                }
            }
        }
        let target = TypeRef::from_path(&path, generics)?;
        target.resolve(self.types)?;
        Some(target)
    }

    /// Replace `| ... |` spans with `System.Math.Abs(...)` routes.
    ///
    /// `nested` carries the offset of the opening bar when scanning an interior; the scan then
    /// stops at the matching closing bar and returns its index. `depth` is the nesting level of
    /// the scanned span.
    fn extract_abs(
        &mut self,
        items: &[NodeId],
        start: usize,
        nested: Option<usize>,
        depth: usize,
    ) -> Result<(Vec<NodeId>, usize), CompileError> {
        let mut out: Vec<NodeId> = Vec::new();
        let mut i = start;
        while i < items.len() {
            let id = items[i];
            if self.ast.operator(id) != Some(Operator::Bar) {
                out.push(id);
                i += 1;
                continue;
            }
            let opening = out.last().is_none_or(|prev| self.ast.is_operator(*prev));
            if !opening {
                return match nested {
                    Some(_) => Ok((out, i)),
                    None => Err(CompileError::parse(
                        self.ast.offset(id),
                        "'|' closes no absolute value",
                    )),
                };
            }
            if depth >= self.max_depth {
                return Err(self.too_deep());
            }
            let open_offset = self.ast.offset(id);
            let (inner, close) = self.extract_abs(items, i + 1, Some(open_offset), depth + 1)?;
            if inner.is_empty() {
                return Err(CompileError::parse(open_offset, "empty absolute value"));
            }
            out.push(self.abs_route(inner, open_offset));
            i = close + 1;
        }
        match nested {
            Some(offset) => Err(CompileError::parse(offset, "missing closing '|'")),
            None => Ok((out, items.len())),
        }
    }

    fn abs_route(&mut self, inner: Vec<NodeId>, offset: usize) -> NodeId {
        let block = self.ast.push(Node::Block(inner), offset);
        let system = self.ast.push(
            Node::Member {
                name: "System".into(),
                generic_args: Vec::new(),
            },
            offset,
        );
        let math = self.ast.push(
            Node::Member {
                name: "Math".into(),
                generic_args: Vec::new(),
            },
            offset,
        );
        let abs = self.ast.push(
            Node::Method {
                name: "Abs".into(),
                generic_args: Vec::new(),
                args: vec![block],
            },
            offset,
        );
        self.ast.push(Node::TypeRoute(vec![system, math, abs]), offset)
    }

    /// Nest the first run of operands joined by `*`, `/`, `%` into a sub-block.
    ///
    /// Returns the rewritten children and the new sub-block, or `None` when there is no run or
    /// the run already spans the whole block.
    fn group_first_run(&mut self, children: &[NodeId]) -> Option<(Vec<NodeId>, NodeId)> {
        let n = children.len();
        for start in 0..n {
            if self.ast.is_operator(children[start]) {
                continue;
            }
            let mut end = start;
            while end + 2 < n
                && self
                    .ast
                    .operator(children[end + 1])
                    .is_some_and(Operator::is_multiplicative)
                && !self.ast.is_operator(children[end + 2])
            {
                end += 2;
            }
            if end == start {
                continue;
            }
            if start == 0 && end == n - 1 {
                return None;
            }
            let offset = self.ast.offset(children[start]);
            let run = self.ast.push(Node::Block(children[start..=end].to_vec()), offset);
            let mut out = Vec::with_capacity(n - (end - start));
            out.extend_from_slice(&children[..start]);
            out.push(run);
            out.extend_from_slice(&children[end + 1..]);
            return Some((out, run));
        }
        None
    }
}
