use std::fmt;

use crate::ast::{Ast, NodeId};
use crate::cache::ResolveCache;

/// Parsed and normalized expression, ready to be bound.
///
/// Binding results are cached per node inside, so binding the same `PreparedExpr` again
/// returns the first successful result even under a different context. The cache is not
/// synchronized; a `PreparedExpr` can move between threads but cannot be shared.
pub struct PreparedExpr {
    pub(crate) ast: Ast,
    pub(crate) root: NodeId,
    pub(crate) cache: ResolveCache,
}

impl PreparedExpr {
    pub(crate) fn new(ast: Ast, root: NodeId) -> Self {
        let cache = ResolveCache::new(ast.len());
        Self { ast, root, cache }
    }

    pub fn ast(&self) -> &Ast {
        &self.ast
    }

    /// The root block.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of nodes that already hold a binding result.
    pub fn cached_nodes(&self) -> usize {
        self.cache.filled()
    }
}

/// Renders the normalized tree, with every nested block in parentheses.
impl fmt::Display for PreparedExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ast.render(self.root))
    }
}

impl fmt::Debug for PreparedExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedExpr")
            .field("expr", &self.to_string())
            .field("nodes", &self.ast.len())
            .field("cached", &self.cache.filled())
            .finish()
    }
}
