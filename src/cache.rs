use std::sync::Arc;

use log::trace;
use once_cell::unsync::OnceCell;

use crate::ast::NodeId;
use crate::bound::Bound;
use crate::error::CompileError;

/// Per-node resolution results, written at most once.
///
/// A node that resolved successfully keeps its result for every later request, whatever
/// context that request carries. Failures leave the slot empty.
pub(crate) struct ResolveCache {
    slots: Vec<OnceCell<Arc<Bound>>>,
}

impl ResolveCache {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            slots: (0..len).map(|_| OnceCell::new()).collect(),
        }
    }

    /// Return the cached result for `id`, or run `resolve` and remember its success.
    pub(crate) fn resolve_with<F>(&self, id: NodeId, resolve: F) -> Result<Arc<Bound>, CompileError>
    where
        F: FnOnce() -> Result<Arc<Bound>, CompileError>,
    {
        let Some(slot) = self.slots.get(id.index()) else {
            return resolve();
        };
        if let Some(hit) = slot.get() {
            trace!("resolve cache hit for {:?}", id);
            return Ok(hit.clone());
        }
        slot.get_or_try_init(resolve).cloned()
    }

    pub(crate) fn filled(&self) -> usize {
        self.slots.iter().filter(|s| s.get().is_some()).count()
    }
}
