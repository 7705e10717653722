use tracing::trace;

use crate::{
    slot::SlotId,
    tree::{Cycle, Progress, Tree},
    Result,
};

/// The replacement for a deleted node with two children: the minimum of its right
/// subtree, together with that node's parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Predecessor {
    pub(crate) slot: SlotId,
    pub(crate) parent: SlotId,
}

impl Predecessor {
    /// Whether the predecessor is the right child of the deleted node itself.
    #[inline]
    pub(crate) fn is_immediate(&self, deleted: SlotId) -> bool {
        self.parent == deleted
    }
}

/// Secondary walk of the delete engine.
///
/// Starts at the right child of the node being deleted and keeps descending left, one
/// link per step, until it meets a node without a left child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PredecessorFinder {
    current: SlotId,
    parent: SlotId,
    steps: u32,
}

impl PredecessorFinder {
    #[inline]
    pub(crate) fn new(deleted: SlotId, right: SlotId) -> Self {
        Self {
            current: right,
            parent: deleted,
            steps: 0,
        }
    }

    pub(crate) fn step(&mut self, tree: &Tree) -> Result<Progress<SlotId, Predecessor>> {
        if self.steps >= tree.capacity() {
            return Err(Cycle(self.steps).into());
        }
        self.steps += 1;

        let left = tree.occupied_node(self.current)?.left;
        if left.is_null() {
            trace!(slot = %self.current, parent = %self.parent, "predecessor found");
            return Ok(Progress::Done(Predecessor {
                slot: self.current,
                parent: self.parent,
            }));
        }

        self.parent = self.current;
        self.current = left;
        Ok(Progress::Continue(left))
    }

    #[cfg(test)]
    pub(crate) fn run(mut self, tree: &Tree) -> Result<Predecessor> {
        loop {
            if let Progress::Done(predecessor) = self.step(tree)? {
                break Ok(predecessor);
            }
        }
    }
}
