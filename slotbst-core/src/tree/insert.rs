use tracing::trace;

use crate::{
    slot::{Side, SlotId},
    store::Node,
    tree::{Position, Progress, Tree, Walk, Walker},
    Result, Value,
};

/// Insert engine: locate the leaf position of a value, then attach a new slot there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InsertJob {
    Locate(Walker),
    Attach { value: Value, position: Position },
}

impl InsertJob {
    #[inline]
    pub(crate) fn new(value: Value, root: SlotId) -> Self {
        Self::Locate(Walker::new(value, root))
    }

    /// Advances the insert by one step, yielding the new slot once attached.
    ///
    /// Duplicates are not rejected. When the walk reaches a node holding the same value
    /// it resumes in that node's right subtree, so the new node lands at the leaf
    /// position right after its equals.
    pub(crate) fn step(&mut self, tree: &mut Tree) -> Result<Progress<(), SlotId>> {
        match self {
            Self::Locate(walker) => {
                match walker.step(tree)? {
                    Progress::Continue(_) => {}
                    Progress::Done(Walk::LeafReached { position }) => {
                        let value = walker.target();
                        *self = Self::Attach { value, position };
                    }
                    Progress::Done(Walk::NodeReached { slot, .. }) => {
                        trace!(value = walker.target(), %slot, "insert: duplicate value");
                        let node = tree.node(slot)?;
                        walker.descend(slot, &node, Side::Right);
                    }
                }
                Ok(Progress::Continue(()))
            }

            Self::Attach { value, position } => {
                let slot = tree.allocate(Node::leaf(*value))?;
                tree.relink(*position, slot)?;
                trace!(value = *value, %slot, parent = %position.parent, "insert: attached");
                Ok(Progress::Done(slot))
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn run(mut self, tree: &mut Tree) -> Result<SlotId> {
        loop {
            if let Progress::Done(slot) = self.step(tree)? {
                break Ok(slot);
            }
        }
    }
}
