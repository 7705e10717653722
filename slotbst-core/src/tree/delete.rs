use tracing::trace;

use crate::{
    slot::{Side, SlotId},
    store::Node,
    tree::{
        predecessor::{Predecessor, PredecessorFinder},
        Position, Progress, Tree, Walk, Walker,
    },
    Result, Value,
};

/// The observable phase of a delete command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePhase {
    /// Walking towards the value to delete.
    Locate,
    /// Inspecting the children of the node found.
    Classify,
    /// Removing a node without children.
    Leaf,
    /// Promoting the only child, on the given side, of the node.
    OneChild(Side),
    /// Searching the replacement of a node with two children.
    TwoChildren,
}

/// Delete engine.
///
/// ```text
/// Locate -> Classify -> { Leaf, OneChild(Left | Right), TwoChildren } -> done
/// ```
///
/// Only the terminal step of each case mutates the tree, every step before it is a
/// read-only inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeleteJob {
    Locate(Walker),
    Classify {
        slot: SlotId,
        position: Position,
    },
    Leaf {
        slot: SlotId,
        position: Position,
    },
    OneChild {
        slot: SlotId,
        position: Position,
        side: Side,
        child: SlotId,
    },
    TwoChildren {
        slot: SlotId,
        position: Position,
        node: Node,
        finder: PredecessorFinder,
    },
}

impl DeleteJob {
    #[inline]
    pub(crate) fn new(value: Value, root: SlotId) -> Self {
        Self::Locate(Walker::new(value, root))
    }

    #[inline]
    pub(crate) fn phase(&self) -> DeletePhase {
        match self {
            Self::Locate(_) => DeletePhase::Locate,
            Self::Classify { .. } => DeletePhase::Classify,
            Self::Leaf { .. } => DeletePhase::Leaf,
            Self::OneChild { side, .. } => DeletePhase::OneChild(*side),
            Self::TwoChildren { .. } => DeletePhase::TwoChildren,
        }
    }

    /// Advances the delete by one step.
    ///
    /// Finishes with the freed slot, or `None` if the value is not in the tree.
    pub(crate) fn step(
        &mut self,
        tree: &mut Tree,
    ) -> Result<Progress<DeletePhase, Option<SlotId>>> {
        let next = match *self {
            Self::Locate(mut walker) => match walker.step(tree)? {
                Progress::Continue(_) => Self::Locate(walker),
                Progress::Done(walk @ Walk::NodeReached { slot, position }) => {
                    trace!(%slot, root = walk.is_root_match(), "delete: located");
                    Self::Classify { slot, position }
                }
                Progress::Done(Walk::LeafReached { .. }) => {
                    trace!(value = walker.target(), "delete: not found");
                    return Ok(Progress::Done(None));
                }
            },

            Self::Classify { slot, position } => {
                let node = tree.occupied_node(slot)?;
                // A promoted child must be a live node.
                for child in [node.left, node.right] {
                    if !child.is_null() {
                        tree.occupied_node(child)?;
                    }
                }
                match (node.left.is_null(), node.right.is_null()) {
                    (true, true) => Self::Leaf { slot, position },
                    (true, false) => Self::OneChild {
                        slot,
                        position,
                        side: Side::Right,
                        child: node.right,
                    },
                    (false, true) => Self::OneChild {
                        slot,
                        position,
                        side: Side::Left,
                        child: node.left,
                    },
                    (false, false) => Self::TwoChildren {
                        slot,
                        position,
                        node,
                        finder: PredecessorFinder::new(slot, node.right),
                    },
                }
            }

            Self::Leaf { slot, position } => {
                tree.relink(position, SlotId::NULL)?;
                tree.dispose(slot)?;
                trace!(%slot, root = position.is_root(), "delete: leaf removed");
                return Ok(Progress::Done(Some(slot)));
            }

            Self::OneChild {
                slot,
                position,
                child,
                ..
            } => {
                tree.relink(position, child)?;
                tree.dispose(slot)?;
                trace!(%slot, %child, root = position.is_root(), "delete: child promoted");
                return Ok(Progress::Done(Some(slot)));
            }

            Self::TwoChildren {
                slot,
                position,
                node,
                mut finder,
            } => match finder.step(tree)? {
                Progress::Continue(_) => Self::TwoChildren {
                    slot,
                    position,
                    node,
                    finder,
                },
                Progress::Done(predecessor) => {
                    Self::replace(tree, slot, position, node, predecessor)?;
                    return Ok(Progress::Done(Some(slot)));
                }
            },
        };

        *self = next;
        Ok(Progress::Continue(self.phase()))
    }

    /// Puts `predecessor` in place of the deleted node at `slot`.
    fn replace(
        tree: &mut Tree,
        slot: SlotId,
        position: Position,
        node: Node,
        predecessor: Predecessor,
    ) -> Result<()> {
        if predecessor.is_immediate(slot) {
            // Its right subtree stays where it is.
            tree.relink(position, predecessor.slot)?;
            tree.set_child(predecessor.slot, Side::Left, node.left)?;
        } else {
            // Having no left child, the predecessor is always the left child of its
            // parent. Its right subtree takes its place there.
            let moved = tree.node(predecessor.slot)?;
            tree.set_child(predecessor.parent, Side::Left, moved.right)?;
            tree.relink(position, predecessor.slot)?;
            tree.set_node(predecessor.slot, Node::new(moved.value, node.left, node.right))?;
        }
        tree.dispose(slot)?;

        trace!(
            %slot,
            predecessor = %predecessor.slot,
            immediate = predecessor.is_immediate(slot),
            "delete: replaced by predecessor"
        );
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn run(mut self, tree: &mut Tree) -> Result<Option<SlotId>> {
        loop {
            if let Progress::Done(deleted) = self.step(tree)? {
                break Ok(deleted);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DeleteJob, DeletePhase};
    use crate::{
        error::ErrorCode,
        slot::{Side, SlotId},
        store::Node,
        tree::{
            tests::{in_order, tree_of},
            Progress, Tree,
        },
        Value,
    };

    fn delete(tree: &mut Tree, value: Value) -> Option<SlotId> {
        let root = tree.root();
        DeleteJob::new(value, root).run(tree).unwrap()
    }

    /// Runs a delete and collects every phase it goes through.
    fn phases(tree: &mut Tree, value: Value) -> Vec<DeletePhase> {
        let mut job = DeleteJob::new(value, tree.root());
        let mut phases = vec![job.phase()];
        while let Progress::Continue(phase) = job.step(tree).unwrap() {
            if phases.last() != Some(&phase) {
                phases.push(phase);
            }
        }
        phases
    }

    #[test]
    fn test_not_found() {
        let mut tree = tree_of(7, &[50, 30, 70]);
        let before = tree.clone();
        assert_eq!(delete(&mut tree, 60), None);
        assert_eq!(tree, before);

        let mut empty = Tree::new(2);
        assert_eq!(delete(&mut empty, 1), None);
    }

    #[test]
    fn test_leaf() {
        let mut tree = tree_of(7, &[50, 30, 70, 20, 40]);
        let others = [1u32, 2, 3, 5].map(|s| tree.node(s.into()).unwrap());

        assert_eq!(
            phases(&mut tree, 20),
            [DeletePhase::Locate, DeletePhase::Classify, DeletePhase::Leaf]
        );
        assert_eq!(tree.node(2.into()).unwrap(), Node::new(30, SlotId::NULL, 5.into()));
        assert_eq!(tree.node(4.into()).unwrap(), Node::default());
        assert!(tree.freelist().is_free(4.into()));

        let after = [1u32, 2, 3, 5].map(|s| tree.node(s.into()).unwrap());
        assert_eq!(others[0], after[0]);
        assert_eq!(others[2], after[2]);
        assert_eq!(others[3], after[3]);
    }

    #[test]
    fn test_root_leaf() {
        let mut tree = tree_of(3, &[5]);
        assert_eq!(delete(&mut tree, 5), Some(1.into()));
        assert!(tree.root().is_null());
        assert_eq!(tree.len(), 0);
        assert_eq!(tree.freelist().len(), 3);
    }

    #[test]
    fn test_one_child() {
        // Right only: 30 -> 40.
        let mut tree = tree_of(7, &[50, 30, 40]);
        assert_eq!(
            phases(&mut tree, 30),
            [
                DeletePhase::Locate,
                DeletePhase::Classify,
                DeletePhase::OneChild(Side::Right)
            ]
        );
        assert_eq!(tree.node(1.into()).unwrap().left, 3.into());
        assert_eq!(in_order(&tree), [40, 50]);

        // Left only: 70 -> 60.
        let mut tree = tree_of(7, &[50, 70, 60]);
        assert_eq!(
            phases(&mut tree, 70),
            [
                DeletePhase::Locate,
                DeletePhase::Classify,
                DeletePhase::OneChild(Side::Left)
            ]
        );
        assert_eq!(tree.node(1.into()).unwrap().right, 3.into());
        assert_eq!(in_order(&tree), [50, 60]);
    }

    #[test]
    fn test_root_with_one_child() {
        let mut tree = Tree::new(3);
        tree.construct(Node::new(10, 2.into(), SlotId::NULL)).unwrap();
        tree.construct(Node::leaf(5)).unwrap();

        assert_eq!(delete(&mut tree, 10), Some(1.into()));
        assert_eq!(tree.root(), 2.into());
        assert_eq!(tree.node(2.into()).unwrap(), Node::leaf(5));
    }

    #[test]
    fn test_dangling_link_rejected() {
        // 10(1) -> 5(2), 20(3); 20 links left to slot 4, which is still free.
        let mut tree = Tree::new(4);
        tree.construct(Node::new(10, 2.into(), 3.into())).unwrap();
        tree.construct(Node::leaf(5)).unwrap();
        tree.construct(Node::new(20, 4.into(), SlotId::NULL)).unwrap();
        let before = tree.clone();

        let err = DeleteJob::new(10, tree.root()).run(&mut tree).unwrap_err();
        assert_eq!(err.code(), ErrorCode::EngineCorrupted);
        let err = DeleteJob::new(20, tree.root()).run(&mut tree).unwrap_err();
        assert_eq!(err.code(), ErrorCode::EngineCorrupted);
        assert_eq!(tree, before);
    }

    #[test]
    fn test_two_children_immediate() {
        let mut tree = tree_of(7, &[50, 30, 70, 20, 40]);
        assert_eq!(
            phases(&mut tree, 30),
            [
                DeletePhase::Locate,
                DeletePhase::Classify,
                DeletePhase::TwoChildren
            ]
        );

        // 40 took the place of 30 and adopted 20.
        assert_eq!(tree.node(1.into()).unwrap().left, 5.into());
        assert_eq!(tree.node(5.into()).unwrap(), Node::new(40, 4.into(), SlotId::NULL));
        assert_eq!(tree.search(30).unwrap().found(), None);
        assert_eq!(in_order(&tree), [20, 40, 50, 70]);
    }

    #[test]
    fn test_two_children_deep() {
        // 50(1) -> 30(2), 80(3); 80 -> 60(4), 90(5); 60 -> 55(6), 65(7); 55 -> 57(8)
        let mut tree = tree_of(8, &[50, 30, 80, 60, 90, 55, 65, 57]);

        assert_eq!(delete(&mut tree, 50), Some(1.into()));
        assert_eq!(tree.root(), 6.into());
        assert_eq!(tree.node(6.into()).unwrap(), Node::new(55, 2.into(), 3.into()));
        // The right subtree of the predecessor moved up to its old place.
        assert_eq!(tree.node(4.into()).unwrap(), Node::new(60, 8.into(), 7.into()));
        assert_eq!(in_order(&tree), [30, 55, 57, 60, 65, 80, 90]);
        assert_eq!(tree.len(), 7);
    }

    #[test]
    fn test_two_children_not_root() {
        // 10(1) -> 50(2); 50 -> 30(3), 80(4); 80 -> 60(5); 60 -> 55(6)
        let mut tree = tree_of(7, &[10, 50, 30, 80, 60, 55]);

        assert_eq!(delete(&mut tree, 50), Some(2.into()));
        assert_eq!(tree.node(1.into()).unwrap().right, 6.into());
        assert_eq!(tree.node(6.into()).unwrap(), Node::new(55, 3.into(), 4.into()));
        assert_eq!(tree.node(5.into()).unwrap(), Node::leaf(60));
        assert_eq!(in_order(&tree), [10, 30, 55, 60, 80]);
    }
}
