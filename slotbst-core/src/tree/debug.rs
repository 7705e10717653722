use std::fmt::{Debug, Formatter};

use thiserror::Error;

use crate::{
    slot::{Side, SlotId},
    store::Node,
    tree::{Tree, Walker},
    Result, Value,
};

/// Read-only inspection of the engine state.
///
/// Its `Debug` output is a dump of the tree, one node per line, left child first.
pub struct Debugger<'a> {
    tree: &'a Tree,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub(crate) enum Inconsistency {
    #[error("the root {0} is not an occupied slot")]
    RootNotOccupied(SlotId),
    #[error("slot {0} is linked from the tree but not occupied")]
    LinkedNotOccupied(SlotId),
    #[error("slot {0} is reachable through more than one link")]
    SharedLink(SlotId),
    #[error("slot {0} breaks the ordering of its subtree")]
    OrderViolated(SlotId),
    #[error("free slot {0} still holds data")]
    FreeSlotNotCleared(SlotId),
    #[error("the free list counts {0} slots but {1} are marked free")]
    FreeCountMismatched(usize, usize),
}

impl<'a> Debugger<'a> {
    #[inline]
    pub(crate) fn new(tree: &'a Tree) -> Self {
        Self { tree }
    }

    #[inline]
    pub fn capacity(&self) -> u32 {
        self.tree.capacity()
    }

    #[inline]
    pub fn free_count(&self) -> usize {
        self.tree.freelist().len()
    }

    /// The free slots, in the order they will be handed out.
    #[inline]
    pub fn free_list(&self) -> Vec<SlotId> {
        self.tree.freelist().iter().collect()
    }

    /// The slots a search for `value` visits, from the root down.
    pub fn path(&self, value: Value) -> Result<Vec<SlotId>> {
        let mut descent = Walker::new(value, self.tree.root()).descent(self.tree);
        let mut path = descent.by_ref().map(|step| step.current).collect::<Vec<_>>();
        if let Some(slot) = descent.outcome().transpose()?.and_then(|w| w.found()) {
            path.push(slot);
        }
        Ok(path)
    }

    /// Checks every structural invariant of the engine state.
    ///
    /// * the root and every linked slot are occupied and linked exactly once,
    /// * left subtrees hold smaller values, right subtrees equal or greater ones,
    /// * free slots are zeroed and the free list count matches its bitmap.
    pub fn validate(&self) -> Result<()> {
        let tree = self.tree;
        let freelist = tree.freelist();

        let marked = (1..=tree.capacity())
            .map(SlotId::from)
            .filter(|slot| freelist.is_free(*slot))
            .count();
        if marked != freelist.len() {
            return Err(Inconsistency::FreeCountMismatched(freelist.len(), marked).into());
        }
        for slot in freelist.iter() {
            if tree.node(slot)? != Node::default() {
                return Err(Inconsistency::FreeSlotNotCleared(slot).into());
            }
        }

        let root = tree.root();
        if root.is_null() {
            return Ok(());
        }
        if !tree.is_occupied(root) {
            return Err(Inconsistency::RootNotOccupied(root).into());
        }

        // (slot, inclusive lower bound, exclusive upper bound)
        let mut seen = vec![false; tree.capacity() as usize + 1];
        let mut stack: Vec<(SlotId, Option<Value>, Option<Value>)> = vec![(root, None, None)];

        while let Some((slot, lower, upper)) = stack.pop() {
            if seen[slot.raw() as usize] {
                return Err(Inconsistency::SharedLink(slot).into());
            }
            seen[slot.raw() as usize] = true;

            let node = tree.node(slot)?;
            let in_range = lower.map_or(true, |lo| node.value >= lo)
                && upper.map_or(true, |hi| node.value < hi);
            if !in_range {
                return Err(Inconsistency::OrderViolated(slot).into());
            }

            for (child, lower, upper) in [
                (node.left, lower, Some(node.value)),
                (node.right, Some(node.value), upper),
            ] {
                if child.is_null() {
                    continue;
                }
                if !tree.is_occupied(child) {
                    return Err(Inconsistency::LinkedNotOccupied(child).into());
                }
                stack.push((child, lower, upper));
            }
        }
        Ok(())
    }

    fn dump_node(
        &self,
        slot: SlotId,
        label: &str,
        prefix: &str,
        is_last: bool,
        depth: u32,
        f: &mut Formatter<'_>,
    ) -> std::fmt::Result {
        let node = self.tree.node(slot)?;
        let weld = if is_last { "┗" } else { "┣" };
        writeln!(f, "{}{}━ {}{} ({})", prefix, weld, label, node.value, slot)?;

        if depth >= self.tree.capacity() {
            return writeln!(f, "{}   ┗━ …", prefix);
        }

        let children = [(Side::Left, "L "), (Side::Right, "R ")]
            .into_iter()
            .filter(|(side, _)| !node.child(*side).is_null())
            .collect::<Vec<_>>();
        let next_prefix = prefix.to_owned() + if is_last { "   " } else { "┃  " };

        for (index, (side, label)) in children.iter().enumerate() {
            let is_last = index == children.len() - 1;
            self.dump_node(node.child(*side), label, &next_prefix, is_last, depth + 1, f)?;
        }
        Ok(())
    }
}

impl Debug for Debugger<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "┓ capacity {}, {} free",
            self.tree.capacity(),
            self.free_count()
        )?;
        let root = self.tree.root();
        if root.is_null() {
            return writeln!(f, "┗━ (empty)");
        }
        self.dump_node(root, "", "", true, 0, f)
    }
}

impl From<crate::Error> for std::fmt::Error {
    #[inline]
    fn from(_: crate::Error) -> Self {
        Self
    }
}

#[cfg(test)]
mod tests {
    use super::Inconsistency;
    use crate::{
        error::ErrorCode,
        slot::SlotId,
        store::Node,
        tree::{tests::tree_of, Tree},
    };

    #[test]
    fn test_dump() {
        let tree = tree_of(7, &[50, 30, 70, 40]);
        let dump = format!("{:?}", tree.debugger());
        assert_eq!(
            dump,
            "┓ capacity 7, 3 free\n\
             ┗━ 50 (#1)\n   \
             ┣━ L 30 (#2)\n   \
             ┃  ┗━ R 40 (#4)\n   \
             ┗━ R 70 (#3)\n"
        );
        assert_eq!(
            format!("{:?}", Tree::new(1).debugger()),
            "┓ capacity 1, 1 free\n┗━ (empty)\n"
        );
    }

    #[test]
    fn test_path() {
        let tree = tree_of(7, &[50, 30, 70, 40]);
        let debugger = tree.debugger();
        assert_eq!(debugger.path(40).unwrap(), [1.into(), 2.into(), 4.into()]);
        assert_eq!(debugger.path(35).unwrap(), [1.into(), 2.into(), 4.into()]);
        assert_eq!(debugger.path(99).unwrap(), [1.into(), 3.into()]);
        assert_eq!(debugger.path(50).unwrap(), [SlotId::from(1)]);
    }

    #[test]
    fn test_validate() {
        let tree = tree_of(7, &[50, 30, 70, 40, 30]);
        tree.debugger().validate().unwrap();
        assert_eq!(tree.debugger().free_list(), [6.into(), 7.into()]);

        let mut tree = Tree::new(3);
        tree.construct(Node::new(10, 2.into(), SlotId::NULL)).unwrap();
        tree.construct(Node::leaf(20)).unwrap();
        let err = tree.debugger().validate().unwrap_err();
        assert_eq!(err.code(), ErrorCode::EngineCorrupted);
        assert_eq!(
            err.to_string(),
            format!("engine state is corrupted: {}", Inconsistency::OrderViolated(2.into()))
        );

        let mut tree = Tree::new(3);
        tree.construct(Node::new(10, 3.into(), SlotId::NULL)).unwrap();
        let err = tree.debugger().validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("engine state is corrupted: {}", Inconsistency::LinkedNotOccupied(3.into()))
        );
    }
}
