use std::iter::FusedIterator;

use crate::{slot::SlotId, tree::Tree, Value};

/// In-order iterator over the live tree, yielding `(slot, value)` pairs in ascending
/// value order.
///
/// The iterator uses an explicit stack bounded by the capacity and yields at most
/// `capacity` items, so corrupted links end the iteration instead of looping.
pub struct Iter<'a> {
    tree: &'a Tree,
    stack: Vec<SlotId>,
    current: SlotId,
    remaining: usize,
}

impl<'a> Iter<'a> {
    pub(crate) fn new(tree: &'a Tree) -> Self {
        Self {
            tree,
            stack: Vec::new(),
            current: tree.root(),
            remaining: tree.capacity() as usize,
        }
    }

    fn advance(&mut self) -> Option<(SlotId, Value)> {
        while !self.current.is_null() {
            if self.stack.len() >= self.remaining {
                return None;
            }
            let node = self.tree.occupied_node(self.current).ok()?;
            self.stack.push(self.current);
            self.current = node.left;
        }

        let slot = self.stack.pop()?;
        let node = self.tree.node(slot).ok()?;
        self.current = node.right;
        self.remaining -= 1;
        Some((slot, node.value))
    }
}

impl Iterator for Iter<'_> {
    type Item = (SlotId, Value);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let item = self.advance();
        if item.is_none() {
            self.remaining = 0;
        }
        item
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

impl FusedIterator for Iter<'_> {}
