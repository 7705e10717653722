use thiserror::Error;

use crate::{
    slot::{Side, SlotId},
    Value,
};

/// A node as seen through the store: its value and both child links.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Node {
    pub value: Value,
    pub left: SlotId,
    pub right: SlotId,
}

impl Node {
    #[inline]
    pub fn new(value: Value, left: SlotId, right: SlotId) -> Self {
        Self { value, left, right }
    }

    /// A node without children.
    #[inline]
    pub fn leaf(value: Value) -> Self {
        Self::new(value, SlotId::NULL, SlotId::NULL)
    }

    #[inline]
    pub fn child(&self, side: Side) -> SlotId {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub(crate) enum Error {
    #[error("slot {0} is out of range for a store of capacity {1}")]
    OutOfRange(SlotId, u32),
    #[error("the null slot cannot hold a node")]
    NullSlot,
}

pub(crate) type Result<T> = std::result::Result<T, Error>;

/// Fixed-size node tables indexed by slot.
///
/// Values and child links live in two parallel tables of `capacity + 1` entries, the
/// child table keeping both links of a slot side by side. Entry `0` stays zeroed. The
/// store does no ordering validation, that is up to the tree algorithms driving it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NodeStore {
    values: Box<[Value]>,
    children: Box<[[SlotId; 2]]>,
}

impl NodeStore {
    pub(crate) fn new(capacity: u32) -> Self {
        let len = capacity as usize + 1;
        Self {
            values: vec![0; len].into_boxed_slice(),
            children: vec![[SlotId::NULL; 2]; len].into_boxed_slice(),
        }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> u32 {
        (self.values.len() - 1) as u32
    }

    /// Reads the node stored at `slot`.
    ///
    /// Reading the null slot is allowed and yields an all-zero node.
    #[inline]
    pub(crate) fn get(&self, slot: SlotId) -> Result<Node> {
        self.check_range(slot)?;
        let [left, right] = self.children[slot.index()];
        Ok(Node {
            value: self.values[slot.index()],
            left,
            right,
        })
    }

    #[inline]
    pub(crate) fn set(&mut self, slot: SlotId, node: Node) -> Result<()> {
        self.check_writable(slot)?;
        self.check_links(&node)?;
        self.values[slot.index()] = node.value;
        self.children[slot.index()] = [node.left, node.right];
        Ok(())
    }

    #[inline]
    pub(crate) fn set_child(&mut self, slot: SlotId, side: Side, child: SlotId) -> Result<()> {
        self.check_writable(slot)?;
        self.check_range(child)?;
        self.children[slot.index()][side.index()] = child;
        Ok(())
    }

    /// Zeroes the value and both children of `slot`.
    #[inline]
    pub(crate) fn clear(&mut self, slot: SlotId) -> Result<()> {
        self.set(slot, Node::default())
    }

    /// Checks that both links of `node` stay within the tables.
    #[inline]
    pub(crate) fn check_links(&self, node: &Node) -> Result<()> {
        self.check_range(node.left)?;
        self.check_range(node.right)
    }

    #[inline]
    fn check_range(&self, slot: SlotId) -> Result<()> {
        if slot.raw() > self.capacity() {
            Err(Error::OutOfRange(slot, self.capacity()))
        } else {
            Ok(())
        }
    }

    #[inline]
    fn check_writable(&self, slot: SlotId) -> Result<()> {
        if slot.is_null() {
            Err(Error::NullSlot)
        } else {
            self.check_range(slot)
        }
    }
}
