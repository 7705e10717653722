pub use cursor::Iter;
pub use debug::Debugger;
pub use delete::DeletePhase;

pub(crate) use debug::Inconsistency;
pub(crate) use delete::DeleteJob;
pub(crate) use insert::InsertJob;
pub(crate) use walker::{Walk, Walker};

mod cursor;
mod debug;
mod delete;
mod insert;
mod predecessor;
mod walker;

use thiserror::Error;

use crate::{
    freelist::Freelist,
    slot::{Side, SlotId},
    store::{Node, NodeStore},
    Result, Value,
};

/// Represents the slot pool of the engine: node tables, free list and root reference.
///
/// All tree algorithms operate on it through exclusive access, one discrete step at a
/// time. See [`walker`], [`insert`], [`delete`] and [`predecessor`] for the algorithms,
/// and [`cursor`], [`debug`] for read-only traversal and inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Tree {
    store: NodeStore,
    freelist: Freelist,
    root: SlotId,
}

/// Where a node hangs in the tree: the child link of `parent` on `side`, or the root
/// reference itself when `side` is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Position {
    pub(crate) parent: SlotId,
    pub(crate) side: Option<Side>,
}

/// The result of one discrete step of a multi-step algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Progress<S, T> {
    Continue(S),
    Done(T),
}

#[derive(Error, Debug)]
#[error("no free slot left in a pool of capacity {0}")]
pub(crate) struct OutOfCapacity(pub(crate) u32);

#[derive(Error, Debug)]
#[error("descent exceeded {0} steps, the child links form a cycle")]
pub(crate) struct Cycle(pub(crate) u32);

impl Position {
    pub(crate) const ROOT: Position = Position {
        parent: SlotId::NULL,
        side: None,
    };

    #[inline]
    pub(crate) const fn child_of(parent: SlotId, side: Side) -> Self {
        Self {
            parent,
            side: Some(side),
        }
    }

    #[inline]
    pub(crate) const fn is_root(&self) -> bool {
        self.side.is_none()
    }
}

impl Tree {
    pub(crate) fn new(capacity: u32) -> Self {
        Self {
            store: NodeStore::new(capacity),
            freelist: Freelist::new(capacity),
            root: SlotId::NULL,
        }
    }

    #[inline]
    pub(crate) fn from_parts(store: NodeStore, freelist: Freelist, root: SlotId) -> Self {
        Self {
            store,
            freelist,
            root,
        }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> u32 {
        self.store.capacity()
    }

    #[inline]
    pub(crate) fn root(&self) -> SlotId {
        self.root
    }

    #[inline]
    pub(crate) fn freelist(&self) -> &Freelist {
        &self.freelist
    }

    /// The number of occupied slots.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.capacity() as usize - self.freelist.len()
    }

    #[inline]
    pub(crate) fn is_occupied(&self, slot: SlotId) -> bool {
        !slot.is_null() && slot.raw() <= self.capacity() && !self.freelist.is_free(slot)
    }

    #[inline]
    pub(crate) fn node(&self, slot: SlotId) -> Result<Node> {
        self.store.get(slot).map_err(Into::into)
    }

    /// Reads the node a link points at, which must be an occupied slot.
    #[inline]
    pub(crate) fn occupied_node(&self, slot: SlotId) -> Result<Node> {
        if !self.is_occupied(slot) {
            return Err(Inconsistency::LinkedNotOccupied(slot).into());
        }
        self.node(slot)
    }

    #[inline]
    pub(crate) fn set_node(&mut self, slot: SlotId, node: Node) -> Result<()> {
        self.store.set(slot, node).map_err(Into::into)
    }

    #[inline]
    pub(crate) fn set_child(&mut self, slot: SlotId, side: Side, child: SlotId) -> Result<()> {
        self.store.set_child(slot, side, child).map_err(Into::into)
    }

    /// Points the link described by `position` at `child`.
    pub(crate) fn relink(&mut self, position: Position, child: SlotId) -> Result<()> {
        match position.side {
            Some(side) => self.set_child(position.parent, side, child),
            None => {
                self.root = child;
                Ok(())
            }
        }
    }

    /// Takes a slot from the free list and stores `node` in it.
    ///
    /// Nothing is mutated when the pool is exhausted.
    pub(crate) fn allocate(&mut self, node: Node) -> Result<SlotId> {
        self.store.check_links(&node)?;
        let slot = self
            .freelist
            .acquire()
            .ok_or(OutOfCapacity(self.capacity()))?;
        self.store.set(slot, node)?;
        Ok(slot)
    }

    /// Clears a slot and gives it back to the free list.
    pub(crate) fn dispose(&mut self, slot: SlotId) -> Result<()> {
        self.store.clear(slot)?;
        self.freelist.release(slot).map_err(Into::into)
    }

    /// Stores a pre-built node verbatim in the next free slot.
    ///
    /// The links are trusted to describe a well-formed tree. A node constructed while the
    /// tree is empty becomes the root.
    pub(crate) fn construct(&mut self, node: Node) -> Result<SlotId> {
        let slot = self.allocate(node)?;
        if self.root.is_null() {
            self.root = slot;
        }
        Ok(slot)
    }

    #[inline]
    pub(crate) fn iter(&self) -> Iter<'_> {
        Iter::new(self)
    }

    #[inline]
    pub(crate) fn debugger(&self) -> Debugger<'_> {
        Debugger::new(self)
    }

    /// Walks from the root to `value` in one go.
    #[inline]
    pub(crate) fn search(&self, value: Value) -> Result<Walk> {
        Walker::new(value, self.root).run(self)
    }
}
