use std::cmp::Ordering;

use tracing::trace;

use crate::{
    slot::{Side, SlotId},
    store::Node,
    tree::{Cycle, Position, Progress, Tree},
    Result, Value,
};

/// One descent step: the node visited and where it hangs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Step {
    pub(crate) current: SlotId,
    pub(crate) position: Position,
}

/// How a walk terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Walk {
    /// A node holding the target was reached.
    NodeReached { slot: SlotId, position: Position },
    /// A null child was reached. `position` is where the target belongs.
    LeafReached { position: Position },
}

impl Walk {
    /// Whether the walk matched the root itself.
    #[inline]
    pub(crate) fn is_root_match(&self) -> bool {
        matches!(self, Walk::NodeReached { position, .. } if position.is_root())
    }

    #[inline]
    pub(crate) fn found(&self) -> Option<SlotId> {
        match self {
            Walk::NodeReached { slot, .. } => Some(*slot),
            Walk::LeafReached { .. } => None,
        }
    }
}

/// Iterative root-to-leaf descent towards a target value.
///
/// Each call to [`Walker::step`] inspects exactly one slot: less goes left, greater goes
/// right, equal terminates. A walk can never take more than `capacity + 1` steps on a
/// well-formed tree, so exceeding that is reported as a [`Cycle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Walker {
    target: Value,
    current: SlotId,
    position: Position,
    steps: u32,
}

impl Walker {
    #[inline]
    pub(crate) fn new(target: Value, root: SlotId) -> Self {
        Self {
            target,
            current: root,
            position: Position::ROOT,
            steps: 0,
        }
    }

    #[inline]
    pub(crate) fn target(&self) -> Value {
        self.target
    }

    /// Continues a finished walk below `node`, stored at `slot`, on `side`.
    ///
    /// The step budget carries over so the cycle guard still covers the whole descent.
    #[inline]
    pub(crate) fn descend(&mut self, slot: SlotId, node: &Node, side: Side) {
        self.current = node.child(side);
        self.position = Position::child_of(slot, side);
    }

    /// Performs a single descent step.
    pub(crate) fn step(&mut self, tree: &Tree) -> Result<Progress<Step, Walk>> {
        if self.steps > tree.capacity() {
            return Err(Cycle(self.steps).into());
        }
        self.steps += 1;

        if self.current.is_null() {
            trace!(value = self.target, parent = %self.position.parent, "walk: leaf reached");
            return Ok(Progress::Done(Walk::LeafReached {
                position: self.position,
            }));
        }

        let node = tree.occupied_node(self.current)?;
        let step = Step {
            current: self.current,
            position: self.position,
        };

        let side = match self.target.cmp(&node.value) {
            Ordering::Less => Side::Left,
            Ordering::Greater => Side::Right,
            Ordering::Equal => {
                trace!(value = self.target, slot = %self.current, "walk: node reached");
                return Ok(Progress::Done(Walk::NodeReached {
                    slot: self.current,
                    position: self.position,
                }));
            }
        };

        trace!(value = self.target, slot = %self.current, ?side, "walk: descend");
        self.descend(self.current, &node, side);
        Ok(Progress::Continue(step))
    }

    /// Runs the walk until it terminates.
    pub(crate) fn run(mut self, tree: &Tree) -> Result<Walk> {
        loop {
            if let Progress::Done(walk) = self.step(tree)? {
                break Ok(walk);
            }
        }
    }

    /// The lazy sequence of descent steps of this walk.
    ///
    /// The sequence ends once the walk terminates, the terminal outcome is available
    /// through [`Descent::outcome`].
    #[inline]
    pub(crate) fn descent(self, tree: &Tree) -> Descent<'_> {
        Descent {
            walker: self,
            tree,
            outcome: None,
        }
    }
}

pub(crate) struct Descent<'a> {
    walker: Walker,
    tree: &'a Tree,
    outcome: Option<Result<Walk>>,
}

impl Descent<'_> {
    /// The terminal outcome, once the sequence is exhausted.
    #[inline]
    pub(crate) fn outcome(self) -> Option<Result<Walk>> {
        self.outcome
    }
}

impl Iterator for Descent<'_> {
    type Item = Step;

    fn next(&mut self) -> Option<Self::Item> {
        if self.outcome.is_some() {
            return None;
        }
        match self.walker.step(self.tree) {
            Ok(Progress::Continue(step)) => Some(step),
            Ok(Progress::Done(walk)) => {
                self.outcome = Some(Ok(walk));
                None
            }
            Err(err) => {
                self.outcome = Some(Err(err));
                None
            }
        }
    }
}
