use std::{
    fs,
    io::{self, Write},
    ops::RangeInclusive,
    path::Path,
};

use thiserror::Error;
use tracing::debug;

use crate::{
    controller::{Busy, Command, Controller, Response, State},
    slot::SlotId,
    snapshot,
    store::Node,
    tree::{Debugger, Iter, Tree},
    Result, Value, DEFAULT_CAPACITY, MAX_CAPACITY,
};

/// The options for configuring a SlotBST engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub(crate) capacity: u32,
    pub(crate) value_range: RangeInclusive<Value>,
    pub(crate) force_sync: bool,
}

impl Options {
    /// Creates a new Options instance with default values.
    #[inline]
    pub fn new() -> Self {
        Default::default()
    }

    /// Set the number of slots of the engine, i.e. the maximum number of live nodes.
    ///
    /// It must be within `1..=MAX_CAPACITY`. By default, it is `DEFAULT_CAPACITY`.
    #[inline]
    pub fn capacity(&mut self, capacity: u32) -> &mut Self {
        self.capacity = capacity;
        self
    }

    /// Restrict the values the engine accepts.
    ///
    /// Commands carrying a value outside of the range are rejected before they start.
    /// By default, every `i64` is accepted.
    #[inline]
    pub fn value_range(&mut self, range: RangeInclusive<Value>) -> &mut Self {
        self.value_range = range;
        self
    }

    /// Decide whether to force synchronization after saving a snapshot.
    ///
    /// If it is true, every save is followed by a sync operation. If it is false, sync
    /// operation will be performed according to the operating system's internal logic.
    #[inline]
    pub fn force_sync(&mut self, flag: bool) -> &mut Self {
        self.force_sync = flag;
        self
    }

    /// Create an empty engine with the current options.
    #[inline]
    pub fn build(&self) -> Result<SlotBst> {
        SlotBst::with_options(self.clone())
    }

    /// Open the engine snapshot at the given path with the current options.
    #[inline]
    pub fn open(&self, path: impl AsRef<Path>) -> Result<SlotBst> {
        SlotBst::open_with_options(path, self.clone())
    }
}

impl Default for Options {
    #[inline]
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            value_range: Value::MIN..=Value::MAX,
            force_sync: false,
        }
    }
}

#[derive(Error, Debug)]
pub(crate) enum InputInvalid {
    #[error("the capacity {0} is not within 1..=2^24")]
    CapacityInvalid(u32),
    #[error("the value {0} is outside of the accepted range {1:?}")]
    ValueOutOfDomain(Value, RangeInclusive<Value>),
    #[error("slot {0} is beyond the capacity {1}")]
    SlotOutOfRange(SlotId, u32),
}

/// The engine, all entry points are here.
///
/// It owns the slot tables, the free list and the command controller. Mutation takes
/// `&mut self`, so at most one command can ever touch the tree at a time.
#[derive(Debug, Clone)]
pub struct SlotBst {
    options: Options,
    tree: Tree,
    controller: Controller,
}

impl SlotBst {
    /// Create an empty engine with the given capacity and default options otherwise.
    #[inline]
    pub fn new(capacity: u32) -> Result<Self> {
        Options::new().capacity(capacity).build()
    }

    /// Create an empty engine with the provided options.
    pub fn with_options(options: Options) -> Result<Self> {
        if options.capacity == 0 || options.capacity > MAX_CAPACITY {
            return Err(InputInvalid::CapacityInvalid(options.capacity).into());
        }
        Ok(Self {
            tree: Tree::new(options.capacity),
            controller: Controller::new(),
            options,
        })
    }

    /// Open the engine snapshot at the given file path with default options.
    #[inline]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_options(path, Options::default())
    }

    /// Open the engine snapshot at the given file path with the provided options.
    ///
    /// If the file does not exist, an empty engine is created and saved there. Otherwise
    /// the capacity recorded in the snapshot takes precedence over the one of `options`.
    pub fn open_with_options(path: impl AsRef<Path>, options: Options) -> Result<Self> {
        let path = path.as_ref();
        match fs::read(path) {
            Ok(bytes) => {
                debug!(path = %path.display(), len = bytes.len(), "snapshot read");
                Self::from_bytes_with_options(&bytes, options)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                let engine = Self::with_options(options)?;
                engine.save(path)?;
                Ok(engine)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Restore an engine from snapshot bytes produced by [`SlotBst::to_bytes`].
    #[inline]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_bytes_with_options(bytes, Options::default())
    }

    /// Restore an engine from snapshot bytes with the provided options.
    pub fn from_bytes_with_options(bytes: &[u8], mut options: Options) -> Result<Self> {
        let tree = snapshot::decode(bytes)?;
        options.capacity = tree.capacity();
        debug!(capacity = tree.capacity(), len = tree.len(), "snapshot decoded");
        Ok(Self {
            options,
            tree,
            controller: Controller::new(),
        })
    }

    /// Options used to configure the engine.
    #[inline]
    pub fn options(&self) -> Options {
        self.options.clone()
    }

    /// Encode the complete engine state into a snapshot.
    #[inline]
    pub fn to_bytes(&self) -> Vec<u8> {
        snapshot::encode(&self.tree)
    }

    /// Write a snapshot of the engine to the given file path.
    ///
    /// A command in flight is not part of the snapshot, only its completed effects are.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        // Create all necessary intermediate directories.
        if let Some(parent_dir) = path.parent() {
            fs::create_dir_all(parent_dir)?;
        }

        let bytes = self.to_bytes();
        let mut file = fs::File::create(path)?;
        file.write_all(&bytes)?;
        if self.options.force_sync {
            file.sync_all()?;
        }
        debug!(path = %path.display(), len = bytes.len(), "snapshot written");
        Ok(())
    }
}

impl SlotBst {
    /// Store a pre-built node verbatim in the next free slot and return that slot.
    ///
    /// The links may name any slot up to the capacity, the ordering they describe is not
    /// checked. If the tree is empty, the new node becomes the root.
    pub fn construct(&mut self, value: Value, left: SlotId, right: SlotId) -> Result<SlotId> {
        match self.execute(Command::Construct(Node::new(value, left, right)))? {
            Response::Constructed(slot) => Ok(slot),
            response => unreachable!("construct finished with {response:?}"),
        }
    }

    /// Insert a value and return the slot that now holds it.
    ///
    /// Duplicates are admitted and go to the right subtree of the equal node.
    pub fn insert(&mut self, value: Value) -> Result<SlotId> {
        match self.execute(Command::Insert(value))? {
            Response::Inserted(slot) => Ok(slot),
            response => unreachable!("insert finished with {response:?}"),
        }
    }

    /// Find the slot holding the given value.
    pub fn find(&self, value: Value) -> Result<Option<SlotId>> {
        self.check_idle()?;
        self.check_value(value)?;
        Ok(self.tree.search(value)?.found())
    }

    /// Check if the engine contains a given value.
    #[inline]
    pub fn contains(&self, value: Value) -> Result<bool> {
        self.find(value).map(|slot| slot.is_some())
    }

    /// Delete one node holding the given value.
    ///
    /// Returns false if the value is not in the tree, in which case nothing changes.
    pub fn delete(&mut self, value: Value) -> Result<bool> {
        match self.execute(Command::Delete(value))? {
            Response::Deleted(_) => Ok(true),
            Response::NotFound => Ok(false),
            response => unreachable!("delete finished with {response:?}"),
        }
    }

    /// Run a command to completion.
    ///
    /// Fails with `Busy` if a stepped command is still in flight.
    pub fn execute(&mut self, command: Command) -> Result<Response> {
        self.check_idle()?;
        self.check_command(&command)?;
        self.controller.submit(command, self.tree.root());
        self.controller
            .finish(&mut self.tree)
            .unwrap_or_else(|| Err(Busy.into()))
    }

    /// Hand a command to the controller, to be driven by [`SlotBst::step`].
    ///
    /// Returns false and ignores the command if another one is in flight, whatever it
    /// carries. Otherwise invalid input is rejected before the command is accepted.
    pub fn submit(&mut self, command: Command) -> Result<bool> {
        if self.controller.is_busy() {
            return Ok(self.controller.submit(command, self.tree.root()));
        }
        self.check_command(&command)?;
        Ok(self.controller.submit(command, self.tree.root()))
    }

    /// Advance the command in flight by one step.
    ///
    /// Returns the response once the command terminates. Returns `None` while it is
    /// still running, or if there is nothing in flight.
    #[inline]
    pub fn step(&mut self) -> Option<Result<Response>> {
        self.controller.step(&mut self.tree)
    }

    /// The current state of the command controller.
    #[inline]
    pub fn state(&self) -> State {
        self.controller.state()
    }

    #[inline]
    fn check_idle(&self) -> Result<()> {
        if self.controller.is_busy() {
            Err(Busy.into())
        } else {
            Ok(())
        }
    }

    fn check_command(&self, command: &Command) -> Result<()> {
        match *command {
            Command::Construct(node) => {
                for link in [node.left, node.right] {
                    if link.raw() > self.capacity() {
                        return Err(InputInvalid::SlotOutOfRange(link, self.capacity()).into());
                    }
                }
                self.check_value(node.value)
            }
            Command::Insert(value) | Command::Find(value) | Command::Delete(value) => {
                self.check_value(value)
            }
        }
    }

    #[inline]
    fn check_value(&self, value: Value) -> Result<()> {
        if self.options.value_range.contains(&value) {
            Ok(())
        } else {
            Err(InputInvalid::ValueOutOfDomain(value, self.options.value_range.clone()).into())
        }
    }
}

impl SlotBst {
    /// The slot of the root node, `None` if the tree is empty.
    #[inline]
    pub fn root(&self) -> Option<SlotId> {
        Some(self.tree.root()).filter(|root| !root.is_null())
    }

    /// The node stored in an occupied slot.
    #[inline]
    pub fn node(&self, slot: SlotId) -> Option<Node> {
        if self.tree.is_occupied(slot) {
            self.tree.node(slot).ok()
        } else {
            None
        }
    }

    /// The number of live nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn capacity(&self) -> u32 {
        self.tree.capacity()
    }

    /// The number of free slots.
    #[inline]
    pub fn free_count(&self) -> usize {
        self.tree.freelist().len()
    }

    /// Iterate over `(slot, value)` pairs in ascending value order.
    #[inline]
    pub fn iter(&self) -> Iter<'_> {
        self.tree.iter()
    }

    /// Get a debugger for the engine.
    #[inline]
    pub fn debugger(&self) -> Debugger<'_> {
        self.tree.debugger()
    }
}

impl<'a> IntoIterator for &'a SlotBst {
    type Item = (SlotId, Value);
    type IntoIter = Iter<'a>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
