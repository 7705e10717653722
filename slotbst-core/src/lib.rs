//! A fixed-capacity binary search tree engine whose nodes live in preallocated slot tables,
//! written in Rust.
//!
//! `SlotBST` keeps every node in one of `N` numbered slots, and links nodes by slot number
//! instead of by pointer. Unused slots wait in an ordered free list: released slots are
//! appended at the back and new nodes take the slot at the front, so memory use is fixed
//! up front and slot identities are reused in a predictable order.
//!
//! Commands run as small state machines. A host can advance a command one discrete step
//! at a time (one descent, one classification, one relink), or simply run it to
//! completion.
//!
//! # Create an Engine
//!
//! ```
//! use slotbst::{Options, SlotBst, Result};
//! # fn try_main() -> Result<()> {
//!
//! // The simplest way, with a capacity of 7 nodes:
//! let engine = SlotBst::new(7)?;
//!
//! // With `Options`:
//! let engine = Options::new()
//!     .capacity(1024)
//!     .value_range(-1000..=1000)
//!     .build()?;
//! # Ok(())
//! # }
//!
//! # fn main() { try_main().unwrap(); }
//! ```
//!
//! # Insert, Find, Delete
//!
//! ```
//! # use slotbst::{SlotBst, SlotId, ErrorCode, Result};
//! # fn try_main() -> Result<()> {
//! let mut engine = SlotBst::new(7)?;
//!
//! // Every insert returns the slot that now holds the value.
//! for value in [50, 30, 70, 20, 40] {
//!     engine.insert(value)?;
//! }
//! assert_eq!(engine.root(), Some(SlotId::from(1)));
//!
//! // Look up a value.
//! assert_eq!(engine.find(40)?, Some(SlotId::from(5)));
//! assert_eq!(engine.find(45)?, None);
//!
//! // Delete a value, its slot goes back to the free list.
//! assert!(engine.delete(30)?);
//! assert!(!engine.delete(30)?);
//! assert_eq!(engine.free_count(), 3);
//!
//! // The pool is bounded.
//! engine.insert(1)?;
//! engine.insert(2)?;
//! engine.insert(3)?;
//! assert_eq!(engine.insert(4).unwrap_err().code(), ErrorCode::OutOfCapacity);
//! # Ok(())
//! # }
//! # fn main() { try_main().unwrap(); }
//! ```
//!
//! # Construct
//!
//! Pre-built nodes can be stored verbatim, links and all. The first node constructed
//! into an empty tree becomes the root.
//!
//! ```
//! # use slotbst::{SlotBst, SlotId, Result};
//! # fn try_main() -> Result<()> {
//! let mut engine = SlotBst::new(7)?;
//! engine.construct(10, SlotId::from(2), SlotId::NULL)?;
//! engine.construct(5, SlotId::NULL, SlotId::NULL)?;
//!
//! assert!(engine.delete(10)?);
//! assert_eq!(engine.root(), Some(SlotId::from(2)));
//! # Ok(())
//! # }
//! # fn main() { try_main().unwrap(); }
//! ```
//!
//! # Stepping
//!
//! A command can be submitted and then driven by `step`, which returns the response once
//! the command terminates. While a command is in flight, other submissions are ignored.
//!
//! ```
//! # use slotbst::{Command, Response, SlotBst, State, Result};
//! # fn try_main() -> Result<()> {
//! let mut engine = SlotBst::new(7)?;
//! for value in [50, 30, 70] {
//!     engine.insert(value)?;
//! }
//!
//! assert!(engine.submit(Command::Find(70))?);
//! assert!(!engine.submit(Command::Insert(10))?);
//! assert_eq!(engine.state(), State::Finding);
//!
//! let response = loop {
//!     if let Some(response) = engine.step() {
//!         break response?;
//!     }
//! };
//! assert_eq!(response, Response::Found(3.into()));
//! assert_eq!(engine.state(), State::Idle);
//! # Ok(())
//! # }
//! # fn main() { try_main().unwrap(); }
//! ```
//!
//! # Snapshot
//!
//! The complete engine state (node tables, free list order, root) can be saved to a
//! file and opened again later. Snapshots carry a checksum and are validated on load.
//!
//! ```
//! # use slotbst::{SlotBst, Result};
//! # fn try_main() -> Result<()> {
//! let path = "target/snapshot.slotbst";
//!
//! let mut engine = SlotBst::new(7)?;
//! engine.insert(42)?;
//! engine.save(path)?;
//!
//! let reopened = SlotBst::open(path)?;
//! assert_eq!(reopened.find(42)?, engine.find(42)?);
//! # Ok(())
//! # }
//! # fn main() { try_main().unwrap(); }
//! ```
//!
//! ## Attention
//!
//! ❗️ Constructed nodes are trusted. Their links are checked against the capacity but
//! not against the ordering of the tree, use `debugger().validate()` to check a
//! constructed tree.
//!

mod controller;
mod engine;
mod error;
mod freelist;
mod slot;
mod snapshot;
mod store;
mod tree;

pub use crate::{
    controller::{Command, Response, State},
    engine::{Options, SlotBst},
    error::{Error, ErrorCode, Result},
    slot::{Side, SlotId},
    store::Node,
    tree::{DeletePhase, Debugger, Iter},
};

/// The type of the values stored in the tree.
pub type Value = i64;

/// The maximum number of slots an engine can be created with.
pub const MAX_CAPACITY: u32 = 1 << 24;
/// The capacity used by the default `Options`.
pub const DEFAULT_CAPACITY: u32 = 255;
