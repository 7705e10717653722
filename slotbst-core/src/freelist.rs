use std::mem;

use thiserror::Error;

use crate::slot::SlotId;

/// Represents the pool of unused slots of the engine.
///
/// Free slots are kept in an ordered ring: a released slot is appended at the back and
/// an acquired slot is taken from the front, so identities are reused in release order.
/// A bitmap mirrors the ring, each bit records whether a slot is free (1) or not (0),
/// which lets a double release be caught without scanning the ring.
#[derive(Debug, Clone)]
pub(crate) struct Freelist {
    ring: Box<[SlotId]>,
    head: usize,
    count: usize,
    bitmap: Vec<BitmapWord>,
}

type BitmapWord = u64;

const BITMAP_WORD_BITS: usize = mem::size_of::<BitmapWord>() * 8;

#[derive(Error, Debug, PartialEq, Eq)]
pub(crate) enum Error {
    #[error("slot {0} is already in the free list")]
    DoubleRelease(SlotId),
    #[error("slot {0} does not belong to a free list of capacity {1}")]
    Corrupted(SlotId, u32),
}

impl Freelist {
    /// Creates a free list holding every slot `1..=capacity` in ascending order.
    pub(crate) fn new(capacity: u32) -> Self {
        let mut freelist = Self::empty(capacity);
        for raw in 1..=capacity {
            freelist.push_back(SlotId::from_raw(raw));
        }
        freelist
    }

    /// Rebuilds a free list from its front-to-back sequence.
    pub(crate) fn from_sequence(
        capacity: u32,
        sequence: impl IntoIterator<Item = SlotId>,
    ) -> Result<Self, Error> {
        let mut freelist = Self::empty(capacity);
        for slot in sequence {
            freelist.release(slot)?;
        }
        Ok(freelist)
    }

    fn empty(capacity: u32) -> Self {
        let bits = capacity as usize + 1;
        Self {
            ring: vec![SlotId::NULL; capacity as usize].into_boxed_slice(),
            head: 0,
            count: 0,
            bitmap: vec![0; (bits + BITMAP_WORD_BITS - 1) / BITMAP_WORD_BITS],
        }
    }

    /// The number of slots the list was created for.
    #[inline]
    pub(crate) fn capacity(&self) -> u32 {
        self.ring.len() as u32
    }

    /// The number of free slots.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.count
    }

    #[cfg(test)]
    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Checks whether a slot is currently free.
    #[inline]
    pub(crate) fn is_free(&self, slot: SlotId) -> bool {
        let (word, mask) = Self::bit(slot);
        self.bitmap.get(word).map_or(false, |w| w & mask != 0)
    }

    /// Takes the slot at the front of the list.
    pub(crate) fn acquire(&mut self) -> Option<SlotId> {
        if self.count == 0 {
            return None;
        }
        let slot = self.ring[self.head];
        self.ring[self.head] = SlotId::NULL;
        self.head = (self.head + 1) % self.ring.len();
        self.count -= 1;

        let (word, mask) = Self::bit(slot);
        self.bitmap[word] &= !mask;
        Some(slot)
    }

    /// Appends a slot to the back of the list.
    pub(crate) fn release(&mut self, slot: SlotId) -> Result<(), Error> {
        if slot.is_null() || slot.raw() > self.capacity() {
            return Err(Error::Corrupted(slot, self.capacity()));
        }
        if self.is_free(slot) {
            return Err(Error::DoubleRelease(slot));
        }
        // Every slot has one bit, so a full ring would have caught a double release above.
        debug_assert!(self.count < self.ring.len());
        self.push_back(slot);
        Ok(())
    }

    /// Iterates over the free slots from front to back.
    pub(crate) fn iter(&self) -> impl Iterator<Item = SlotId> + '_ {
        (0..self.count).map(move |offset| self.ring[(self.head + offset) % self.ring.len()])
    }

    fn push_back(&mut self, slot: SlotId) {
        let tail = (self.head + self.count) % self.ring.len();
        self.ring[tail] = slot;
        self.count += 1;

        let (word, mask) = Self::bit(slot);
        self.bitmap[word] |= mask;
    }

    #[inline]
    fn bit(slot: SlotId) -> (usize, BitmapWord) {
        let index = slot.index();
        (index / BITMAP_WORD_BITS, 1 << (index % BITMAP_WORD_BITS))
    }
}

/// Two free lists are equal when they hand out the same slots in the same order,
/// wherever their rings start.
impl PartialEq for Freelist {
    fn eq(&self, other: &Self) -> bool {
        self.capacity() == other.capacity() && self.iter().eq(other.iter())
    }
}

impl Eq for Freelist {}
