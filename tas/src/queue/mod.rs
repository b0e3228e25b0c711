//! Single-producer single-consumer rings of tagged slots.
//!
//! A ring is an array of fixed size slots in a [`Region`]. The last byte of each slot is its type
//! tag and the tag alone decides who owns the slot:
//!
//! * While the tag is `INVALID` the slot belongs to the producer. It writes the payload and then
//!   publishes the slot by storing a valid tag with release ordering.
//! * While the tag is valid the slot belongs to the consumer. It loads the tag with acquire
//!   ordering, reads the payload and hands the slot back by storing `INVALID`, again with release
//!   ordering.
//!
//! Neither side keeps a shared index, each only remembers its own position. The producer finds the
//! ring full when the slot at its position still has a valid tag, the consumer finds it empty when
//! the slot at its position is `INVALID`.
//!
//! [`Region`]: ../region/struct.Region.html
use core::marker::PhantomData;
use core::sync::atomic::{AtomicU8, Ordering};
use alloc::sync::Arc;

use crate::{Error, Result};
use crate::layout::{Entry, INVALID};
use crate::region::Region;

#[cfg(test)]
mod tests;

/// The memory of one ring.
struct Ring<E> {
    region: Arc<Region>,
    offset: usize,
    entries: u32,
    entry: PhantomData<fn(E) -> E>,
}

/// The writing end of a ring.
pub struct Producer<E: Entry> {
    ring: Ring<E>,
    head: u32,
}

/// The reading end of a ring.
pub struct Consumer<E: Entry> {
    ring: Ring<E>,
    tail: u32,
}

impl<E: Entry> Ring<E> {
    fn new(region: Arc<Region>, offset: usize, entries: u32) -> Result<Self> {
        if entries == 0 || E::SIZE < 2 {
            return Err(Error::Illegal);
        }

        let len = (entries as usize).checked_mul(E::SIZE)
            .ok_or(Error::Truncated)?;
        region.check(offset, len)?;

        Ok(Ring {
            region,
            offset,
            entries,
            entry: PhantomData,
        })
    }

    fn slot(&self, idx: u32) -> *mut u8 {
        debug_assert!(idx < self.entries);
        // SAFETY: in bounds as checked on construction.
        unsafe { self.region.as_ptr().add(self.offset + idx as usize * E::SIZE) }
    }

    fn tag(&self, idx: u32) -> &AtomicU8 {
        // SAFETY: the last byte of the slot, only ever accessed atomically.
        unsafe { &*(self.slot(idx).add(E::SIZE - 1) as *const AtomicU8) }
    }

    /// The payload of a slot, excluding the tag byte.
    ///
    /// # Safety
    ///
    /// The caller must own the slot according to the tag protocol.
    #[allow(clippy::mut_from_ref)]
    unsafe fn payload(&self, idx: u32) -> &mut [u8] {
        core::slice::from_raw_parts_mut(self.slot(idx), E::SIZE - 1)
    }

    fn next(&self, idx: u32) -> u32 {
        if idx + 1 == self.entries { 0 } else { idx + 1 }
    }
}

impl<E: Entry> Producer<E> {
    /// Create the producer of a ring at `offset` in a region.
    ///
    /// The ring memory should be zeroed or only contain slots this producer published before.
    pub fn new(region: Arc<Region>, offset: usize, entries: u32) -> Result<Self> {
        Self::with_position(region, offset, entries, 0)
    }

    /// Create a producer that resumes at a saved position.
    pub fn with_position(region: Arc<Region>, offset: usize, entries: u32, head: u32) -> Result<Self> {
        let ring = Ring::new(region, offset, entries)?;
        if head >= entries {
            return Err(Error::Illegal);
        }
        Ok(Producer { ring, head })
    }

    /// Publish an entry.
    ///
    /// Returns `WouldBlock` if the consumer has not yet released the next slot. Nothing is written
    /// in that case.
    pub fn push(&mut self, repr: &E::Repr) -> Result<()> {
        let tag = self.ring.tag(self.head);
        if tag.load(Ordering::Acquire) != INVALID {
            return Err(Error::WouldBlock);
        }

        // SAFETY: the tag is invalid and only we publish it, so the slot is ours.
        let payload = unsafe { self.ring.payload(self.head) };
        let value = E::emit(repr, payload);
        debug_assert_ne!(value, INVALID);
        tag.store(value, Ordering::Release);

        self.head = self.ring.next(self.head);
        Ok(())
    }

    /// Check if the next push will succeed.
    pub fn has_space(&self) -> bool {
        self.ring.tag(self.head).load(Ordering::Acquire) == INVALID
    }

    /// The position of the next slot to be written.
    pub fn position(&self) -> u32 {
        self.head
    }

    /// The number of slots in the ring.
    pub fn capacity(&self) -> u32 {
        self.ring.entries
    }
}

impl<E: Entry> Consumer<E> {
    /// Create the consumer of a ring at `offset` in a region.
    pub fn new(region: Arc<Region>, offset: usize, entries: u32) -> Result<Self> {
        Self::with_position(region, offset, entries, 0)
    }

    /// Create a consumer that resumes at a saved position.
    pub fn with_position(region: Arc<Region>, offset: usize, entries: u32, tail: u32) -> Result<Self> {
        let ring = Ring::new(region, offset, entries)?;
        if tail >= entries {
            return Err(Error::Illegal);
        }
        Ok(Consumer { ring, tail })
    }

    /// Take the next published entry.
    ///
    /// Returns `Ok(None)` when the ring is empty. An entry with an unknown tag or malformed content
    /// is still released back to the producer before its error is returned, so that one bad entry
    /// can not stall the ring.
    pub fn pop(&mut self) -> Result<Option<E::Repr>> {
        let tag = self.ring.tag(self.tail);
        let value = tag.load(Ordering::Acquire);
        if value == INVALID {
            return Ok(None);
        }

        // SAFETY: the tag is valid so the producer handed the slot to us.
        let parsed = E::parse(value, unsafe { self.ring.payload(self.tail) });
        tag.store(INVALID, Ordering::Release);
        self.tail = self.ring.next(self.tail);

        match parsed {
            Ok(repr) => Ok(Some(repr)),
            Err(err) => {
                net_debug!("queue: dropped entry with tag {}: {}", value, err);
                Err(err)
            },
        }
    }

    /// Parse the next published entry without releasing it.
    pub fn peek(&self) -> Result<Option<E::Repr>> {
        let value = self.ring.tag(self.tail).load(Ordering::Acquire);
        if value == INVALID {
            return Ok(None);
        }

        // SAFETY: the tag is valid so the producer handed the slot to us.
        E::parse(value, unsafe { self.ring.payload(self.tail) }).map(Some)
    }

    /// Take up to `max` entries, handing each to `f`.
    ///
    /// Malformed entries are released and skipped. Returns the number of slots released.
    pub fn poll<F>(&mut self, max: usize, mut f: F) -> usize
        where F: FnMut(E::Repr),
    {
        let mut released = 0;
        while released < max {
            match self.pop() {
                Ok(Some(repr)) => f(repr),
                Ok(None) => break,
                Err(_) => {},
            }
            released += 1;
        }
        released
    }

    /// Check if an entry is ready without taking it.
    pub fn is_empty(&self) -> bool {
        self.ring.tag(self.tail).load(Ordering::Acquire) == INVALID
    }

    /// The position of the next slot to be read.
    pub fn position(&self) -> u32 {
        self.tail
    }

    /// The number of slots in the ring.
    pub fn capacity(&self) -> u32 {
        self.ring.entries
    }
}

/// Create both ends of a new ring in its own heap region.
pub fn channel<E: Entry>(entries: u32) -> Result<(Producer<E>, Consumer<E>)> {
    let len = (entries as usize).checked_mul(E::SIZE)
        .ok_or(Error::NoCapacity)?;
    let region = Arc::new(Region::zeroed(len)?);
    let producer = Producer::new(region.clone(), 0, entries)?;
    let consumer = Consumer::new(region, 0, entries)?;
    Ok((producer, consumer))
}

/// The size of a ring of `entries` slots.
pub fn ring_len<E: Entry>(entries: u32) -> usize {
    entries as usize * E::SIZE
}
