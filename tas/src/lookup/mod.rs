//! Finding the flow record of a received segment.
//!
//! The table is open-addressed with fixed buckets of `FLOWHT_NBSZ` entries. An entry packs the
//! flow index, a valid bit and its position within the bucket into one 32-bit word, next to the
//! 32-bit hash of the flow's four tuple. The slow path is the only writer. It stores the hash
//! first and then publishes the word with release ordering, so a fast path reading the word with
//! acquire ordering always sees the matching hash.
//!
//! A hash match alone does not identify a flow. Lookups take a verifier that compares the full
//! four tuple of the candidate record.
use core::sync::atomic::{AtomicU32, Ordering};
use core::ptr::NonNull;
use alloc::sync::Arc;

use crate::{Error, Result};
use crate::flow::{FlowId, FlowKey, FlowStore};
use crate::layout::FLOWHT_NBSZ;
use crate::region::{Region, Shared};

mod hash;

#[cfg(test)]
mod tests;

pub use self::hash::FlowHasher;

/// One slot of the lookup table.
#[repr(C)]
#[derive(Debug, Default)]
pub struct HtEntry {
    flow_id: AtomicU32,
    flow_hash: AtomicU32,
}

const _: () = assert!(core::mem::size_of::<HtEntry>() == 8);

// SAFETY: zero is an empty entry, all access is atomic.
unsafe impl Shared for HtEntry { }

/// The shared lookup table.
#[derive(Clone)]
pub struct LookupTable {
    region: Arc<Region>,
    base: NonNull<HtEntry>,
    entries: usize,
    hasher: FlowHasher,
}

// SAFETY: `base` points into the region kept alive by `region`, entries are atomics.
unsafe impl Send for LookupTable { }
unsafe impl Sync for LookupTable { }

impl HtEntry {
    /// The entry holds a flow.
    pub const VALID: u32 = 1 << 31;
    /// Shift of the position within the bucket.
    pub const POS_SHIFT: u32 = 29;
    /// Mask of the flow index.
    pub const ID_MASK: u32 = (1 << Self::POS_SHIFT) - 1;

    fn load(&self) -> Option<(FlowId, u32)> {
        let word = self.flow_id.load(Ordering::Acquire);
        if word & Self::VALID == 0 {
            return None;
        }
        let hash = self.flow_hash.load(Ordering::Relaxed);
        Some((FlowId(word & Self::ID_MASK), hash))
    }
}

impl LookupTable {
    /// Create a view of `entries` slots at `offset` of a region.
    ///
    /// The number of entries must be a non-zero multiple of the bucket size.
    pub fn new(region: Arc<Region>, offset: usize, entries: usize, hasher: FlowHasher) -> Result<Self> {
        if entries == 0 || entries % FLOWHT_NBSZ != 0 {
            return Err(Error::Illegal);
        }
        let slots = region.view::<HtEntry>(offset, entries)?;
        let base = NonNull::from(slots).cast();
        Ok(LookupTable { region, base, entries, hasher })
    }

    /// Create a table in its own heap region.
    pub fn with_entries(entries: usize, hasher: FlowHasher) -> Result<Self> {
        let len = entries.checked_mul(core::mem::size_of::<HtEntry>())
            .ok_or(Error::NoCapacity)?;
        let region = Arc::new(Region::zeroed(len.max(1))?);
        LookupTable::new(region, 0, entries, hasher)
    }

    /// The hasher used for four tuples.
    pub fn hasher(&self) -> &FlowHasher {
        &self.hasher
    }

    /// The number of buckets.
    pub fn buckets(&self) -> usize {
        self.entries / FLOWHT_NBSZ
    }

    fn slots(&self) -> &[HtEntry] {
        // SAFETY: validated as a view on construction, the region outlives `self`.
        unsafe { core::slice::from_raw_parts(self.base.as_ptr(), self.entries) }
    }

    fn bucket(&self, hash: u32) -> &[HtEntry] {
        let start = (hash as usize % self.buckets()) * FLOWHT_NBSZ;
        &self.slots()[start..start + FLOWHT_NBSZ]
    }

    /// Insert a flow under a precomputed hash.
    ///
    /// Fails with `BucketFull` when all slots of the bucket are taken. The flow then stays
    /// unreachable and the caller should release it.
    pub fn insert_hashed(&self, hash: u32, flow: FlowId) -> Result<()> {
        if flow.0 > HtEntry::ID_MASK {
            return Err(Error::Illegal);
        }

        for (pos, slot) in self.bucket(hash).iter().enumerate() {
            if slot.flow_id.load(Ordering::Acquire) & HtEntry::VALID != 0 {
                continue;
            }

            slot.flow_hash.store(hash, Ordering::Relaxed);
            let word = HtEntry::VALID | (pos as u32) << HtEntry::POS_SHIFT | flow.0;
            slot.flow_id.store(word, Ordering::Release);
            return Ok(());
        }

        Err(Error::BucketFull)
    }

    /// Find a flow by its hash, accepting the first candidate the verifier confirms.
    pub fn lookup_hashed<F>(&self, hash: u32, mut verify: F) -> Result<FlowId>
        where F: FnMut(FlowId) -> bool,
    {
        self.bucket(hash).iter()
            .filter_map(HtEntry::load)
            .filter(|&(_, candidate)| candidate == hash)
            .map(|(id, _)| id)
            .find(|&id| verify(id))
            .ok_or(Error::NotFound)
    }

    /// Remove a flow's entry.
    pub fn remove_hashed(&self, hash: u32, flow: FlowId) -> Result<()> {
        for slot in self.bucket(hash) {
            match slot.load() {
                Some((id, candidate)) if id == flow && candidate == hash => {
                    slot.flow_id.store(0, Ordering::Release);
                    return Ok(());
                },
                _ => {},
            }
        }

        Err(Error::NotFound)
    }

    /// Insert a flow under the hash of its four tuple.
    pub fn insert(&self, key: &FlowKey, flow: FlowId) -> Result<()> {
        self.insert_hashed(self.hasher.hash(key), flow)
    }

    /// Find the flow of a four tuple, checking candidates against their records.
    pub fn lookup(&self, store: &FlowStore, key: &FlowKey) -> Result<FlowId> {
        self.lookup_hashed(self.hasher.hash(key), |id| {
            store.lock(id)
                .map(|guard| guard.identity().key() == *key)
                .unwrap_or(false)
        })
    }

    /// Remove a flow inserted with `insert`.
    pub fn remove(&self, key: &FlowKey, flow: FlowId) -> Result<()> {
        self.remove_hashed(self.hasher.hash(key), flow)
    }

    /// The region holding the table.
    pub fn region(&self) -> &Arc<Region> {
        &self.region
    }
}
