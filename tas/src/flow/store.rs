use core::ptr::NonNull;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::{Error, Result};
use crate::region::Region;
use super::{FlowGuard, FlowId, FlowIdentity, FlowState};

/// A shared view of the flow record array.
#[derive(Clone)]
pub struct FlowStore {
    region: Arc<Region>,
    base: NonNull<FlowState>,
    count: usize,
}

/// The slow path's allocator of flow records.
///
/// Only one actor may own the pool, every other actor merely locks records it found through the
/// lookup table.
#[derive(Debug)]
pub struct FlowPool {
    free: Vec<u32>,
    used: Vec<bool>,
}

// SAFETY: `base` points into the region kept alive by `region`, and `FlowState` is `Sync`.
unsafe impl Send for FlowStore { }
unsafe impl Sync for FlowStore { }

impl FlowStore {
    /// Create a view of `count` records at `offset` of a region.
    pub fn new(region: Arc<Region>, offset: usize, count: usize) -> Result<Self> {
        let states = region.view::<FlowState>(offset, count)?;
        let base = NonNull::from(states).cast();
        Ok(FlowStore { region, base, count })
    }

    /// Create a store in its own heap region.
    pub fn with_capacity(count: usize) -> Result<Self> {
        let len = count.checked_mul(core::mem::size_of::<FlowState>())
            .ok_or(Error::NoCapacity)?;
        let region = Arc::new(Region::zeroed(len)?);
        FlowStore::new(region, 0, count)
    }

    /// The number of records.
    pub fn capacity(&self) -> usize {
        self.count
    }

    /// The region holding the records.
    pub fn region(&self) -> &Arc<Region> {
        &self.region
    }

    fn states(&self) -> &[FlowState] {
        // SAFETY: validated as a view on construction, the region outlives `self`.
        unsafe { core::slice::from_raw_parts(self.base.as_ptr(), self.count) }
    }

    /// The record with `id`, without locking it.
    pub fn get(&self, id: FlowId) -> Result<&FlowState> {
        self.states().get(id.index()).ok_or(Error::NotFound)
    }

    /// Spin until the record's lock is taken.
    pub fn lock(&self, id: FlowId) -> Result<FlowGuard<'_>> {
        Ok(self.get(id)?.lock(id))
    }

    /// Take the record's lock if it is free, fails with `WouldBlock` otherwise.
    pub fn try_lock(&self, id: FlowId) -> Result<FlowGuard<'_>> {
        self.get(id)?.try_lock(id).ok_or(Error::WouldBlock)
    }
}

impl FlowPool {
    /// A pool where all `capacity` records are free.
    ///
    /// Records are handed out lowest index first.
    pub fn new(capacity: usize) -> Self {
        FlowPool {
            free: (0..capacity as u32).rev().collect(),
            used: alloc::vec![false; capacity],
        }
    }

    /// The number of records.
    pub fn capacity(&self) -> usize {
        self.used.len()
    }

    /// The number of records currently handed out.
    pub fn in_use(&self) -> usize {
        self.used.len() - self.free.len()
    }

    /// Whether the record is currently handed out.
    pub fn is_used(&self, id: FlowId) -> bool {
        self.used.get(id.index()).copied().unwrap_or(false)
    }

    /// Claim a record and initialize it under its lock.
    ///
    /// The registers are zeroed and the bump sequence starts at zero. Fails with `NoCapacity` when
    /// no record is free and with `Illegal` for an identity that does not validate.
    pub fn create(&mut self, store: &FlowStore, identity: FlowIdentity) -> Result<FlowId> {
        identity.validate()?;
        let index = self.free.pop().ok_or(Error::NoCapacity)?;
        let id = FlowId(index);

        let mut guard = match store.lock(id) {
            Ok(guard) => guard,
            Err(err) => {
                self.free.push(index);
                return Err(err);
            },
        };
        guard.reset(identity);
        drop(guard);

        self.used[id.index()] = true;
        Ok(id)
    }

    /// Return a record to the pool, zeroing it.
    ///
    /// The caller must have removed the flow from the lookup table before.
    pub fn release(&mut self, store: &FlowStore, id: FlowId) -> Result<()> {
        if !self.is_used(id) {
            return Err(Error::Illegal);
        }

        store.lock(id)?.clear();
        self.used[id.index()] = false;
        self.free.push(id.0);
        Ok(())
    }
}
