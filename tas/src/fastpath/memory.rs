use core::sync::atomic::{AtomicU8, Ordering};
use core::ptr::NonNull;
use alloc::sync::Arc;

use crate::{Error, Result};
use crate::flow::FlowStore;
use crate::layout::{app_context, AppContextRepr, StateLayout, MAX_FLOWGROUPS};
use crate::lookup::{FlowHasher, LookupTable};
use crate::region::{Region, Shared};
use super::FlowTables;

/// A typed view of the internal state region.
#[derive(Clone, Debug)]
pub struct StateMemory {
    region: Arc<Region>,
    layout: StateLayout,
}

/// The table mapping flow groups to the fast path core that handles them.
#[derive(Clone)]
pub struct Steering {
    region: Arc<Region>,
    base: NonNull<AtomicU8>,
}

// SAFETY: zero steers to core zero, all access is atomic.
unsafe impl Shared for AtomicU8 { }

// SAFETY: `base` points into the region kept alive by `region`.
unsafe impl Send for Steering { }
unsafe impl Sync for Steering { }

impl StateMemory {
    /// View a region with the given layout.
    pub fn new(region: Arc<Region>, layout: StateLayout) -> Result<Self> {
        region.check(0, layout.size)?;
        Ok(StateMemory { region, layout })
    }

    /// A fresh zeroed region for the layout.
    pub fn zeroed(layout: StateLayout) -> Result<Self> {
        let region = Arc::new(Region::zeroed(layout.size)?);
        StateMemory::new(region, layout)
    }

    /// The layout this view was created with.
    pub fn layout(&self) -> &StateLayout {
        &self.layout
    }

    /// The region backing this view.
    pub fn region(&self) -> &Arc<Region> {
        &self.region
    }

    /// A view of the flow records.
    pub fn flow_store(&self) -> Result<FlowStore> {
        FlowStore::new(self.region.clone(), self.layout.flows, self.layout.flow_count)
    }

    /// A view of the lookup table using `hasher`.
    pub fn lookup_table(&self, hasher: FlowHasher) -> Result<LookupTable> {
        LookupTable::new(self.region.clone(), self.layout.lookup, self.layout.lookup_entries, hasher)
    }

    /// Views of the records and the lookup table.
    pub fn flow_tables(&self, hasher: FlowHasher) -> Result<FlowTables> {
        Ok(FlowTables::new(self.flow_store()?, self.lookup_table(hasher)?))
    }

    /// A view of the flow group to core map.
    pub fn steering(&self) -> Result<Steering> {
        let slots = self.region.view::<AtomicU8>(self.layout.steering, MAX_FLOWGROUPS)?;
        Ok(Steering {
            region: self.region.clone(),
            base: NonNull::from(slots).cast(),
        })
    }

    /// Read the registers of context `ctx` on core `core`.
    ///
    /// # Safety
    ///
    /// No other actor may write the registers concurrently.
    pub unsafe fn app_context(&self, core: usize, ctx: usize) -> Result<AppContextRepr> {
        let offset = self.layout.appctx_offset(core, ctx).ok_or(Error::NotFound)?;
        let bytes = self.region.bytes(offset, 48)?;
        AppContextRepr::parse(app_context::new_unchecked(bytes))
    }

    /// Write the registers of context `ctx` on core `core`.
    ///
    /// # Safety
    ///
    /// No other actor may access the registers concurrently, which holds while registering a
    /// context that is not yet announced to the fast path.
    pub unsafe fn set_app_context(&self, core: usize, ctx: usize, repr: &AppContextRepr) -> Result<()> {
        let offset = self.layout.appctx_offset(core, ctx).ok_or(Error::NotFound)?;
        let bytes = self.region.bytes_mut(offset, 48)?;
        repr.emit(app_context::new_checked_mut(bytes)?);
        Ok(())
    }
}

impl Steering {
    fn slots(&self) -> &[AtomicU8] {
        // SAFETY: validated as a view on construction, the region outlives `self`.
        unsafe { core::slice::from_raw_parts(self.base.as_ptr(), MAX_FLOWGROUPS) }
    }

    /// The core handling a flow group.
    pub fn core(&self, group: u16) -> Result<u8> {
        self.slots().get(usize::from(group))
            .map(|slot| slot.load(Ordering::Relaxed))
            .ok_or(Error::NotFound)
    }

    /// Redirect a flow group.
    pub fn set_core(&self, group: u16, core: u8) -> Result<()> {
        let slot = self.slots().get(usize::from(group)).ok_or(Error::NotFound)?;
        slot.store(core, Ordering::Relaxed);
        Ok(())
    }

    /// Spread all groups round robin over `cores` cores.
    pub fn spread(&self, cores: u8) {
        if cores == 0 {
            return;
        }
        for (group, slot) in self.slots().iter().enumerate() {
            slot.store((group % usize::from(cores)) as u8, Ordering::Relaxed);
        }
    }

    /// The region backing this view.
    pub fn region(&self) -> &Arc<Region> {
        &self.region
    }
}
