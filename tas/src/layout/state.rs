use super::regs::{APPCTX_BYTES, APPST_BYTES};
use super::{APPCTX_NUM, APPST_CTX_MCS, APPST_NUM, FLOWHT_ENTRIES, FLOWHT_NBSZ, FLOWST_NUM, MAX_FLOWGROUPS};

/// Byte offsets of the internal state region.
///
/// The region is a packed sequence of fixed arrays in this order:
///
/// | array          | element                     | count                          |
/// |----------------|-----------------------------|--------------------------------|
/// | context regs   | 48 bytes                    | `APPST_CTX_MCS * APPCTX_NUM`   |
/// | flow states    | 128 bytes, 64 byte aligned  | `FLOWST_NUM`                   |
/// | lookup table   | 8 bytes                     | `FLOWHT_ENTRIES`               |
/// | kernel context | 48 bytes                    | `APPST_CTX_MCS`                |
/// | app states     | 64 bytes                    | `APPST_NUM`                    |
/// | steering       | 1 byte                      | `MAX_FLOWGROUPS`               |
///
/// Context registers are indexed by core first, then by context id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StateLayout {
    /// Offset of the context register blocks.
    pub appctx: usize,
    /// Offset of the flow state records.
    pub flows: usize,
    /// Number of flow state records.
    pub flow_count: usize,
    /// Offset of the lookup table.
    pub lookup: usize,
    /// Number of lookup table entries, a multiple of the bucket size.
    pub lookup_entries: usize,
    /// Offset of the kernel context register blocks.
    pub kctx: usize,
    /// Offset of the application states.
    pub appst: usize,
    /// Offset of the flow group steering table.
    pub steering: usize,
    /// Total size of the region.
    pub size: usize,
}

/// Size of one flow state record.
pub(crate) const FLOWST_BYTES: usize = 128;
/// Size of one lookup table entry.
pub(crate) const FLOWHT_BYTES: usize = 8;

impl StateLayout {
    /// The layout of the full sized region.
    pub const fn new() -> Self {
        Self::with_flows(FLOWST_NUM)
    }

    /// A layout with a reduced number of flows, for tests and small deployments.
    ///
    /// The lookup table has twice as many entries as there are flows, rounded up to whole
    /// buckets. All actors must agree on the flow count, only the full layout is what an
    /// external fast path publishes.
    pub const fn with_flows(flow_count: usize) -> Self {
        let lookup_entries = if flow_count == FLOWST_NUM {
            FLOWHT_ENTRIES
        } else if flow_count == 0 {
            FLOWHT_NBSZ
        } else {
            (flow_count * 2 + FLOWHT_NBSZ - 1) / FLOWHT_NBSZ * FLOWHT_NBSZ
        };

        let appctx = 0;
        let flows = appctx + APPST_CTX_MCS * APPCTX_NUM * APPCTX_BYTES;
        let lookup = flows + flow_count * FLOWST_BYTES;
        let kctx = lookup + lookup_entries * FLOWHT_BYTES;
        let appst = kctx + APPST_CTX_MCS * APPCTX_BYTES;
        let steering = appst + APPST_NUM * APPST_BYTES;
        let size = steering + MAX_FLOWGROUPS;

        StateLayout {
            appctx,
            flows,
            flow_count,
            lookup,
            lookup_entries,
            kctx,
            appst,
            steering,
            size,
        }
    }

    /// Offset of the register block of context `ctx` on core `core`.
    pub fn appctx_offset(&self, core: usize, ctx: usize) -> Option<usize> {
        if core >= APPST_CTX_MCS || ctx >= APPCTX_NUM {
            return None;
        }
        Some(self.appctx + (core * APPCTX_NUM + ctx) * APPCTX_BYTES)
    }

    /// Offset of the kernel context register block of core `core`.
    pub fn kctx_offset(&self, core: usize) -> Option<usize> {
        if core >= APPST_CTX_MCS {
            return None;
        }
        Some(self.kctx + core * APPCTX_BYTES)
    }

    /// Offset of application state `idx`.
    pub fn appst_offset(&self, idx: usize) -> Option<usize> {
        if idx >= APPST_NUM {
            return None;
        }
        Some(self.appst + idx * APPST_BYTES)
    }
}

impl Default for StateLayout {
    fn default() -> Self {
        StateLayout::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn full_layout() {
        let layout = StateLayout::new();
        assert_eq!(layout.flows, 12288);
        assert_eq!(layout.flows % 64, 0);
        assert_eq!(layout.lookup, 12288 + 128 * 1024 * 128);
        assert_eq!(layout.kctx, layout.lookup + 256 * 1024 * 8);
        assert_eq!(layout.size, layout.steering + 4096);
    }

    #[test]
    fn register_offsets() {
        let layout = StateLayout::with_flows(64);
        assert_eq!(layout.appctx_offset(1, 2), Some(48 * 18));
        assert_eq!(layout.appctx_offset(16, 0), None);
        assert_eq!(layout.kctx_offset(0), Some(layout.kctx));
        assert_eq!(layout.appst_offset(8), None);
    }

    #[test]
    fn lookup_fills_whole_buckets() {
        assert_eq!(StateLayout::with_flows(3).lookup_entries, 8);
        assert_eq!(StateLayout::with_flows(4).lookup_entries, 8);
        assert_eq!(StateLayout::with_flows(0).lookup_entries, FLOWHT_NBSZ);
        assert_eq!(StateLayout::new().lookup_entries, FLOWHT_ENTRIES);
    }
}
