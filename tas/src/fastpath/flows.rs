use crate::{Error, Result};
use crate::layout::FlowProgress;
use crate::flow::{FlowFlags, FlowId, FlowIdentity, FlowKey, FlowPool, FlowStore};
use crate::lookup::LookupTable;

/// The flow records together with their lookup table.
///
/// Cheap to clone, every actor holds its own.
#[derive(Clone)]
pub struct FlowTables {
    store: FlowStore,
    table: LookupTable,
}

/// The slow path's side of flow management.
pub struct Flows {
    tables: FlowTables,
    pool: FlowPool,
}

/// Everything the slow path knows about a flow when installing it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlowInit {
    /// Four tuple, buffers and owning context.
    pub identity: FlowIdentity,
    /// The peer's next sequence number.
    pub rx_next_seq: u32,
    /// Our next sequence number.
    pub tx_next_seq: u32,
    /// The window the peer advertised during the handshake.
    pub remote_window: u32,
    /// Initial transmission rate in kbps, zero for unlimited.
    pub tx_rate: u32,
}

impl FlowTables {
    /// Combine a record array with its lookup table.
    pub fn new(store: FlowStore, table: LookupTable) -> Self {
        FlowTables { store, table }
    }

    /// The flow records.
    pub fn store(&self) -> &FlowStore {
        &self.store
    }

    /// The lookup table.
    pub fn table(&self) -> &LookupTable {
        &self.table
    }

    /// Resolve a four tuple to its flow.
    pub fn lookup(&self, key: &FlowKey) -> Result<FlowId> {
        self.table.lookup(&self.store, key)
    }
}

impl Flows {
    /// Manage all records of the tables.
    pub fn new(tables: FlowTables) -> Self {
        let capacity = tables.store.capacity();
        Flows {
            tables,
            pool: FlowPool::new(capacity),
        }
    }

    /// The tables shared with the fast path.
    pub fn tables(&self) -> &FlowTables {
        &self.tables
    }

    /// The number of installed flows.
    pub fn in_use(&self) -> usize {
        self.pool.in_use()
    }

    /// Install an established flow.
    ///
    /// The record is fully initialized before the lookup entry is published. If the lookup bucket
    /// is full the record is given back and `BucketFull` returned.
    pub fn install(&mut self, init: &FlowInit) -> Result<FlowId> {
        let key = init.identity.key();
        let id = self.pool.create(&self.tables.store, init.identity)
            .map_err(|err| {
                net_debug!("flows: no record for {}: {}", key, err);
                err
            })?;

        {
            let mut flow = self.tables.store.lock(id)?;
            flow.rx_avail = init.identity.rx_len();
            flow.rx_next_seq = init.rx_next_seq;
            flow.tx_next_seq = init.tx_next_seq;
            flow.rx_remote_avail = init.remote_window;
            flow.tx_rate = init.tx_rate;
        }

        if let Err(err) = self.tables.table.insert(&key, id) {
            net_debug!("flows: lookup insert of {} failed: {}", key, err);
            self.pool.release(&self.tables.store, id)?;
            return Err(err);
        }

        net_debug!("flows: installed {} as {}", key, id);
        Ok(id)
    }

    /// Remove a flow from the lookup table and return its record to the pool.
    pub fn remove(&mut self, id: FlowId) -> Result<()> {
        if !self.pool.is_used(id) {
            return Err(Error::NotFound);
        }

        let key = self.tables.store.lock(id)?.identity().key();
        self.tables.table.remove(&key, id)?;
        self.pool.release(&self.tables.store, id)?;
        net_debug!("flows: removed {}", id);
        Ok(())
    }

    /// Remove the flow once both directions have finished.
    ///
    /// Returns whether the flow was removed.
    pub fn release_if_finished(&mut self, id: FlowId) -> Result<bool> {
        let finished = FlowFlags::TXFIN | FlowFlags::RXFIN;
        if !self.tables.store.lock(id)?.flags().contains(finished) {
            return Ok(false);
        }
        self.remove(id)?;
        Ok(true)
    }

    /// Route a flow's notifications to another context.
    ///
    /// The bump sequence is advanced past both its current value and the last sequence the
    /// application used, so that every bump issued before the move is stale afterwards. Returns
    /// the new sequence, the application continues counting from it, and the progress of the flow
    /// at the time of the switch. Every notification from then on goes to the new context.
    pub fn move_flow(&mut self, id: FlowId, db_id: u16, opaque: u64, app_seq: u16)
        -> Result<(u16, FlowProgress)>
    {
        if !self.pool.is_used(id) {
            return Err(Error::NotFound);
        }

        let mut flow = self.tables.store.lock(id)?;
        let current = flow.bump_seq();
        let base = if super::seq16_newer(app_seq, current) { app_seq } else { current };
        let next = base.wrapping_add(1);

        flow.set_bump_seq(next);
        let flags = flow.flags();
        let progress = FlowProgress {
            rx_next_seq: flow.rx_next_seq,
            rx_avail: flow.rx_avail,
            tx_acked_seq: flow.tx_next_seq.wrapping_sub(flow.tx_sent),
            tx_held: flow.tx_avail + flow.tx_sent,
            rx_fin: flags.contains(FlowFlags::RXFIN),
            tx_fin: flags.contains(FlowFlags::TXFIN),
            tx_done: flags.contains(FlowFlags::TXFIN) && flow.tx_avail == 0 && flow.tx_sent == 0,
        };
        let identity = flow.identity_mut();
        identity.set_db_id(db_id);
        identity.set_opaque(opaque);
        net_debug!("flows: moved {} to context {} at bump sequence {}", id, db_id, next);
        Ok((next, progress))
    }

    /// Divert a flow's packets to the slow path, or return them to the fast path.
    pub fn set_slowpath(&mut self, id: FlowId, slowpath: bool) -> Result<()> {
        let mut flow = self.tables.store.lock(id)?;
        if slowpath {
            flow.insert_flags(FlowFlags::SLOWPATH);
        } else {
            flow.remove_flags(FlowFlags::SLOWPATH);
        }
        Ok(())
    }
}
