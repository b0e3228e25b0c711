use core::cell::UnsafeCell;
use core::mem::{align_of, offset_of, size_of};
use core::net::Ipv4Addr;
use core::ops;
use bytemuck::{Pod, Zeroable};

use crate::{Error, Result};
use crate::region::Shared;
use super::{FlowFlags, FlowId, FlowKey, SpinLock};

/// The read-mostly identity of a flow.
///
/// Written by the slow path when the flow is installed. Afterwards only the flag bits in the low
/// bits of the receive base, the opaque handle and the context id change, the latter two when the
/// flow is moved to another context.
#[repr(C, packed)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct FlowIdentity {
    opaque: u64,
    rx_base: u64,
    tx_base: u64,
    rx_len: u32,
    tx_len: u32,
    local_ip: [u8; 4],
    remote_ip: [u8; 4],
    local_port: [u8; 2],
    remote_port: [u8; 2],
    remote_mac: [u8; 6],
    db_id: u16,
    flow_group: u16,
}

/// The working registers of a flow, all guarded by the flow lock.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct FlowRegisters {
    /// Free space in the receive buffer.
    pub rx_avail: u32,
    /// Position in the receive buffer of the next in-order byte.
    pub rx_next_pos: u32,
    /// Sequence number of the next in-order byte expected from the peer.
    pub rx_next_seq: u32,
    /// Window last advertised by the peer.
    pub rx_remote_avail: u32,
    /// Number of duplicate acknowledgements in a row.
    pub rx_dupack_cnt: u32,
    /// Sequence number of the buffered out-of-order interval.
    pub rx_ooo_start: u32,
    /// Length of the out-of-order interval, zero if there is none.
    pub rx_ooo_len: u32,
    /// Bytes in the transmit buffer not yet sent.
    pub tx_avail: u32,
    /// Bytes sent but not yet acknowledged.
    pub tx_sent: u32,
    /// Position in the transmit buffer of the next byte to send.
    pub tx_next_pos: u32,
    /// Sequence number of the next byte to send.
    pub tx_next_seq: u32,
    /// Timestamp to echo in the next segment.
    pub tx_next_ts: u32,
    /// Allowed transmission rate in kbps, zero for unlimited.
    pub tx_rate: u32,
    /// Retransmissions since the slow path last read the counters.
    pub cnt_tx_drops: u16,
    /// Acknowledgements received since the counters were last read.
    pub cnt_rx_acks: u16,
    /// Bytes acknowledged since the counters were last read.
    pub cnt_rx_ack_bytes: u32,
    /// Acknowledged bytes that carried an ECN echo.
    pub cnt_rx_ecn_bytes: u32,
    /// Smoothed round trip time estimate in microseconds.
    pub rtt_est: u32,
}

/// One 128-byte flow record.
#[repr(C, align(64))]
pub struct FlowState {
    identity: UnsafeCell<FlowIdentity>,
    bump_seq: UnsafeCell<u16>,
    lock: SpinLock,
    regs: UnsafeCell<FlowRegisters>,
}

const _: () = assert!(size_of::<FlowIdentity>() == 54);
const _: () = assert!(size_of::<FlowRegisters>() == 68);
const _: () = assert!(size_of::<FlowState>() == 128);
const _: () = assert!(align_of::<FlowState>() == 64);
const _: () = assert!(offset_of!(FlowState, bump_seq) == 54);
const _: () = assert!(offset_of!(FlowState, lock) == 56);
const _: () = assert!(offset_of!(FlowState, regs) == 60);

// SAFETY: all interior mutation happens while holding `lock`.
unsafe impl Sync for FlowState { }
// SAFETY: all-zero is an unlocked, empty record.
unsafe impl Shared for FlowState { }

/// Exclusive access to a locked flow record.
///
/// Dereferences to the flow registers. The lock is released when the guard is dropped.
pub struct FlowGuard<'a> {
    state: &'a FlowState,
    id: FlowId,
}

impl FlowIdentity {
    /// The identity of a flow with the given four tuple and application handle.
    pub fn new(key: FlowKey, opaque: u64) -> Self {
        FlowIdentity {
            opaque,
            local_ip: key.local_ip.octets(),
            remote_ip: key.remote_ip.octets(),
            local_port: key.local_port.to_be_bytes(),
            remote_port: key.remote_port.to_be_bytes(),
            ..FlowIdentity::zeroed()
        }
    }

    /// Set the location of the receive buffer in buffer memory.
    pub fn with_rx_buffer(mut self, base: u64, len: u32) -> Self {
        self.rx_base = base;
        self.rx_len = len;
        self
    }

    /// Set the location of the transmit buffer in buffer memory.
    pub fn with_tx_buffer(mut self, base: u64, len: u32) -> Self {
        self.tx_base = base;
        self.tx_len = len;
        self
    }

    /// Set the MAC address of the next hop.
    pub fn with_remote_mac(mut self, mac: [u8; 6]) -> Self {
        self.remote_mac = mac;
        self
    }

    /// Set the context whose queues receive updates of this flow.
    pub fn with_context(mut self, db_id: u16) -> Self {
        self.db_id = db_id;
        self
    }

    /// Set the flow group, which selects the fast path core.
    pub fn with_flow_group(mut self, group: u16) -> Self {
        self.flow_group = group;
        self
    }

    /// Check the invariants of a freshly built identity.
    ///
    /// The receive base must leave the flag bits clear and both buffers must be non-empty.
    pub fn validate(&self) -> Result<()> {
        let (rx_base, rx_len, tx_len) = (self.rx_base, self.rx_len, self.tx_len);
        if rx_base & FlowFlags::MASK != 0 || rx_len == 0 || tx_len == 0 {
            return Err(Error::Illegal);
        }
        Ok(())
    }

    /// The application handle of the connection.
    pub fn opaque(&self) -> u64 {
        self.opaque
    }

    /// Replace the application handle.
    pub fn set_opaque(&mut self, opaque: u64) {
        self.opaque = opaque;
    }

    /// The four tuple of the flow.
    pub fn key(&self) -> FlowKey {
        FlowKey {
            local_ip: Ipv4Addr::from(self.local_ip),
            local_port: u16::from_be_bytes(self.local_port),
            remote_ip: Ipv4Addr::from(self.remote_ip),
            remote_port: u16::from_be_bytes(self.remote_port),
        }
    }

    /// Offset of the receive buffer, without the flag bits.
    pub fn rx_base(&self) -> u64 {
        self.rx_base & !FlowFlags::MASK
    }

    /// Size of the receive buffer.
    pub fn rx_len(&self) -> u32 {
        self.rx_len
    }

    /// Offset of the transmit buffer.
    pub fn tx_base(&self) -> u64 {
        self.tx_base
    }

    /// Size of the transmit buffer.
    pub fn tx_len(&self) -> u32 {
        self.tx_len
    }

    /// MAC address of the next hop.
    pub fn remote_mac(&self) -> [u8; 6] {
        self.remote_mac
    }

    /// The context receiving updates of this flow.
    pub fn db_id(&self) -> u16 {
        self.db_id
    }

    /// Redirect updates to another context.
    pub fn set_db_id(&mut self, db_id: u16) {
        self.db_id = db_id;
    }

    /// The flow group.
    pub fn flow_group(&self) -> u16 {
        self.flow_group
    }

    /// The flag bits stored in the receive base.
    pub fn flags(&self) -> FlowFlags {
        FlowFlags::from_bits(self.rx_base & FlowFlags::MASK)
    }

    fn set_flags(&mut self, flags: FlowFlags) {
        self.rx_base = self.rx_base() | flags.bits();
    }
}

impl FlowState {
    /// Lock the record.
    pub fn lock(&self, id: FlowId) -> FlowGuard<'_> {
        self.lock.lock();
        FlowGuard { state: self, id }
    }

    /// Lock the record if it is currently free.
    pub fn try_lock(&self, id: FlowId) -> Option<FlowGuard<'_>> {
        if self.lock.try_lock() {
            Some(FlowGuard { state: self, id })
        } else {
            None
        }
    }

    /// Check if any actor holds the lock at the moment.
    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }
}

impl FlowGuard<'_> {
    /// The id of the locked record.
    pub fn id(&self) -> FlowId {
        self.id
    }

    /// The identity of the locked record.
    pub fn identity(&self) -> &FlowIdentity {
        // SAFETY: guarded by the lock we hold.
        unsafe { &*self.state.identity.get() }
    }

    /// Mutable access to the identity of the locked record.
    pub fn identity_mut(&mut self) -> &mut FlowIdentity {
        // SAFETY: guarded by the lock we hold.
        unsafe { &mut *self.state.identity.get() }
    }

    /// The sequence of the last bump that was applied.
    pub fn bump_seq(&self) -> u16 {
        // SAFETY: guarded by the lock we hold.
        unsafe { *self.state.bump_seq.get() }
    }

    /// Record the sequence of an applied bump.
    pub fn set_bump_seq(&mut self, seq: u16) {
        // SAFETY: guarded by the lock we hold.
        unsafe { *self.state.bump_seq.get() = seq }
    }

    /// The flag bits stored in the receive base.
    pub fn flags(&self) -> FlowFlags {
        self.identity().flags()
    }

    /// Set additional flag bits.
    pub fn insert_flags(&mut self, flags: FlowFlags) {
        let current = self.flags();
        self.identity_mut().set_flags(current | flags);
    }

    /// Clear flag bits.
    pub fn remove_flags(&mut self, flags: FlowFlags) {
        let current = self.flags();
        self.identity_mut().set_flags(current.difference(flags));
    }

    /// Overwrite the whole record with a new identity and zeroed registers.
    pub fn reset(&mut self, identity: FlowIdentity) {
        *self.identity_mut() = identity;
        self.set_bump_seq(0);
        **self = FlowRegisters::zeroed();
    }

    /// Zero the whole record.
    pub fn clear(&mut self) {
        self.reset(FlowIdentity::zeroed());
    }
}

impl ops::Deref for FlowGuard<'_> {
    type Target = FlowRegisters;

    fn deref(&self) -> &FlowRegisters {
        // SAFETY: guarded by the lock we hold.
        unsafe { &*self.state.regs.get() }
    }
}

impl ops::DerefMut for FlowGuard<'_> {
    fn deref_mut(&mut self) -> &mut FlowRegisters {
        // SAFETY: guarded by the lock we hold.
        unsafe { &mut *self.state.regs.get() }
    }
}

impl Drop for FlowGuard<'_> {
    fn drop(&mut self) {
        // SAFETY: a guard only exists while the lock is held.
        unsafe { self.state.lock.unlock() }
    }
}
