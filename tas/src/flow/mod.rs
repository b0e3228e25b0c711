//! The per-flow state records.
//!
//! Each established connection handled by the fast path has one [`FlowState`] in a fixed array.
//! The record is shared by the fast path cores, the slow path and, indirectly through the queues,
//! the owning application. All fields except the lock are only accessed through a [`FlowGuard`].
//!
//! Records are handed out by the slow path's [`FlowPool`]. A record is fully initialized under its
//! lock before the flow is made reachable through the lookup table, so a packet can never observe a
//! half-written flow.
//!
//! [`FlowState`]: struct.FlowState.html
//! [`FlowGuard`]: struct.FlowGuard.html
//! [`FlowPool`]: struct.FlowPool.html
use core::{fmt, ops};
use core::net::Ipv4Addr;

mod lock;
mod state;
mod store;

#[cfg(test)]
mod tests;

pub use self::lock::SpinLock;
pub use self::state::{FlowGuard, FlowIdentity, FlowRegisters, FlowState};
pub use self::store::{FlowPool, FlowStore};

/// The index of a flow record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FlowId(pub u32);

/// The four tuple of a connection as seen from the local host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FlowKey {
    /// Our address.
    pub local_ip: Ipv4Addr,
    /// Our port.
    pub local_port: u16,
    /// The peer's address.
    pub remote_ip: Ipv4Addr,
    /// The peer's port.
    pub remote_port: u16,
}

/// State flags kept in the low bits of the receive buffer base.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FlowFlags(u64);

impl FlowId {
    /// The position in the record array.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "flow#{}", self.0)
    }
}

impl FlowKey {
    /// The key of the same connection seen from the other host.
    pub fn reverse(self) -> Self {
        FlowKey {
            local_ip: self.remote_ip,
            local_port: self.remote_port,
            remote_ip: self.local_ip,
            remote_port: self.local_port,
        }
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{} -> {}:{}",
            self.local_ip, self.local_port, self.remote_ip, self.remote_port)
    }
}

impl FlowFlags {
    /// Packets of this flow go to the slow path.
    pub const SLOWPATH: FlowFlags = FlowFlags(1);
    /// The peer negotiated explicit congestion notification.
    pub const ECN: FlowFlags = FlowFlags(8);
    /// The application closed its sending direction.
    pub const TXFIN: FlowFlags = FlowFlags(16);
    /// The peer closed its sending direction.
    pub const RXFIN: FlowFlags = FlowFlags(32);

    /// The bits of the receive base reserved for flags.
    pub const MASK: u64 = 63;

    /// No flags set.
    pub const fn empty() -> Self {
        FlowFlags(0)
    }

    /// Flags from raw bits, bits outside `MASK` are dropped.
    pub fn from_bits(bits: u64) -> Self {
        FlowFlags(bits & Self::MASK)
    }

    /// The raw bits.
    pub fn bits(self) -> u64 {
        self.0
    }

    /// Whether all flags of `other` are set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// The flags not in `other`.
    pub fn difference(self, other: Self) -> Self {
        FlowFlags(self.0 & !other.0)
    }
}

impl ops::BitOr for FlowFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        FlowFlags(self.0 | rhs.0)
    }
}

impl fmt::Debug for FlowFlags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let names = [
            (FlowFlags::SLOWPATH, "SLOWPATH"),
            (FlowFlags::ECN, "ECN"),
            (FlowFlags::TXFIN, "TXFIN"),
            (FlowFlags::RXFIN, "RXFIN"),
        ];
        let mut list = f.debug_set();
        for (flag, name) in names.iter() {
            if self.contains(*flag) {
                list.entry(&format_args!("{}", name));
            }
        }
        list.finish()
    }
}
