//! Entries of the queues between the fast path and the slow path.
//!
//! The kernel receive queue carries exception packets from the fast path to the slow path, such as
//! segments of flows without an installed record or with control flags. The kernel transmit queue
//! carries packets built by the slow path and retransmission requests back to the fast path.
use byteorder::{ByteOrder, NativeEndian};

use crate::{Error, Result};
use super::Entry;

enum_with_unknown! {
    /// Type tag of a kernel receive entry.
    pub doc enum KernelRxType(u8) {
        /// An empty slot.
        Invalid = 0,
        /// A packet in the buffer memory.
        Packet = 1,
    }
}

enum_with_unknown! {
    /// Type tag of a kernel transmit entry.
    pub doc enum KernelTxType(u8) {
        /// An empty slot.
        Invalid = 0,
        /// A packet in the buffer memory.
        Packet = 1,
        /// Retransmit from the last acknowledged byte of a flow.
        ConnRetransmit = 2,
        /// A packet sent without a timestamp option.
        PacketNoTs = 3,
    }
}

byte_wrapper! {
    /// The payload of a kernel receive slot.
    #[derive(Debug, PartialEq, Eq)]
    pub struct kernel_rx([u8]);
}

byte_wrapper! {
    /// The payload of a kernel transmit slot.
    #[derive(Debug, PartialEq, Eq)]
    pub struct kernel_tx([u8]);
}

mod field {
    use crate::layout::field::*;

    pub(crate) const ADDR:       Field =  0..8;
    pub(crate) const LEN:        Field =  8..10;
    pub(crate) const FN_CORE:    Field = 10..12;
    pub(crate) const FLOW_GROUP: Field = 12..14;

    pub(crate) const FLOW_ID:    Field =  0..4;
}

/// Marker for the fast path to slow path queue.
#[derive(Clone, Copy, Debug)]
pub enum KernelRx { }

/// Marker for the slow path to fast path queue.
#[derive(Clone, Copy, Debug)]
pub enum KernelTx { }

/// An exception packet handed to the slow path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KernelRxRepr {
    /// A received segment the fast path did not handle.
    Packet {
        /// Offset of the packet in the buffer memory.
        addr: u64,
        /// Length of the packet in bytes.
        len: u16,
        /// The fast path core that received the packet.
        fn_core: u16,
        /// The flow group the receive queue hashed the packet to.
        flow_group: u16,
    },
}

/// A request of the slow path to the fast path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KernelTxRepr {
    /// Transmit a prepared packet, inserting a timestamp option.
    Packet {
        /// Offset of the packet in the buffer memory.
        addr: u64,
        /// Length of the packet in bytes.
        len: u16,
    },
    /// Transmit a prepared packet without touching its options.
    PacketNoTs {
        /// Offset of the packet in the buffer memory.
        addr: u64,
        /// Length of the packet in bytes.
        len: u16,
    },
    /// Go back to the last acknowledged byte of a flow and resend.
    ConnRetransmit {
        /// The flow to rewind.
        flow_id: u32,
    },
}

impl kernel_rx {
    /// Wrap a slot payload without checking its length.
    pub fn new_unchecked(data: &[u8]) -> &Self {
        Self::__from_macro_new_unchecked(data)
    }

    /// Wrap a mutable slot payload without checking its length.
    pub fn new_unchecked_mut(data: &mut [u8]) -> &mut Self {
        Self::__from_macro_new_unchecked_mut(data)
    }

    /// Ensure the payload holds all fields.
    pub fn check_len(&self) -> Result<()> {
        if self.0.len() < KernelRx::SIZE - 1 {
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    /// Return the buffer offset of the packet.
    pub fn addr(&self) -> u64 {
        NativeEndian::read_u64(&self.0[field::ADDR])
    }

    /// Return the packet length.
    pub fn len(&self) -> u16 {
        NativeEndian::read_u16(&self.0[field::LEN])
    }

    /// Return the receiving fast path core.
    pub fn fn_core(&self) -> u16 {
        NativeEndian::read_u16(&self.0[field::FN_CORE])
    }

    /// Return the flow group.
    pub fn flow_group(&self) -> u16 {
        NativeEndian::read_u16(&self.0[field::FLOW_GROUP])
    }

    /// Set the buffer offset of the packet.
    pub fn set_addr(&mut self, value: u64) {
        NativeEndian::write_u64(&mut self.0[field::ADDR], value)
    }

    /// Set the packet length.
    pub fn set_len(&mut self, value: u16) {
        NativeEndian::write_u16(&mut self.0[field::LEN], value)
    }

    /// Set the receiving fast path core.
    pub fn set_fn_core(&mut self, value: u16) {
        NativeEndian::write_u16(&mut self.0[field::FN_CORE], value)
    }

    /// Set the flow group.
    pub fn set_flow_group(&mut self, value: u16) {
        NativeEndian::write_u16(&mut self.0[field::FLOW_GROUP], value)
    }
}

impl kernel_tx {
    /// Wrap a slot payload without checking its length.
    pub fn new_unchecked(data: &[u8]) -> &Self {
        Self::__from_macro_new_unchecked(data)
    }

    /// Wrap a mutable slot payload without checking its length.
    pub fn new_unchecked_mut(data: &mut [u8]) -> &mut Self {
        Self::__from_macro_new_unchecked_mut(data)
    }

    /// Ensure the payload holds all fields.
    pub fn check_len(&self) -> Result<()> {
        if self.0.len() < KernelTx::SIZE - 1 {
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    /// Return the buffer offset of the packet.
    pub fn addr(&self) -> u64 {
        NativeEndian::read_u64(&self.0[field::ADDR])
    }

    /// Return the packet length.
    pub fn len(&self) -> u16 {
        NativeEndian::read_u16(&self.0[field::LEN])
    }

    /// Return the flow id.
    pub fn flow_id(&self) -> u32 {
        NativeEndian::read_u32(&self.0[field::FLOW_ID])
    }

    /// Set the buffer offset of the packet.
    pub fn set_addr(&mut self, value: u64) {
        NativeEndian::write_u64(&mut self.0[field::ADDR], value)
    }

    /// Set the packet length.
    pub fn set_len(&mut self, value: u16) {
        NativeEndian::write_u16(&mut self.0[field::LEN], value)
    }

    /// Set the flow id.
    pub fn set_flow_id(&mut self, value: u32) {
        NativeEndian::write_u32(&mut self.0[field::FLOW_ID], value)
    }
}

impl KernelRxRepr {
    /// Parse an entry with the given tag.
    pub fn parse(tag: KernelRxType, entry: &kernel_rx) -> Result<Self> {
        entry.check_len()?;
        match tag {
            KernelRxType::Packet => Ok(KernelRxRepr::Packet {
                addr: entry.addr(),
                len: entry.len(),
                fn_core: entry.fn_core(),
                flow_group: entry.flow_group(),
            }),
            _ => Err(Error::Unrecognized),
        }
    }

    /// Write the entry fields and return the tag to publish.
    pub fn emit(&self, entry: &mut kernel_rx) -> KernelRxType {
        match *self {
            KernelRxRepr::Packet { addr, len, fn_core, flow_group } => {
                entry.set_addr(addr);
                entry.set_len(len);
                entry.set_fn_core(fn_core);
                entry.set_flow_group(flow_group);
                KernelRxType::Packet
            },
        }
    }
}

impl KernelTxRepr {
    /// Parse an entry with the given tag.
    pub fn parse(tag: KernelTxType, entry: &kernel_tx) -> Result<Self> {
        entry.check_len()?;
        match tag {
            KernelTxType::Packet => Ok(KernelTxRepr::Packet {
                addr: entry.addr(),
                len: entry.len(),
            }),
            KernelTxType::PacketNoTs => Ok(KernelTxRepr::PacketNoTs {
                addr: entry.addr(),
                len: entry.len(),
            }),
            KernelTxType::ConnRetransmit => Ok(KernelTxRepr::ConnRetransmit {
                flow_id: entry.flow_id(),
            }),
            _ => Err(Error::Unrecognized),
        }
    }

    /// Write the entry fields and return the tag to publish.
    pub fn emit(&self, entry: &mut kernel_tx) -> KernelTxType {
        match *self {
            KernelTxRepr::Packet { addr, len } => {
                entry.set_addr(addr);
                entry.set_len(len);
                KernelTxType::Packet
            },
            KernelTxRepr::PacketNoTs { addr, len } => {
                entry.set_addr(addr);
                entry.set_len(len);
                KernelTxType::PacketNoTs
            },
            KernelTxRepr::ConnRetransmit { flow_id } => {
                entry.set_flow_id(flow_id);
                KernelTxType::ConnRetransmit
            },
        }
    }
}

impl Entry for KernelRx {
    const SIZE: usize = 64;
    type Repr = KernelRxRepr;

    fn parse(tag: u8, payload: &[u8]) -> Result<KernelRxRepr> {
        KernelRxRepr::parse(tag.into(), kernel_rx::new_unchecked(payload))
    }

    fn emit(repr: &KernelRxRepr, payload: &mut [u8]) -> u8 {
        repr.emit(kernel_rx::new_unchecked_mut(payload)).into()
    }
}

impl Entry for KernelTx {
    const SIZE: usize = 64;
    type Repr = KernelTxRepr;

    fn parse(tag: u8, payload: &[u8]) -> Result<KernelTxRepr> {
        KernelTxRepr::parse(tag.into(), kernel_tx::new_unchecked(payload))
    }

    fn emit(repr: &KernelTxRepr, payload: &mut [u8]) -> u8 {
        repr.emit(kernel_tx::new_unchecked_mut(payload)).into()
    }
}
