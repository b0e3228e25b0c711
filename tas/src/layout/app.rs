//! Entries of the per-core queues between the fast path and an application context.
use core::ops;
use byteorder::{ByteOrder, NativeEndian};

use crate::{Error, Result};
use super::Entry;

enum_with_unknown! {
    /// Type tag of an application receive entry.
    pub doc enum AppRxType(u8) {
        /// An empty slot.
        Invalid = 0,
        /// Progress on one connection.
        ConnUpdate = 1,
    }
}

enum_with_unknown! {
    /// Type tag of an application transmit entry.
    pub doc enum AppTxType(u8) {
        /// An empty slot.
        Invalid = 0,
        /// Progress on one connection.
        ConnUpdate = 1,
    }
}

byte_wrapper! {
    /// The payload of an application receive slot, written by the fast path.
    #[derive(Debug, PartialEq, Eq)]
    pub struct app_rx([u8]);
}

byte_wrapper! {
    /// The payload of an application transmit slot, written by the application.
    #[derive(Debug, PartialEq, Eq)]
    pub struct app_tx([u8]);
}

mod field {
    use crate::layout::field::*;

    pub(crate) mod rx {
        use super::Field;
        pub(crate) const OPAQUE:  Field =  0..8;
        pub(crate) const RX_BUMP: Field =  8..12;
        pub(crate) const RX_POS:  Field = 12..16;
        pub(crate) const TX_BUMP: Field = 16..20;
        pub(crate) const FLAGS:   usize = 20;
    }

    pub(crate) mod tx {
        use super::Field;
        pub(crate) const RX_BUMP:  Field =  0..4;
        pub(crate) const TX_BUMP:  Field =  4..8;
        pub(crate) const FLOW_ID:  Field =  8..12;
        pub(crate) const BUMP_SEQ: Field = 12..14;
        pub(crate) const FLAGS:    usize = 14;
    }
}

/// Flags the fast path sets on a connection update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RxFlags(u8);

impl RxFlags {
    /// The peer closed its direction, no more data will be received.
    pub const RXDONE: RxFlags = RxFlags(1);
    /// All data including the end of stream have been acknowledged by the peer.
    pub const TXDONE: RxFlags = RxFlags(2);

    /// No flags set.
    pub const fn empty() -> Self {
        RxFlags(0)
    }

    /// Flags from their raw representation, unknown bits are kept.
    pub fn from_bits(bits: u8) -> Self {
        RxFlags(bits)
    }

    /// The raw representation.
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Whether all flags of `other` are set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl ops::BitOr for RxFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        RxFlags(self.0 | rhs.0)
    }
}

/// Flags an application sets on a bump.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TxFlags(u8);

impl TxFlags {
    /// The application will not send any more data after the bumped bytes.
    pub const TXDONE: TxFlags = TxFlags(1);

    /// No flags set.
    pub const fn empty() -> Self {
        TxFlags(0)
    }

    /// Flags from their raw representation, unknown bits are kept.
    pub fn from_bits(bits: u8) -> Self {
        TxFlags(bits)
    }

    /// The raw representation.
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Whether all flags of `other` are set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

/// A progress notification of the fast path for one connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConnUpdate {
    /// The application's handle for the connection.
    pub opaque: u64,
    /// Bytes of in-order data newly available in the receive buffer.
    pub rx_bump: u32,
    /// Position in the receive buffer of the first new byte.
    pub rx_pos: u32,
    /// Bytes of the transmit buffer newly acknowledged by the peer.
    pub tx_bump: u32,
    /// Connection state changes reported with this update.
    pub flags: RxFlags,
}

/// A progress notification of an application for one connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BumpUpdate {
    /// The fast path flow the bump applies to.
    pub flow_id: u32,
    /// Bytes the application consumed from the receive buffer.
    pub rx_bump: u32,
    /// Bytes the application appended to the transmit buffer.
    pub tx_bump: u32,
    /// The sequence of this bump, strictly increasing per connection.
    pub bump_seq: u16,
    /// Connection state changes requested with this bump.
    pub flags: TxFlags,
}

/// A parsed entry of the fast path to application queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppRxRepr {
    /// Progress on a connection.
    ConnUpdate(ConnUpdate),
}

/// A parsed entry of the application to fast path queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppTxRepr {
    /// An application consumed or produced data.
    ConnUpdate(BumpUpdate),
}

/// Marker for the fast path to application queue.
#[derive(Clone, Copy, Debug)]
pub enum AppRx { }

/// Marker for the application to fast path queue.
#[derive(Clone, Copy, Debug)]
pub enum AppTx { }

impl app_rx {
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
        if self.0.len() <= field::rx::FLAGS {
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    /// Return the opaque connection handle.
    pub fn opaque(&self) -> u64 {
        NativeEndian::read_u64(&self.0[field::rx::OPAQUE])
    }

    /// Return the receive bump.
    pub fn rx_bump(&self) -> u32 {
        NativeEndian::read_u32(&self.0[field::rx::RX_BUMP])
    }

    /// Return the receive position.
    pub fn rx_pos(&self) -> u32 {
        NativeEndian::read_u32(&self.0[field::rx::RX_POS])
    }

    /// Return the transmit bump.
    pub fn tx_bump(&self) -> u32 {
        NativeEndian::read_u32(&self.0[field::rx::TX_BUMP])
    }

    /// Return the flags.
    pub fn flags(&self) -> RxFlags {
        RxFlags(self.0[field::rx::FLAGS])
    }

    /// Set the opaque connection handle.
    pub fn set_opaque(&mut self, value: u64) {
        NativeEndian::write_u64(&mut self.0[field::rx::OPAQUE], value)
    }

    /// Set the receive bump.
    pub fn set_rx_bump(&mut self, value: u32) {
        NativeEndian::write_u32(&mut self.0[field::rx::RX_BUMP], value)
    }

    /// Set the receive position.
    pub fn set_rx_pos(&mut self, value: u32) {
        NativeEndian::write_u32(&mut self.0[field::rx::RX_POS], value)
    }

    /// Set the transmit bump.
    pub fn set_tx_bump(&mut self, value: u32) {
        NativeEndian::write_u32(&mut self.0[field::rx::TX_BUMP], value)
    }

    /// Set the flags.
    pub fn set_flags(&mut self, value: RxFlags) {
        self.0[field::rx::FLAGS] = value.0
    }
}

impl app_tx {
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
        if self.0.len() <= field::tx::FLAGS {
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    /// Return the receive bump.
    pub fn rx_bump(&self) -> u32 {
        NativeEndian::read_u32(&self.0[field::tx::RX_BUMP])
    }

    /// Return the transmit bump.
    pub fn tx_bump(&self) -> u32 {
        NativeEndian::read_u32(&self.0[field::tx::TX_BUMP])
    }

    /// Return the flow id.
    pub fn flow_id(&self) -> u32 {
        NativeEndian::read_u32(&self.0[field::tx::FLOW_ID])
    }

    /// Return the bump sequence.
    pub fn bump_seq(&self) -> u16 {
        NativeEndian::read_u16(&self.0[field::tx::BUMP_SEQ])
    }

    /// Return the flags.
    pub fn flags(&self) -> TxFlags {
        TxFlags(self.0[field::tx::FLAGS])
    }

    /// Set the receive bump.
    pub fn set_rx_bump(&mut self, value: u32) {
        NativeEndian::write_u32(&mut self.0[field::tx::RX_BUMP], value)
    }

    /// Set the transmit bump.
    pub fn set_tx_bump(&mut self, value: u32) {
        NativeEndian::write_u32(&mut self.0[field::tx::TX_BUMP], value)
    }

    /// Set the flow id.
    pub fn set_flow_id(&mut self, value: u32) {
        NativeEndian::write_u32(&mut self.0[field::tx::FLOW_ID], value)
    }

    /// Set the bump sequence.
    pub fn set_bump_seq(&mut self, value: u16) {
        NativeEndian::write_u16(&mut self.0[field::tx::BUMP_SEQ], value)
    }

    /// Set the flags.
    pub fn set_flags(&mut self, value: TxFlags) {
        self.0[field::tx::FLAGS] = value.0
    }
}

impl AppRxRepr {
    /// Parse an entry with the given tag.
    pub fn parse(tag: AppRxType, entry: &app_rx) -> Result<Self> {
        entry.check_len()?;
        match tag {
            AppRxType::ConnUpdate => Ok(AppRxRepr::ConnUpdate(ConnUpdate {
                opaque: entry.opaque(),
                rx_bump: entry.rx_bump(),
                rx_pos: entry.rx_pos(),
                tx_bump: entry.tx_bump(),
                flags: entry.flags(),
            })),
            _ => Err(Error::Unrecognized),
        }
    }

    /// Write the entry fields and return the tag to publish.
    pub fn emit(&self, entry: &mut app_rx) -> AppRxType {
        match self {
            AppRxRepr::ConnUpdate(update) => {
                entry.set_opaque(update.opaque);
                entry.set_rx_bump(update.rx_bump);
                entry.set_rx_pos(update.rx_pos);
                entry.set_tx_bump(update.tx_bump);
                entry.set_flags(update.flags);
                AppRxType::ConnUpdate
            },
        }
    }
}

impl AppTxRepr {
    /// Parse an entry with the given tag.
    pub fn parse(tag: AppTxType, entry: &app_tx) -> Result<Self> {
        entry.check_len()?;
        match tag {
            AppTxType::ConnUpdate => Ok(AppTxRepr::ConnUpdate(BumpUpdate {
                flow_id: entry.flow_id(),
                rx_bump: entry.rx_bump(),
                tx_bump: entry.tx_bump(),
                bump_seq: entry.bump_seq(),
                flags: entry.flags(),
            })),
            _ => Err(Error::Unrecognized),
        }
    }

    /// Write the entry fields and return the tag to publish.
    pub fn emit(&self, entry: &mut app_tx) -> AppTxType {
        match self {
            AppTxRepr::ConnUpdate(bump) => {
                entry.set_rx_bump(bump.rx_bump);
                entry.set_tx_bump(bump.tx_bump);
                entry.set_flow_id(bump.flow_id);
                entry.set_bump_seq(bump.bump_seq);
                entry.set_flags(bump.flags);
                AppTxType::ConnUpdate
            },
        }
    }
}

impl Entry for AppRx {
    const SIZE: usize = 32;
    type Repr = AppRxRepr;

    fn parse(tag: u8, payload: &[u8]) -> Result<AppRxRepr> {
        AppRxRepr::parse(tag.into(), app_rx::new_unchecked(payload))
    }

    fn emit(repr: &AppRxRepr, payload: &mut [u8]) -> u8 {
        repr.emit(app_rx::new_unchecked_mut(payload)).into()
    }
}

impl Entry for AppTx {
    const SIZE: usize = 16;
    type Repr = AppTxRepr;

    fn parse(tag: u8, payload: &[u8]) -> Result<AppTxRepr> {
        AppTxRepr::parse(tag.into(), app_tx::new_unchecked(payload))
    }

    fn emit(repr: &AppTxRepr, payload: &mut [u8]) -> u8 {
        repr.emit(app_tx::new_unchecked_mut(payload)).into()
    }
}
