//! Register blocks of application contexts and application states.
use byteorder::{ByteOrder, NativeEndian};

use crate::{Error, Result};
use super::APPST_CTX_NUM;

byte_wrapper! {
    /// The registers of an application context on one fast path core.
    ///
    /// The base and length fields locate the context's receive and transmit queues in the buffer
    /// memory and are only written by the slow path while the context is being registered. The
    /// head and timestamp fields are the fast path's working copy.
    #[derive(Debug, PartialEq, Eq)]
    pub struct app_context([u8]);
}

byte_wrapper! {
    /// The list of contexts of one application.
    #[derive(Debug, PartialEq, Eq)]
    pub struct app_state([u8]);
}

mod field {
    use crate::layout::field::*;

    pub(crate) const RX_BASE:  Field =  0..8;
    pub(crate) const TX_BASE:  Field =  8..16;
    pub(crate) const RX_LEN:   Field = 16..20;
    pub(crate) const TX_LEN:   Field = 20..24;
    pub(crate) const APPST_ID: Field = 24..28;
    pub(crate) const EVFD:     Field = 28..32;
    pub(crate) const RX_HEAD:  Field = 32..36;
    pub(crate) const TX_HEAD:  Field = 36..40;
    pub(crate) const LAST_TS:  Field = 40..44;
    pub(crate) const RX_AVAIL: Field = 44..48;

    pub(crate) const CTX_NUM:  Field = 0..2;
    pub(crate) const CTX_IDS:  usize = 2;
}

/// Size of one context register block.
pub(crate) const APPCTX_BYTES: usize = field::RX_AVAIL.end;
/// Size of one application state block.
pub(crate) const APPST_BYTES: usize = field::CTX_IDS + 2 * APPST_CTX_NUM;

/// High-level representation of a context register block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AppContextRepr {
    /// Offset of the receive queue in the buffer memory.
    pub rx_base: u64,
    /// Offset of the transmit queue in the buffer memory.
    pub tx_base: u64,
    /// Size of the receive queue in bytes.
    pub rx_len: u32,
    /// Size of the transmit queue in bytes.
    pub tx_len: u32,
    /// The application state this context belongs to.
    pub appst_id: u32,
    /// The event file descriptor used to wake the application, negative if none.
    pub evfd: i32,
    /// Byte offset of the next receive slot the fast path writes.
    pub rx_head: u32,
    /// Byte offset of the next transmit slot the fast path reads.
    pub tx_head: u32,
    /// Time of the last wakeup sent to the application.
    pub last_ts: u32,
    /// Free bytes in the receive queue as last seen by the fast path.
    pub rx_avail: u32,
}

/// High-level representation of an application state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AppStateRepr {
    /// Number of valid entries in `ctx_ids`.
    pub ctx_num: u16,
    /// Ids of the contexts, the first `ctx_num` are valid.
    pub ctx_ids: [u16; APPST_CTX_NUM],
}

impl app_context {
    /// Wrap a register block without checking its length.
    pub fn new_unchecked(data: &[u8]) -> &Self {
        Self::__from_macro_new_unchecked(data)
    }

    /// Wrap a mutable register block without checking its length.
    pub fn new_unchecked_mut(data: &mut [u8]) -> &mut Self {
        Self::__from_macro_new_unchecked_mut(data)
    }

    /// Wrap a register block after checking its length.
    pub fn new_checked(data: &[u8]) -> Result<&Self> {
        Self::new_unchecked(data).check_len()?;
        Ok(Self::new_unchecked(data))
    }

    /// Wrap a mutable register block after checking its length.
    pub fn new_checked_mut(data: &mut [u8]) -> Result<&mut Self> {
        Self::new_checked(&data[..])?;
        Ok(Self::new_unchecked_mut(data))
    }

    /// Ensure the block holds all fields.
    pub fn check_len(&self) -> Result<()> {
        if self.0.len() < APPCTX_BYTES {
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    /// Return the receive head.
    pub fn rx_head(&self) -> u32 {
        NativeEndian::read_u32(&self.0[field::RX_HEAD])
    }

    /// Return the transmit head.
    pub fn tx_head(&self) -> u32 {
        NativeEndian::read_u32(&self.0[field::TX_HEAD])
    }

    /// Return the last wakeup time.
    pub fn last_ts(&self) -> u32 {
        NativeEndian::read_u32(&self.0[field::LAST_TS])
    }

    /// Set the receive head.
    pub fn set_rx_head(&mut self, value: u32) {
        NativeEndian::write_u32(&mut self.0[field::RX_HEAD], value)
    }

    /// Set the transmit head.
    pub fn set_tx_head(&mut self, value: u32) {
        NativeEndian::write_u32(&mut self.0[field::TX_HEAD], value)
    }

    /// Set the last wakeup time.
    pub fn set_last_ts(&mut self, value: u32) {
        NativeEndian::write_u32(&mut self.0[field::LAST_TS], value)
    }
}

impl AppContextRepr {
    /// Read all fields of the block.
    pub fn parse(regs: &app_context) -> Result<Self> {
        regs.check_len()?;
        Ok(AppContextRepr {
            rx_base: NativeEndian::read_u64(&regs.0[field::RX_BASE]),
            tx_base: NativeEndian::read_u64(&regs.0[field::TX_BASE]),
            rx_len: NativeEndian::read_u32(&regs.0[field::RX_LEN]),
            tx_len: NativeEndian::read_u32(&regs.0[field::TX_LEN]),
            appst_id: NativeEndian::read_u32(&regs.0[field::APPST_ID]),
            evfd: NativeEndian::read_i32(&regs.0[field::EVFD]),
            rx_head: regs.rx_head(),
            tx_head: regs.tx_head(),
            last_ts: regs.last_ts(),
            rx_avail: NativeEndian::read_u32(&regs.0[field::RX_AVAIL]),
        })
    }

    /// Write all fields to the block.
    pub fn emit(&self, regs: &mut app_context) {
        NativeEndian::write_u64(&mut regs.0[field::RX_BASE], self.rx_base);
        NativeEndian::write_u64(&mut regs.0[field::TX_BASE], self.tx_base);
        NativeEndian::write_u32(&mut regs.0[field::RX_LEN], self.rx_len);
        NativeEndian::write_u32(&mut regs.0[field::TX_LEN], self.tx_len);
        NativeEndian::write_u32(&mut regs.0[field::APPST_ID], self.appst_id);
        NativeEndian::write_i32(&mut regs.0[field::EVFD], self.evfd);
        regs.set_rx_head(self.rx_head);
        regs.set_tx_head(self.tx_head);
        regs.set_last_ts(self.last_ts);
        NativeEndian::write_u32(&mut regs.0[field::RX_AVAIL], self.rx_avail);
    }
}

impl app_state {
    /// Wrap a register block without checking its length.
    pub fn new_unchecked(data: &[u8]) -> &Self {
        Self::__from_macro_new_unchecked(data)
    }

    /// Wrap a mutable register block without checking its length.
    pub fn new_unchecked_mut(data: &mut [u8]) -> &mut Self {
        Self::__from_macro_new_unchecked_mut(data)
    }

    /// Ensure the block holds all fields.
    pub fn check_len(&self) -> Result<()> {
        if self.0.len() < APPST_BYTES {
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    /// Return the number of registered contexts.
    pub fn ctx_num(&self) -> u16 {
        NativeEndian::read_u16(&self.0[field::CTX_NUM])
    }

    /// The context id at `idx`.
    ///
    /// # Panics
    /// This function panics if `idx` is not smaller than the maximum number of contexts.
    pub fn ctx_id(&self, idx: usize) -> u16 {
        assert!(idx < APPST_CTX_NUM);
        let start = field::CTX_IDS + 2*idx;
        NativeEndian::read_u16(&self.0[start..start + 2])
    }
}

impl AppStateRepr {
    /// Read all fields of the block.
    pub fn parse(state: &app_state) -> Result<Self> {
        state.check_len()?;
        let ctx_num = state.ctx_num();
        if usize::from(ctx_num) > APPST_CTX_NUM {
            return Err(Error::Illegal);
        }

        let mut ctx_ids = [0; APPST_CTX_NUM];
        for (idx, id) in ctx_ids.iter_mut().enumerate() {
            *id = state.ctx_id(idx);
        }

        Ok(AppStateRepr { ctx_num, ctx_ids })
    }

    /// Write all fields to the block.
    pub fn emit(&self, state: &mut app_state) {
        NativeEndian::write_u16(&mut state.0[field::CTX_NUM], self.ctx_num);
        for (idx, id) in self.ctx_ids.iter().enumerate() {
            let start = field::CTX_IDS + 2*idx;
            NativeEndian::write_u16(&mut state.0[start..start + 2], *id);
        }
    }

    /// The ids of the registered contexts.
    pub fn contexts(&self) -> &[u16] {
        &self.ctx_ids[..usize::from(self.ctx_num).min(APPST_CTX_NUM)]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn block_sizes() {
        assert_eq!(APPCTX_BYTES, 48);
        assert_eq!(APPST_BYTES, 64);
    }

    #[test]
    fn context_heads() {
        let mut bytes = [0u8; 48];
        let repr = AppContextRepr {
            rx_base: 0x1000,
            tx_base: 0x2000,
            rx_len: 1024,
            tx_len: 1024,
            appst_id: 2,
            evfd: -1,
            ..AppContextRepr::default()
        };
        repr.emit(app_context::new_checked_mut(&mut bytes).unwrap());
        let regs = app_context::new_checked_mut(&mut bytes).unwrap();
        regs.set_tx_head(96);
        assert_eq!(NativeEndian::read_u32(&bytes[36..40]), 96);
        let parsed = AppContextRepr::parse(app_context::new_unchecked(&bytes)).unwrap();
        assert_eq!(parsed.evfd, -1);
        assert_eq!(parsed.tx_head, 96);
    }

    #[test]
    fn too_many_contexts() {
        let mut bytes = [0u8; 64];
        NativeEndian::write_u16(&mut bytes[0..2], 32);
        assert_eq!(AppStateRepr::parse(app_state::new_unchecked(&bytes)), Err(Error::Illegal));
    }
}
