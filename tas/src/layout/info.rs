//! The information region describing the other shared memory regions.
use core::ops;
use byteorder::{ByteOrder, NativeEndian};

use crate::{Error, Result};

byte_wrapper! {
    /// The information region published by the fast path.
    ///
    /// Applications read it once when attaching to learn the sizes of the other regions.
    #[derive(Debug, PartialEq, Eq)]
    pub struct info_region([u8]);
}

mod field {
    use crate::layout::field::*;

    pub(crate) const FLAGS:          Field =  0..8;
    pub(crate) const BUF_MEM_SIZE:   Field =  8..16;
    pub(crate) const STATE_MEM_SIZE: Field = 16..24;
    pub(crate) const MAC_ADDRESS:    Field = 24..30;
    // 30..32 padding of the 64-bit MAC register
    pub(crate) const QMQ_NUM:        Field = 32..36;
    pub(crate) const CORES_NUM:      Field = 36..40;
}

/// Flags of the information region.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct InfoFlags(u64);

impl InfoFlags {
    /// Initialization has finished, all regions are valid.
    pub const READY: InfoFlags = InfoFlags(1);
    /// The buffer memory is backed by huge pages.
    pub const HUGEPAGES: InfoFlags = InfoFlags(2);

    /// Create flags from the raw register value.
    pub fn from_bits(bits: u64) -> Self {
        InfoFlags(bits)
    }

    /// The raw register value.
    pub fn bits(self) -> u64 {
        self.0
    }

    /// Test if all bits of `other` are set.
    pub fn contains(self, other: InfoFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl ops::BitOr for InfoFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        InfoFlags(self.0 | rhs.0)
    }
}

impl info_region {
    /// Imbue a raw octet buffer with information region structure.
    pub fn new_unchecked(data: &[u8]) -> &Self {
        Self::__from_macro_new_unchecked(data)
    }

    /// Imbue a mutable octet buffer with information region structure.
    pub fn new_unchecked_mut(data: &mut [u8]) -> &mut Self {
        Self::__from_macro_new_unchecked_mut(data)
    }

    /// Shorthand for a combination of `new_unchecked` and `check_len`.
    pub fn new_checked(data: &[u8]) -> Result<&Self> {
        Self::new_unchecked(data).check_len()?;
        Ok(Self::new_unchecked(data))
    }

    /// Shorthand for a combination of `new_unchecked_mut` and `check_len`.
    pub fn new_checked_mut(data: &mut [u8]) -> Result<&mut Self> {
        Self::new_checked(&data[..])?;
        Ok(Self::new_unchecked_mut(data))
    }

    /// Ensure that no accessor method will panic if called.
    pub fn check_len(&self) -> Result<()> {
        if self.0.len() < field::CORES_NUM.end {
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    /// Return the flags.
    pub fn flags(&self) -> InfoFlags {
        InfoFlags(NativeEndian::read_u64(&self.0[field::FLAGS]))
    }

    /// Return the size of the buffer memory.
    pub fn buf_mem_size(&self) -> u64 {
        NativeEndian::read_u64(&self.0[field::BUF_MEM_SIZE])
    }

    /// Return the size of the internal state memory.
    pub fn state_mem_size(&self) -> u64 {
        NativeEndian::read_u64(&self.0[field::STATE_MEM_SIZE])
    }

    /// Return the MAC address of the interface.
    pub fn mac_address(&self) -> [u8; 6] {
        let mut mac = [0; 6];
        mac.copy_from_slice(&self.0[field::MAC_ADDRESS]);
        mac
    }

    /// Return the number of queue manager queues.
    pub fn qmq_num(&self) -> u32 {
        NativeEndian::read_u32(&self.0[field::QMQ_NUM])
    }

    /// Return the number of fast path cores.
    pub fn cores_num(&self) -> u32 {
        NativeEndian::read_u32(&self.0[field::CORES_NUM])
    }

    /// Set the flags.
    pub fn set_flags(&mut self, value: InfoFlags) {
        NativeEndian::write_u64(&mut self.0[field::FLAGS], value.0)
    }

    /// Set the size of the buffer memory.
    pub fn set_buf_mem_size(&mut self, value: u64) {
        NativeEndian::write_u64(&mut self.0[field::BUF_MEM_SIZE], value)
    }

    /// Set the size of the internal state memory.
    pub fn set_state_mem_size(&mut self, value: u64) {
        NativeEndian::write_u64(&mut self.0[field::STATE_MEM_SIZE], value)
    }

    /// Set the MAC address and clear the register padding.
    pub fn set_mac_address(&mut self, value: [u8; 6]) {
        self.0[field::MAC_ADDRESS].copy_from_slice(&value);
        self.0[field::MAC_ADDRESS.end..field::QMQ_NUM.start].copy_from_slice(&[0; 2]);
    }

    /// Set the number of queue manager queues.
    pub fn set_qmq_num(&mut self, value: u32) {
        NativeEndian::write_u32(&mut self.0[field::QMQ_NUM], value)
    }

    /// Set the number of fast path cores.
    pub fn set_cores_num(&mut self, value: u32) {
        NativeEndian::write_u32(&mut self.0[field::CORES_NUM], value)
    }
}

/// High-level representation of the information region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InfoRepr {
    /// Readiness and memory flags.
    pub flags: InfoFlags,
    /// Size of the buffer memory in bytes.
    pub buf_mem_size: u64,
    /// Size of the internal state memory in bytes.
    pub state_mem_size: u64,
    /// MAC address of the interface.
    pub mac_address: [u8; 6],
    /// Number of queue manager queues.
    pub qmq_num: u32,
    /// Number of fast path cores.
    pub cores_num: u32,
}

impl InfoRepr {
    /// Read all fields of the region.
    pub fn parse(region: &info_region) -> Result<Self> {
        region.check_len()?;
        Ok(InfoRepr {
            flags: region.flags(),
            buf_mem_size: region.buf_mem_size(),
            state_mem_size: region.state_mem_size(),
            mac_address: region.mac_address(),
            qmq_num: region.qmq_num(),
            cores_num: region.cores_num(),
        })
    }

    /// Emit all fields.
    ///
    /// The flags are written last. A reader that polls the flags for readiness must only observe
    /// `READY` after the sizes, which additionally requires a release store or fence by the
    /// caller when the region is concurrently observed.
    pub fn emit(&self, region: &mut info_region) {
        region.set_buf_mem_size(self.buf_mem_size);
        region.set_state_mem_size(self.state_mem_size);
        region.set_mac_address(self.mac_address);
        region.set_qmq_num(self.qmq_num);
        region.set_cores_num(self.cores_num);
        region.set_flags(self.flags);
    }

    /// Whether the fast path finished initialization.
    pub fn is_ready(&self) -> bool {
        self.flags.contains(InfoFlags::READY)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn offsets() {
        let mut bytes = [0u8; 64];
        let repr = InfoRepr {
            flags: InfoFlags::READY | InfoFlags::HUGEPAGES,
            buf_mem_size: 1 << 30,
            state_mem_size: 0x1234,
            mac_address: [2, 0, 0, 0, 0, 1],
            qmq_num: 128,
            cores_num: 4,
        };
        repr.emit(info_region::new_checked_mut(&mut bytes).unwrap());
        assert_eq!(NativeEndian::read_u64(&bytes[0..8]), 3);
        assert_eq!(NativeEndian::read_u64(&bytes[8..16]), 1 << 30);
        assert_eq!(&bytes[24..30], &[2, 0, 0, 0, 0, 1]);
        assert_eq!(NativeEndian::read_u32(&bytes[36..40]), 4);

        let parsed = InfoRepr::parse(info_region::new_unchecked(&bytes)).unwrap();
        assert_eq!(parsed, repr);
        assert!(parsed.is_ready());
    }

    #[test]
    fn truncated() {
        let bytes = [0u8; 39];
        assert_eq!(info_region::new_checked(&bytes).err(), Some(Error::Truncated));
    }
}
