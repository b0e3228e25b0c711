/*! The binary contract of all shared-memory records.

Every actor on the shared memory (fast path, slow path, application contexts) must agree on the
byte offsets defined here. The module follows a two level scheme:

 * Lowercase byte wrappers such as [`app_tx`] give field access to a sequence of octets. They
   never own data and can be laid over a ring slot or a register block in place.
 * `Repr` types such as [`AppTxRepr`] are the compact, high-level representation that can be
   parsed from and emitted into the wrappers.

Registers shared with the host (counters, offsets, lengths) are stored in native byte order.
Addresses and ports that also appear in packet headers are kept in network byte order.

A ring slot always carries its type tag in its last byte. The tag is the publication point of the
slot and is never accessed through the byte wrappers, these only cover the payload before it. See
the [`queue`] module for the protocol.

[`app_tx`]: struct.app_tx.html
[`AppTxRepr`]: enum.AppTxRepr.html
[`queue`]: ../queue/index.html
*/
use core::fmt;

use crate::Result;

mod admin;
mod app;
mod info;
mod kernel;
mod regs;
mod state;

pub use self::admin::{
    admin_in,
    admin_out,
    AdminIn,
    AdminInRepr,
    AdminInType,
    AdminOut,
    AdminOutRepr,
    AdminOutType,
    ConnParams,
    FlowProgress,
};

pub use self::app::{
    app_rx,
    app_tx,
    AppRx,
    AppRxRepr,
    AppRxType,
    AppTx,
    AppTxRepr,
    AppTxType,
    BumpUpdate,
    ConnUpdate,
    RxFlags,
    TxFlags,
};

pub use self::info::{
    info_region,
    InfoFlags,
    InfoRepr,
};

pub use self::kernel::{
    kernel_rx,
    kernel_tx,
    KernelRx,
    KernelRxRepr,
    KernelRxType,
    KernelTx,
    KernelTxRepr,
    KernelTxType,
};

pub use self::regs::{
    app_context,
    app_state,
    AppContextRepr,
    AppStateRepr,
};

pub use self::state::StateLayout;

/// Number of application state slots, one per attached application process.
pub const APPST_NUM: usize = 8;
/// Maximum number of contexts a single application state may reference.
pub const APPST_CTX_NUM: usize = 31;
/// Maximum number of fast path cores with their own context registers.
pub const APPST_CTX_MCS: usize = 16;
/// Number of application context register blocks per core.
pub const APPCTX_NUM: usize = 16;
/// Capacity of the flow state array.
pub const FLOWST_NUM: usize = 128 * 1024;
/// Number of entries in the flow lookup table, twice the flow capacity.
pub const FLOWHT_ENTRIES: usize = FLOWST_NUM * 2;
/// Number of entries in a single lookup table bucket.
pub const FLOWHT_NBSZ: usize = 4;
/// Number of flow groups the receive-side steering table maps to cores.
pub const MAX_FLOWGROUPS: usize = 4096;

/// Size of the published information region.
pub const INFO_BYTES: usize = 0x1000;
/// Name of the shared memory object holding the information region.
pub const INFO_NAME: &str = "tas_info";
/// Name of the shared memory object holding the connection buffers.
pub const MEMORY_NAME: &str = "tas_memory";
/// Name of the shared memory object holding the internal fast path state.
pub const STATE_NAME: &str = "tas_internal";
/// Directory prefix of the buffer memory when it is backed by huge pages.
pub const HUGE_PREFIX: &str = "/dev/hugepages";

/// The tag of a slot that may be written by the producer.
pub const INVALID: u8 = 0;

/// A ring entry format.
///
/// Implemented by marker types for each queue direction. The slot size includes the trailing type
/// tag, the payload passed to `parse` and `emit` has one byte less.
pub trait Entry {
    /// The full slot size in bytes.
    const SIZE: usize;

    /// The parsed content of a slot.
    type Repr: Copy + fmt::Debug;

    /// Parse a published slot with its tag.
    fn parse(tag: u8, payload: &[u8]) -> Result<Self::Repr>;

    /// Emit the content into a free slot and return the tag that publishes it.
    ///
    /// The returned tag is never [`INVALID`].
    ///
    /// [`INVALID`]: constant.INVALID.html
    fn emit(repr: &Self::Repr, payload: &mut [u8]) -> u8;
}

pub(crate) mod field {
    pub(crate) type Field = ::core::ops::Range<usize>;
}
