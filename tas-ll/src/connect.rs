use core::fmt;
use std::sync::Arc;

use tas::fastpath::StateMemory;
use tas::layout::{info_region, InfoFlags, InfoRepr, StateLayout, INFO_NAME, MEMORY_NAME, STATE_NAME};
use tas::region::Region;
use tas::sys::{self, Errno};

use crate::config::Config;

/// Failure to attach to a fast path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectError {
    /// The fast path exists but has not finished its initialization, try again later.
    NotReady,
    /// Mapping the shared memory failed.
    Failed(Errno),
    /// The published memory does not match the expected layout.
    Layout(tas::Error),
}

/// The shared memory of a running fast path.
#[derive(Debug)]
pub struct Attachment {
    /// The published information at the time of attaching.
    pub info: InfoRepr,
    /// The connection buffer memory.
    pub buffers: Arc<Region>,
}

impl Attachment {
    /// Attach to regions that are already mapped, or allocated in this process.
    ///
    /// The information region must have its ready flag set and the buffer region must cover the
    /// published buffer size.
    pub fn from_regions(info: &Region, buffers: Arc<Region>) -> Result<Self, ConnectError> {
        // SAFETY: the fast path writes the information region once, before setting the ready
        // flag. The parsed copy is not used unless that flag is observed.
        let bytes = unsafe { info.bytes(0, info.len()) }
            .map_err(ConnectError::Layout)?;
        let info = info_region::new_checked(bytes)
            .and_then(InfoRepr::parse)
            .map_err(ConnectError::Layout)?;

        if !info.is_ready() {
            net_debug!("attach: fast path not ready");
            return Err(ConnectError::NotReady);
        }

        if (buffers.len() as u64) < info.buf_mem_size {
            return Err(ConnectError::Layout(tas::Error::Truncated));
        }

        net_debug!("attach: {} cores, {} bytes of buffers", info.cores_num, info.buf_mem_size);
        Ok(Attachment { info, buffers })
    }

    /// View a mapped internal state region of this fast path.
    ///
    /// The published state size must hold the full layout and the region must cover the
    /// published size.
    pub fn internal_state(&self, region: Arc<Region>) -> Result<StateMemory, ConnectError> {
        let layout = StateLayout::new();
        let published = self.info.state_mem_size;
        if published < layout.size as u64 || (region.len() as u64) < published {
            return Err(ConnectError::Layout(tas::Error::Truncated));
        }
        StateMemory::new(region, layout).map_err(ConnectError::Layout)
    }
}

/// Attach to the fast path of this host through its published shared memory.
///
/// A missing information region is reported as `NotReady`, the fast path may still be starting.
pub fn attach(config: &Config) -> Result<Attachment, ConnectError> {
    let published = sys::map_shm(INFO_NAME).map_err(|err| match err {
        Errno(libc::ENOENT) => ConnectError::NotReady,
        other => ConnectError::Failed(other),
    })?;

    // SAFETY: see `from_regions`, only the flags are inspected before the ready check.
    let flags = unsafe { published.bytes(0, published.len()) }
        .and_then(info_region::new_checked)
        .map(|info| info.flags())
        .map_err(ConnectError::Layout)?;
    if !flags.contains(InfoFlags::READY) {
        return Err(ConnectError::NotReady);
    }

    let buffers = if flags.contains(InfoFlags::HUGEPAGES) {
        sys::map_file(&format!("{}/{}", config.huge_prefix, MEMORY_NAME))
    } else {
        sys::map_shm(MEMORY_NAME)
    }.map_err(ConnectError::Failed)?;

    Attachment::from_regions(&published, Arc::new(buffers))
}

/// Map the internal state of the fast path, for tools and the slow path.
///
/// Applications only need [`attach`]. The state region holds the flow records, the lookup table
/// and the context registers.
///
/// [`attach`]: fn.attach.html
pub fn attach_internal(attachment: &Attachment) -> Result<StateMemory, ConnectError> {
    let region = sys::map_shm(STATE_NAME).map_err(ConnectError::Failed)?;
    net_debug!("attach: {} bytes of internal state", region.len());
    attachment.internal_state(Arc::new(region))
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConnectError::NotReady => write!(f, "fast path not ready"),
            ConnectError::Failed(errno) => write!(f, "mapping shared memory failed: {}", errno),
            ConnectError::Layout(err) => write!(f, "unexpected shared memory layout: {}", err),
        }
    }
}

impl std::error::Error for ConnectError {}

impl From<Errno> for ConnectError {
    fn from(errno: Errno) -> Self {
        ConnectError::Failed(errno)
    }
}
