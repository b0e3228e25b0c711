use std::time::Duration;

use tas::layout::{InfoRepr, HUGE_PREFIX};

/// Tunables of an application context.
///
/// All values have working defaults. A configuration is usually derived from the information
/// region of the fast path with [`Config::from_info`] and then adjusted with the setters.
///
/// [`Config::from_info`]: #method.from_info
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Number of fast path cores, one queue pair each.
    pub cores: u16,
    /// Slots of each fast path to application queue.
    pub rxq_len: u32,
    /// Slots of each application to fast path queue.
    pub txq_len: u32,
    /// Slots of each administrative queue.
    pub admin_len: u32,
    /// Maximum number of queue entries taken from one queue in one poll.
    pub poll_batch: usize,
    /// A fast path core idle for longer than this is woken after a bump.
    pub kick_threshold: Duration,
    /// Directory of the buffer memory when backed by huge pages.
    pub huge_prefix: String,
}

impl Config {
    /// Match the core count of a running fast path.
    pub fn from_info(info: &InfoRepr) -> Self {
        Config {
            cores: u16::try_from(info.cores_num).unwrap_or(u16::MAX),
            ..Config::default()
        }
    }

    pub fn with_cores(mut self, cores: u16) -> Self {
        self.cores = cores;
        self
    }

    pub fn with_queue_lengths(mut self, rxq_len: u32, txq_len: u32) -> Self {
        self.rxq_len = rxq_len;
        self.txq_len = txq_len;
        self
    }

    pub fn with_admin_len(mut self, admin_len: u32) -> Self {
        self.admin_len = admin_len;
        self
    }

    pub fn with_poll_batch(mut self, poll_batch: usize) -> Self {
        self.poll_batch = poll_batch;
        self
    }

    pub fn with_kick_threshold(mut self, threshold: Duration) -> Self {
        self.kick_threshold = threshold;
        self
    }

    pub fn with_huge_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.huge_prefix = prefix.into();
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cores: 1,
            rxq_len: 256,
            txq_len: 256,
            admin_len: 64,
            poll_batch: 32,
            kick_threshold: Duration::from_micros(10),
            huge_prefix: HUGE_PREFIX.to_string(),
        }
    }
}
