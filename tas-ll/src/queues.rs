use std::os::unix::io::RawFd;

use tas::layout::{AdminIn, AdminOut, AppRx, AppTx};
use tas::queue::{channel, Consumer, Producer};
use tas::sys::EventFd;
use tas::Result;

use crate::config::Config;

/// The queue pair of a context towards one fast path core.
pub struct CoreQueues {
    /// Bumps to the fast path.
    pub tx: Producer<AppTx>,
    /// Notifications from the fast path.
    pub rx: Consumer<AppRx>,
    /// Event descriptor that wakes the core when it sleeps.
    pub kick: Option<RawFd>,
}

/// All queue endpoints owned by an application context.
pub struct ContextQueues {
    /// The doorbell id under which the fast path knows this context.
    pub db_id: u16,
    pub admin_out: Producer<AdminOut>,
    pub admin_in: Consumer<AdminIn>,
    /// One pair per fast path core, indexed by core.
    pub cores: Vec<CoreQueues>,
    /// Signalled by the other actors when there is something to poll.
    pub event: Option<EventFd>,
}

/// The other ends of a context's queues, for the fast and slow path.
pub struct PeerQueues {
    pub db_id: u16,
    pub admin_out: Consumer<AdminOut>,
    pub admin_in: Producer<AdminIn>,
    /// Notification producer and bump consumer per core, for `FastPath::attach_context`.
    pub cores: Vec<(Producer<AppRx>, Consumer<AppTx>)>,
}

impl CoreQueues {
    pub fn with_kick(mut self, fd: RawFd) -> Self {
        self.kick = Some(fd);
        self
    }
}

impl ContextQueues {
    pub fn with_event(mut self, event: EventFd) -> Self {
        self.event = Some(event);
        self
    }
}

/// Create the queues of a new context in heap regions.
///
/// The lengths are taken from the configuration, one queue pair is created per core.
pub fn channels(config: &Config, db_id: u16) -> Result<(ContextQueues, PeerQueues)> {
    let (admin_out, admin_out_peer) = channel::<AdminOut>(config.admin_len)?;
    let (admin_in_peer, admin_in) = channel::<AdminIn>(config.admin_len)?;

    let mut cores = Vec::with_capacity(usize::from(config.cores));
    let mut peer_cores = Vec::with_capacity(usize::from(config.cores));
    for _ in 0..config.cores {
        let (tx, tx_peer) = channel::<AppTx>(config.txq_len)?;
        let (rx_peer, rx) = channel::<AppRx>(config.rxq_len)?;
        cores.push(CoreQueues { tx, rx, kick: None });
        peer_cores.push((rx_peer, tx_peer));
    }

    let queues = ContextQueues {
        db_id,
        admin_out,
        admin_in,
        cores,
        event: None,
    };
    let peer = PeerQueues {
        db_id,
        admin_out: admin_out_peer,
        admin_in: admin_in_peer,
        cores: peer_cores,
    };
    Ok((queues, peer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tas::layout::{AdminOutRepr, AppTxRepr, BumpUpdate, TxFlags};

    #[test]
    fn both_ends_connected() {
        let config = Config::default().with_cores(2).with_queue_lengths(4, 2);
        let (mut queues, mut peer) = channels(&config, 3).unwrap();
        assert_eq!(queues.cores.len(), 2);
        assert_eq!(peer.db_id, 3);
        assert_eq!(queues.cores[1].tx.capacity(), 2);
        assert_eq!(queues.cores[1].rx.capacity(), 4);

        let request = AdminOutRepr::ConnClose { opaque: 1, flow_id: 2, reset: false };
        queues.admin_out.push(&request).unwrap();
        assert_eq!(peer.admin_out.pop(), Ok(Some(request)));

        let bump = AppTxRepr::ConnUpdate(BumpUpdate {
            flow_id: 2,
            rx_bump: 0,
            tx_bump: 10,
            bump_seq: 1,
            flags: TxFlags::empty(),
        });
        queues.cores[1].tx.push(&bump).unwrap();
        assert_eq!(peer.cores[0].1.pop(), Ok(None));
        assert_eq!(peer.cores[1].1.pop(), Ok(Some(bump)));
    }
}
