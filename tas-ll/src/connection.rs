use core::{fmt, ops};
use std::net::Ipv4Addr;

use tas::layout::{ConnParams, ConnUpdate, FlowProgress};
use tas::storage::{RxBuffer, TxBuffer};
use tas::{Error, Result};

/// The administrative state of a connection.
///
/// Requests move a connection into one of the `Requested` states, the matching completion moves
/// it on. Only one request may be outstanding at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConnState {
    Closed,
    OpenRequested,
    AcceptRequested,
    Open,
    CloseRequested,
}

/// The half-close and move flags of a connection.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ConnFlags(u8);

/// A connection of an application context.
///
/// Owned by the context's arena, or in transit between two contexts during a move.
#[derive(Debug)]
pub struct Connection {
    state: ConnState,
    flags: ConnFlags,
    io: Option<ConnIo>,
    local: (Ipv4Addr, u16),
    remote: (Ipv4Addr, u16),
    seq_rx: u32,
    seq_tx: u32,
    flow_id: u32,
    fn_core: u16,
    bump_seq: u16,
    pending: bool,
    /// Notifications that arrived while the move was incomplete.
    held: Vec<ConnUpdate>,
}

/// Buffers of an established connection.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ConnIo {
    pub(crate) rx: RxBuffer,
    pub(crate) tx: TxBuffer,
    pub(crate) rx_base: u64,
    pub(crate) tx_base: u64,
    /// Sequence number of the next byte a notification will report as received.
    pub(crate) rx_seq: u32,
    /// Sequence number after the last byte a notification reported as acknowledged.
    pub(crate) tx_acked: u32,
}

/// What a completed move had to catch up on.
///
/// Notifications for a connection in transit can be dropped by the old context, and bumps it sent
/// can be discarded as stale by the fast path. The state of the flow at the move reveals both.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Resync {
    /// Received bytes never reported, as position and length.
    pub(crate) received: Option<(u32, u32)>,
    /// Acknowledged bytes never reported.
    pub(crate) acked: u32,
    /// The peer's close was never reported.
    pub(crate) rx_closed: bool,
    /// The completion of our close was never reported.
    pub(crate) tx_closed: bool,
    /// Receive bumps to send again.
    pub(crate) rx_lost: u32,
    /// Transmit bumps to send again.
    pub(crate) tx_lost: u32,
}

impl ConnFlags {
    /// The application closed its sending direction.
    pub const TXEOS: ConnFlags = ConnFlags(1);
    /// The close was allocated a place in the transmit stream.
    ///
    /// While this is set the close waits for earlier bytes to be sent before it is reported.
    pub const TXEOS_ALLOC: ConnFlags = ConnFlags(2);
    /// The peer acknowledged the close.
    pub const TXEOS_ACK: ConnFlags = ConnFlags(4);
    /// The peer closed its sending direction.
    pub const RXEOS: ConnFlags = ConnFlags(8);
    /// A move to another context is in progress.
    pub const MOVING: ConnFlags = ConnFlags(16);

    pub const fn empty() -> Self {
        ConnFlags(0)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl ops::BitOr for ConnFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        ConnFlags(self.0 | rhs.0)
    }
}

impl fmt::Debug for ConnFlags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let names = [
            (ConnFlags::TXEOS, "TXEOS"),
            (ConnFlags::TXEOS_ALLOC, "TXEOS_ALLOC"),
            (ConnFlags::TXEOS_ACK, "TXEOS_ACK"),
            (ConnFlags::RXEOS, "RXEOS"),
            (ConnFlags::MOVING, "MOVING"),
        ];
        let mut list = f.debug_set();
        for (flag, name) in names.iter() {
            if self.contains(*flag) {
                list.entry(name);
            }
        }
        list.finish()
    }
}

impl Connection {
    /// A connection waiting for its open or accept to complete.
    pub(crate) fn requested(state: ConnState) -> Self {
        Connection {
            state,
            flags: ConnFlags::empty(),
            io: None,
            local: (Ipv4Addr::UNSPECIFIED, 0),
            remote: (Ipv4Addr::UNSPECIFIED, 0),
            seq_rx: 0,
            seq_tx: 0,
            flow_id: 0,
            fn_core: 0,
            bump_seq: 0,
            pending: false,
            held: Vec::new(),
        }
    }

    /// Complete an open or accept with the parameters chosen by the slow path.
    pub(crate) fn establish(&mut self, params: &ConnParams) -> Result<()> {
        self.io = Some(ConnIo {
            rx: RxBuffer::new(params.rx_len)?,
            tx: TxBuffer::new(params.tx_len)?,
            rx_base: params.rx_off,
            tx_base: params.tx_off,
            rx_seq: params.seq_rx,
            tx_acked: params.seq_tx,
        });
        self.local = (params.local_ip, params.local_port);
        self.remote = (params.remote_ip, params.remote_port);
        self.seq_rx = params.seq_rx;
        self.seq_tx = params.seq_tx;
        self.flow_id = params.flow_id;
        self.fn_core = params.fn_core;
        self.bump_seq = 0;
        self.state = ConnState::Open;
        Ok(())
    }

    pub fn state(&self) -> ConnState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: ConnState) {
        self.state = state;
    }

    pub fn flags(&self) -> ConnFlags {
        self.flags
    }

    pub(crate) fn flags_mut(&mut self) -> &mut ConnFlags {
        &mut self.flags
    }

    pub fn local(&self) -> (Ipv4Addr, u16) {
        self.local
    }

    pub fn remote(&self) -> (Ipv4Addr, u16) {
        self.remote
    }

    /// The initial receive sequence number.
    pub fn seq_rx(&self) -> u32 {
        self.seq_rx
    }

    /// The initial transmit sequence number.
    pub fn seq_tx(&self) -> u32 {
        self.seq_tx
    }

    pub fn flow_id(&self) -> u32 {
        self.flow_id
    }

    /// The fast path core whose queues carry this connection's bumps.
    pub fn fn_core(&self) -> u16 {
        self.fn_core
    }

    /// The sequence of the last bump sent to the fast path.
    pub fn bump_seq(&self) -> u16 {
        self.bump_seq
    }

    pub(crate) fn set_bump_seq(&mut self, seq: u16) {
        self.bump_seq = seq;
    }

    /// Take the sequence number for the next bump.
    pub(crate) fn next_bump_seq(&mut self) -> u16 {
        self.bump_seq = self.bump_seq.wrapping_add(1);
        self.bump_seq
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnState::Open
    }

    /// Consumed receive bytes and sent transmit bytes not yet reported to the fast path.
    pub fn pending_bumps(&self) -> (u32, u32) {
        self.io.as_ref()
            .map(|io| (io.rx.pending_bump(), io.tx.pending_bump()))
            .unwrap_or((0, 0))
    }

    /// Whether a bump has to be sent for this connection.
    pub(crate) fn wants_bump(&self) -> bool {
        let (rx, tx) = self.pending_bumps();
        rx > 0 || tx > 0 || self.close_unsent()
    }

    /// A close was requested but not yet sent.
    pub(crate) fn close_unsent(&self) -> bool {
        self.flags.contains(ConnFlags::TXEOS) && !self.flags.contains(ConnFlags::TXEOS_ALLOC)
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.pending
    }

    pub(crate) fn set_pending(&mut self, pending: bool) {
        self.pending = pending;
    }

    /// Keep a notification until the move has completed.
    pub(crate) fn hold(&mut self, update: ConnUpdate) {
        self.held.push(update);
    }

    pub(crate) fn take_held(&mut self) -> Vec<ConnUpdate> {
        core::mem::take(&mut self.held)
    }

    /// Align the connection with the state of its flow at the move.
    ///
    /// Accounts for notifications the old context never processed and schedules lost bumps to be
    /// sent again. Must run before any notification addressed to the new context.
    pub(crate) fn resync(&mut self, progress: &FlowProgress) -> Resync {
        let mut caught = Resync::default();
        let io = match self.io.as_mut() {
            Some(io) => io,
            None => return caught,
        };

        let missed = progress.rx_next_seq.wrapping_sub(io.rx_seq);
        if missed as i32 > 0 {
            let pos = io.rx.head();
            if io.rx.receive(missed).is_ok() {
                io.rx_seq = progress.rx_next_seq;
                caught.received = Some((pos, missed));
            }
        }

        let acked = progress.tx_acked_seq.wrapping_sub(io.tx_acked);
        if acked as i32 > 0 && io.tx.ack(acked).is_ok() {
            io.tx_acked = progress.tx_acked_seq;
            caught.acked = acked;
        }

        // Occupied receive space as seen by the fast path and by us.
        let theirs = io.rx.len().saturating_sub(progress.rx_avail);
        let ours = io.rx.used() + io.rx.pending_bump();
        if theirs > ours && io.rx.resend(theirs - ours).is_ok() {
            caught.rx_lost = theirs - ours;
        }

        let reported = io.tx.sent().saturating_sub(io.tx.pending_bump());
        if reported > progress.tx_held && io.tx.resend(reported - progress.tx_held).is_ok() {
            caught.tx_lost = reported - progress.tx_held;
        }

        if self.flags.contains(ConnFlags::TXEOS_ALLOC) && !progress.tx_fin {
            self.flags.remove(ConnFlags::TXEOS_ALLOC);
        }
        if progress.tx_done
            && self.flags.contains(ConnFlags::TXEOS_ALLOC)
            && !self.flags.contains(ConnFlags::TXEOS_ACK)
        {
            self.flags.insert(ConnFlags::TXEOS_ACK);
            caught.tx_closed = true;
        }
        if progress.rx_fin && !self.flags.contains(ConnFlags::RXEOS) {
            self.flags.insert(ConnFlags::RXEOS);
            caught.rx_closed = true;
        }

        caught
    }

    pub(crate) fn io(&self) -> Result<&ConnIo> {
        self.io.as_ref().ok_or(Error::Illegal)
    }

    pub(crate) fn io_mut(&mut self) -> Result<&mut ConnIo> {
        self.io.as_mut().ok_or(Error::Illegal)
    }
}
