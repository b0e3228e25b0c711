//! Per-core processing of the fast path.
//!
//! A [`FastPath`] owns the queue endpoints of one core: the transmit queue of every attached
//! application context, the receive queue the core notifies it through, and the two kernel queues
//! towards the slow path. It never owns flows. Flows are installed by the slow path through
//! [`Flows`] and only ever locked one at a time by the core that currently processes one of their
//! packets or bumps.
//!
//! The packet layer around this module is out of scope. It hands in parsed segment metadata
//! ([`RxSegment`], [`AckInfo`]) and receives descriptors ([`TxSegment`]) whose payload it copies
//! out of buffer memory itself.
//!
//! [`FastPath`]: struct.FastPath.html
//! [`Flows`]: struct.Flows.html
//! [`RxSegment`]: struct.RxSegment.html
//! [`AckInfo`]: struct.AckInfo.html
//! [`TxSegment`]: struct.TxSegment.html
use core::convert::TryFrom;
use alloc::collections::VecDeque;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::{Error, Result};
use crate::flow::{FlowFlags, FlowGuard, FlowId, FlowKey};
use crate::layout::{
    AppRx, AppRxRepr, AppTx, AppTxRepr, BumpUpdate, ConnUpdate,
    KernelRx, KernelRxRepr, KernelTx, KernelTxRepr, RxFlags, TxFlags,
    APPCTX_NUM,
};
use crate::queue::{Consumer, Producer};
use crate::region::Region;
use crate::storage::{split, Span};
use crate::time::Instant;

mod congestion;
mod flows;
mod memory;


pub use self::congestion::{smooth_rtt, AckSample, CongestionPolicy, FixedRate};
pub use self::flows::{FlowInit, FlowTables, Flows};
pub use self::memory::{StateMemory, Steering};

/// Compare two bump sequences with wrap around.
///
/// Returns true if `a` was issued after `b`, that is if it lies in the half of the sequence space
/// following `b`. Equal sequences are not newer.
pub fn seq16_newer(a: u16, b: u16) -> bool {
    (a.wrapping_sub(b) as i16) > 0
}

/// Compare two TCP sequence numbers with wrap around, true if `a` lies before `b`.
pub fn seq32_before(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) < 0
}

/// The processing engine of one fast path core.
pub struct FastPath<P: CongestionPolicy = FixedRate> {
    core: u16,
    flows: FlowTables,
    buffers: Arc<Region>,
    contexts: Vec<Option<AppQueues>>,
    kernel: Option<KernelQueues>,
    steering: Option<Steering>,
    policy: P,
    /// Notifications that found their context's queue full, in order of creation.
    deferred: VecDeque<(u16, ConnUpdate)>,
    ready: VecDeque<FlowId>,
    stats: Stats,
}

/// The queues of one application context on this core.
struct AppQueues {
    rx: Producer<AppRx>,
    tx: Consumer<AppTx>,
}

struct KernelQueues {
    rx: Producer<KernelRx>,
    tx: Consumer<KernelTx>,
}

/// Counters of a core.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    /// Bumps applied to a flow.
    pub bumps: u64,
    /// Bumps dropped for an outdated sequence or context.
    pub stale_bumps: u64,
    /// Bumps rejected because they exceeded the buffers, or named an unknown flow.
    pub rejected_bumps: u64,
    /// Segments that delivered payload, in order or not.
    pub rx_segments: u64,
    /// Segments whose payload was dropped entirely.
    pub rx_dropped: u64,
    /// Acknowledgements that advanced a flow.
    pub acks: u64,
    /// Duplicate acknowledgements.
    pub dupacks: u64,
    /// Segments handed to the packet layer.
    pub tx_segments: u64,
    /// Fast retransmissions and slow path rewinds.
    pub retransmits: u64,
    /// Notifications that had to wait for queue space.
    pub deferred: u64,
    /// Packets handed to the slow path.
    pub slowpath: u64,
}

/// The effect of an applied bump.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BumpOutcome {
    /// The flow has unsent data.
    pub tx_ready: bool,
    /// Receive space became available again after the window was closed.
    pub window_opened: bool,
    /// The transmit direction closed and completed at once.
    pub tx_closed: bool,
}

/// A received segment of an established flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RxSegment<'a> {
    /// Sequence number of the first payload byte.
    pub seq: u32,
    /// The segment payload.
    pub payload: &'a [u8],
    /// The peer finished sending with the end of this payload.
    pub fin: bool,
    /// The peer's timestamp, echoed in the next segment we send.
    pub ts_val: u32,
}

/// The result of receiving a segment, what the packet layer needs to acknowledge it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RxOutcome {
    /// In-order bytes made available to the application.
    pub delivered: u32,
    /// The payload was kept as the out-of-order interval.
    pub buffered: bool,
    /// The peer's sending direction is now closed.
    pub fin: bool,
    /// The acknowledgement number to send.
    pub ack: u32,
    /// The window to advertise.
    pub window: u32,
}

/// The acknowledgement information of a received segment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AckInfo {
    /// The acknowledgement number.
    pub ack: u32,
    /// The window advertised by the peer.
    pub window: u32,
    /// The peer echoed a congestion mark.
    pub ecn_echo: bool,
    /// Our echoed timestamp, zero if the segment carried none.
    pub ts_echo: u32,
}

/// The result of processing an acknowledgement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AckOutcome {
    /// Newly acknowledged bytes.
    pub acked: u32,
    /// The acknowledgement did not advance and was counted as duplicate.
    pub duplicate: bool,
    /// Unacknowledged data was queued for sending again.
    pub retransmit: bool,
}

/// A segment to transmit, the payload still lies in buffer memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TxSegment {
    /// The sending flow.
    pub flow: FlowId,
    /// Sequence number of the first payload byte.
    pub seq: u32,
    /// The acknowledgement number.
    pub ack: u32,
    /// The receive window to advertise.
    pub window: u32,
    /// Offset of the transmit buffer in buffer memory.
    pub base: u64,
    /// Size of the transmit buffer.
    pub buf_len: u32,
    /// The payload range within the transmit buffer, may wrap.
    pub span: Span,
    /// Our timestamp.
    pub ts_val: u32,
    /// The peer timestamp to echo.
    pub ts_echo: u32,
    /// The segment closes our sending direction.
    pub fin: bool,
    /// The rate the flow may send at in kbps, zero for unlimited.
    pub rate: u32,
}

/// A packet the slow path asked this core to transmit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KernelPacket {
    /// Offset of the frame in buffer memory.
    pub addr: u64,
    /// Length of the frame.
    pub len: u16,
    /// Whether to insert the current timestamp into the frame.
    pub timestamp: bool,
}

impl FastPath {
    /// A core with the default fixed rate policy.
    pub fn new(core: u16, flows: FlowTables, buffers: Arc<Region>) -> Self {
        FastPath::with_policy(core, flows, buffers, FixedRate::default())
    }
}

impl<P: CongestionPolicy> FastPath<P> {
    /// A core with a custom congestion policy.
    pub fn with_policy(core: u16, flows: FlowTables, buffers: Arc<Region>, policy: P) -> Self {
        FastPath {
            core,
            flows,
            buffers,
            contexts: Vec::new(),
            kernel: None,
            steering: None,
            policy,
            deferred: VecDeque::new(),
            ready: VecDeque::new(),
            stats: Stats::default(),
        }
    }

    /// The index of this core.
    pub fn core(&self) -> u16 {
        self.core
    }

    /// The flow tables this core works on.
    pub fn flows(&self) -> &FlowTables {
        &self.flows
    }

    /// The congestion policy, to adjust it at runtime.
    pub fn policy_mut(&mut self) -> &mut P {
        &mut self.policy
    }

    /// A snapshot of the counters.
    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// Register the queues of an application context under its doorbell id.
    ///
    /// Fails with `Illegal` if the id is out of range and `NoCapacity` if it is taken.
    pub fn attach_context(&mut self, db_id: u16, rx: Producer<AppRx>, tx: Consumer<AppTx>) -> Result<()> {
        let idx = usize::from(db_id);
        if idx >= APPCTX_NUM {
            return Err(Error::Illegal);
        }
        if self.contexts.len() <= idx {
            self.contexts.resize_with(idx + 1, || None);
        }
        if self.contexts[idx].is_some() {
            return Err(Error::NoCapacity);
        }

        self.contexts[idx] = Some(AppQueues { rx, tx });
        net_debug!("fastpath[{}]: attached context {}", self.core, db_id);
        Ok(())
    }

    /// Remove a context, dropping its pending notifications.
    pub fn detach_context(&mut self, db_id: u16) -> Result<()> {
        let slot = self.contexts.get_mut(usize::from(db_id))
            .ok_or(Error::NotFound)?;
        slot.take().ok_or(Error::NotFound)?;
        self.deferred.retain(|&(id, _)| id != db_id);
        net_debug!("fastpath[{}]: detached context {}", self.core, db_id);
        Ok(())
    }

    /// Register the queues to and from the slow path.
    pub fn attach_kernel(&mut self, rx: Producer<KernelRx>, tx: Consumer<KernelTx>) {
        self.kernel = Some(KernelQueues { rx, tx });
    }

    /// Use a flow group map to reject packets of other cores.
    pub fn attach_steering(&mut self, steering: Steering) {
        self.steering = Some(steering);
    }

    /// Process up to `max` bumps of each attached context.
    ///
    /// Notifications deferred for a full queue are retried first. Stale bumps are dropped
    /// silently, rejected ones are logged. Returns the number of queue entries consumed.
    pub fn poll_app(&mut self, max: usize) -> usize {
        self.flush_deferred();

        let mut consumed = 0;
        for idx in 0..self.contexts.len() {
            let mut budget = max;
            while budget > 0 {
                let entry = match &mut self.contexts[idx] {
                    Some(queues) => queues.tx.pop(),
                    None => break,
                };

                match entry {
                    Ok(Some(AppTxRepr::ConnUpdate(bump))) => self.handle_bump(idx as u16, &bump),
                    Ok(None) => break,
                    Err(_) => self.stats.rejected_bumps += 1,
                }
                consumed += 1;
                budget -= 1;
            }
        }

        consumed
    }

    fn handle_bump(&mut self, db_id: u16, bump: &BumpUpdate) {
        match self.apply_bump(db_id, bump) {
            Ok(_) => self.stats.bumps += 1,
            Err(Error::StaleSequence) => {
                net_trace!("fastpath[{}]: stale bump {} for flow#{}", self.core, bump.bump_seq, bump.flow_id);
                self.stats.stale_bumps += 1;
            },
            Err(err) => {
                net_debug!("fastpath[{}]: rejected bump for flow#{}: {}", self.core, bump.flow_id, err);
                self.stats.rejected_bumps += 1;
            },
        }
    }

    /// Apply an application's bump to its flow.
    ///
    /// The bump must come from the context the flow is currently bound to and carry a sequence
    /// newer than the last applied one, otherwise it is stale. A bump that would exceed either
    /// buffer is `Illegal`. In both cases the flow is not modified.
    pub fn apply_bump(&mut self, db_id: u16, bump: &BumpUpdate) -> Result<BumpOutcome> {
        let id = FlowId(bump.flow_id);
        let mut outcome = BumpOutcome::default();
        let mut notify = None;

        {
            let mut flow = self.flows.store().lock(id)?;
            if flow.identity().db_id() != db_id || !seq16_newer(bump.bump_seq, flow.bump_seq()) {
                return Err(Error::StaleSequence);
            }

            let rx_len = flow.identity().rx_len();
            let tx_len = flow.identity().tx_len();
            let rx_avail = u64::from(flow.rx_avail) + u64::from(bump.rx_bump);
            let tx_total = u64::from(flow.tx_avail) + u64::from(flow.tx_sent) + u64::from(bump.tx_bump);
            if rx_avail > u64::from(rx_len) || tx_total > u64::from(tx_len) {
                return Err(Error::Illegal);
            }

            outcome.window_opened = flow.rx_avail == 0 && bump.rx_bump > 0;
            flow.set_bump_seq(bump.bump_seq);
            flow.rx_avail = rx_avail as u32;
            flow.tx_avail += bump.tx_bump;

            if bump.flags.contains(TxFlags::TXDONE) && !flow.flags().contains(FlowFlags::TXFIN) {
                flow.insert_flags(FlowFlags::TXFIN);
                if flow.tx_avail == 0 && flow.tx_sent == 0 {
                    outcome.tx_closed = true;
                    notify = Some(ConnUpdate {
                        opaque: flow.identity().opaque(),
                        rx_pos: flow.rx_next_pos,
                        flags: RxFlags::TXDONE,
                        ..ConnUpdate::default()
                    });
                }
            }

            outcome.tx_ready = flow.tx_avail > 0;
        }

        if outcome.tx_ready || outcome.window_opened {
            self.mark_ready(id);
        }
        if let Some(update) = notify {
            self.notify(db_id, update);
        }

        Ok(outcome)
    }

    /// Receive the payload of a segment into the flow's receive buffer.
    ///
    /// Duplicate bytes are trimmed. In-order bytes are delivered up to the free space and merged
    /// with the buffered out-of-order interval if they reach it. Out-of-order bytes are kept only
    /// if they fit the free space, they extend the interval when overlapping or adjacent to it and
    /// are otherwise not tracked. The application is notified of delivered bytes and of the FIN.
    pub fn rx_segment(&mut self, id: FlowId, segment: &RxSegment) -> Result<RxOutcome> {
        let mut outcome = RxOutcome::default();
        let (db_id, update) = {
            let mut flow = self.flows.store().lock(id)?;
            let rx_base = flow.identity().rx_base();
            let rx_len = flow.identity().rx_len();
            let payload_len = u32::try_from(segment.payload.len()).map_err(|_| Error::Illegal)?;
            let fin_seq = segment.seq.wrapping_add(payload_len);

            let mut seq = segment.seq;
            let mut data = segment.payload;
            if seq32_before(seq, flow.rx_next_seq) {
                let dup = flow.rx_next_seq.wrapping_sub(seq) as usize;
                data = data.get(dup..).unwrap_or(&[]);
                seq = flow.rx_next_seq;
            }

            let start_pos = flow.rx_next_pos;
            let mut delivered = 0;
            if data.is_empty() {
                // nothing new
            } else if seq == flow.rx_next_seq {
                let take = (data.len() as u32).min(flow.rx_avail);
                copy_in(&self.buffers, rx_base, rx_len, flow.rx_next_pos, &data[..take as usize])?;
                advance_rx(&mut flow, take, rx_len);
                delivered = take;

                if flow.rx_ooo_len > 0 && !seq32_before(flow.rx_next_seq, flow.rx_ooo_start) {
                    let covered = flow.rx_next_seq.wrapping_sub(flow.rx_ooo_start);
                    if covered < flow.rx_ooo_len {
                        let extra = flow.rx_ooo_len - covered;
                        advance_rx(&mut flow, extra, rx_len);
                        delivered += extra;
                    }
                    flow.rx_ooo_len = 0;
                }
            } else {
                let offset = seq.wrapping_sub(flow.rx_next_seq);
                let end = u64::from(offset) + data.len() as u64;
                if end <= u64::from(flow.rx_avail) {
                    let pos = ((u64::from(flow.rx_next_pos) + u64::from(offset)) % u64::from(rx_len)) as u32;
                    copy_in(&self.buffers, rx_base, rx_len, pos, data)?;
                    outcome.buffered = merge_ooo(&mut flow, offset, end as u32);
                } else {
                    net_trace!("fastpath: {} out-of-order segment beyond window", id);
                }
            }

            if delivered > 0 || outcome.buffered {
                self.stats.rx_segments += 1;
            } else if !segment.payload.is_empty() {
                self.stats.rx_dropped += 1;
            }

            let mut flags = RxFlags::empty();
            if segment.fin && flow.rx_next_seq == fin_seq && !flow.flags().contains(FlowFlags::RXFIN) {
                flow.insert_flags(FlowFlags::RXFIN);
                flags = RxFlags::RXDONE;
                outcome.fin = true;
            }

            flow.tx_next_ts = segment.ts_val;
            outcome.delivered = delivered;
            outcome.ack = flow.rx_next_seq;
            outcome.window = flow.rx_avail;

            let update = if delivered > 0 || outcome.fin {
                Some(ConnUpdate {
                    opaque: flow.identity().opaque(),
                    rx_bump: delivered,
                    rx_pos: start_pos,
                    tx_bump: 0,
                    flags,
                })
            } else {
                None
            };
            (flow.identity().db_id(), update)
        };

        if let Some(update) = update {
            self.notify(db_id, update);
        }
        Ok(outcome)
    }

    /// Process the acknowledgement fields of a received segment.
    ///
    /// Acknowledgements beyond the sent data are ignored. Acknowledged bytes are released to the
    /// application, the counters and the round trip estimate are updated and the policy consulted.
    /// An acknowledgement that does not advance while data is outstanding counts as duplicate.
    pub fn rx_ack(&mut self, id: FlowId, ack: &AckInfo, now: Instant) -> Result<AckOutcome> {
        let mut outcome = AckOutcome::default();
        let (db_id, update) = {
            let mut flow = self.flows.store().lock(id)?;
            let unacked = flow.tx_next_seq.wrapping_sub(flow.tx_sent);
            let acked = ack.ack.wrapping_sub(unacked);
            if acked > flow.tx_sent {
                net_trace!("fastpath: {} ack {} outside of sent data", id, ack.ack);
                return Ok(outcome);
            }

            flow.rx_remote_avail = ack.window;
            if acked == 0 {
                if flow.tx_sent > 0 {
                    flow.rx_dupack_cnt += 1;
                    outcome.duplicate = true;
                    self.stats.dupacks += 1;
                    if self.policy.fast_retransmit(id, flow.rx_dupack_cnt) {
                        go_back(&mut flow);
                        outcome.retransmit = true;
                        self.stats.retransmits += 1;
                    }
                }
                (0, None)
            } else {
                flow.rx_dupack_cnt = 0;
                flow.tx_sent -= acked;
                flow.cnt_rx_acks = flow.cnt_rx_acks.wrapping_add(1);
                flow.cnt_rx_ack_bytes = flow.cnt_rx_ack_bytes.wrapping_add(acked);
                let ecn_bytes = if ack.ecn_echo { acked } else { 0 };
                flow.cnt_rx_ecn_bytes = flow.cnt_rx_ecn_bytes.wrapping_add(ecn_bytes);

                let rtt = if ack.ts_echo != 0 {
                    Some(now.since_timestamp(ack.ts_echo))
                } else {
                    None
                };
                if let Some(sample) = rtt {
                    flow.rtt_est = smooth_rtt(flow.rtt_est, sample);
                }

                let sample = AckSample { acked, ecn_bytes, rtt, rtt_est: flow.rtt_est };
                let mut rate = flow.tx_rate;
                self.policy.on_ack(id, &sample, &mut rate);
                flow.tx_rate = rate;
                self.stats.acks += 1;
                outcome.acked = acked;

                let mut flags = RxFlags::empty();
                if flow.flags().contains(FlowFlags::TXFIN) && flow.tx_sent == 0 && flow.tx_avail == 0 {
                    flags = RxFlags::TXDONE;
                }
                let update = ConnUpdate {
                    opaque: flow.identity().opaque(),
                    rx_bump: 0,
                    rx_pos: flow.rx_next_pos,
                    tx_bump: acked,
                    flags,
                };
                (flow.identity().db_id(), Some(update))
            }
        };

        if outcome.retransmit {
            self.mark_ready(id);
        }
        if let Some(update) = update {
            self.notify(db_id, update);
        }
        Ok(outcome)
    }

    /// Take the next segment of unsent data of a flow.
    ///
    /// At most `mss` bytes are taken, limited by the window the peer has left. Returns `None` if
    /// there is nothing that may be sent. The FIN rides on the segment carrying the last byte.
    pub fn tx_segment(&mut self, id: FlowId, mss: u32, now: Instant) -> Result<Option<TxSegment>> {
        let mut flow = self.flows.store().lock(id)?;
        let window = flow.rx_remote_avail.saturating_sub(flow.tx_sent);
        let len = flow.tx_avail.min(window).min(mss);
        if len == 0 {
            return Ok(None);
        }

        let tx_len = flow.identity().tx_len();
        let segment = TxSegment {
            flow: id,
            seq: flow.tx_next_seq,
            ack: flow.rx_next_seq,
            window: flow.rx_avail,
            base: flow.identity().tx_base(),
            buf_len: tx_len,
            span: Span { pos: flow.tx_next_pos, len },
            ts_val: now.timestamp(),
            ts_echo: flow.tx_next_ts,
            fin: flow.flags().contains(FlowFlags::TXFIN) && len == flow.tx_avail,
            rate: flow.tx_rate,
        };

        flow.tx_next_pos = ((u64::from(flow.tx_next_pos) + u64::from(len)) % u64::from(tx_len)) as u32;
        flow.tx_next_seq = flow.tx_next_seq.wrapping_add(len);
        flow.tx_avail -= len;
        flow.tx_sent += len;
        self.stats.tx_segments += 1;
        Ok(Some(segment))
    }

    /// Copy the payload of a segment out of buffer memory.
    ///
    /// Returns the number of bytes written, `Truncated` if `out` is too short.
    pub fn copy_payload(&self, segment: &TxSegment, out: &mut [u8]) -> Result<usize> {
        let len = segment.span.len as usize;
        let out = out.get_mut(..len).ok_or(Error::Truncated)?;
        let (first, second) = split(segment.span.pos, segment.span.len, segment.buf_len);
        let (head, tail) = out.split_at_mut(first.len as usize);

        let base = usize::try_from(segment.base).map_err(|_| Error::Truncated)?;
        // SAFETY: bytes between the sent position and the application's head are not written by
        // the application until they are acknowledged.
        unsafe {
            head.copy_from_slice(self.buffers.bytes(base + first.pos as usize, head.len())?);
            if let Some(second) = second {
                tail.copy_from_slice(self.buffers.bytes(base + second.pos as usize, tail.len())?);
            }
        }
        Ok(len)
    }

    /// Go back to the first unacknowledged byte of a flow.
    pub fn retransmit(&mut self, id: FlowId) -> Result<()> {
        {
            let mut flow = self.flows.store().lock(id)?;
            go_back(&mut flow);
        }
        self.stats.retransmits += 1;
        self.mark_ready(id);
        Ok(())
    }

    /// The next flow that may have data to send.
    pub fn next_ready(&mut self) -> Option<FlowId> {
        self.ready.pop_front()
    }

    fn mark_ready(&mut self, id: FlowId) {
        if !self.ready.contains(&id) {
            self.ready.push_back(id);
        }
    }

    /// Handle up to `max` requests of the slow path.
    ///
    /// Packets are handed to `transmit`, retransmission requests are executed. Returns the number
    /// of queue entries consumed.
    pub fn poll_kernel<F>(&mut self, max: usize, mut transmit: F) -> usize
        where F: FnMut(KernelPacket),
    {
        let mut consumed = 0;
        while consumed < max {
            let entry = match &mut self.kernel {
                Some(kernel) => kernel.tx.pop(),
                None => break,
            };

            match entry {
                Ok(Some(KernelTxRepr::Packet { addr, len })) => {
                    transmit(KernelPacket { addr, len, timestamp: true })
                },
                Ok(Some(KernelTxRepr::PacketNoTs { addr, len })) => {
                    transmit(KernelPacket { addr, len, timestamp: false })
                },
                Ok(Some(KernelTxRepr::ConnRetransmit { flow_id })) => {
                    if let Err(err) = self.retransmit(FlowId(flow_id)) {
                        net_debug!("fastpath[{}]: retransmit of flow#{} failed: {}", self.core, flow_id, err);
                    }
                },
                Ok(None) => break,
                Err(_) => {},
            }
            consumed += 1;
        }
        consumed
    }

    /// Hand a packet the fast path can not process to the slow path.
    pub fn to_slowpath(&mut self, addr: u64, len: u16, flow_group: u16) -> Result<()> {
        let kernel = self.kernel.as_mut().ok_or(Error::NotReady)?;
        let entry = KernelRxRepr::Packet { addr, len, fn_core: self.core, flow_group };
        kernel.rx.push(&entry).map_err(|err| {
            net_trace!("fastpath[{}]: kernel queue full", self.core);
            err
        })?;
        self.stats.slowpath += 1;
        Ok(())
    }

    /// Find the flow of a received packet.
    ///
    /// Flows marked for the slow path are reported as not found, their packets take the
    /// exception path.
    pub fn lookup(&self, key: &FlowKey) -> Result<FlowId> {
        let id = self.flows.lookup(key)?;
        if self.flows.store().lock(id)?.flags().contains(FlowFlags::SLOWPATH) {
            return Err(Error::NotFound);
        }
        Ok(id)
    }

    /// The core responsible for a flow group.
    pub fn steer(&self, flow_group: u16) -> Result<u8> {
        self.steering.as_ref()
            .ok_or(Error::NotReady)?
            .core(flow_group)
    }

    /// Deliver a notification, or queue it behind earlier ones of the same context.
    ///
    /// Notifications for a context that is not attached are dropped.
    fn notify(&mut self, db_id: u16, update: ConnUpdate) {
        if self.deferred.iter().any(|&(id, _)| id == db_id) {
            self.deferred.push_back((db_id, update));
            self.stats.deferred += 1;
            return;
        }

        let queues = match self.contexts.get_mut(usize::from(db_id)).and_then(Option::as_mut) {
            Some(queues) => queues,
            None => {
                net_debug!("fastpath[{}]: no context {} for update", self.core, db_id);
                return;
            },
        };
        if queues.rx.push(&AppRxRepr::ConnUpdate(update)).is_err() {
            net_trace!("fastpath[{}]: context {} queue full", self.core, db_id);
            self.deferred.push_back((db_id, update));
            self.stats.deferred += 1;
        }
    }

    /// The number of notifications waiting for queue space.
    pub fn deferred(&self) -> usize {
        self.deferred.len()
    }

    /// Retry deferred notifications, stopping per context at the first full queue.
    fn flush_deferred(&mut self) {
        let mut blocked: Vec<u16> = Vec::new();
        for _ in 0..self.deferred.len() {
            let (db_id, update) = match self.deferred.pop_front() {
                Some(entry) => entry,
                None => break,
            };

            if !blocked.contains(&db_id) {
                let queues = match self.contexts.get_mut(usize::from(db_id)).and_then(Option::as_mut) {
                    Some(queues) => queues,
                    None => continue,
                };
                if queues.rx.push(&AppRxRepr::ConnUpdate(update)).is_ok() {
                    continue;
                }
                blocked.push(db_id);
            }

            self.deferred.push_back((db_id, update));
        }
    }
}

fn advance_rx(flow: &mut FlowGuard, bytes: u32, rx_len: u32) {
    flow.rx_next_pos = ((u64::from(flow.rx_next_pos) + u64::from(bytes)) % u64::from(rx_len)) as u32;
    flow.rx_next_seq = flow.rx_next_seq.wrapping_add(bytes);
    flow.rx_avail -= bytes;
}

/// Merge `[start, end)`, relative to the next expected byte, into the out-of-order interval.
fn merge_ooo(flow: &mut FlowGuard, start: u32, end: u32) -> bool {
    if flow.rx_ooo_len == 0 {
        flow.rx_ooo_start = flow.rx_next_seq.wrapping_add(start);
        flow.rx_ooo_len = end - start;
        return true;
    }

    let cur_start = flow.rx_ooo_start.wrapping_sub(flow.rx_next_seq);
    let cur_end = cur_start + flow.rx_ooo_len;
    if start > cur_end || cur_start > end {
        return false;
    }

    let merged_start = start.min(cur_start);
    flow.rx_ooo_start = flow.rx_next_seq.wrapping_add(merged_start);
    flow.rx_ooo_len = end.max(cur_end) - merged_start;
    true
}

fn go_back(flow: &mut FlowGuard) {
    let tx_len = flow.identity().tx_len();
    let sent = flow.tx_sent;
    flow.tx_next_pos = if sent <= flow.tx_next_pos {
        flow.tx_next_pos - sent
    } else {
        flow.tx_next_pos + (tx_len - sent)
    };
    flow.tx_next_seq = flow.tx_next_seq.wrapping_sub(sent);
    flow.tx_avail += sent;
    flow.tx_sent = 0;
    flow.rx_dupack_cnt = 0;
    flow.cnt_tx_drops = flow.cnt_tx_drops.wrapping_add(1);
}

fn copy_in(buffers: &Region, base: u64, buf_len: u32, pos: u32, data: &[u8]) -> Result<()> {
    let base = usize::try_from(base).map_err(|_| Error::Truncated)?;
    let (first, second) = split(pos, data.len() as u32, buf_len);
    let (head, tail) = data.split_at(first.len as usize);
    // SAFETY: the free part of a receive buffer belongs to the fast path until it is announced.
    unsafe {
        buffers.bytes_mut(base + first.pos as usize, head.len())?.copy_from_slice(head);
        if let Some(second) = second {
            buffers.bytes_mut(base + second.pos as usize, tail.len())?.copy_from_slice(tail);
        }
    }
    Ok(())
}
