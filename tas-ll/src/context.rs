//! The application context: requests, bumps and events.
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tas::layout::{
    AdminIn,
    AdminInRepr,
    AdminOut,
    AdminOutRepr,
    AppRxRepr,
    AppTxRepr,
    BumpUpdate,
    ConnParams,
    ConnUpdate,
    FlowProgress,
    RxFlags,
    TxFlags,
};
use tas::queue::{Consumer, Producer};
use tas::region::Region;
use tas::storage::{split, Span};
use tas::sys::{Errno, EventFd};
use tas::{Error, Result};

use crate::arena::{Arena, Handle};
use crate::config::Config;
use crate::connection::{ConnFlags, ConnState, Connection};
use crate::event::{ConnHandle, Event, ListenerHandle};
use crate::pending::PendingList;
use crate::queues::{ContextQueues, CoreQueues};

/// The most events a single fast path notification can produce.
///
/// A notification is only taken from its queue when the caller has room for this many events.
pub const EVENTS_PER_UPDATE: usize = 4;

/// An application context, owned by a single thread.
///
/// All requests return immediately. Their completion, as well as everything the fast path
/// reports, is observed as [`Event`]s by calling [`poll`].
///
/// [`Event`]: enum.Event.html
/// [`poll`]: #method.poll
pub struct Context {
    config: Config,
    db_id: u16,
    buffers: Arc<Region>,
    admin_out: Producer<AdminOut>,
    admin_in: Consumer<AdminIn>,
    cores: Vec<Core>,
    event: Option<EventFd>,
    conns: Arena<Connection>,
    listeners: Arena<Listener>,
    pending: PendingList,
    /// The core whose notifications are polled first in the next poll.
    next_core: usize,
}

struct Core {
    queues: CoreQueues,
    last_kick: Option<Instant>,
}

#[derive(Debug)]
struct Listener {
    port: u16,
    open: bool,
}

impl Context {
    /// Create a context over its queues and the buffer memory of the fast path.
    ///
    /// There must be one queue pair for each core.
    pub fn new(config: Config, buffers: Arc<Region>, queues: ContextQueues) -> Result<Self> {
        if queues.cores.is_empty() || queues.cores.len() != usize::from(config.cores) {
            return Err(Error::Illegal);
        }

        let ContextQueues { db_id, admin_out, admin_in, cores, event } = queues;
        net_debug!("context {}: created with {} cores", db_id, cores.len());
        Ok(Context {
            config,
            db_id,
            buffers,
            admin_out,
            admin_in,
            cores: cores.into_iter()
                .map(|queues| Core { queues, last_kick: None })
                .collect(),
            event,
            conns: Arena::new(),
            listeners: Arena::new(),
            pending: PendingList::new(),
            next_core: 0,
        })
    }

    pub fn db_id(&self) -> u16 {
        self.db_id
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn connection(&self, conn: ConnHandle) -> Option<&Connection> {
        self.conns.get(conn.0)
    }

    /// The port of a listener.
    pub fn listener_port(&self, listener: ListenerHandle) -> Option<u16> {
        self.listeners.get(listener.0).map(|listener| listener.port)
    }

    /// The number of connections waiting for their bumps to be sent.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Request a listener on a local port.
    ///
    /// Completes with `Event::ListenOpen`.
    pub fn listen_open(&mut self, port: u16, backlog: u32, reuseport: bool) -> Result<ListenerHandle> {
        self.admin_ready()?;
        let handle = self.listeners.insert(Listener { port, open: false });
        self.admin_out.push(&AdminOutRepr::ListenOpen {
            opaque: handle.to_opaque(),
            local_port: port,
            backlog,
            reuseport,
        })?;
        Ok(ListenerHandle(handle))
    }

    /// Accept the next incoming connection of a listener.
    ///
    /// The returned connection is usable after `Event::ListenAccept` reported success.
    pub fn listen_accept(&mut self, listener: ListenerHandle) -> Result<ConnHandle> {
        match self.listeners.get(listener.0) {
            Some(entry) if entry.open => {},
            Some(_) => return Err(Error::Illegal),
            None => return Err(Error::NotFound),
        }
        self.admin_ready()?;

        let handle = self.conns.insert(Connection::requested(ConnState::AcceptRequested));
        self.admin_out.push(&AdminOutRepr::ListenAccept {
            listener: listener.opaque(),
            opaque: handle.to_opaque(),
        })?;
        Ok(ConnHandle(handle))
    }

    /// Open a connection to a remote host.
    ///
    /// Completes with `Event::ConnOpen`.
    pub fn connection_open(&mut self, remote_ip: Ipv4Addr, remote_port: u16) -> Result<ConnHandle> {
        self.admin_ready()?;
        let handle = self.conns.insert(Connection::requested(ConnState::OpenRequested));
        self.admin_out.push(&AdminOutRepr::ConnOpen {
            opaque: handle.to_opaque(),
            remote_ip,
            remote_port,
        })?;
        Ok(ConnHandle(handle))
    }

    /// Close or reset an open connection.
    ///
    /// Completes with `Event::ConnClosed`, after which the handle is invalid.
    pub fn connection_close(&mut self, conn: ConnHandle, reset: bool) -> Result<()> {
        self.admin_ready()?;
        let entry = self.conns.get_mut(conn.0).ok_or(Error::NotFound)?;
        if !entry.is_open() || entry.flags().contains(ConnFlags::MOVING) {
            return Err(Error::Illegal);
        }

        self.admin_out.push(&AdminOutRepr::ConnClose {
            opaque: conn.opaque(),
            flow_id: entry.flow_id(),
            reset,
        })?;
        entry.set_state(ConnState::CloseRequested);
        Ok(())
    }

    /// Detach an open connection to move it to another context.
    ///
    /// Unsent bumps stay with the connection and are sent by the new context once the move has
    /// completed. The handle is invalid afterwards.
    pub fn take_connection(&mut self, conn: ConnHandle) -> Result<Connection> {
        let entry = self.conns.get(conn.0).ok_or(Error::NotFound)?;
        if !entry.is_open() || entry.flags().contains(ConnFlags::MOVING) {
            return Err(Error::Illegal);
        }

        let mut taken = self.conns.remove(conn.0).ok_or(Error::NotFound)?;
        taken.set_pending(false);
        Ok(taken)
    }

    /// Adopt a connection taken from another context.
    ///
    /// Completes with `Event::ConnMoved`. Until then bumps of the connection are held back, and
    /// so are notifications. On completion the connection catches up with anything the old
    /// context missed: `ConnMoved` is followed by the events it would have reported, and bumps
    /// the fast path discarded during the move are sent again. On failure the connection is
    /// handed back together with the error.
    pub fn connection_move(&mut self, mut conn: Connection) -> core::result::Result<ConnHandle, (Error, Connection)> {
        if !conn.is_open() || usize::from(conn.fn_core()) >= self.cores.len() {
            return Err((Error::Illegal, conn));
        }
        if let Err(err) = self.admin_ready() {
            return Err((err, conn));
        }

        let handle = self.conns.next_handle();
        let flow_id = conn.flow_id();
        let request = AdminOutRepr::ConnMove {
            opaque: handle.to_opaque(),
            flow_id,
            db_id: self.db_id,
            bump_seq: conn.bump_seq(),
        };
        if let Err(err) = self.admin_out.push(&request) {
            return Err((err, conn));
        }

        conn.flags_mut().insert(ConnFlags::MOVING);
        let inserted = self.conns.insert(conn);
        debug_assert_eq!(inserted, handle);
        net_debug!("context {}: moving flow#{} in as {}", self.db_id, flow_id, inserted);
        Ok(ConnHandle(inserted))
    }

    /// The application is done with `bytes` of received data.
    pub fn rx_done(&mut self, conn: ConnHandle, bytes: u32) -> Result<()> {
        let entry = self.conns.get_mut(conn.0).ok_or(Error::NotFound)?;
        entry.io_mut()?.rx.done(bytes)?;
        if !entry.flags().contains(ConnFlags::MOVING) {
            self.pending.schedule(conn, entry);
        }
        Ok(())
    }

    /// Allocate up to `want` contiguous bytes of the transmit buffer.
    ///
    /// The allocation may be shorter, at the end of the buffer for example. Fails with
    /// `WouldBlock` when the buffer is full, wait for `Event::ConnSendBuf`.
    pub fn tx_alloc(&mut self, conn: ConnHandle, want: u32) -> Result<Span> {
        Self::sendable(&mut self.conns, conn)?.io_mut()?.tx.alloc(want)
    }

    /// Allocate up to `want` bytes of the transmit buffer in up to two spans.
    pub fn tx_alloc2(&mut self, conn: ConnHandle, want: u32) -> Result<(Span, Option<Span>)> {
        Self::sendable(&mut self.conns, conn)?.io_mut()?.tx.alloc2(want)
    }

    /// Send the first `bytes` allocated bytes.
    pub fn tx_send(&mut self, conn: ConnHandle, bytes: u32) -> Result<()> {
        let entry = Self::sendable(&mut self.conns, conn)?;
        entry.io_mut()?.tx.send(bytes)?;
        if !entry.flags().contains(ConnFlags::MOVING) {
            self.pending.schedule(conn, entry);
        }
        Ok(())
    }

    /// Copy as much of `data` as fits into the transmit buffer and send it.
    ///
    /// Returns the number of bytes sent.
    pub fn tx_write(&mut self, conn: ConnHandle, data: &[u8]) -> Result<usize> {
        let want = u32::try_from(data.len()).unwrap_or(u32::MAX);
        let (first, second) = self.tx_alloc2(conn, want)?;

        let mut written = 0;
        for span in core::iter::once(first).chain(second) {
            let len = span.len as usize;
            self.tx_buffer_mut(conn, span)?
                .copy_from_slice(&data[written..written + len]);
            written += len;
        }

        self.tx_send(conn, written as u32)?;
        Ok(written)
    }

    /// Close the sending direction.
    ///
    /// All allocated bytes must have been sent. `Event::ConnTxClosed` follows once the peer
    /// acknowledged everything.
    pub fn tx_close(&mut self, conn: ConnHandle) -> Result<()> {
        let entry = Self::sendable(&mut self.conns, conn)?;
        if entry.io()?.tx.allocated() > 0 {
            return Err(Error::Illegal);
        }

        entry.flags_mut().insert(ConnFlags::TXEOS);
        if !entry.flags().contains(ConnFlags::MOVING) {
            self.pending.schedule(conn, entry);
        }
        Ok(())
    }

    /// The number of bytes that can currently be allocated for sending.
    pub fn tx_possible(&self, conn: ConnHandle) -> Result<u32> {
        let entry = self.conns.get(conn.0).ok_or(Error::NotFound)?;
        if entry.flags().contains(ConnFlags::TXEOS) {
            return Ok(0);
        }
        Ok(entry.io()?.tx.available())
    }

    /// The bytes reported by `Event::ConnReceived`, split at the end of the receive buffer.
    ///
    /// The second slice is empty unless the range wraps.
    pub fn received(&self, conn: ConnHandle, pos: u32, len: u32) -> Result<(&[u8], &[u8])> {
        let io = self.conns.get(conn.0).ok_or(Error::NotFound)?.io()?;
        if pos >= io.rx.len() || len > io.rx.used() {
            return Err(Error::Illegal);
        }

        let (first, second) = split(pos, len, io.rx.len());
        if !io.rx.is_unconsumed(first) || !second.map_or(true, |span| io.rx.is_unconsumed(span)) {
            return Err(Error::Illegal);
        }
        let first = self.rx_bytes(io.rx_base, first)?;
        let second = match second {
            Some(span) => self.rx_bytes(io.rx_base, span)?,
            None => &[],
        };
        Ok((first, second))
    }

    /// Mutable access to an allocated span of the transmit buffer.
    ///
    /// The span must be allocated and not yet sent.
    pub fn tx_buffer_mut(&mut self, conn: ConnHandle, span: Span) -> Result<&mut [u8]> {
        let io = self.conns.get(conn.0).ok_or(Error::NotFound)?.io()?;
        if !io.tx.is_allocated(span) {
            return Err(Error::Illegal);
        }

        let offset = buffer_offset(io.tx_base, span.pos)?;
        // SAFETY: allocated bytes are not read by the fast path before they are sent, and the
        // exclusive borrow of the context prevents a second slice of the same span.
        unsafe { self.buffers.bytes_mut(offset, span.len as usize) }
    }

    fn rx_bytes(&self, base: u64, span: Span) -> Result<&[u8]> {
        let offset = buffer_offset(base, span.pos)?;
        // SAFETY: the fast path does not write to received bytes until they are released with
        // `rx_done`, which needs an exclusive borrow of the context.
        unsafe { self.buffers.bytes(offset, span.len as usize) }
    }

    fn sendable(conns: &mut Arena<Connection>, conn: ConnHandle) -> Result<&mut Connection> {
        let entry = conns.get_mut(conn.0).ok_or(Error::NotFound)?;
        if !entry.is_open() || entry.flags().contains(ConnFlags::TXEOS) {
            return Err(Error::Illegal);
        }
        Ok(entry)
    }

    fn admin_ready(&self) -> Result<()> {
        if self.admin_out.has_space() {
            Ok(())
        } else {
            Err(Error::WouldBlock)
        }
    }

    /// Collect up to `max` events and send pending bumps.
    ///
    /// Administrative completions are handled first, then the notifications of all cores. A
    /// notification is only taken when there is room for `EVENTS_PER_UPDATE` more events, so
    /// `max` should be at least that. A completion needs room for one more. Only a completed move
    /// can exceed `max`, by the notifications held back while it was in progress. Returns the
    /// number of events appended.
    pub fn poll(&mut self, events: &mut Vec<Event>, max: usize) -> usize {
        let start = events.len();

        let mut handled = 0;
        while events.len() - start + EVENTS_PER_UPDATE < max && handled < self.config.poll_batch {
            match self.admin_in.pop() {
                Ok(Some(message)) => self.handle_admin(&message, events),
                Ok(None) => break,
                Err(err) => {
                    net_debug!("context {}: malformed admin message: {}", self.db_id, err);
                },
            }
            handled += 1;
        }

        let cores = self.cores.len();
        for offset in 0..cores {
            let core = (self.next_core + offset) % cores;
            let mut handled = 0;
            while events.len() - start + EVENTS_PER_UPDATE <= max && handled < self.config.poll_batch {
                match self.cores[core].queues.rx.pop() {
                    Ok(Some(AppRxRepr::ConnUpdate(update))) => self.handle_update(&update, events),
                    Ok(None) => break,
                    Err(err) => {
                        net_debug!("context {}: malformed update: {}", self.db_id, err);
                    },
                }
                handled += 1;
            }
        }
        self.next_core = (self.next_core + 1) % cores;

        self.flush();
        events.len() - start
    }

    fn handle_admin(&mut self, message: &AdminInRepr, events: &mut Vec<Event>) {
        let event = match self.admin_event(message) {
            Some(event) => event,
            None => return,
        };
        events.push(event);

        if let (Event::ConnMoved { conn, status: 0 }, AdminInRepr::ConnMoved { ref progress, .. })
            = (event, *message)
        {
            self.catch_up(conn, progress, events);
        }
    }

    fn admin_event(&mut self, message: &AdminInRepr) -> Option<Event> {
        let handle = match Handle::from_opaque(message.opaque()) {
            Some(handle) => handle,
            None => {
                net_debug!("context {}: admin message without handle", self.db_id);
                return None;
            },
        };

        match *message {
            AdminInRepr::ListenOpen { status, .. } => {
                let listener = self.listeners.get_mut(handle)?;
                if status == 0 {
                    listener.open = true;
                } else {
                    self.listeners.remove(handle);
                }
                Some(Event::ListenOpen { listener: ListenerHandle(handle), status })
            },
            AdminInRepr::ListenNewConn { remote_ip, remote_port, .. } => {
                self.listeners.get(handle)?;
                Some(Event::ListenNewConn { listener: ListenerHandle(handle), remote_ip, remote_port })
            },
            AdminInRepr::ListenAccept { status, ref params, .. } => {
                let status = self.complete_open(handle, ConnState::AcceptRequested, status, params)?;
                Some(Event::ListenAccept { conn: ConnHandle(handle), status })
            },
            AdminInRepr::ConnOpen { status, ref params, .. } => {
                let status = self.complete_open(handle, ConnState::OpenRequested, status, params)?;
                Some(Event::ConnOpen { conn: ConnHandle(handle), status })
            },
            AdminInRepr::ConnClosed { status, .. } => {
                let conn = self.conns.get_mut(handle)?;
                if status == 0 || conn.state() != ConnState::CloseRequested {
                    self.conns.remove(handle);
                } else {
                    conn.set_state(ConnState::Open);
                }
                Some(Event::ConnClosed { conn: ConnHandle(handle), status })
            },
            AdminInRepr::ConnMoved { status, bump_seq, .. } => {
                let conn = self.conns.get_mut(handle)?;
                if !conn.flags().contains(ConnFlags::MOVING) {
                    return None;
                }
                conn.flags_mut().remove(ConnFlags::MOVING);
                if status == 0 {
                    conn.set_bump_seq(bump_seq);
                } else {
                    conn.take_held();
                }
                Some(Event::ConnMoved { conn: ConnHandle(handle), status })
            },
        }
    }

    /// Report what a moved connection missed, then the notifications held during the move.
    fn catch_up(&mut self, conn: ConnHandle, progress: &FlowProgress, events: &mut Vec<Event>) {
        let entry = match self.conns.get_mut(conn.0) {
            Some(entry) => entry,
            None => return,
        };

        let caught = entry.resync(progress);
        if caught.rx_lost > 0 || caught.tx_lost > 0 {
            net_debug!("context {}: {} resending bumps rx {} tx {}",
                self.db_id, conn, caught.rx_lost, caught.tx_lost);
        }
        if let Some((pos, len)) = caught.received {
            events.push(Event::ConnReceived { conn, pos, len });
        }
        if caught.acked > 0 {
            events.push(Event::ConnSendBuf { conn });
        }
        if caught.rx_closed {
            events.push(Event::ConnRxClosed { conn });
        }
        if caught.tx_closed {
            events.push(Event::ConnTxClosed { conn });
        }

        for update in entry.take_held() {
            self.handle_update(&update, events);
        }

        if let Some(entry) = self.conns.get_mut(conn.0) {
            if entry.wants_bump() {
                self.pending.schedule(conn, entry);
            }
        }
    }

    /// Finish an open or accept, returning the status to report.
    fn complete_open(&mut self, handle: Handle, expected: ConnState, status: i16, params: &ConnParams)
        -> Option<i16>
    {
        let conn = self.conns.get_mut(handle)?;
        if conn.state() != expected {
            net_debug!("context {}: unexpected completion for conn#{}", self.db_id, handle);
            return None;
        }

        if status == 0 && usize::from(params.fn_core) < self.cores.len() {
            match conn.establish(params) {
                Ok(()) => return Some(0),
                Err(err) => {
                    net_debug!("context {}: unusable parameters: {}", self.db_id, err);
                },
            }
        }

        self.conns.remove(handle);
        Some(if status == 0 { -1 } else { status })
    }

    fn handle_update(&mut self, update: &ConnUpdate, events: &mut Vec<Event>) {
        let handle = match Handle::from_opaque(update.opaque) {
            Some(handle) => ConnHandle(handle),
            None => return,
        };
        let conn = match self.conns.get_mut(handle.0) {
            Some(conn) => conn,
            None => {
                net_trace!("context {}: update for unknown {}", self.db_id, handle);
                return;
            },
        };
        if conn.flags().contains(ConnFlags::MOVING) {
            conn.hold(*update);
            return;
        }
        let io = match conn.io_mut() {
            Ok(io) => io,
            Err(_) => return,
        };

        if update.rx_bump > 0 {
            if update.rx_pos != io.rx.head() {
                net_debug!("context {}: {} receive at {} expected {}",
                    self.db_id, handle, update.rx_pos, io.rx.head());
            }
            match io.rx.receive(update.rx_bump) {
                Ok(_) => {
                    io.rx_seq = io.rx_seq.wrapping_add(update.rx_bump);
                    events.push(Event::ConnReceived {
                        conn: handle,
                        pos: update.rx_pos,
                        len: update.rx_bump,
                    });
                },
                Err(err) => {
                    net_debug!("context {}: {} receive overflow: {}", self.db_id, handle, err);
                },
            }
        }

        if update.tx_bump > 0 {
            match io.tx.ack(update.tx_bump) {
                Ok(()) => {
                    io.tx_acked = io.tx_acked.wrapping_add(update.tx_bump);
                    events.push(Event::ConnSendBuf { conn: handle });
                },
                Err(err) => {
                    net_debug!("context {}: {} ack overflow: {}", self.db_id, handle, err);
                },
            }
        }

        if update.flags.contains(RxFlags::RXDONE) && !conn.flags().contains(ConnFlags::RXEOS) {
            conn.flags_mut().insert(ConnFlags::RXEOS);
            events.push(Event::ConnRxClosed { conn: handle });
        }

        if update.flags.contains(RxFlags::TXDONE) && !conn.flags().contains(ConnFlags::TXEOS_ACK) {
            conn.flags_mut().insert(ConnFlags::TXEOS_ACK);
            events.push(Event::ConnTxClosed { conn: handle });
        }
    }

    /// Send the bumps of pending connections.
    ///
    /// Stops at the first connection whose queue is full, it is retried first on the next flush.
    /// Returns the number of bumps sent.
    pub fn flush(&mut self) -> usize {
        if self.pending.is_empty() {
            return 0;
        }

        let mut sent = 0;
        let mut touched = vec![false; self.cores.len()];

        while let Some(handle) = self.pending.pop() {
            let conn = match self.conns.get_mut(handle.0) {
                Some(conn) => conn,
                None => continue,
            };
            if conn.flags().contains(ConnFlags::MOVING) || !conn.wants_bump() {
                conn.set_pending(false);
                continue;
            }

            let core = usize::from(conn.fn_core());
            let queue = match self.cores.get_mut(core) {
                Some(core) => &mut core.queues.tx,
                None => {
                    conn.set_pending(false);
                    continue;
                },
            };
            if !queue.has_space() {
                net_trace!("context {}: core {} queue full", self.db_id, core);
                self.pending.unpop(handle);
                break;
            }

            let (rx_bump, tx_bump) = conn.pending_bumps();
            let close = conn.close_unsent();
            let bump = BumpUpdate {
                flow_id: conn.flow_id(),
                rx_bump,
                tx_bump,
                bump_seq: conn.bump_seq().wrapping_add(1),
                flags: if close { TxFlags::TXDONE } else { TxFlags::empty() },
            };
            if queue.push(&AppTxRepr::ConnUpdate(bump)).is_err() {
                self.pending.unpop(handle);
                break;
            }

            conn.next_bump_seq();
            if let Ok(io) = conn.io_mut() {
                io.rx.take_bump();
                io.tx.take_bump();
            }
            if close {
                conn.flags_mut().insert(ConnFlags::TXEOS_ALLOC);
            }
            conn.set_pending(false);
            touched[core] = true;
            sent += 1;
        }

        let now = Instant::now();
        let threshold = self.config.kick_threshold;
        for (core, _) in touched.iter().enumerate().filter(|(_, touched)| **touched) {
            self.cores[core].kick(now, threshold);
        }
        sent
    }

    /// Wait until there is something to poll, but no longer than the timeout.
    ///
    /// Sleeps on the context's event descriptor if it has one and spins otherwise. Returns
    /// whether any queue has entries.
    pub fn block(&mut self, timeout: Option<Duration>) -> core::result::Result<bool, Errno> {
        if self.has_input() {
            return Ok(true);
        }

        match &self.event {
            Some(event) => {
                event.wait(timeout)?;
                event.drain()?;
            },
            None => {
                let deadline = timeout.map(|timeout| Instant::now() + timeout);
                while !self.has_input() {
                    if deadline.map_or(false, |deadline| Instant::now() >= deadline) {
                        break;
                    }
                    std::hint::spin_loop();
                }
            },
        }

        Ok(self.has_input())
    }

    fn has_input(&self) -> bool {
        !self.admin_in.is_empty() || self.cores.iter().any(|core| !core.queues.rx.is_empty())
    }
}

impl Core {
    /// Wake the fast path core if it was not woken recently.
    fn kick(&mut self, now: Instant, threshold: Duration) {
        let fd = match self.queues.kick {
            Some(fd) => fd,
            None => return,
        };
        let due = self.last_kick.map_or(true, |last| now.duration_since(last) >= threshold);
        if !due {
            return;
        }

        if let Err(err) = tas::sys::kick(fd) {
            net_debug!("kick of fast path failed: {}", err);
        }
        self.last_kick = Some(now);
    }
}

fn buffer_offset(base: u64, pos: u32) -> Result<usize> {
    usize::try_from(base + u64::from(pos)).map_err(|_| Error::Truncated)
}

#[cfg(test)]
mod tests;
