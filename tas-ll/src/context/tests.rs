use std::net::Ipv4Addr;
use std::sync::Arc;

use tas::layout::{
    AdminInRepr,
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
use tas::region::Region;
use tas::sys::EventFd;
use tas::Error;

use super::*;
use crate::queues::{channels, PeerQueues};

const REMOTE: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);

fn params(flow_id: u32) -> ConnParams {
    ConnParams {
        rx_off: 0,
        rx_len: 1024,
        tx_off: 4096,
        tx_len: 1024,
        flow_id,
        local_ip: Ipv4Addr::new(10, 0, 0, 1),
        local_port: 40000,
        remote_ip: REMOTE,
        remote_port: 80,
        seq_rx: 1,
        seq_tx: 2,
        fn_core: 0,
    }
}

fn context(config: Config) -> (Context, PeerQueues, Arc<Region>) {
    let buffers = Arc::new(Region::zeroed(8192).unwrap());
    let (queues, peer) = channels(&config, 1).unwrap();
    let context = Context::new(config, buffers.clone(), queues).unwrap();
    (context, peer, buffers)
}

/// Open a connection and answer the request.
fn open(context: &mut Context, peer: &mut PeerQueues, flow_id: u32) -> ConnHandle {
    let conn = context.connection_open(REMOTE, 80).unwrap();
    let request = peer.admin_out.pop().unwrap().unwrap();
    assert_eq!(request, AdminOutRepr::ConnOpen { opaque: conn.opaque(), remote_ip: REMOTE, remote_port: 80 });

    peer.admin_in.push(&AdminInRepr::ConnOpen {
        opaque: conn.opaque(),
        status: 0,
        params: params(flow_id),
    }).unwrap();

    let mut events = Vec::new();
    assert_eq!(context.poll(&mut events, 16), 1);
    assert_eq!(events, vec![Event::ConnOpen { conn, status: 0 }]);
    conn
}

fn pop_bump(peer: &mut PeerQueues) -> Option<BumpUpdate> {
    match peer.cores[0].1.pop().unwrap() {
        Some(AppTxRepr::ConnUpdate(bump)) => Some(bump),
        None => None,
    }
}

fn notify(peer: &mut PeerQueues, conn: ConnHandle, rx_bump: u32, rx_pos: u32, tx_bump: u32, flags: RxFlags) {
    peer.cores[0].0.push(&AppRxRepr::ConnUpdate(ConnUpdate {
        opaque: conn.opaque(),
        rx_bump,
        rx_pos,
        tx_bump,
        flags,
    })).unwrap();
}

#[test]
fn queue_count_must_match() {
    let buffers = Arc::new(Region::zeroed(4096).unwrap());
    let (queues, _peer) = channels(&Config::default().with_cores(2), 0).unwrap();
    assert!(Context::new(Config::default(), buffers, queues).is_err());
}

#[test]
fn listener_lifecycle() {
    let (mut context, mut peer, _) = context(Config::default());
    let listener = context.listen_open(80, 16, true).unwrap();
    assert_eq!(context.listen_accept(listener).err(), Some(Error::Illegal));

    let request = peer.admin_out.pop().unwrap().unwrap();
    assert_eq!(request, AdminOutRepr::ListenOpen {
        opaque: listener.opaque(),
        local_port: 80,
        backlog: 16,
        reuseport: true,
    });

    peer.admin_in.push(&AdminInRepr::ListenOpen { opaque: listener.opaque(), status: 0 }).unwrap();
    peer.admin_in.push(&AdminInRepr::ListenNewConn {
        opaque: listener.opaque(),
        remote_ip: REMOTE,
        remote_port: 5555,
    }).unwrap();

    let mut events = Vec::new();
    assert_eq!(context.poll(&mut events, 16), 2);
    assert_eq!(events, vec![
        Event::ListenOpen { listener, status: 0 },
        Event::ListenNewConn { listener, remote_ip: REMOTE, remote_port: 5555 },
    ]);
    assert_eq!(context.listener_port(listener), Some(80));

    let conn = context.listen_accept(listener).unwrap();
    assert_eq!(peer.admin_out.pop().unwrap(), Some(AdminOutRepr::ListenAccept {
        listener: listener.opaque(),
        opaque: conn.opaque(),
    }));
    assert_eq!(context.connection(conn).map(Connection::state), Some(ConnState::AcceptRequested));
}

#[test]
fn failed_listen_removes_listener() {
    let (mut context, mut peer, _) = context(Config::default());
    let listener = context.listen_open(80, 16, false).unwrap();
    peer.admin_out.pop().unwrap();
    peer.admin_in.push(&AdminInRepr::ListenOpen { opaque: listener.opaque(), status: -98 }).unwrap();

    let mut events = Vec::new();
    context.poll(&mut events, 16);
    assert_eq!(events, vec![Event::ListenOpen { listener, status: -98 }]);
    assert_eq!(context.listener_port(listener), None);
    assert_eq!(context.listen_accept(listener).err(), Some(Error::NotFound));
}

#[test]
fn failed_open_invalidates_handle() {
    let (mut context, mut peer, _) = context(Config::default());
    let conn = context.connection_open(REMOTE, 80).unwrap();
    peer.admin_out.pop().unwrap();
    peer.admin_in.push(&AdminInRepr::ConnOpen {
        opaque: conn.opaque(),
        status: -111,
        params: ConnParams::default(),
    }).unwrap();

    let mut events = Vec::new();
    context.poll(&mut events, 16);
    assert_eq!(events, vec![Event::ConnOpen { conn, status: -111 }]);
    assert!(context.connection(conn).is_none());
    assert_eq!(context.tx_alloc(conn, 1).err(), Some(Error::NotFound));
}

#[test]
fn sends_are_folded_into_one_bump() {
    let (mut context, mut peer, buffers) = context(Config::default());
    let conn = open(&mut context, &mut peer, 7);

    assert_eq!(context.tx_write(conn, b"hello ").unwrap(), 6);
    assert_eq!(context.tx_write(conn, b"world").unwrap(), 5);
    assert_eq!(context.pending(), 1);
    assert_eq!(context.flush(), 1);
    assert_eq!(context.pending(), 0);

    assert_eq!(pop_bump(&mut peer), Some(BumpUpdate {
        flow_id: 7,
        rx_bump: 0,
        tx_bump: 11,
        bump_seq: 1,
        flags: TxFlags::empty(),
    }));
    assert_eq!(pop_bump(&mut peer), None);
    assert_eq!(unsafe { buffers.bytes(4096, 11).unwrap() }, b"hello world");
    assert_eq!(context.tx_possible(conn), Ok(1024 - 11));
}

#[test]
fn receive_and_release() {
    let (mut context, mut peer, buffers) = context(Config::default());
    let conn = open(&mut context, &mut peer, 3);

    unsafe { buffers.bytes_mut(0, 5).unwrap().copy_from_slice(b"abcde") };
    notify(&mut peer, conn, 5, 0, 0, RxFlags::empty());

    let mut events = Vec::new();
    context.poll(&mut events, 16);
    assert_eq!(events, vec![Event::ConnReceived { conn, pos: 0, len: 5 }]);
    assert_eq!(context.received(conn, 0, 5).unwrap(), (&b"abcde"[..], &[][..]));

    context.rx_done(conn, 5).unwrap();
    assert_eq!(context.rx_done(conn, 1).err(), Some(Error::Illegal));
    context.flush();
    let bump = pop_bump(&mut peer).unwrap();
    assert_eq!((bump.rx_bump, bump.tx_bump, bump.bump_seq), (5, 0, 1));
}

#[test]
fn received_data_may_wrap() {
    let (mut context, mut peer, buffers) = context(Config::default());
    let conn = open(&mut context, &mut peer, 3);

    notify(&mut peer, conn, 1020, 0, 0, RxFlags::empty());
    let mut events = Vec::new();
    context.poll(&mut events, 16);
    context.rx_done(conn, 1020).unwrap();

    unsafe {
        buffers.bytes_mut(1020, 4).unwrap().copy_from_slice(b"wrap");
        buffers.bytes_mut(0, 2).unwrap().copy_from_slice(b"ed");
    }
    notify(&mut peer, conn, 6, 1020, 0, RxFlags::empty());
    events.clear();
    context.poll(&mut events, 16);
    assert_eq!(events, vec![Event::ConnReceived { conn, pos: 1020, len: 6 }]);
    assert_eq!(context.received(conn, 1020, 6).unwrap(), (&b"wrap"[..], &b"ed"[..]));
}

#[test]
fn updates_need_room_for_all_events() {
    let (mut context, mut peer, _) = context(Config::default());
    let conn = open(&mut context, &mut peer, 3);
    context.tx_write(conn, b"data").unwrap();
    context.flush();
    pop_bump(&mut peer).unwrap();

    notify(&mut peer, conn, 2, 0, 4, RxFlags::RXDONE);
    let mut events = Vec::new();
    assert_eq!(context.poll(&mut events, EVENTS_PER_UPDATE - 1), 0);
    assert_eq!(context.poll(&mut events, EVENTS_PER_UPDATE), 3);
    assert_eq!(events, vec![
        Event::ConnReceived { conn, pos: 0, len: 2 },
        Event::ConnSendBuf { conn },
        Event::ConnRxClosed { conn },
    ]);
    assert!(context.connection(conn).unwrap().flags().contains(ConnFlags::RXEOS));
}

#[test]
fn close_is_sent_once() {
    let (mut context, mut peer, _) = context(Config::default());
    let conn = open(&mut context, &mut peer, 9);

    context.tx_alloc(conn, 4).unwrap();
    assert_eq!(context.tx_close(conn).err(), Some(Error::Illegal));
    context.tx_send(conn, 4).unwrap();
    context.tx_close(conn).unwrap();
    assert_eq!(context.tx_alloc(conn, 1).err(), Some(Error::Illegal));
    assert_eq!(context.tx_possible(conn), Ok(0));

    context.flush();
    let bump = pop_bump(&mut peer).unwrap();
    assert_eq!((bump.tx_bump, bump.flags), (4, TxFlags::TXDONE));

    let flags = context.connection(conn).unwrap().flags();
    assert!(flags.contains(ConnFlags::TXEOS | ConnFlags::TXEOS_ALLOC));
    context.rx_done(conn, 0).unwrap();
    context.flush();
    assert_eq!(pop_bump(&mut peer), None);

    notify(&mut peer, conn, 0, 0, 4, RxFlags::TXDONE);
    let mut events = Vec::new();
    context.poll(&mut events, 16);
    assert_eq!(events, vec![Event::ConnSendBuf { conn }, Event::ConnTxClosed { conn }]);
}

#[test]
fn flush_stops_at_full_queue() {
    let config = Config::default().with_queue_lengths(8, 1);
    let (mut context, mut peer, _) = context(config);
    let first = open(&mut context, &mut peer, 1);
    let second = open(&mut context, &mut peer, 2);

    context.tx_write(first, b"a").unwrap();
    context.tx_write(second, b"bb").unwrap();
    assert_eq!(context.flush(), 1);
    assert_eq!(context.pending(), 1);

    // More data for the waiting connection is folded into its bump.
    context.tx_write(second, b"b").unwrap();
    assert_eq!(context.pending(), 1);

    assert_eq!(pop_bump(&mut peer).map(|bump| bump.flow_id), Some(1));
    assert_eq!(context.flush(), 1);
    let bump = pop_bump(&mut peer).unwrap();
    assert_eq!((bump.flow_id, bump.tx_bump), (2, 3));
}

#[test]
fn close_completes() {
    let (mut context, mut peer, _) = context(Config::default());
    let conn = open(&mut context, &mut peer, 4);
    context.connection_close(conn, false).unwrap();
    assert_eq!(context.connection_close(conn, false).err(), Some(Error::Illegal));
    assert_eq!(peer.admin_out.pop().unwrap(), Some(AdminOutRepr::ConnClose {
        opaque: conn.opaque(),
        flow_id: 4,
        reset: false,
    }));

    peer.admin_in.push(&AdminInRepr::ConnClosed { opaque: conn.opaque(), status: 0 }).unwrap();
    let mut events = Vec::new();
    context.poll(&mut events, 16);
    assert_eq!(events, vec![Event::ConnClosed { conn, status: 0 }]);
    assert!(context.connection(conn).is_none());
}

#[test]
fn move_holds_bumps_until_completed() {
    let (mut old, mut old_peer, buffers) = context(Config::default());
    let (queues, mut new_peer) = channels(&Config::default(), 2).unwrap();
    let mut new = Context::new(Config::default(), buffers, queues).unwrap();

    let conn = open(&mut old, &mut old_peer, 5);
    old.tx_write(conn, b"xy").unwrap();
    old.flush();
    assert_eq!(pop_bump(&mut old_peer).map(|bump| bump.bump_seq), Some(1));

    old.tx_write(conn, b"z").unwrap();
    let taken = old.take_connection(conn).unwrap();
    assert!(old.connection(conn).is_none());
    assert_eq!(old.flush(), 0);

    let moved = new.connection_move(taken).ok().unwrap();
    assert_eq!(new_peer.admin_out.pop().unwrap(), Some(AdminOutRepr::ConnMove {
        opaque: moved.opaque(),
        flow_id: 5,
        db_id: 2,
        bump_seq: 1,
    }));
    assert_eq!(new.tx_write(moved, b"w").unwrap(), 1);
    assert_eq!(new.flush(), 0);

    new_peer.admin_in.push(&AdminInRepr::ConnMoved {
        opaque: moved.opaque(),
        status: 0,
        bump_seq: 2,
        progress: in_step(2),
    }).unwrap();
    let mut events = Vec::new();
    new.poll(&mut events, 16);
    assert_eq!(events, vec![Event::ConnMoved { conn: moved, status: 0 }]);

    let bump = pop_bump(&mut new_peer).unwrap();
    assert_eq!((bump.flow_id, bump.tx_bump, bump.bump_seq), (5, 2, 3));
}

/// The state of a flow opened with `params` that has `tx_held` unacknowledged bytes.
fn in_step(tx_held: u32) -> FlowProgress {
    FlowProgress {
        rx_next_seq: 1,
        rx_avail: 1024,
        tx_acked_seq: 2,
        tx_held,
        ..FlowProgress::default()
    }
}

/// Move a connection from `old` into a second context on the same buffers.
fn moved_context(old: &mut Context, conn: ConnHandle, buffers: Arc<Region>) -> (Context, PeerQueues, ConnHandle) {
    let (queues, mut peer) = channels(&Config::default(), 2).unwrap();
    let mut new = Context::new(Config::default(), buffers, queues).unwrap();
    let taken = old.take_connection(conn).unwrap();
    let moved = new.connection_move(taken).ok().unwrap();
    peer.admin_out.pop().unwrap().unwrap();
    (new, peer, moved)
}

#[test]
fn move_reports_missed_progress() {
    let (mut old, mut old_peer, buffers) = context(Config::default());
    let conn = open(&mut old, &mut old_peer, 5);
    old.tx_write(conn, b"abcdef").unwrap();
    old.flush();
    pop_bump(&mut old_peer).unwrap();

    let (mut new, mut new_peer, moved) = moved_context(&mut old, conn, buffers.clone());
    unsafe { buffers.bytes_mut(0, 3).unwrap().copy_from_slice(b"end") };

    // The old context never saw the data, the acknowledgement or the peer's close.
    new_peer.admin_in.push(&AdminInRepr::ConnMoved {
        opaque: moved.opaque(),
        status: 0,
        bump_seq: 2,
        progress: FlowProgress {
            rx_next_seq: 4,
            rx_avail: 1021,
            tx_acked_seq: 8,
            tx_held: 0,
            rx_fin: true,
            ..FlowProgress::default()
        },
    }).unwrap();
    let mut events = Vec::new();
    new.poll(&mut events, 16);
    assert_eq!(events, vec![
        Event::ConnMoved { conn: moved, status: 0 },
        Event::ConnReceived { conn: moved, pos: 0, len: 3 },
        Event::ConnSendBuf { conn: moved },
        Event::ConnRxClosed { conn: moved },
    ]);
    assert_eq!(new.received(moved, 0, 3).unwrap(), (&b"end"[..], &[][..]));
    assert_eq!(new.tx_possible(moved), Ok(1024));
    assert_eq!(pop_bump(&mut new_peer), None);
}

#[test]
fn move_resends_lost_bumps() {
    let (mut old, mut old_peer, buffers) = context(Config::default());
    let conn = open(&mut old, &mut old_peer, 5);
    notify(&mut old_peer, conn, 10, 0, 0, RxFlags::empty());
    let mut events = Vec::new();
    old.poll(&mut events, 16);
    old.rx_done(conn, 10).unwrap();
    old.tx_write(conn, b"lost").unwrap();
    old.flush();
    pop_bump(&mut old_peer).unwrap();

    let (mut new, mut new_peer, moved) = moved_context(&mut old, conn, buffers);
    // The bump arrived after the flow moved and was dropped.
    new_peer.admin_in.push(&AdminInRepr::ConnMoved {
        opaque: moved.opaque(),
        status: 0,
        bump_seq: 2,
        progress: FlowProgress { rx_next_seq: 11, rx_avail: 1014, ..in_step(0) },
    }).unwrap();
    events.clear();
    new.poll(&mut events, 16);
    assert_eq!(events, vec![Event::ConnMoved { conn: moved, status: 0 }]);

    let bump = pop_bump(&mut new_peer).unwrap();
    assert_eq!((bump.rx_bump, bump.tx_bump, bump.bump_seq), (10, 4, 3));
}

#[test]
fn notifications_wait_for_move() {
    let (mut old, mut old_peer, buffers) = context(Config::default());
    let conn = open(&mut old, &mut old_peer, 5);
    let (mut new, mut new_peer, moved) = moved_context(&mut old, conn, buffers);

    // Data after the move overtakes the completion.
    notify(&mut new_peer, moved, 2, 0, 0, RxFlags::empty());
    let mut events = Vec::new();
    new.poll(&mut events, 16);
    assert_eq!(events, vec![]);

    new_peer.admin_in.push(&AdminInRepr::ConnMoved {
        opaque: moved.opaque(),
        status: 0,
        bump_seq: 2,
        progress: in_step(0),
    }).unwrap();
    new.poll(&mut events, 16);
    assert_eq!(events, vec![
        Event::ConnMoved { conn: moved, status: 0 },
        Event::ConnReceived { conn: moved, pos: 0, len: 2 },
    ]);
    assert_eq!(pop_bump(&mut new_peer), None);
}

#[test]
fn unowned_spans_are_refused() {
    let (mut context, mut peer, _) = context(Config::default());
    let conn = open(&mut context, &mut peer, 3);

    assert_eq!(context.tx_buffer_mut(conn, Span { pos: 0, len: 1024 }).err(), Some(Error::Illegal));
    assert_eq!(context.tx_buffer_mut(conn, Span { pos: 1, len: u32::MAX }).err(), Some(Error::Illegal));
    let span = context.tx_alloc(conn, 8).unwrap();
    assert_eq!(context.tx_buffer_mut(conn, span).map(|bytes| bytes.len()), Ok(8));
    context.tx_send(conn, 8).unwrap();
    // Sent bytes are read by the fast path.
    assert_eq!(context.tx_buffer_mut(conn, span).err(), Some(Error::Illegal));

    notify(&mut peer, conn, 4, 0, 0, RxFlags::empty());
    let mut events = Vec::new();
    context.poll(&mut events, 16);
    context.rx_done(conn, 2).unwrap();
    assert!(context.received(conn, 0, 2).is_err());
    assert_eq!(context.received(conn, 2, 2).map(|(first, _)| first.len()), Ok(2));
    assert!(context.received(conn, 4, 1).is_err());
}

#[test]
fn flush_kicks_fast_path() {
    let event = EventFd::new().unwrap();
    let config = Config::default().with_kick_threshold(Duration::from_secs(3600));
    let buffers = Arc::new(Region::zeroed(8192).unwrap());
    let (mut queues, mut peer) = channels(&config, 1).unwrap();
    queues.cores = queues.cores.into_iter()
        .map(|core| core.with_kick(event.as_raw_fd()))
        .collect();
    let mut context = Context::new(config, buffers, queues).unwrap();
    let conn = open(&mut context, &mut peer, 1);

    context.tx_write(conn, b"a").unwrap();
    context.flush();
    context.tx_write(conn, b"b").unwrap();
    context.flush();
    assert_eq!(event.drain(), Ok(1));
}

#[test]
fn idle_flush_does_not_kick() {
    let event = EventFd::new().unwrap();
    let config = Config::default().with_kick_threshold(Duration::from_secs(0));
    let buffers = Arc::new(Region::zeroed(8192).unwrap());
    let (mut queues, mut peer) = channels(&config, 1).unwrap();
    queues.cores = queues.cores.into_iter()
        .map(|core| core.with_kick(event.as_raw_fd()))
        .collect();
    let mut context = Context::new(config, buffers, queues).unwrap();
    let _conn = open(&mut context, &mut peer, 1);

    assert_eq!(context.pending(), 0);
    assert_eq!(context.flush(), 0);
    assert_eq!(pop_bump(&mut peer), None);
    assert_eq!(event.drain(), Ok(0));
}

#[test]
fn block_returns_on_input() {
    let event = EventFd::new().unwrap();
    let config = Config::default();
    let buffers = Arc::new(Region::zeroed(8192).unwrap());
    let (queues, mut peer) = channels(&config, 1).unwrap();
    let mut context = Context::new(config, buffers, queues.with_event(event)).unwrap();

    assert_eq!(context.block(Some(Duration::from_millis(1))), Ok(false));
    peer.admin_in.push(&AdminInRepr::ConnClosed { opaque: 1 << 32, status: 0 }).unwrap();
    assert_eq!(context.block(None), Ok(true));

    let mut events = Vec::new();
    assert_eq!(context.poll(&mut events, 16), 0);
}
