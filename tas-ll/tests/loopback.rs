mod common;

use std::sync::Arc;

use tas::flow::{FlowId, FlowKey};
use tas::region::Region;
use tas_ll::{Attachment, Config, ConnHandle, ConnectError, Context, Event};

use common::{events, published_info, Host, BUF_LEN, LOCAL, REMOTE};

fn open(host: &mut Host, context: &mut Context) -> (ConnHandle, u32) {
    let conn = context.connection_open(REMOTE, 7).unwrap();
    assert_eq!(events(host, context), vec![Event::ConnOpen { conn, status: 0 }]);
    let flow = context.connection(conn).unwrap().flow_id();
    (conn, flow)
}

#[test]
fn attach_waits_for_ready() {
    let buffers = Arc::new(Region::zeroed(64 * 1024).unwrap());
    let starting = published_info(false);
    assert_eq!(
        Attachment::from_regions(&starting, buffers.clone()).err(),
        Some(ConnectError::NotReady));

    let ready = published_info(true);
    let attachment = Attachment::from_regions(&ready, buffers).unwrap();
    assert_eq!(Config::from_info(&attachment.info).cores, 1);
}

#[test]
fn open_send_receive() {
    let mut host = Host::new();
    let mut context = host.context(1);
    let (conn, flow) = open(&mut host, &mut context);

    assert_eq!(context.tx_write(conn, b"ping").unwrap(), 4);
    let mut polled = Vec::new();
    context.poll(&mut polled, 16);
    assert_eq!(host.send_all(flow), b"ping");
    assert_eq!(events(&mut host, &mut context), vec![Event::ConnSendBuf { conn }]);
    assert_eq!(context.tx_possible(conn), Ok(BUF_LEN));

    let outcome = host.deliver(flow, b"pong");
    assert_eq!(outcome.delivered, 4);
    assert_eq!(outcome.window, BUF_LEN - 4);
    assert_eq!(events(&mut host, &mut context), vec![Event::ConnReceived { conn, pos: 0, len: 4 }]);
    assert_eq!(context.received(conn, 0, 4).unwrap(), (&b"pong"[..], &[][..]));

    context.rx_done(conn, 4).unwrap();
    context.poll(&mut polled, 16);
    host.fastpath.poll_app(64);
    let rx_avail = host.flows.tables().store().lock(FlowId(flow)).unwrap().rx_avail;
    assert_eq!(rx_avail, BUF_LEN);
    assert_eq!(host.fastpath.stats().stale_bumps, 0);
}

#[test]
fn listen_and_accept() {
    let mut host = Host::new();
    let mut context = host.context(1);

    let listener = context.listen_open(8080, 8, false).unwrap();
    assert_eq!(events(&mut host, &mut context), vec![Event::ListenOpen { listener, status: 0 }]);

    host.incoming(8080, REMOTE, 5000);
    assert_eq!(events(&mut host, &mut context), vec![
        Event::ListenNewConn { listener, remote_ip: REMOTE, remote_port: 5000 },
    ]);

    let conn = context.listen_accept(listener).unwrap();
    assert_eq!(events(&mut host, &mut context), vec![Event::ListenAccept { conn, status: 0 }]);

    let accepted = context.connection(conn).unwrap();
    assert_eq!(accepted.local(), (LOCAL, 8080));
    assert_eq!(accepted.remote(), (REMOTE, 5000));

    let key = FlowKey { local_ip: LOCAL, local_port: 8080, remote_ip: REMOTE, remote_port: 5000 };
    assert_eq!(host.fastpath.lookup(&key), Ok(FlowId(accepted.flow_id())));
}

#[test]
fn second_listener_on_port_fails() {
    let mut host = Host::new();
    let mut context = host.context(1);

    let first = context.listen_open(8080, 8, false).unwrap();
    let second = context.listen_open(8080, 8, false).unwrap();
    assert_eq!(events(&mut host, &mut context), vec![
        Event::ListenOpen { listener: first, status: 0 },
        Event::ListenOpen { listener: second, status: -98 },
    ]);
    assert_eq!(context.listener_port(second), None);
}

#[test]
fn both_directions_close() {
    let mut host = Host::new();
    let mut context = host.context(1);
    let (conn, flow) = open(&mut host, &mut context);

    let outcome = host.fin(flow);
    assert!(outcome.fin);
    assert_eq!(events(&mut host, &mut context), vec![Event::ConnRxClosed { conn }]);

    context.tx_write(conn, b"bye").unwrap();
    context.tx_close(conn).unwrap();
    let mut polled = Vec::new();
    context.poll(&mut polled, 16);
    assert_eq!(host.send_all(flow), b"bye");
    assert_eq!(events(&mut host, &mut context), vec![
        Event::ConnSendBuf { conn },
        Event::ConnTxClosed { conn },
    ]);

    context.connection_close(conn, false).unwrap();
    assert_eq!(events(&mut host, &mut context), vec![Event::ConnClosed { conn, status: 0 }]);
    assert!(context.connection(conn).is_none());
    assert_eq!(host.flows.in_use(), 0);
}

#[test]
fn close_without_data_completes_at_once() {
    let mut host = Host::new();
    let mut context = host.context(1);
    let (conn, _) = open(&mut host, &mut context);

    context.tx_close(conn).unwrap();
    let mut polled = Vec::new();
    context.poll(&mut polled, 16);
    assert_eq!(events(&mut host, &mut context), vec![Event::ConnTxClosed { conn }]);
}

#[test]
fn move_between_contexts() {
    let mut host = Host::new();
    let mut first = host.context(1);
    let mut second = host.context(2);
    let (conn, flow) = open(&mut host, &mut first);

    first.tx_write(conn, b"a").unwrap();
    let mut polled = Vec::new();
    first.poll(&mut polled, 16);
    host.fastpath.poll_app(64);

    let taken = first.take_connection(conn).unwrap();
    let moved = second.connection_move(taken).ok().unwrap();
    assert_eq!(events(&mut host, &mut second), vec![Event::ConnMoved { conn: moved, status: 0 }]);

    second.tx_write(moved, b"b").unwrap();
    second.poll(&mut polled, 16);
    assert_eq!(host.send_all(flow), b"ab");

    host.deliver(flow, b"x");
    assert_eq!(events(&mut host, &mut second), vec![
        Event::ConnSendBuf { conn: moved },
        Event::ConnReceived { conn: moved, pos: 0, len: 1 },
    ]);
    first.poll(&mut polled, 16);
    assert!(polled.is_empty());
    assert_eq!(host.fastpath.stats().stale_bumps, 0);
}

#[test]
fn data_received_before_a_move_is_reported() {
    let mut host = Host::new();
    let mut first = host.context(1);
    let mut second = host.context(2);
    let (conn, flow) = open(&mut host, &mut first);

    host.deliver(flow, b"data");
    let taken = first.take_connection(conn).unwrap();
    let moved = second.connection_move(taken).ok().unwrap();
    assert_eq!(events(&mut host, &mut second), vec![
        Event::ConnMoved { conn: moved, status: 0 },
        Event::ConnReceived { conn: moved, pos: 0, len: 4 },
    ]);
    assert_eq!(second.received(moved, 0, 4).unwrap(), (&b"data"[..], &[][..]));

    let mut polled = Vec::new();
    first.poll(&mut polled, 16);
    assert!(polled.is_empty());

    second.rx_done(moved, 4).unwrap();
    second.poll(&mut polled, 16);
    host.fastpath.poll_app(64);
    let rx_avail = host.flows.tables().store().lock(FlowId(flow)).unwrap().rx_avail;
    assert_eq!(rx_avail, BUF_LEN);
}

#[test]
fn bumps_lost_in_a_move_are_resent() {
    let mut host = Host::new();
    let mut first = host.context(1);
    let mut second = host.context(2);
    let (conn, flow) = open(&mut host, &mut first);

    first.tx_write(conn, b"lost").unwrap();
    let mut polled = Vec::new();
    first.poll(&mut polled, 16);

    let taken = first.take_connection(conn).unwrap();
    let moved = second.connection_move(taken).ok().unwrap();
    host.serve();
    host.fastpath.poll_app(64);
    assert_eq!(host.fastpath.stats().stale_bumps, 1);

    second.poll(&mut polled, 16);
    assert_eq!(polled, vec![Event::ConnMoved { conn: moved, status: 0 }]);
    assert_eq!(host.send_all(flow), b"lost");
    assert_eq!(host.fastpath.stats().stale_bumps, 1);
}

#[test]
fn pending_bumps_wait_for_queue_space() {
    let mut host = Host::with_config(Config::default().with_queue_lengths(64, 1));
    let mut context = host.context(1);
    let (first, first_flow) = open(&mut host, &mut context);
    let (second, second_flow) = open(&mut host, &mut context);

    context.tx_write(first, b"one").unwrap();
    context.tx_write(second, b"two").unwrap();
    let mut polled = Vec::new();
    context.poll(&mut polled, 16);
    assert_eq!(context.pending(), 1);

    assert_eq!(host.send_all(first_flow), b"one");
    context.poll(&mut polled, 16);
    assert_eq!(context.pending(), 0);
    assert_eq!(host.send_all(second_flow), b"two");
}
