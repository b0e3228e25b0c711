use std::sync::Arc;
use std::thread;

use super::*;
use crate::Error;

fn key(port: u16) -> FlowKey {
    FlowKey {
        local_ip: Ipv4Addr::new(10, 0, 0, 1),
        local_port: 80,
        remote_ip: Ipv4Addr::new(10, 0, 0, 2),
        remote_port: port,
    }
}

fn identity(port: u16) -> FlowIdentity {
    FlowIdentity::new(key(port), u64::from(port))
        .with_rx_buffer(0x1000, 4096)
        .with_tx_buffer(0x2000, 4096)
        .with_context(1)
}

#[test]
fn identity_bytes() {
    let ident = identity(0x1234).with_remote_mac([2, 0, 0, 0, 0, 9]);
    let bytes = bytemuck::bytes_of(&ident);
    assert_eq!(bytes.len(), 54);
    assert_eq!(&bytes[32..36], &[10, 0, 0, 1]);
    // Ports are kept in network order.
    assert_eq!(&bytes[42..44], &[0x12, 0x34]);
    assert_eq!(&bytes[44..50], &[2, 0, 0, 0, 0, 9]);
    assert_eq!(ident.key(), key(0x1234));
}

#[test]
fn flags_share_the_receive_base() {
    let store = FlowStore::with_capacity(4).unwrap();
    let mut pool = FlowPool::new(4);
    let id = pool.create(&store, identity(1)).unwrap();

    let mut guard = store.lock(id).unwrap();
    guard.insert_flags(FlowFlags::TXFIN | FlowFlags::ECN);
    assert_eq!(guard.identity().rx_base(), 0x1000);
    assert!(guard.flags().contains(FlowFlags::TXFIN));
    guard.remove_flags(FlowFlags::ECN);
    assert_eq!(guard.flags(), FlowFlags::TXFIN);
}

#[test]
fn unaligned_base_rejected() {
    let store = FlowStore::with_capacity(1).unwrap();
    let mut pool = FlowPool::new(1);
    let bad = identity(1).with_rx_buffer(0x1001, 4096);
    assert_eq!(pool.create(&store, bad), Err(Error::Illegal));
    assert_eq!(pool.in_use(), 0);
}

#[test]
fn pool_exhaustion_and_reuse() {
    let store = FlowStore::with_capacity(2).unwrap();
    let mut pool = FlowPool::new(2);
    let first = pool.create(&store, identity(1)).unwrap();
    let second = pool.create(&store, identity(2)).unwrap();
    assert_eq!((first, second), (FlowId(0), FlowId(1)));
    assert_eq!(pool.create(&store, identity(3)), Err(Error::NoCapacity));

    {
        let mut guard = store.lock(first).unwrap();
        guard.tx_sent = 100;
        guard.set_bump_seq(9);
    }

    pool.release(&store, first).unwrap();
    assert_eq!(pool.release(&store, first), Err(Error::Illegal));

    let again = pool.create(&store, identity(3)).unwrap();
    assert_eq!(again, first);
    let guard = store.lock(again).unwrap();
    assert_eq!(guard.tx_sent, 0);
    assert_eq!(guard.bump_seq(), 0);
    assert_eq!(guard.identity().opaque(), 3);
}

#[test]
fn out_of_range() {
    let store = FlowStore::with_capacity(2).unwrap();
    assert!(matches!(store.lock(FlowId(2)), Err(Error::NotFound)));
}

#[test]
fn try_lock_contended() {
    let store = FlowStore::with_capacity(1).unwrap();
    let guard = store.lock(FlowId(0)).unwrap();
    assert!(matches!(store.try_lock(FlowId(0)), Err(Error::WouldBlock)));
    drop(guard);
    assert!(store.try_lock(FlowId(0)).is_ok());
}

#[test]
fn lock_excludes_other_threads() {
    const THREADS: usize = 4;
    const ROUNDS: u32 = 10_000;

    let store = Arc::new(FlowStore::with_capacity(1).unwrap());
    let workers: Vec<_> = (0..THREADS).map(|_| {
        let store = store.clone();
        thread::spawn(move || {
            for _ in 0..ROUNDS {
                let mut guard = store.lock(FlowId(0)).unwrap();
                // Two dependent registers, torn if the lock did not exclude.
                let sent = guard.tx_sent;
                guard.tx_avail = guard.tx_avail.wrapping_add(1);
                guard.tx_sent = sent + 1;
            }
        })
    }).collect();

    for worker in workers {
        worker.join().unwrap();
    }

    let guard = store.lock(FlowId(0)).unwrap();
    assert_eq!(guard.tx_sent, THREADS as u32 * ROUNDS);
    assert_eq!(guard.tx_avail, guard.tx_sent);
    assert!(store.get(FlowId(0)).unwrap().is_locked());
}
