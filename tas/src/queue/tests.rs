use std::thread;

use super::*;
use crate::layout::{AppTx, AppTxRepr, BumpUpdate, KernelTx, KernelTxRepr, TxFlags};

fn bump(seq: u16) -> AppTxRepr {
    AppTxRepr::ConnUpdate(BumpUpdate {
        flow_id: 3,
        rx_bump: u32::from(seq),
        tx_bump: 0,
        bump_seq: seq,
        flags: TxFlags::empty(),
    })
}

#[test]
fn full_and_empty() {
    let (mut tx, mut rx) = channel::<AppTx>(4).unwrap();
    assert!(rx.is_empty());
    assert_eq!(rx.pop(), Ok(None));

    for seq in 1..=4 {
        tx.push(&bump(seq)).unwrap();
    }
    assert!(!tx.has_space());
    assert_eq!(tx.push(&bump(5)), Err(Error::WouldBlock));

    assert_eq!(rx.pop(), Ok(Some(bump(1))));
    assert!(tx.has_space());
    tx.push(&bump(5)).unwrap();

    for seq in 2..=5 {
        assert_eq!(rx.pop(), Ok(Some(bump(seq))));
    }
    assert_eq!(rx.pop(), Ok(None));
    assert_eq!(tx.position(), 1);
    assert_eq!(rx.position(), 1);
}

#[test]
fn malformed_entry_is_released() {
    let region = Arc::new(Region::zeroed(ring_len::<KernelTx>(2)).unwrap());
    let mut rx = Consumer::<KernelTx>::new(region.clone(), 0, 2).unwrap();
    // A foreign writer published an unassigned type into the first slot.
    unsafe { region.bytes_mut(63, 1).unwrap()[0] = 0x7f };
    let mut tx = Producer::<KernelTx>::with_position(region.clone(), 0, 2, 1).unwrap();

    assert_eq!(rx.pop(), Err(Error::Unrecognized));
    tx.push(&KernelTxRepr::ConnRetransmit { flow_id: 1 }).unwrap();
    tx.push(&KernelTxRepr::ConnRetransmit { flow_id: 2 }).unwrap();
    assert_eq!(rx.pop(), Ok(Some(KernelTxRepr::ConnRetransmit { flow_id: 1 })));
    assert_eq!(rx.pop(), Ok(Some(KernelTxRepr::ConnRetransmit { flow_id: 2 })));
}

#[test]
fn ring_bounds() {
    let region = Arc::new(Region::zeroed(100).unwrap());
    assert!(Producer::<AppTx>::new(region.clone(), 0, 6).is_ok());
    assert_eq!(Producer::<AppTx>::new(region.clone(), 0, 7).err(), Some(Error::Truncated));
    assert_eq!(Consumer::<AppTx>::new(region.clone(), 0, 0).err(), Some(Error::Illegal));
    assert_eq!(Consumer::<AppTx>::with_position(region, 0, 4, 4).err(), Some(Error::Illegal));
}

#[test]
fn ordered_across_threads() {
    const COUNT: u16 = 10_000;
    let (mut tx, mut rx) = channel::<AppTx>(16).unwrap();

    let producer = thread::spawn(move || {
        let mut seq = 1;
        while seq <= COUNT {
            match tx.push(&bump(seq)) {
                Ok(()) => seq += 1,
                Err(Error::WouldBlock) => thread::yield_now(),
                Err(other) => panic!("unexpected {:?}", other),
            }
        }
    });

    let mut expected = 1;
    while expected <= COUNT {
        match rx.pop().unwrap() {
            Some(entry) => {
                assert_eq!(entry, bump(expected));
                expected += 1;
            },
            None => thread::yield_now(),
        }
    }

    producer.join().unwrap();
    assert!(rx.is_empty());
}

#[test]
fn peek_then_poll_batch() {
    let (mut tx, mut rx) = channel::<AppTx>(8).unwrap();
    for seq in 1..=5 {
        tx.push(&bump(seq)).unwrap();
    }

    assert_eq!(rx.peek(), Ok(Some(bump(1))));
    assert_eq!(rx.peek(), Ok(Some(bump(1))));

    let mut seen = Vec::new();
    assert_eq!(rx.poll(3, |entry| seen.push(entry)), 3);
    assert_eq!(seen, vec![bump(1), bump(2), bump(3)]);
    assert_eq!(rx.poll(10, |entry| seen.push(entry)), 2);
    assert_eq!(rx.poll(10, |_| unreachable!()), 0);
    assert_eq!(rx.peek(), Ok(None));
}
