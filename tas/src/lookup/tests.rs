use core::net::Ipv4Addr;

use proptest::prelude::*;

use super::*;
use crate::flow::{FlowIdentity, FlowPool};

fn key(port: u16) -> FlowKey {
    FlowKey {
        local_ip: Ipv4Addr::new(10, 0, 0, 1),
        local_port: 7,
        remote_ip: Ipv4Addr::new(10, 0, 0, 2),
        remote_port: port,
    }
}

#[test]
fn fifth_in_bucket_is_full() {
    let table = LookupTable::with_entries(16, FlowHasher::default()).unwrap();
    // Buckets are indexed by hash modulo 4, all of these land in bucket 1.
    for (idx, hash) in [1u32, 5, 9, 13].iter().enumerate() {
        table.insert_hashed(*hash, FlowId(idx as u32)).unwrap();
    }
    assert_eq!(table.insert_hashed(17, FlowId(4)), Err(Error::BucketFull));
    // Other buckets are unaffected.
    table.insert_hashed(2, FlowId(4)).unwrap();

    table.remove_hashed(9, FlowId(2)).unwrap();
    table.insert_hashed(17, FlowId(5)).unwrap();
    assert_eq!(table.lookup_hashed(17, |_| true), Ok(FlowId(5)));
}

#[test]
fn hash_collision_is_verified() {
    let table = LookupTable::with_entries(8, FlowHasher::default()).unwrap();
    table.insert_hashed(42, FlowId(1)).unwrap();
    table.insert_hashed(42, FlowId(2)).unwrap();
    assert_eq!(table.lookup_hashed(42, |id| id == FlowId(2)), Ok(FlowId(2)));
    assert_eq!(table.lookup_hashed(42, |_| false), Err(Error::NotFound));
    // Same bucket, different hash.
    assert_eq!(table.lookup_hashed(44, |_| true), Err(Error::NotFound));
}

#[test]
fn removed_key_not_found() {
    let store = FlowStore::with_capacity(8).unwrap();
    let mut pool = FlowPool::new(8);
    let table = LookupTable::with_entries(16, FlowHasher::default()).unwrap();

    let ident = FlowIdentity::new(key(1000), 0)
        .with_rx_buffer(0, 1024)
        .with_tx_buffer(1024, 1024);
    let id = pool.create(&store, ident).unwrap();
    table.insert(&key(1000), id).unwrap();

    assert_eq!(table.lookup(&store, &key(1000)), Ok(id));
    assert_eq!(table.lookup(&store, &key(1001)), Err(Error::NotFound));

    table.remove(&key(1000), id).unwrap();
    assert_eq!(table.lookup(&store, &key(1000)), Err(Error::NotFound));
    assert_eq!(table.remove(&key(1000), id), Err(Error::NotFound));
}

#[test]
fn entry_word_layout() {
    let table = LookupTable::with_entries(4, FlowHasher::default()).unwrap();
    table.insert_hashed(0, FlowId(3)).unwrap();
    table.insert_hashed(0, FlowId(4)).unwrap();
    let word = table.slots()[1].flow_id.load(Ordering::Relaxed);
    assert_eq!(word, HtEntry::VALID | 1 << 29 | 4);
    assert_eq!(table.insert_hashed(0, FlowId(1 << 29)), Err(Error::Illegal));
}

#[test]
fn invalid_sizes() {
    assert!(LookupTable::with_entries(6, FlowHasher::default()).is_err());
    assert!(LookupTable::with_entries(0, FlowHasher::default()).is_err());
}

proptest! {
    #[test]
    fn table_matches_model(ops in prop::collection::vec((any::<bool>(), 0..32u32, 0..8u32), 0..128)) {
        let table = LookupTable::with_entries(16, FlowHasher::default()).unwrap();
        let mut model: Vec<(u32, FlowId)> = Vec::new();

        for (insert, hash, id) in ops {
            let flow = FlowId(id);
            let present = model.iter().position(|&entry| entry == (hash, flow));
            if insert {
                let bucket = model.iter().filter(|(other, _)| other % 4 == hash % 4).count();
                match table.insert_hashed(hash, flow) {
                    Ok(()) => model.push((hash, flow)),
                    Err(err) => {
                        prop_assert_eq!(err, Error::BucketFull);
                        prop_assert_eq!(bucket, FLOWHT_NBSZ);
                    },
                }
            } else {
                match present {
                    Some(idx) => {
                        prop_assert_eq!(table.remove_hashed(hash, flow), Ok(()));
                        model.swap_remove(idx);
                    },
                    None => prop_assert_eq!(table.remove_hashed(hash, flow), Err(Error::NotFound)),
                }
            }

            for key_hash in 0..32u32 {
                for candidate in 0..8u32 {
                    let want = FlowId(candidate);
                    let expected = model.contains(&(key_hash, want));
                    let found = table.lookup_hashed(key_hash, |id| id == want);
                    prop_assert_eq!(found.is_ok(), expected);
                }
            }
        }
    }
}
