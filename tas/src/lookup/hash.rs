//! The flow hash, a keyed SipHash-2-4 over the four tuple.
//!
//! Every actor that inserts into or reads from the same lookup table must use the same key. The
//! default key is fixed, deployments that fear hash flooding should distribute a random key
//! through their configuration instead.
//!
//! > SipHash: a fast short-input PRF, Jean-Philippe Aumasson and Daniel J. Bernstein
use crate::flow::FlowKey;

/// A keyed hash of flow four tuples.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlowHasher {
    keys: (u64, u64),
}

// Initial values of the paper, as ASCII text.
const IV: [&[u8; 8]; 4] = [
    b"somepseu",
    b"dorandom",
    b"lygenera",
    b"tedbytes"];

const DEFAULT_KEY: [u8; 16] = *b"tas flow lookup!";

struct State {
    v0: u64,
    v1: u64,
    v2: u64,
    v3: u64,
}

impl FlowHasher {
    /// Create a hasher by deriving a key from the standard `RandomState`.
    ///
    /// Only useful when a single process owns the table, other processes can not derive the same
    /// key.
    #[cfg(feature = "std")]
    pub fn from_std_hash() -> Self {
        use std::hash::{Hasher, BuildHasher};
        use std::collections::hash_map::RandomState;

        let hash = RandomState::new().build_hasher();
        let x0 = {
            let mut hash = hash.clone();
            hash.write_u64(0);
            hash.finish()
        };
        let x1 = {
            let mut hash = hash.clone();
            hash.write_u64(1);
            hash.finish()
        };

        FlowHasher { keys: (x0, x1) }
    }

    /// Create a hasher with a shared secret key.
    pub fn from_secret_key_bytes(bytes: [u8; 16]) -> Self {
        let [a0, a1, a2, a3, a4, a5, a6, a7, b0, b1, b2, b3, b4, b5, b6, b7] = bytes;
        let a = u64::from_le_bytes([a0, a1, a2, a3, a4, a5, a6, a7]);
        let b = u64::from_le_bytes([b0, b1, b2, b3, b4, b5, b6, b7]);
        FlowHasher { keys: (a, b) }
    }

    /// Create a hasher from the two halves of its key.
    pub fn from_key(a: u64, b: u64) -> Self {
        FlowHasher { keys: (a, b) }
    }

    /// The full 64-bit hash of a four tuple.
    pub fn hash64(&self, key: &FlowKey) -> u64 {
        let mut state = State::init(self.keys.0, self.keys.1);
        let m = u64::from(u32::from(key.local_ip))
            | u64::from(u32::from(key.remote_ip)) << 32;
        let p = u64::from(key.local_port)
            | u64::from(key.remote_port) << 16
            // Message length = 12
            | 12_u64 << 56;
        state.absorb(m);
        state.absorb(p);
        state.finalize()
    }

    /// The 32-bit hash stored in the lookup table.
    pub fn hash(&self, key: &FlowKey) -> u32 {
        let full = self.hash64(key);
        (full ^ (full >> 32)) as u32
    }
}

impl Default for FlowHasher {
    fn default() -> Self {
        FlowHasher::from_secret_key_bytes(DEFAULT_KEY)
    }
}

impl State {
    const SIP_C: usize = 2;
    const SIP_D: usize = 4;

    fn init(k0: u64, k1: u64) -> Self {
        State {
            v0: u64::from_be_bytes(*IV[0]) ^ k0,
            v1: u64::from_be_bytes(*IV[1]) ^ k1,
            v2: u64::from_be_bytes(*IV[2]) ^ k0,
            v3: u64::from_be_bytes(*IV[3]) ^ k1,
        }
    }

    fn round(&mut self) {
        self.v0 = self.v0.wrapping_add(self.v1);
        self.v1 = self.v1.rotate_left(13);
        self.v1 ^= self.v0;
        self.v0 = self.v0.rotate_left(32);
        self.v2 = self.v2.wrapping_add(self.v3);
        self.v3 = self.v3.rotate_left(16);
        self.v3 ^= self.v2;
        self.v0 = self.v0.wrapping_add(self.v3);
        self.v3 = self.v3.rotate_left(21);
        self.v3 ^= self.v0;
        self.v2 = self.v2.wrapping_add(self.v1);
        self.v1 = self.v1.rotate_left(17);
        self.v1 ^= self.v2;
        self.v2 = self.v2.rotate_left(32);
    }

    /// Process one 8-byte block, the caller appends the length block.
    fn absorb(&mut self, m: u64) {
        self.v3 ^= m;
        (0..Self::SIP_C).for_each(|_| self.round());
        self.v0 ^= m;
    }

    fn finalize(mut self) -> u64 {
        self.v2 ^= 0xff;
        (0..Self::SIP_D).for_each(|_| self.round());
        self.v0 ^ self.v1 ^ self.v2 ^ self.v3
    }
}

#[cfg(test)]
mod tests {
    use core::net::Ipv4Addr;
    use super::*;

    /// Appendix A of the paper.
    #[test]
    fn paper_vector() {
        let k0 = u64::from_le_bytes(0x0001020304050607_u64.to_be_bytes());
        let k1 = u64::from_le_bytes(0x08090a0b0c0d0e0f_u64.to_be_bytes());

        let mut state = State::init(k0, k1);
        state.absorb(u64::from_le_bytes(0x0001020304050607_u64.to_be_bytes()));
        state.absorb(u64::from_le_bytes(0x08090a0b0c0d0e0f_u64.to_be_bytes()));
        assert_eq!(state.finalize(), 0xa129ca6149be45e5);
    }

    #[test]
    fn direction_matters() {
        let key = FlowKey {
            local_ip: Ipv4Addr::new(192, 168, 0, 1),
            local_port: 443,
            remote_ip: Ipv4Addr::new(192, 168, 0, 2),
            remote_port: 50_000,
        };
        let hasher = FlowHasher::default();
        assert_eq!(hasher.hash(&key), hasher.hash(&key));
        assert_ne!(hasher.hash64(&key), hasher.hash64(&key.reverse()));
        assert_ne!(hasher.hash64(&key), FlowHasher::from_key(1, 2).hash64(&key));
    }
}
