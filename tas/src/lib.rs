//! Shared-memory fast path state of a kernel-bypass TCP acceleration service.
//!
//! ## Table of contents
//!
//! 1. [Design](#design-and-relevant-core-concepts)
//! 2. [The layout module](layout/index.html), the binary contract of all shared records
//! 3. [Ring queues](queue/index.html)
//! 4. [Flow state](flow/index.html) and [flow lookup](lookup/index.html)
//! 5. [Connection byte buffers](storage/index.html)
//! 6. [Fast path processing](fastpath/index.html)
//!
//! ## Design and relevant core concepts
//!
//! Three kinds of actors share the memory described here: the slow path in the kernel (or a
//! privileged service process) that sets up and tears down connections, the fast path that
//! processes packets, and any number of application contexts. None of them calls into another.
//! They communicate only through fixed-layout records in shared memory:
//!
//! * A fixed array of per-flow records, each guarded by its own spin lock.
//! * An open-addressed lookup table from a flow's four tuple hash to its record.
//! * Single-producer single-consumer ring queues whose entries are published by writing their
//!   type tag last.
//! * Per-connection circular byte buffers whose progress is communicated as offset deltas
//!   ("bumps") through the queues.
//!
//! Nothing here allocates on the hot path. Memory is handed in as a [`Region`] up front, either
//! heap allocated for an in-process setup or mapped from the shared memory files published by
//! the fast path (feature `std`).
//!
//! [`Region`]: region/struct.Region.html
#![warn(missing_docs)]
#![warn(unreachable_pub)]

// tests should be able to use `std`
#![cfg_attr(all(
    not(feature = "std"),
    not(test)),
no_std)]

extern crate alloc;

#[doc(hidden)]
#[cfg(feature = "log")]
pub extern crate log as __log;

#[macro_use] mod macros;
mod error;

pub mod fastpath;
pub mod flow;
pub mod layout;
pub mod lookup;
pub mod queue;
pub mod region;
pub mod storage;
#[cfg(feature = "std")]
pub mod sys;
pub mod time;

pub use error::{Error, Result};
