//! The application side of the tas fast path.
//!
//! An application thread owns a [`Context`]. Through it the application opens listeners and
//! connections (requests to the slow path over the administrative queues) and moves data (offset
//! bumps to the fast path over the per-core application queues). Nothing here blocks or makes a
//! system call on the data path, [`Context::poll`] collects everything that happened into
//! [`Event`]s and flushes the bumps that accumulated since the last call.
//!
//! ## Connecting
//!
//! A fast path publishes its shared memory under fixed names. [`attach`] maps the information
//! region and the buffer memory, distinguishing a fast path that is still starting up
//! ([`ConnectError::NotReady`]) from a hard failure. For an in-process setup the same can be done
//! from heap regions with [`Attachment::from_regions`] and queue pairs created by [`channels`].
//!
//! [`Context`]: struct.Context.html
//! [`Context::poll`]: struct.Context.html#method.poll
//! [`Event`]: enum.Event.html
//! [`attach`]: fn.attach.html
//! [`ConnectError::NotReady`]: enum.ConnectError.html#variant.NotReady
//! [`Attachment::from_regions`]: struct.Attachment.html#method.from_regions
//! [`channels`]: fn.channels.html
#![warn(unreachable_pub)]

#[macro_use]
extern crate tas;

mod arena;
mod config;
mod connect;
mod connection;
mod context;
mod event;
mod pending;
mod queues;

pub use tas::{Error, Result};
pub use tas::storage::Span;
pub use tas::sys::Errno;

pub use crate::arena::{Arena, Handle};
pub use crate::config::Config;
pub use crate::connect::{attach, attach_internal, Attachment, ConnectError};
pub use crate::connection::{ConnFlags, ConnState, Connection};
pub use crate::context::{Context, EVENTS_PER_UPDATE};
pub use crate::event::{ConnHandle, Event, ListenerHandle};
pub use crate::queues::{channels, ContextQueues, CoreQueues, PeerQueues};
