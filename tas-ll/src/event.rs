use core::fmt;
use std::net::Ipv4Addr;

use crate::arena::Handle;

/// A listening port of a context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerHandle(pub(crate) Handle);

/// A connection of a context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnHandle(pub(crate) Handle);

/// Something that happened on a context.
///
/// Asynchronous completions carry the status reported by the slow path, zero for success and
/// negative for a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    /// A listener was opened, or failed to open and is gone.
    ListenOpen { listener: ListenerHandle, status: i16 },
    /// A peer connected to a listener and waits to be accepted.
    ListenNewConn { listener: ListenerHandle, remote_ip: Ipv4Addr, remote_port: u16 },
    /// An accepted connection is ready, or the accept failed.
    ListenAccept { conn: ConnHandle, status: i16 },
    /// An actively opened connection is established, or failed.
    ConnOpen { conn: ConnHandle, status: i16 },
    /// A connection is gone, its handle is no longer valid.
    ConnClosed { conn: ConnHandle, status: i16 },
    /// New data is in the receive buffer.
    ///
    /// The range may wrap, see `Context::received`.
    ConnReceived { conn: ConnHandle, pos: u32, len: u32 },
    /// Sent data was acknowledged, transmit buffer is available again.
    ConnSendBuf { conn: ConnHandle },
    /// The peer closed its sending direction, all its data has been received.
    ConnRxClosed { conn: ConnHandle },
    /// The close of our sending direction was acknowledged.
    ConnTxClosed { conn: ConnHandle },
    /// A connection moved to this context.
    ConnMoved { conn: ConnHandle, status: i16 },
}

impl ListenerHandle {
    pub fn opaque(self) -> u64 {
        self.0.to_opaque()
    }
}

impl ConnHandle {
    pub fn opaque(self) -> u64 {
        self.0.to_opaque()
    }
}

impl fmt::Display for ListenerHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

impl fmt::Display for ConnHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

impl Event {
    /// The connection an event refers to, if any.
    pub fn conn(&self) -> Option<ConnHandle> {
        match *self {
            Event::ListenOpen { .. } | Event::ListenNewConn { .. } => None,
            Event::ListenAccept { conn, .. }
            | Event::ConnOpen { conn, .. }
            | Event::ConnClosed { conn, .. }
            | Event::ConnReceived { conn, .. }
            | Event::ConnSendBuf { conn }
            | Event::ConnRxClosed { conn }
            | Event::ConnTxClosed { conn }
            | Event::ConnMoved { conn, .. } => Some(conn),
        }
    }
}
