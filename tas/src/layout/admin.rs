//! Administrative messages between an application context and the slow path.
//!
//! Each context owns one queue in either direction. Requests carry the application's opaque
//! handle for the listener or connection they concern and every request is answered by exactly
//! one response carrying the same handle, except for `ListenNewConn` which the slow path sends
//! unprompted for each incoming connection on an open listener.
//!
//! Statuses are signed, zero is success and negative values are failures. Connection parameters
//! are only meaningful in successful responses.
use core::net::Ipv4Addr;
use byteorder::{ByteOrder, NativeEndian, NetworkEndian};

use crate::{Error, Result};
use super::Entry;

enum_with_unknown! {
    /// Type tag of an application to slow path message.
    pub doc enum AdminOutType(u8) {
        /// An empty slot.
        Invalid = 0,
        /// Open a listener.
        ListenOpen = 1,
        /// Accept on a listener.
        ListenAccept = 2,
        /// Open a connection.
        ConnOpen = 3,
        /// Close a connection.
        ConnClose = 4,
        /// Move a connection to another context.
        ConnMove = 5,
    }
}

enum_with_unknown! {
    /// Type tag of a slow path to application message.
    pub doc enum AdminInType(u8) {
        /// An empty slot.
        Invalid = 0,
        /// Listener opened or failed.
        ListenOpen = 1,
        /// A peer connected to a listener.
        ListenNewConn = 2,
        /// Accept completed.
        ListenAccept = 3,
        /// Open completed.
        ConnOpen = 4,
        /// Close completed.
        ConnClosed = 5,
        /// Move completed.
        ConnMoved = 6,
    }
}

byte_wrapper! {
    /// The payload of a request slot.
    #[derive(Debug, PartialEq, Eq)]
    pub struct admin_out([u8]);
}

byte_wrapper! {
    /// The payload of a response slot.
    #[derive(Debug, PartialEq, Eq)]
    pub struct admin_in([u8]);
}

mod field {
    use crate::layout::field::*;

    pub(crate) const OPAQUE: Field = 0..8;

    pub(crate) mod out {
        use super::Field;
        pub(crate) const LOCAL_PORT:  Field =  8..10;
        pub(crate) const BACKLOG:     Field = 10..14;
        pub(crate) const FLAGS:       usize = 14;
        pub(crate) const LISTENER:    Field =  8..16;
        pub(crate) const REMOTE_IP:   Field =  8..12;
        pub(crate) const REMOTE_PORT: Field = 12..14;
        pub(crate) const FLOW_ID:     Field =  8..12;
        pub(crate) const DB_ID:       Field = 12..14;
        pub(crate) const BUMP_SEQ:    Field = 16..18;
        pub(crate) const END:         usize = 18;
    }

    pub(crate) mod inb {
        use super::Field;
        pub(crate) const STATUS:      Field =  8..10;
        pub(crate) const BUMP_SEQ:    Field = 10..12;
        pub(crate) const RX_SEQ:      Field = 12..16;
        pub(crate) const RX_AVAIL:    Field = 16..20;
        pub(crate) const TX_ACKED:    Field = 20..24;
        pub(crate) const TX_HELD:     Field = 24..28;
        pub(crate) const PROGRESS:    usize = 28;
        pub(crate) const RX_OFF:      Field = 10..18;
        pub(crate) const RX_LEN:      Field = 18..22;
        pub(crate) const TX_OFF:      Field = 22..30;
        pub(crate) const TX_LEN:      Field = 30..34;
        pub(crate) const FLOW_ID:     Field = 34..38;
        pub(crate) const LOCAL_IP:    Field = 38..42;
        pub(crate) const LOCAL_PORT:  Field = 42..44;
        pub(crate) const REMOTE_IP:   Field = 44..48;
        pub(crate) const REMOTE_PORT: Field = 48..50;
        pub(crate) const SEQ_RX:      Field = 50..54;
        pub(crate) const SEQ_TX:      Field = 54..58;
        pub(crate) const FN_CORE:     Field = 58..60;
    }

    pub(crate) const FLAG_REUSEPORT: u8 = 1;
    pub(crate) const FLAG_RESET: u8 = 1;
    pub(crate) const PROGRESS_RX_FIN: u8 = 1;
    pub(crate) const PROGRESS_TX_FIN: u8 = 2;
    pub(crate) const PROGRESS_TX_DONE: u8 = 4;
}

/// Marker for the application to slow path queue.
#[derive(Clone, Copy, Debug)]
pub enum AdminOut { }

/// Marker for the slow path to application queue.
#[derive(Clone, Copy, Debug)]
pub enum AdminIn { }

/// A request of an application context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdminOutRepr {
    /// Listen on a local port.
    ListenOpen {
        /// Handle of the new listener.
        opaque: u64,
        /// The port to listen on.
        local_port: u16,
        /// Incoming connections queued before they are accepted.
        backlog: u32,
        /// Share the port with other listeners.
        reuseport: bool,
    },
    /// Accept the next incoming connection of a listener into a new connection handle.
    ListenAccept {
        /// Handle of the listener.
        listener: u64,
        /// Handle of the new connection.
        opaque: u64,
    },
    /// Connect to a remote host.
    ConnOpen {
        /// Handle of the new connection.
        opaque: u64,
        /// Address of the peer.
        remote_ip: Ipv4Addr,
        /// Port of the peer.
        remote_port: u16,
    },
    /// Close an established connection.
    ConnClose {
        /// Handle of the connection.
        opaque: u64,
        /// The flow of the connection.
        flow_id: u32,
        /// Abort with a reset instead of an orderly close.
        reset: bool,
    },
    /// Route all further notifications of a flow to the requesting context.
    ConnMove {
        /// Handle of the connection in the requesting context.
        opaque: u64,
        /// The flow to move.
        flow_id: u32,
        /// Doorbell id of the requesting context.
        db_id: u16,
        /// The last bump sequence the connection used.
        bump_seq: u16,
    },
}

/// Everything an application needs to operate an established connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnParams {
    /// Offset of the receive buffer in the buffer memory.
    pub rx_off: u64,
    /// Size of the receive buffer.
    pub rx_len: u32,
    /// Offset of the transmit buffer in the buffer memory.
    pub tx_off: u64,
    /// Size of the transmit buffer.
    pub tx_len: u32,
    /// Index of the flow state record.
    pub flow_id: u32,
    /// Our address.
    pub local_ip: Ipv4Addr,
    /// Our port.
    pub local_port: u16,
    /// Address of the peer.
    pub remote_ip: Ipv4Addr,
    /// Port of the peer.
    pub remote_port: u16,
    /// Initial receive sequence number.
    pub seq_rx: u32,
    /// Initial transmit sequence number.
    pub seq_tx: u32,
    /// The fast path core whose queues carry this connection's updates.
    pub fn_core: u16,
}

/// The fast path's progress on a flow at the moment it moved.
///
/// Notifications issued before the move went to the previous context and bumps sent by it may
/// have been discarded as stale. The new context compares this snapshot with its own accounting
/// to catch up on both.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlowProgress {
    /// Sequence number of the next byte to be received.
    pub rx_next_seq: u32,
    /// Receive buffer space the fast path considers free.
    pub rx_avail: u32,
    /// Sequence number after the last acknowledged byte.
    pub tx_acked_seq: u32,
    /// Transmit bytes the fast path holds, sent or not, that are not yet acknowledged.
    pub tx_held: u32,
    /// The peer's FIN was received.
    pub rx_fin: bool,
    /// The application's close was applied.
    pub tx_fin: bool,
    /// The close was applied and everything before it acknowledged.
    pub tx_done: bool,
}

/// A response or notification of the slow path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdminInRepr {
    /// Outcome of a listen request.
    ListenOpen {
        /// Handle of the listener.
        opaque: u64,
        /// Zero or a negated error number.
        status: i16,
    },
    /// A peer connected to an open listener.
    ListenNewConn {
        /// Handle of the listener.
        opaque: u64,
        /// Address of the peer.
        remote_ip: Ipv4Addr,
        /// Port of the peer.
        remote_port: u16,
    },
    /// Outcome of an accept request.
    ListenAccept {
        /// Handle of the accepted connection.
        opaque: u64,
        /// Zero or a negated error number.
        status: i16,
        /// The connection, if successful.
        params: ConnParams,
    },
    /// Outcome of an open request.
    ConnOpen {
        /// Handle of the connection.
        opaque: u64,
        /// Zero or a negated error number.
        status: i16,
        /// The connection, if successful.
        params: ConnParams,
    },
    /// Outcome of a close request.
    ConnClosed {
        /// Handle of the connection.
        opaque: u64,
        /// Zero or a negated error number.
        status: i16,
    },
    /// The move completed, bumps from now on must be newer than `bump_seq`.
    ConnMoved {
        /// Handle of the connection in the new context.
        opaque: u64,
        /// Zero or a negated error number.
        status: i16,
        /// The sequence of the flow after the move.
        bump_seq: u16,
        /// The state of the flow at the move.
        progress: FlowProgress,
    },
}

impl Default for ConnParams {
    fn default() -> Self {
        ConnParams {
            rx_off: 0,
            rx_len: 0,
            tx_off: 0,
            tx_len: 0,
            flow_id: 0,
            local_ip: Ipv4Addr::UNSPECIFIED,
            local_port: 0,
            remote_ip: Ipv4Addr::UNSPECIFIED,
            remote_port: 0,
            seq_rx: 0,
            seq_tx: 0,
            fn_core: 0,
        }
    }
}

fn read_ip(bytes: &[u8]) -> Ipv4Addr {
    Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3])
}

impl admin_out {
    /// Wrap a slot payload without checking its length.
    pub fn new_unchecked(data: &[u8]) -> &Self {
        Self::__from_macro_new_unchecked(data)
    }

    /// Wrap a mutable slot payload without checking its length.
    pub fn new_unchecked_mut(data: &mut [u8]) -> &mut Self {
        Self::__from_macro_new_unchecked_mut(data)
    }

    /// Ensure that all fields are in bounds.
    pub fn check_len(&self) -> Result<()> {
        if self.0.len() < field::out::END {
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    /// The application's handle.
    pub fn opaque(&self) -> u64 {
        NativeEndian::read_u64(&self.0[field::OPAQUE])
    }

    /// The local port, network byte order on the wire.
    pub fn local_port(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::out::LOCAL_PORT])
    }

    /// The listen backlog.
    pub fn backlog(&self) -> u32 {
        NativeEndian::read_u32(&self.0[field::out::BACKLOG])
    }

    /// Request flags, reuseport or reset.
    pub fn flags(&self) -> u8 {
        self.0[field::out::FLAGS]
    }

    /// The listener handle of an accept.
    pub fn listener(&self) -> u64 {
        NativeEndian::read_u64(&self.0[field::out::LISTENER])
    }

    /// The peer's address.
    pub fn remote_ip(&self) -> Ipv4Addr {
        read_ip(&self.0[field::out::REMOTE_IP])
    }

    /// The peer's port.
    pub fn remote_port(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::out::REMOTE_PORT])
    }

    /// The flow of a close or move.
    pub fn flow_id(&self) -> u32 {
        NativeEndian::read_u32(&self.0[field::out::FLOW_ID])
    }

    /// The doorbell id of a moving context.
    pub fn db_id(&self) -> u16 {
        NativeEndian::read_u16(&self.0[field::out::DB_ID])
    }

    /// The bump sequence of a move.
    pub fn bump_seq(&self) -> u16 {
        NativeEndian::read_u16(&self.0[field::out::BUMP_SEQ])
    }

    /// Set the application's handle.
    pub fn set_opaque(&mut self, value: u64) {
        NativeEndian::write_u64(&mut self.0[field::OPAQUE], value)
    }

    /// Set the local port.
    pub fn set_local_port(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::out::LOCAL_PORT], value)
    }

    /// Set the listen backlog.
    pub fn set_backlog(&mut self, value: u32) {
        NativeEndian::write_u32(&mut self.0[field::out::BACKLOG], value)
    }

    /// Set the request flags.
    pub fn set_flags(&mut self, value: u8) {
        self.0[field::out::FLAGS] = value
    }

    /// Set the listener handle.
    pub fn set_listener(&mut self, value: u64) {
        NativeEndian::write_u64(&mut self.0[field::out::LISTENER], value)
    }

    /// Set the peer's address.
    pub fn set_remote_ip(&mut self, value: Ipv4Addr) {
        self.0[field::out::REMOTE_IP].copy_from_slice(&value.octets())
    }

    /// Set the peer's port.
    pub fn set_remote_port(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::out::REMOTE_PORT], value)
    }

    /// Set the flow.
    pub fn set_flow_id(&mut self, value: u32) {
        NativeEndian::write_u32(&mut self.0[field::out::FLOW_ID], value)
    }

    /// Set the doorbell id.
    pub fn set_db_id(&mut self, value: u16) {
        NativeEndian::write_u16(&mut self.0[field::out::DB_ID], value)
    }

    /// Set the bump sequence.
    pub fn set_bump_seq(&mut self, value: u16) {
        NativeEndian::write_u16(&mut self.0[field::out::BUMP_SEQ], value)
    }
}

impl admin_in {
    /// Wrap a slot payload without checking its length.
    pub fn new_unchecked(data: &[u8]) -> &Self {
        Self::__from_macro_new_unchecked(data)
    }

    /// Wrap a mutable slot payload without checking its length.
    pub fn new_unchecked_mut(data: &mut [u8]) -> &mut Self {
        Self::__from_macro_new_unchecked_mut(data)
    }

    /// Ensure that all fields are in bounds.
    pub fn check_len(&self) -> Result<()> {
        if self.0.len() < field::inb::FN_CORE.end {
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    /// The application's handle.
    pub fn opaque(&self) -> u64 {
        NativeEndian::read_u64(&self.0[field::OPAQUE])
    }

    /// Zero or a negated error number.
    pub fn status(&self) -> i16 {
        NativeEndian::read_i16(&self.0[field::inb::STATUS])
    }

    /// The bump sequence of a move.
    pub fn bump_seq(&self) -> u16 {
        NativeEndian::read_u16(&self.0[field::inb::BUMP_SEQ])
    }

    /// The peer's address.
    pub fn remote_ip(&self) -> Ipv4Addr {
        read_ip(&self.0[field::inb::REMOTE_IP])
    }

    /// The peer's port.
    pub fn remote_port(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::inb::REMOTE_PORT])
    }

    /// Read the progress snapshot of a moved flow.
    pub fn progress(&self) -> FlowProgress {
        let flags = self.0[field::inb::PROGRESS];
        FlowProgress {
            rx_next_seq: NativeEndian::read_u32(&self.0[field::inb::RX_SEQ]),
            rx_avail: NativeEndian::read_u32(&self.0[field::inb::RX_AVAIL]),
            tx_acked_seq: NativeEndian::read_u32(&self.0[field::inb::TX_ACKED]),
            tx_held: NativeEndian::read_u32(&self.0[field::inb::TX_HELD]),
            rx_fin: flags & field::PROGRESS_RX_FIN != 0,
            tx_fin: flags & field::PROGRESS_TX_FIN != 0,
            tx_done: flags & field::PROGRESS_TX_DONE != 0,
        }
    }

    /// Read the connection parameter block.
    pub fn params(&self) -> ConnParams {
        ConnParams {
            rx_off: NativeEndian::read_u64(&self.0[field::inb::RX_OFF]),
            rx_len: NativeEndian::read_u32(&self.0[field::inb::RX_LEN]),
            tx_off: NativeEndian::read_u64(&self.0[field::inb::TX_OFF]),
            tx_len: NativeEndian::read_u32(&self.0[field::inb::TX_LEN]),
            flow_id: NativeEndian::read_u32(&self.0[field::inb::FLOW_ID]),
            local_ip: read_ip(&self.0[field::inb::LOCAL_IP]),
            local_port: NetworkEndian::read_u16(&self.0[field::inb::LOCAL_PORT]),
            remote_ip: self.remote_ip(),
            remote_port: self.remote_port(),
            seq_rx: NativeEndian::read_u32(&self.0[field::inb::SEQ_RX]),
            seq_tx: NativeEndian::read_u32(&self.0[field::inb::SEQ_TX]),
            fn_core: NativeEndian::read_u16(&self.0[field::inb::FN_CORE]),
        }
    }

    /// Set the application's handle.
    pub fn set_opaque(&mut self, value: u64) {
        NativeEndian::write_u64(&mut self.0[field::OPAQUE], value)
    }

    /// Set the status.
    pub fn set_status(&mut self, value: i16) {
        NativeEndian::write_i16(&mut self.0[field::inb::STATUS], value)
    }

    /// Set the bump sequence.
    pub fn set_bump_seq(&mut self, value: u16) {
        NativeEndian::write_u16(&mut self.0[field::inb::BUMP_SEQ], value)
    }

    /// Set the peer's address.
    pub fn set_remote_ip(&mut self, value: Ipv4Addr) {
        self.0[field::inb::REMOTE_IP].copy_from_slice(&value.octets())
    }

    /// Set the peer's port.
    pub fn set_remote_port(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::inb::REMOTE_PORT], value)
    }

    /// Write the progress snapshot of a moved flow.
    pub fn set_progress(&mut self, progress: &FlowProgress) {
        NativeEndian::write_u32(&mut self.0[field::inb::RX_SEQ], progress.rx_next_seq);
        NativeEndian::write_u32(&mut self.0[field::inb::RX_AVAIL], progress.rx_avail);
        NativeEndian::write_u32(&mut self.0[field::inb::TX_ACKED], progress.tx_acked_seq);
        NativeEndian::write_u32(&mut self.0[field::inb::TX_HELD], progress.tx_held);
        let mut flags = 0;
        if progress.rx_fin {
            flags |= field::PROGRESS_RX_FIN;
        }
        if progress.tx_fin {
            flags |= field::PROGRESS_TX_FIN;
        }
        if progress.tx_done {
            flags |= field::PROGRESS_TX_DONE;
        }
        self.0[field::inb::PROGRESS] = flags;
    }

    /// Write the connection parameter block.
    pub fn set_params(&mut self, params: &ConnParams) {
        NativeEndian::write_u64(&mut self.0[field::inb::RX_OFF], params.rx_off);
        NativeEndian::write_u32(&mut self.0[field::inb::RX_LEN], params.rx_len);
        NativeEndian::write_u64(&mut self.0[field::inb::TX_OFF], params.tx_off);
        NativeEndian::write_u32(&mut self.0[field::inb::TX_LEN], params.tx_len);
        NativeEndian::write_u32(&mut self.0[field::inb::FLOW_ID], params.flow_id);
        self.0[field::inb::LOCAL_IP].copy_from_slice(&params.local_ip.octets());
        NetworkEndian::write_u16(&mut self.0[field::inb::LOCAL_PORT], params.local_port);
        self.set_remote_ip(params.remote_ip);
        self.set_remote_port(params.remote_port);
        NativeEndian::write_u32(&mut self.0[field::inb::SEQ_RX], params.seq_rx);
        NativeEndian::write_u32(&mut self.0[field::inb::SEQ_TX], params.seq_tx);
        NativeEndian::write_u16(&mut self.0[field::inb::FN_CORE], params.fn_core);
    }
}

impl AdminOutRepr {
    /// Parse a request of the given type.
    pub fn parse(tag: AdminOutType, entry: &admin_out) -> Result<Self> {
        entry.check_len()?;
        let opaque = entry.opaque();
        Ok(match tag {
            AdminOutType::ListenOpen => AdminOutRepr::ListenOpen {
                opaque,
                local_port: entry.local_port(),
                backlog: entry.backlog(),
                reuseport: entry.flags() & field::FLAG_REUSEPORT != 0,
            },
            AdminOutType::ListenAccept => AdminOutRepr::ListenAccept {
                listener: entry.listener(),
                opaque,
            },
            AdminOutType::ConnOpen => AdminOutRepr::ConnOpen {
                opaque,
                remote_ip: entry.remote_ip(),
                remote_port: entry.remote_port(),
            },
            AdminOutType::ConnClose => AdminOutRepr::ConnClose {
                opaque,
                flow_id: entry.flow_id(),
                reset: entry.flags() & field::FLAG_RESET != 0,
            },
            AdminOutType::ConnMove => AdminOutRepr::ConnMove {
                opaque,
                flow_id: entry.flow_id(),
                db_id: entry.db_id(),
                bump_seq: entry.bump_seq(),
            },
            _ => return Err(Error::Unrecognized),
        })
    }

    /// Write the request, returning its type tag.
    pub fn emit(&self, entry: &mut admin_out) -> AdminOutType {
        match *self {
            AdminOutRepr::ListenOpen { opaque, local_port, backlog, reuseport } => {
                entry.set_opaque(opaque);
                entry.set_local_port(local_port);
                entry.set_backlog(backlog);
                entry.set_flags(if reuseport { field::FLAG_REUSEPORT } else { 0 });
                AdminOutType::ListenOpen
            },
            AdminOutRepr::ListenAccept { listener, opaque } => {
                entry.set_opaque(opaque);
                entry.set_listener(listener);
                AdminOutType::ListenAccept
            },
            AdminOutRepr::ConnOpen { opaque, remote_ip, remote_port } => {
                entry.set_opaque(opaque);
                entry.set_remote_ip(remote_ip);
                entry.set_remote_port(remote_port);
                AdminOutType::ConnOpen
            },
            AdminOutRepr::ConnClose { opaque, flow_id, reset } => {
                entry.set_opaque(opaque);
                entry.set_flow_id(flow_id);
                entry.set_flags(if reset { field::FLAG_RESET } else { 0 });
                AdminOutType::ConnClose
            },
            AdminOutRepr::ConnMove { opaque, flow_id, db_id, bump_seq } => {
                entry.set_opaque(opaque);
                entry.set_flow_id(flow_id);
                entry.set_db_id(db_id);
                entry.set_bump_seq(bump_seq);
                AdminOutType::ConnMove
            },
        }
    }
}

impl AdminInRepr {
    /// Parse a response of the given type.
    pub fn parse(tag: AdminInType, entry: &admin_in) -> Result<Self> {
        entry.check_len()?;
        let opaque = entry.opaque();
        Ok(match tag {
            AdminInType::ListenOpen => AdminInRepr::ListenOpen {
                opaque,
                status: entry.status(),
            },
            AdminInType::ListenNewConn => AdminInRepr::ListenNewConn {
                opaque,
                remote_ip: entry.remote_ip(),
                remote_port: entry.remote_port(),
            },
            AdminInType::ListenAccept => AdminInRepr::ListenAccept {
                opaque,
                status: entry.status(),
                params: entry.params(),
            },
            AdminInType::ConnOpen => AdminInRepr::ConnOpen {
                opaque,
                status: entry.status(),
                params: entry.params(),
            },
            AdminInType::ConnClosed => AdminInRepr::ConnClosed {
                opaque,
                status: entry.status(),
            },
            AdminInType::ConnMoved => AdminInRepr::ConnMoved {
                opaque,
                status: entry.status(),
                bump_seq: entry.bump_seq(),
                progress: entry.progress(),
            },
            _ => return Err(Error::Unrecognized),
        })
    }

    /// Write the response, returning its type tag.
    pub fn emit(&self, entry: &mut admin_in) -> AdminInType {
        match *self {
            AdminInRepr::ListenOpen { opaque, status } => {
                entry.set_opaque(opaque);
                entry.set_status(status);
                AdminInType::ListenOpen
            },
            AdminInRepr::ListenNewConn { opaque, remote_ip, remote_port } => {
                entry.set_opaque(opaque);
                entry.set_remote_ip(remote_ip);
                entry.set_remote_port(remote_port);
                AdminInType::ListenNewConn
            },
            AdminInRepr::ListenAccept { opaque, status, ref params } => {
                entry.set_opaque(opaque);
                entry.set_status(status);
                entry.set_params(params);
                AdminInType::ListenAccept
            },
            AdminInRepr::ConnOpen { opaque, status, ref params } => {
                entry.set_opaque(opaque);
                entry.set_status(status);
                entry.set_params(params);
                AdminInType::ConnOpen
            },
            AdminInRepr::ConnClosed { opaque, status } => {
                entry.set_opaque(opaque);
                entry.set_status(status);
                AdminInType::ConnClosed
            },
            AdminInRepr::ConnMoved { opaque, status, bump_seq, ref progress } => {
                entry.set_opaque(opaque);
                entry.set_status(status);
                entry.set_bump_seq(bump_seq);
                entry.set_progress(progress);
                AdminInType::ConnMoved
            },
        }
    }

    /// The handle of the listener or connection the message concerns.
    pub fn opaque(&self) -> u64 {
        match *self {
            AdminInRepr::ListenOpen { opaque, .. }
            | AdminInRepr::ListenNewConn { opaque, .. }
            | AdminInRepr::ListenAccept { opaque, .. }
            | AdminInRepr::ConnOpen { opaque, .. }
            | AdminInRepr::ConnClosed { opaque, .. }
            | AdminInRepr::ConnMoved { opaque, .. } => opaque,
        }
    }
}

impl Entry for AdminOut {
    const SIZE: usize = 64;
    type Repr = AdminOutRepr;

    fn parse(tag: u8, payload: &[u8]) -> Result<AdminOutRepr> {
        AdminOutRepr::parse(tag.into(), admin_out::new_unchecked(payload))
    }

    fn emit(repr: &AdminOutRepr, payload: &mut [u8]) -> u8 {
        repr.emit(admin_out::new_unchecked_mut(payload)).into()
    }
}

impl Entry for AdminIn {
    const SIZE: usize = 64;
    type Repr = AdminInRepr;

    fn parse(tag: u8, payload: &[u8]) -> Result<AdminInRepr> {
        AdminInRepr::parse(tag.into(), admin_in::new_unchecked(payload))
    }

    fn emit(repr: &AdminInRepr, payload: &mut [u8]) -> u8 {
        repr.emit(admin_in::new_unchecked_mut(payload)).into()
    }
}
