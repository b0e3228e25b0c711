//! An in-process host: one fast path core and a scripted slow path.
#![allow(dead_code)]
use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::sync::Arc;

use tas::fastpath::{AckInfo, FastPath, FlowInit, Flows, RxOutcome, RxSegment, StateMemory};
use tas::flow::{FlowId, FlowIdentity, FlowKey};
use tas::layout::{
    info_region,
    AdminIn,
    AdminInRepr,
    AdminOut,
    AdminOutRepr,
    ConnParams,
    FlowProgress,
    InfoFlags,
    InfoRepr,
    StateLayout,
    INFO_BYTES,
};
use tas::lookup::FlowHasher;
use tas::queue::{Consumer, Producer};
use tas::region::Region;
use tas::time::Instant;
use tas_ll::{channels, Config, Context, Event};

pub const LOCAL: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
pub const REMOTE: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);
pub const BUF_LEN: u32 = 1024;
const BUFFER_MEMORY: usize = 64 * 1024;

pub struct Host {
    pub flows: Flows,
    pub fastpath: FastPath,
    pub buffers: Arc<Region>,
    pub config: Config,
    admins: Vec<Admin>,
    listeners: Vec<Listen>,
    next_offset: u64,
    next_port: u16,
}

struct Admin {
    db_id: u16,
    requests: Consumer<AdminOut>,
    replies: Producer<AdminIn>,
}

struct Listen {
    port: u16,
    db_id: u16,
    opaque: u64,
    backlog: VecDeque<(Ipv4Addr, u16)>,
    accepts: VecDeque<u64>,
}

/// An information region as published by a fast path.
pub fn published_info(ready: bool) -> Region {
    let region = Region::zeroed(INFO_BYTES).unwrap();
    let repr = InfoRepr {
        flags: if ready { InfoFlags::READY } else { InfoFlags::from_bits(0) },
        buf_mem_size: BUFFER_MEMORY as u64,
        state_mem_size: 0,
        mac_address: [2, 0, 0, 0, 0, 1],
        qmq_num: 0,
        cores_num: 1,
    };
    let bytes = unsafe { region.bytes_mut(0, INFO_BYTES).unwrap() };
    repr.emit(info_region::new_checked_mut(bytes).unwrap());
    region
}

impl Host {
    pub fn new() -> Self {
        Host::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let memory = StateMemory::zeroed(StateLayout::with_flows(64)).unwrap();
        let tables = memory.flow_tables(FlowHasher::default()).unwrap();
        let buffers = Arc::new(Region::zeroed(BUFFER_MEMORY).unwrap());
        Host {
            flows: Flows::new(tables.clone()),
            fastpath: FastPath::new(0, tables, buffers.clone()),
            buffers,
            config,
            admins: Vec::new(),
            listeners: Vec::new(),
            next_offset: 0,
            next_port: 40000,
        }
    }

    /// Create a context and wire its queues to the fast path and the slow path.
    pub fn context(&mut self, db_id: u16) -> Context {
        let (queues, peer) = channels(&self.config, db_id).unwrap();
        for (rx, tx) in peer.cores {
            self.fastpath.attach_context(db_id, rx, tx).unwrap();
        }
        self.admins.push(Admin {
            db_id,
            requests: peer.admin_out,
            replies: peer.admin_in,
        });
        Context::new(self.config.clone(), self.buffers.clone(), queues).unwrap()
    }

    /// Answer all outstanding administrative requests.
    pub fn serve(&mut self) -> usize {
        let mut requests = Vec::new();
        for admin in &mut self.admins {
            let db_id = admin.db_id;
            admin.requests.poll(64, |request| requests.push((db_id, request)));
        }

        let served = requests.len();
        for (db_id, request) in requests {
            self.handle(db_id, request);
        }
        served
    }

    fn handle(&mut self, db_id: u16, request: AdminOutRepr) {
        match request {
            AdminOutRepr::ListenOpen { opaque, local_port, .. } => {
                let taken = self.listeners.iter().any(|listen| listen.port == local_port);
                if !taken {
                    self.listeners.push(Listen {
                        port: local_port,
                        db_id,
                        opaque,
                        backlog: VecDeque::new(),
                        accepts: VecDeque::new(),
                    });
                }
                let status = if taken { -98 } else { 0 };
                self.reply(db_id, AdminInRepr::ListenOpen { opaque, status });
            },
            AdminOutRepr::ListenAccept { listener, opaque } => {
                if let Some(idx) = self.listeners.iter().position(|listen| listen.opaque == listener) {
                    self.listeners[idx].accepts.push_back(opaque);
                    self.match_accepts(idx);
                }
            },
            AdminOutRepr::ConnOpen { opaque, remote_ip, remote_port } => {
                let key = FlowKey {
                    local_ip: LOCAL,
                    local_port: self.next_port,
                    remote_ip,
                    remote_port,
                };
                self.next_port += 1;
                let params = self.install(db_id, opaque, key);
                self.reply(db_id, AdminInRepr::ConnOpen { opaque, status: 0, params });
            },
            AdminOutRepr::ConnClose { opaque, flow_id, .. } => {
                let status = match self.flows.remove(FlowId(flow_id)) {
                    Ok(()) => 0,
                    Err(_) => -2,
                };
                self.reply(db_id, AdminInRepr::ConnClosed { opaque, status });
            },
            AdminOutRepr::ConnMove { opaque, flow_id, db_id: target, bump_seq } => {
                let reply = match self.flows.move_flow(FlowId(flow_id), target, opaque, bump_seq) {
                    Ok((next, progress)) => AdminInRepr::ConnMoved { opaque, status: 0, bump_seq: next, progress },
                    Err(_) => AdminInRepr::ConnMoved {
                        opaque,
                        status: -2,
                        bump_seq: 0,
                        progress: FlowProgress::default(),
                    },
                };
                self.reply(target, reply);
            },
        }
    }

    /// A peer connects to a listening port.
    pub fn incoming(&mut self, port: u16, remote_ip: Ipv4Addr, remote_port: u16) {
        let idx = self.listeners.iter().position(|listen| listen.port == port).unwrap();
        let (db_id, opaque) = (self.listeners[idx].db_id, self.listeners[idx].opaque);
        self.listeners[idx].backlog.push_back((remote_ip, remote_port));
        self.reply(db_id, AdminInRepr::ListenNewConn { opaque, remote_ip, remote_port });
        self.match_accepts(idx);
    }

    fn match_accepts(&mut self, idx: usize) {
        loop {
            let listen = &mut self.listeners[idx];
            if listen.backlog.is_empty() || listen.accepts.is_empty() {
                return;
            }
            let (remote_ip, remote_port) = listen.backlog.pop_front().unwrap();
            let opaque = listen.accepts.pop_front().unwrap();
            let (db_id, port) = (listen.db_id, listen.port);

            let key = FlowKey { local_ip: LOCAL, local_port: port, remote_ip, remote_port };
            let params = self.install(db_id, opaque, key);
            self.reply(db_id, AdminInRepr::ListenAccept { opaque, status: 0, params });
        }
    }

    fn install(&mut self, db_id: u16, opaque: u64, key: FlowKey) -> ConnParams {
        let rx_off = self.next_offset;
        let tx_off = rx_off + u64::from(BUF_LEN);
        self.next_offset += 2 * u64::from(BUF_LEN);

        let init = FlowInit {
            identity: FlowIdentity::new(key, opaque)
                .with_rx_buffer(rx_off, BUF_LEN)
                .with_tx_buffer(tx_off, BUF_LEN)
                .with_context(db_id),
            rx_next_seq: 1,
            tx_next_seq: 1,
            remote_window: 65535,
            tx_rate: 0,
        };
        let id = self.flows.install(&init).unwrap();

        ConnParams {
            rx_off,
            rx_len: BUF_LEN,
            tx_off,
            tx_len: BUF_LEN,
            flow_id: id.0,
            local_ip: key.local_ip,
            local_port: key.local_port,
            remote_ip: key.remote_ip,
            remote_port: key.remote_port,
            seq_rx: 1,
            seq_tx: 1,
            fn_core: 0,
        }
    }

    fn reply(&mut self, db_id: u16, reply: AdminInRepr) {
        let admin = self.admins.iter_mut().find(|admin| admin.db_id == db_id).unwrap();
        admin.replies.push(&reply).unwrap();
    }

    /// The peer sends in-order data.
    pub fn deliver(&mut self, flow: u32, payload: &[u8]) -> RxOutcome {
        self.segment(flow, payload, false)
    }

    /// The peer closes its sending direction.
    pub fn fin(&mut self, flow: u32) -> RxOutcome {
        self.segment(flow, &[], true)
    }

    fn segment(&mut self, flow: u32, payload: &[u8], fin: bool) -> RxOutcome {
        let seq = self.flows.tables().store().lock(FlowId(flow)).unwrap().rx_next_seq;
        let segment = RxSegment { seq, payload, fin, ts_val: 0 };
        self.fastpath.rx_segment(FlowId(flow), &segment).unwrap()
    }

    /// Apply bumps, transmit everything the flow has and acknowledge it.
    pub fn send_all(&mut self, flow: u32) -> Vec<u8> {
        self.fastpath.poll_app(64);

        let id = FlowId(flow);
        let now = Instant::from_micros(0);
        let mut data = Vec::new();
        let mut ack = None;
        while let Some(segment) = self.fastpath.tx_segment(id, 1460, now).unwrap() {
            let mut payload = vec![0; segment.span.len as usize];
            self.fastpath.copy_payload(&segment, &mut payload).unwrap();
            data.extend_from_slice(&payload);
            ack = Some(segment.seq.wrapping_add(segment.span.len));
        }

        if let Some(ack) = ack {
            let info = AckInfo { ack, window: 65535, ..AckInfo::default() };
            self.fastpath.rx_ack(id, &info, now).unwrap();
        }
        data
    }
}

/// Poll until at least one event arrived, running the host in between.
pub fn events(host: &mut Host, context: &mut Context) -> Vec<Event> {
    let mut events = Vec::new();
    for _ in 0..4 {
        host.serve();
        host.fastpath.poll_app(64);
        context.poll(&mut events, 64);
        if !events.is_empty() {
            break;
        }
    }
    events
}
