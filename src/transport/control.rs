//! The discovery side-channel: a best-effort UDP socket used to find servers
//! and exchange their advertised metadata, fully separate from game-data
//! links.
//!
//! Nothing here blocks: the socket is polled with [`ControlSocket::listen`]
//! from the driving loop, and sends are fire-and-forget. Socket-level
//! failures surface as results from the operation that hit them and never
//! take the discovery loop down with them.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use thiserror::Error;
use tokio::net::UdpSocket;
use tracing::{debug, info, trace, warn};

use crate::protocol::HostInfo;
use crate::protocol::constants::{
    DEFAULT_CONTROL_PORT, DISCOVERY_MAGIC, MAX_CONTROL_DATAGRAM, MAX_HOSTS,
};
use crate::protocol::discovery::{DiscoveryMessage, InfoReply, InfoRequest, QuitNotice};
use crate::protocol::types::{Address, WireTime};

/// Errors from control socket operations.
#[derive(Error, Debug)]
pub enum ControlError {
    /// The local port could not be bound (in use, insufficient privilege).
    #[error("failed to bind control port {port}: {source}")]
    Bind { port: u16, source: io::Error },

    /// The given host name did not resolve to any address.
    #[error("could not resolve control host {host:?}")]
    Resolve { host: String },

    /// The socket has been shut down.
    #[error("control socket is shut down")]
    Closed,
}

/// A discovered server: its address, advertised metadata, and the measured
/// request/reply round trip.
#[derive(Debug, Clone)]
pub struct FoundHost {
    pub address: Address,
    pub info: HostInfo,
    pub latency: Duration,
}

/// Where outbound info requests go.
enum Target {
    /// LAN broadcast toward the well-known control port.
    Broadcast,
    /// One known server, opened with [`ControlSocket::open`].
    Unicast(SocketAddr),
}

/// The control connection: discovery requests out, host info in.
pub struct ControlSocket {
    /// `None` once shut down; every operation then fails or no-ops.
    socket: Option<UdpSocket>,
    /// Servers answer info requests; clients only collect replies.
    server_mode: bool,
    target: Target,
    /// Metadata advertised in our own info replies (server mode).
    info: HostInfo,
    hosts: Vec<FoundHost>,
    /// Clock origin for the millisecond timestamps stamped into requests.
    epoch: Instant,
}

impl ControlSocket {
    /// Binds a control socket on `port` (0 picks an ephemeral port). In
    /// server mode the socket answers inbound info requests with the
    /// metadata set via [`set_info`](Self::set_info).
    pub async fn init(server_mode: bool, port: u16) -> Result<Self, ControlError> {
        let bind = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        let socket = UdpSocket::bind(bind)
            .await
            .map_err(|source| ControlError::Bind { port, source })?;
        if let Err(e) = socket.set_broadcast(true) {
            // Discovery degrades to unicast-only; surfaced as absent replies.
            warn!(error = %e, "broadcast unavailable on control socket");
        }
        info!(port, server_mode, "control socket up");
        Ok(Self {
            socket: Some(socket),
            server_mode,
            target: Target::Broadcast,
            info: HostInfo::default(),
            hosts: Vec::new(),
            epoch: Instant::now(),
        })
    }

    /// Opens a unicast control channel toward one known server instead of
    /// broadcasting. `port` 0 means the well-known control port.
    pub async fn open(host: &str, port: u16) -> Result<Self, ControlError> {
        let port = if port == 0 { DEFAULT_CONTROL_PORT } else { port };
        let target = tokio::net::lookup_host((host, port))
            .await
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| ControlError::Resolve { host: host.into() })?;

        let bind = SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0));
        let socket = UdpSocket::bind(bind)
            .await
            .map_err(|source| ControlError::Bind { port: 0, source })?;
        info!(%target, "control socket opened toward server");
        Ok(Self {
            socket: Some(socket),
            server_mode: false,
            target: Target::Unicast(target),
            info: HostInfo::default(),
            hosts: Vec::new(),
            epoch: Instant::now(),
        })
    }

    /// Sets the metadata advertised in this server's info replies.
    pub fn set_info(&mut self, info: HostInfo) {
        self.info = info;
    }

    /// Non-blocking poll: drains every control datagram that has arrived
    /// since the last call. Invoke periodically from the driving loop.
    ///
    /// Malformed or foreign datagrams are logged and dropped; they never
    /// fail the poll or disturb other discovery state.
    pub fn listen(&mut self) -> Result<(), ControlError> {
        let mut buf = [0u8; MAX_CONTROL_DATAGRAM];
        loop {
            let (len, from) = {
                let socket = self.socket.as_ref().ok_or(ControlError::Closed)?;
                match socket.try_recv_from(&mut buf) {
                    Ok(received) => received,
                    Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                    Err(e) => {
                        // Per-datagram failure (e.g. a port-unreachable
                        // bounce); skip it and keep draining.
                        debug!(error = %e, "control recv failed");
                        continue;
                    }
                }
            };
            self.handle_datagram(&buf[..len], from);
        }
    }

    /// Starts a fresh discovery round: clears the host table and sends an
    /// info request to the broadcast address or the opened server. With
    /// `quit`, additionally tells peers we are leaving.
    ///
    /// Fire-and-forget: send failures are logged and surface only as an
    /// absence of replies.
    pub fn ask_info(&mut self, quit: bool) {
        if self.socket.is_none() {
            debug!("ask_info on a shut down control socket");
            return;
        }
        self.hosts.clear();

        let dest = match self.target {
            Target::Broadcast => SocketAddr::from((Ipv4Addr::BROADCAST, DEFAULT_CONTROL_PORT)),
            Target::Unicast(addr) => addr,
        };
        if quit {
            self.send_to(
                &DiscoveryMessage::from(QuitNotice {
                    magic: DISCOVERY_MAGIC,
                }),
                dest,
            );
        }
        let request = DiscoveryMessage::from(InfoRequest {
            magic: DISCOVERY_MAGIC,
            time: WireTime(self.now_ms()),
        });
        self.send_to(&request, dest);
        trace!(%dest, quit, "info request sent");
    }

    /// Number of hosts discovered in the current round.
    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    /// Snapshot accessor over the discovered-host table. `None` for an
    /// out-of-range index.
    pub fn host(&self, index: usize) -> Option<&FoundHost> {
        self.hosts.get(index)
    }

    pub fn local_addr(&self) -> Option<Address> {
        self.socket
            .as_ref()
            .and_then(|s| s.local_addr().ok())
            .map(Address::from)
    }

    /// Releases the socket. Idempotent; subsequent polls fail with
    /// [`ControlError::Closed`] and sends become logged no-ops.
    pub fn shutdown(&mut self) {
        if self.socket.take().is_some() {
            info!("control socket shut down");
        }
    }

    fn handle_datagram(&mut self, bytes: &[u8], from: SocketAddr) {
        let mut slice = bytes;
        let msg = match DiscoveryMessage::decode_checked(&mut slice) {
            Ok(msg) => msg,
            Err(e) => {
                debug!(peer = %from, error = %e, "discarding control datagram");
                return;
            }
        };
        match msg {
            DiscoveryMessage::InfoRequest(request) => {
                if !self.server_mode {
                    trace!(peer = %from, "ignoring info request in client mode");
                    return;
                }
                let reply = DiscoveryMessage::from(InfoReply {
                    magic: DISCOVERY_MAGIC,
                    // Echoed untouched so the requester can measure latency.
                    time: request.time,
                    info: self.info.clone(),
                });
                self.send_to(&reply, from);
                debug!(peer = %from, "answered info request");
            }
            DiscoveryMessage::InfoReply(reply) => {
                let elapsed = self.now_ms().saturating_sub(reply.time.0);
                self.record_host(
                    Address::from(from),
                    reply.info,
                    Duration::from_millis(elapsed),
                );
            }
            DiscoveryMessage::QuitNotice(_) => {
                debug!(peer = %from, "peer sent quit notice");
                self.hosts.retain(|h| h.address != Address::from(from));
            }
        }
    }

    fn record_host(&mut self, address: Address, info: HostInfo, latency: Duration) {
        if let Some(existing) = self.hosts.iter_mut().find(|h| h.address == address) {
            // A fresher reply replaces the entry outright.
            existing.info = info;
            existing.latency = latency;
            return;
        }
        if self.hosts.len() >= MAX_HOSTS {
            debug!(%address, "host table full, ignoring reply");
            return;
        }
        info!(%address, name = %info.name, "discovered host");
        self.hosts.push(FoundHost {
            address,
            info,
            latency,
        });
    }

    fn send_to(&self, msg: &DiscoveryMessage, dest: SocketAddr) {
        let Some(socket) = self.socket.as_ref() else {
            return;
        };
        let mut buf = BytesMut::new();
        msg.encode(&mut buf);
        if let Err(e) = socket.try_send_to(&buf, dest) {
            debug!(%dest, error = %e, "control send failed");
        }
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}
