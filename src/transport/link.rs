use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Notify;
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace};

use crate::data::{Block, ByteArray, Consignment};
use crate::protocol::constants::{CHANNEL_COUNT, MAX_FRAME_PAYLOAD};
use crate::protocol::frame::{read_frame, write_frame};
use crate::protocol::types::{Address, Channel};

/// Frames buffered per link before the reader stops pulling off the wire and
/// lets transport backpressure take over.
const MAX_LINK_BACKLOG: usize = 1024;

/// Errors from operations against a link.
#[derive(Error, Debug)]
pub enum LinkError {
    /// The link is in its terminal closed state. Every operation after
    /// closure reports this, distinguishing it from a transient failure.
    #[error("link to {peer} is closed")]
    Closed { peer: Address },

    /// The consignment does not fit one frame.
    #[error("consignment of {size} bytes exceeds the frame payload limit")]
    PayloadTooLarge { size: usize },

    /// The remote address could not be connected to.
    #[error("failed to connect link to {peer}: {source}")]
    Connect {
        peer: Address,
        source: std::io::Error,
    },
}

/// Capability interface over a connection that carries consignments.
///
/// Implemented by [`MuxLink`] and by [`Client`](crate::transport::Client);
/// a session holds a collection of whichever variant the transport handed
/// it.
pub trait Link {
    /// The remote address this link is connected to.
    fn peer(&self) -> Address;

    /// False once the link has reached its terminal closed state.
    fn is_open(&self) -> bool;

    /// Queues a consignment for transmission on its channel.
    fn send(&self, consignment: Consignment) -> Result<(), LinkError>;

    /// The next fully reassembled inbound consignment, or `None` when
    /// nothing is available. Never blocks; poll it from the driving loop.
    fn receive(&mut self) -> Option<Consignment>;

    /// Moves the link to its terminal closed state. Safe to call at any
    /// time, idempotent.
    fn close(&self);
}

type ChannelQueues = [VecDeque<Bytes>; CHANNEL_COUNT];

fn empty_queues() -> ChannelQueues {
    std::array::from_fn(|_| VecDeque::new())
}

/// State shared between the link handle and its reader/writer tasks.
struct Shared {
    peer: Address,
    closed: AtomicBool,
    outbound: Mutex<ChannelQueues>,
    inbound: Mutex<ChannelQueues>,
    /// Wakes the writer task when outbound work arrives or the link closes.
    writer_wake: Notify,
    /// Stops the reader task on local closure.
    reader_stop: Notify,
    /// Resumes a backpressured reader once the application drains inbound.
    reader_resume: Notify,
}

impl Shared {
    fn new(peer: Address) -> Self {
        Self {
            peer,
            closed: AtomicBool::new(false),
            outbound: Mutex::new(empty_queues()),
            inbound: Mutex::new(empty_queues()),
            writer_wake: Notify::new(),
            reader_stop: Notify::new(),
            reader_resume: Notify::new(),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Enters the terminal closed state and wakes both tasks so they can
    /// observe it. Idempotent.
    fn shut_down(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(peer = %self.peer, "link closed");
        self.writer_wake.notify_one();
        self.reader_stop.notify_one();
        self.reader_resume.notify_one();
    }

    /// Pops one payload from the next non-empty outbound channel at or after
    /// `cursor`, advancing the cursor past the served channel. One frame per
    /// channel per sweep keeps channels fair.
    fn pop_outbound(&self, cursor: &mut usize) -> Option<(Channel, Bytes)> {
        let mut queues = self.outbound.lock().unwrap_or_else(|e| e.into_inner());
        for step in 0..CHANNEL_COUNT {
            let idx = (*cursor + step) % CHANNEL_COUNT;
            if let Some(payload) = queues[idx].pop_front() {
                *cursor = (idx + 1) % CHANNEL_COUNT;
                return Some((Channel::from_nibble(idx as u8), payload));
            }
        }
        None
    }

    fn push_inbound(&self, channel: Channel, payload: Bytes) {
        let mut queues = self.inbound.lock().unwrap_or_else(|e| e.into_inner());
        queues[channel.index()].push_back(payload);
    }

    fn inbound_backlog(&self) -> usize {
        let queues = self.inbound.lock().unwrap_or_else(|e| e.into_inner());
        queues.iter().map(VecDeque::len).sum()
    }
}

/// A connection multiplexing up to [`CHANNEL_COUNT`] consignment streams to
/// one remote address over a single TCP stream.
///
/// Socket I/O runs on two spawned tasks; the handle's operations enqueue,
/// dequeue, or fail immediately and never block. Consignments on the same
/// channel are delivered in wire order; across channels there is no ordering
/// guarantee, and a large payload on one channel cannot starve the others.
pub struct MuxLink {
    shared: Arc<Shared>,
    /// Round-robin position for [`Link::receive`].
    recv_cursor: usize,
}

impl MuxLink {
    /// Actively opens a link to `peer`.
    pub async fn connect(peer: Address) -> Result<Self, LinkError> {
        let stream = TcpStream::connect(peer.socket_addr())
            .await
            .map_err(|source| LinkError::Connect { peer, source })?;
        Ok(Self::from_stream(stream, peer))
    }

    /// Wraps an established stream, spawning the reader and writer tasks.
    pub(crate) fn from_stream(stream: TcpStream, peer: Address) -> Self {
        // Consignments are latency-sensitive and already framed.
        let _ = stream.set_nodelay(true);
        let shared = Arc::new(Shared::new(peer));
        let (rd, wr) = stream.into_split();
        tokio::spawn(run_reader(shared.clone(), rd));
        tokio::spawn(run_writer(shared.clone(), wr));
        Self {
            shared,
            recv_cursor: 0,
        }
    }
}

impl Link for MuxLink {
    fn peer(&self) -> Address {
        self.shared.peer
    }

    fn is_open(&self) -> bool {
        !self.shared.is_closed()
    }

    fn send(&self, consignment: Consignment) -> Result<(), LinkError> {
        if self.shared.is_closed() {
            return Err(LinkError::Closed {
                peer: self.shared.peer,
            });
        }
        let size = consignment.size();
        if size > MAX_FRAME_PAYLOAD {
            return Err(LinkError::PayloadTooLarge { size });
        }
        let channel = consignment.channel();
        let payload = consignment.into_block().into_bytes();
        {
            let mut queues = self.shared.outbound.lock().unwrap_or_else(|e| e.into_inner());
            queues[channel.index()].push_back(payload);
        }
        self.shared.writer_wake.notify_one();
        trace!(peer = %self.shared.peer, %channel, len = size, "consignment queued");
        Ok(())
    }

    fn receive(&mut self) -> Option<Consignment> {
        if self.shared.is_closed() {
            return None;
        }
        let popped = {
            let mut queues = self.shared.inbound.lock().unwrap_or_else(|e| e.into_inner());
            let mut found = None;
            for step in 0..CHANNEL_COUNT {
                let idx = (self.recv_cursor + step) % CHANNEL_COUNT;
                if let Some(payload) = queues[idx].pop_front() {
                    self.recv_cursor = (idx + 1) % CHANNEL_COUNT;
                    found = Some((Channel::from_nibble(idx as u8), payload));
                    break;
                }
            }
            found
        };
        let (channel, payload) = popped?;
        self.shared.reader_resume.notify_one();
        Some(Consignment::from_block(
            channel,
            self.shared.peer,
            Block::from_shared(payload),
        ))
    }

    fn close(&self) {
        self.shared.shut_down();
    }
}

impl Drop for MuxLink {
    fn drop(&mut self) {
        self.shared.shut_down();
    }
}

impl std::fmt::Debug for MuxLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MuxLink")
            .field("peer", &self.shared.peer)
            .field("open", &!self.shared.is_closed())
            .finish()
    }
}

/// Reassembles inbound frames into the per-channel queues, in wire order.
async fn run_reader(shared: Arc<Shared>, mut rd: OwnedReadHalf) {
    'link: loop {
        // Stop pulling off the wire while the application lags; the
        // transport's own backpressure holds the rest.
        while shared.inbound_backlog() >= MAX_LINK_BACKLOG {
            if shared.is_closed() {
                break 'link;
            }
            tokio::select! {
                _ = shared.reader_resume.notified() => {}
                _ = shared.reader_stop.notified() => break 'link,
            }
        }

        tokio::select! {
            res = read_frame(&mut rd) => match res {
                Ok(Some((channel, payload))) => {
                    trace!(peer = %shared.peer, %channel, len = payload.len(), "frame in");
                    shared.push_inbound(channel, payload);
                }
                Ok(None) => {
                    debug!(peer = %shared.peer, "transport closed by peer");
                    break;
                }
                Err(e) => {
                    debug!(peer = %shared.peer, error = %e, "link read failed");
                    break;
                }
            },
            _ = shared.reader_stop.notified() => break,
        }
    }
    shared.shut_down();
}

/// Serves the outbound channel queues round-robin onto the stream.
async fn run_writer(shared: Arc<Shared>, mut wr: OwnedWriteHalf) {
    let mut cursor = 0;
    loop {
        match shared.pop_outbound(&mut cursor) {
            Some((channel, payload)) => {
                if let Err(e) = write_frame(&mut wr, channel, &payload).await {
                    debug!(peer = %shared.peer, error = %e, "link write failed");
                    break;
                }
            }
            None => {
                if shared.is_closed() {
                    break;
                }
                shared.writer_wake.notified().await;
            }
        }
    }
    shared.shut_down();
    let _ = wr.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, SocketAddr};

    fn shared() -> Shared {
        Shared::new(Address::from(SocketAddr::from((Ipv4Addr::LOCALHOST, 5000))))
    }

    fn queue(shared: &Shared, channel: u8, tag: u8) {
        let mut queues = shared.outbound.lock().unwrap();
        queues[channel as usize].push_back(Bytes::from(vec![tag]));
    }

    #[test]
    fn outbound_sweep_serves_channels_fairly() {
        let shared = shared();
        // Three frames on channel 0, one each on 1 and 2.
        queue(&shared, 0, 10);
        queue(&shared, 0, 11);
        queue(&shared, 0, 12);
        queue(&shared, 1, 20);
        queue(&shared, 2, 30);

        let mut cursor = 0;
        let mut order = Vec::new();
        while let Some((channel, payload)) = shared.pop_outbound(&mut cursor) {
            order.push((channel.tag(), payload[0]));
        }
        // One frame per channel per sweep: the bulk on channel 0 cannot
        // starve 1 and 2.
        assert_eq!(order, vec![(0, 10), (1, 20), (2, 30), (0, 11), (0, 12)]);
    }

    #[test]
    fn same_channel_order_is_fifo() {
        let shared = shared();
        queue(&shared, 3, 1);
        queue(&shared, 3, 2);
        queue(&shared, 3, 3);

        let mut cursor = 0;
        let mut seen = Vec::new();
        while let Some((_, payload)) = shared.pop_outbound(&mut cursor) {
            seen.push(payload[0]);
        }
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn shut_down_is_idempotent() {
        let shared = shared();
        assert!(!shared.is_closed());
        shared.shut_down();
        shared.shut_down();
        assert!(shared.is_closed());
    }
}
