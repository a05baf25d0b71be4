use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::info;

use crate::protocol::types::Address;
use crate::transport::link::MuxLink;

/// Accepts inbound link connections on a local TCP address.
pub struct LinkListener {
    listener: TcpListener,
    local: Address,
}

impl LinkListener {
    /// Binds a new listener to the specified address.
    pub async fn bind(addr: SocketAddr) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local = Address::from(listener.local_addr()?);
        info!(%local, "link listener up");
        Ok(Self { listener, local })
    }

    pub fn local_addr(&self) -> Address {
        self.local
    }

    /// Accepts the next inbound connection as a ready-to-use link.
    pub async fn accept(&self) -> std::io::Result<MuxLink> {
        let (stream, peer) = self.listener.accept().await?;
        info!(peer = %peer, "link accepted");
        Ok(MuxLink::from_stream(stream, Address::from(peer)))
    }
}
