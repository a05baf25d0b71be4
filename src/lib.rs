//! Channel-multiplexed game-session transport with LAN discovery.
//!
//! `muxlink` is the network core of a client/server game engine. It finds
//! servers over a UDP control side-channel, opens a multiplexed TCP link to
//! a chosen one, and moves channel-tagged payloads ("consignments") between
//! a session that owns the authoritative world state and the remote parties
//! connected to it.
//!
//! The layers, bottom up:
//! - [`data`]: the byte-array substrate (blocks, addressed blocks,
//!   consignments) and the id service.
//! - [`protocol`]: wire formats: the frame layout links speak, the
//!   discovery datagrams, the session control messages.
//! - [`transport`]: the control socket, link listener, links and clients.
//! - [`session`]: the world owner coordinating all connected parties.
//!
//! All public operations are non-blocking: socket I/O runs on spawned tokio
//! tasks, and the polling surface (`listen`, `receive`, `poll`) is meant to
//! be driven once per simulation tick.
//!
//! ```no_run
//! use muxlink::{ControlSocket, MuxLink};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Find servers on the LAN.
//! let mut control = ControlSocket::init(false, 0).await?;
//! control.ask_info(false);
//! // ...tick...
//! control.listen()?;
//! if let Some(host) = control.host(0) {
//!     let link = MuxLink::connect(host.address).await?;
//!     // register with a session, exchange consignments...
//!     # let _ = link;
//! }
//! # Ok(())
//! # }
//! ```

pub mod data;
pub mod protocol;
pub mod session;
pub mod transport;

pub use data::{AddressedBlock, Block, ByteArray, Consignment, DataError, Enumerator, Id};
pub use protocol::types::{Address, Channel};
pub use protocol::{DecodeError, HostInfo};
pub use session::{Session, SessionEvent, World};
pub use transport::{
    Client, ControlError, ControlSocket, FoundHost, Link, LinkError, LinkListener, MuxLink, Rights,
};
