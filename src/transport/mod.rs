//! Tokio-based transport layer: the UDP discovery side-channel and the TCP
//! links that multiplex channel-tagged consignments.
//!
//! This module exposes the high-level connection types:
//! - `ControlSocket` for server discovery and session negotiation.
//! - `LinkListener` / `MuxLink` for accepting and opening game-data links.
//! - `Client` for a registered remote party carrying access rights.
//!
//! All socket I/O runs on spawned tasks; the public operations are
//! non-blocking polls or immediate failures, so a driving loop can call them
//! once per simulation tick.

mod client;
pub mod control;
mod link;
mod listener;

pub use client::{Client, Rights};
pub use control::{ControlError, ControlSocket, FoundHost};
pub use link::{Link, LinkError, MuxLink};
pub use listener::LinkListener;
