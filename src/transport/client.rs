use bitflags::bitflags;

use crate::data::Consignment;
use crate::protocol::types::Address;
use crate::transport::link::{Link, LinkError, MuxLink};

bitflags! {
    /// Access rights held by a connected party.
    ///
    /// Rights are granted by the session, never self-asserted by the remote
    /// party. This layer only stores and exposes them; collaborators consult
    /// them before permitting privileged operations.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct Rights: u32 {
        const ADMIN  = 0b0000_0001;
        const KICK   = 0b0000_0010;
        const CONFIG = 0b0000_0100;
    }
}

impl Rights {
    /// Initial rights for a connection from `peer`. A connection recognised
    /// as local is the operator's own and gets ADMIN; everyone else starts
    /// with none until explicitly granted more.
    pub fn for_peer(peer: &Address) -> Rights {
        if peer.is_local() {
            Rights::ADMIN
        } else {
            Rights::empty()
        }
    }
}

/// A connected remote party: a [`MuxLink`] carrying a [`Rights`] bitset.
pub struct Client {
    link: MuxLink,
    rights: Rights,
}

impl Client {
    /// Wraps an accepted link. Rights start empty until the session grants
    /// them.
    pub fn new(link: MuxLink) -> Self {
        Self {
            link,
            rights: Rights::empty(),
        }
    }

    /// Assigns the initial rights derived from the peer address. Called
    /// exactly once by the session, immediately after registration.
    pub fn grant_rights(&mut self) {
        self.rights = Rights::for_peer(&self.link.peer());
    }

    /// Explicitly grants additional rights on top of the initial set.
    pub fn grant(&mut self, rights: Rights) {
        self.rights |= rights;
    }

    pub fn rights(&self) -> Rights {
        self.rights
    }
}

impl Link for Client {
    fn peer(&self) -> Address {
        self.link.peer()
    }

    fn is_open(&self) -> bool {
        self.link.is_open()
    }

    fn send(&self, consignment: Consignment) -> Result<(), LinkError> {
        self.link.send(consignment)
    }

    fn receive(&mut self) -> Option<Consignment> {
        self.link.receive()
    }

    fn close(&self) {
        self.link.close()
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("peer", &self.link.peer())
            .field("rights", &self.rights)
            .finish()
    }
}
