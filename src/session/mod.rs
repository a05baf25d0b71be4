//! Session layer: authoritative world state and its connected parties.
//!
//! A session owns the world outright and is its only mutation path. Remote
//! parties propose changes as consignments; the session applies them,
//! synchronizes everyone's view, and reaps links that die or ask to leave.

mod inbound;

use std::collections::HashMap;
use std::sync::Arc;

use bytes::BytesMut;
use tracing::{debug, info};

use crate::data::{Block, Consignment, Enumerator, Id};
use crate::protocol::DecodeError;
use crate::protocol::session::{PartyJoined, SessionEnded, SessionMessage, Welcome};
use crate::protocol::types::{Address, Channel};
use crate::transport::{Client, Link, LinkError, MuxLink, Rights};

/// Collaborator seam for the game-world state a session owns.
///
/// The session never interprets state bytes itself; it routes inbound
/// proposals into `apply` and outbound snapshots from `snapshot`.
pub trait World {
    /// Applies one state proposal from `from`. An error means the proposal
    /// is discarded; it never fails the session.
    fn apply(&mut self, from: &Address, update: &Block) -> Result<(), DecodeError>;

    /// Serializes the authoritative state for transmission.
    fn snapshot(&self) -> Block;
}

/// User-facing notifications returned by [`Session::poll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Joined { party: Id, peer: Address },
    Left { party: Id, peer: Address },
}

/// Owner of the shared world and the registry of connected parties.
///
/// The registry holds the link handles; the sockets themselves live on the
/// transport tasks behind them. Dropping or shutting down the session
/// notifies every party before the world goes away.
pub struct Session<W: World> {
    id: Id,
    ids: Arc<Enumerator>,
    world: W,
    clients: HashMap<Id, Client>,
    pending_events: Vec<SessionEvent>,
}

impl<W: World> Session<W> {
    /// Creates a session owning `world`, with an identity issued by the
    /// shared id service.
    pub fn new(world: W, ids: Arc<Enumerator>) -> Self {
        let id = ids.get();
        info!(session = %id, "session created");
        Self {
            id,
            ids,
            world,
            clients: HashMap::new(),
            pending_events: Vec::new(),
        }
    }

    /// The session's immutable identifier.
    pub fn id(&self) -> Id {
        self.id
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    /// The world's single mutation path runs through the session.
    pub fn world_mut(&mut self) -> &mut W {
        &mut self.world
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Registers an accepted link as a connected party.
    ///
    /// Grants the initial rights, welcomes the newcomer with the session id,
    /// its party id and a world snapshot, and announces the join to everyone
    /// else. The registration is visible before any of the party's
    /// consignments are applied.
    pub fn register(&mut self, link: MuxLink) -> Result<Id, LinkError> {
        let mut client = Client::new(link);
        client.grant_rights();
        let party = self.ids.get();
        let peer = client.peer();

        let welcome = SessionMessage::from(Welcome {
            session: self.id,
            party,
            state: self.world.snapshot().into_bytes(),
        });
        Self::send_control(&client, &welcome)?;

        info!(
            session = %self.id,
            party = %party,
            peer = %peer,
            rights = ?client.rights(),
            "party registered"
        );
        self.clients.insert(party, client);
        self.fan_out(&SessionMessage::from(PartyJoined { party }), Some(party));
        self.pending_events.push(SessionEvent::Joined { party, peer });
        Ok(party)
    }

    /// Fans a consignment built from `block` out to every registered party
    /// on `channel`. Per-party send failures are logged and the dead link is
    /// reaped by the next poll; they do not abort the fan-out.
    pub fn broadcast(&mut self, channel: Channel, block: &Block) {
        for (party, client) in &self.clients {
            let consignment = Consignment::from_block(channel, client.peer(), block.clone());
            if let Err(e) = client.send(consignment) {
                debug!(party = %party, error = %e, "broadcast send failed");
            }
        }
    }

    /// Pushes the current world snapshot to every party on the state
    /// channel.
    pub fn sync_clients(&mut self) {
        let snapshot = self.world.snapshot();
        self.broadcast(Channel::STATE, &snapshot);
    }

    /// The rights held by a registered party, or `None` for an unknown id.
    pub fn rights(&self, party: Id) -> Option<Rights> {
        self.clients.get(&party).map(Client::rights)
    }

    /// Grants additional rights to a registered party.
    pub fn grant(&mut self, party: Id, rights: Rights) {
        if let Some(client) = self.clients.get_mut(&party) {
            client.grant(rights);
        }
    }

    /// Notifies every party that the session is over and closes their
    /// links. The world is released only afterwards, when the session
    /// itself is dropped.
    pub fn shutdown(&mut self) {
        if self.clients.is_empty() {
            return;
        }
        info!(session = %self.id, clients = self.clients.len(), "session shutting down");
        let ended = SessionMessage::from(SessionEnded {});
        for (party, client) in self.clients.drain() {
            if let Err(e) = Self::send_control(&client, &ended) {
                debug!(party = %party, error = %e, "session-ended notice failed");
            }
            client.close();
        }
    }

    /// Encodes a session message as a control-channel consignment for one
    /// party.
    fn send_control(client: &Client, msg: &SessionMessage) -> Result<(), LinkError> {
        let mut buf = BytesMut::new();
        msg.encode(&mut buf);
        let consignment = Consignment::from_block(
            Channel::CONTROL,
            client.peer(),
            Block::from_shared(buf.freeze()),
        );
        client.send(consignment)
    }

    /// Fans a control message out to every registered party, optionally
    /// excluding one (the newcomer, for join announcements).
    fn fan_out(&self, msg: &SessionMessage, exclude: Option<Id>) {
        for (party, client) in &self.clients {
            if Some(*party) == exclude {
                continue;
            }
            if let Err(e) = Self::send_control(client, msg) {
                debug!(party = %party, error = %e, "control fan-out failed");
            }
        }
    }
}

impl<W: World> Drop for Session<W> {
    fn drop(&mut self) {
        // Parties are told before the world goes away.
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullWorld;

    impl World for NullWorld {
        fn apply(&mut self, _from: &Address, _update: &Block) -> Result<(), DecodeError> {
            Ok(())
        }

        fn snapshot(&self) -> Block {
            Block::new(0)
        }
    }

    #[test]
    fn sessions_get_distinct_ids_from_the_shared_service() {
        let ids = Arc::new(Enumerator::new());
        let a = Session::new(NullWorld, ids.clone());
        let b = Session::new(NullWorld, ids.clone());
        assert_ne!(a.id(), b.id());
        assert_ne!(a.id(), Id::NONE);
    }

    #[test]
    fn empty_session_shutdown_is_a_no_op() {
        let ids = Arc::new(Enumerator::new());
        let mut session = Session::new(NullWorld, ids);
        session.shutdown();
        assert_eq!(session.client_count(), 0);
    }

    #[test]
    fn rights_lookup_fails_for_unknown_party() {
        let ids = Arc::new(Enumerator::new());
        let session = Session::new(NullWorld, ids);
        assert!(session.rights(Id(99)).is_none());
    }
}
