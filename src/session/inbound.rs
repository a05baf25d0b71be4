use tracing::{debug, info, trace};

use crate::data::{Consignment, Id};
use crate::protocol::session::{PartyLeft, SessionMessage};
use crate::protocol::types::Channel;
use crate::session::{Session, SessionEvent, World};
use crate::transport::Link;

impl<W: World> Session<W> {
    /// Drains every party's inbound consignments and applies them, then
    /// reaps dead links and leavers. Invoke once per simulation tick.
    ///
    /// Control-channel consignments are session requests; consignments on
    /// any other channel are state proposals applied to the world strictly
    /// through the session, so the world has exactly one writer. Malformed
    /// input of either kind is dropped and logged, never fatal.
    pub fn poll(&mut self) -> Vec<SessionEvent> {
        let mut events = std::mem::take(&mut self.pending_events);
        let mut departed: Vec<Id> = Vec::new();

        for (&party, client) in self.clients.iter_mut() {
            let mut leaving = false;
            while let Some(consignment) = client.receive() {
                if consignment.channel() == Channel::CONTROL {
                    leaving |= Self::handle_control(party, &consignment);
                } else if let Err(e) = self.world.apply(consignment.address(), consignment.block())
                {
                    debug!(party = %party, error = %e, "state proposal discarded");
                }
            }
            if leaving || !client.is_open() {
                departed.push(party);
            }
        }

        for party in departed {
            if let Some(client) = self.clients.remove(&party) {
                let peer = client.peer();
                client.close();
                info!(session = %self.id, party = %party, peer = %peer, "party left");
                self.fan_out(&SessionMessage::from(PartyLeft { party }), None);
                events.push(SessionEvent::Left { party, peer });
            }
        }
        events
    }

    /// Handles one control-channel consignment from a party. Returns true
    /// when it asks to leave the session.
    fn handle_control(party: Id, consignment: &Consignment) -> bool {
        let mut bytes = consignment.block().clone().into_bytes();
        match SessionMessage::decode(&mut bytes) {
            Ok(SessionMessage::Leave(_)) => {
                debug!(party = %party, "leave requested");
                true
            }
            Ok(other) => {
                // Server-bound control traffic is only ever Leave today;
                // anything else is a confused peer.
                trace!(party = %party, kind = other.kind(), "ignoring control message");
                false
            }
            Err(e) => {
                debug!(party = %party, error = %e, "malformed control consignment dropped");
                false
            }
        }
    }
}
