//! Session control messages, exchanged as control-channel consignments over
//! an established link.

use bytes::{Buf, BufMut, Bytes};

use crate::data::Id;
use crate::protocol::{DecodeError, Message, WireEncodable, message::define_message_family};

/// First message a newly registered party receives. Carries the ids it needs
/// to talk about itself and an authoritative snapshot of the world.
#[derive(Debug, Clone)]
pub struct Welcome {
    pub session: Id,
    /// The id assigned to the receiving party.
    pub party: Id,
    /// Serialized world state; opaque to the transport.
    pub state: Bytes,
}

impl Message for Welcome {
    const KIND: u8 = 0x10;

    fn encode_body(&self, dst: &mut impl BufMut) {
        self.session.encode_wire(dst);
        self.party.encode_wire(dst);
        self.state.encode_wire(dst);
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(Self {
            session: Id::decode_wire(src)?,
            party: Id::decode_wire(src)?,
            state: Bytes::decode_wire(src)?,
        })
    }
}

/// Another party joined the session.
#[derive(Debug, Clone)]
pub struct PartyJoined {
    pub party: Id,
}

impl Message for PartyJoined {
    const KIND: u8 = 0x11;

    fn encode_body(&self, dst: &mut impl BufMut) {
        self.party.encode_wire(dst);
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(Self {
            party: Id::decode_wire(src)?,
        })
    }
}

/// Another party left the session or its link died.
#[derive(Debug, Clone)]
pub struct PartyLeft {
    pub party: Id,
}

impl Message for PartyLeft {
    const KIND: u8 = 0x12;

    fn encode_body(&self, dst: &mut impl BufMut) {
        self.party.encode_wire(dst);
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(Self {
            party: Id::decode_wire(src)?,
        })
    }
}

/// The session is shutting down. Sent to every party before the world is
/// released; receivers should close their links.
#[derive(Debug, Clone)]
pub struct SessionEnded {}

impl Message for SessionEnded {
    const KIND: u8 = 0x13;

    fn encode_body(&self, _dst: &mut impl BufMut) {}

    fn decode_body(_src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(Self {})
    }
}

/// A party asks to leave gracefully.
#[derive(Debug, Clone)]
pub struct Leave {}

impl Message for Leave {
    const KIND: u8 = 0x14;

    fn encode_body(&self, _dst: &mut impl BufMut) {}

    fn decode_body(_src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(Self {})
    }
}

define_message_family! {
    /// Registry of the messages spoken on the control channel of a link.
    SessionMessage {
        Welcome,
        PartyJoined,
        PartyLeft,
        SessionEnded,
        Leave,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn welcome_roundtrip() {
        let msg = SessionMessage::from(Welcome {
            session: Id(42),
            party: Id(7),
            state: Bytes::from_static(b"snapshot"),
        });
        let mut buf = BytesMut::new();
        msg.encode(&mut buf);
        match SessionMessage::decode(&mut buf.freeze()).unwrap() {
            SessionMessage::Welcome(w) => {
                assert_eq!(w.session, Id(42));
                assert_eq!(w.party, Id(7));
                assert_eq!(&w.state[..], b"snapshot");
            }
            other => panic!("expected Welcome, got {other:?}"),
        }
    }

    #[test]
    fn empty_bodies_roundtrip() {
        for msg in [
            SessionMessage::from(SessionEnded {}),
            SessionMessage::from(Leave {}),
        ] {
            let mut buf = BytesMut::new();
            msg.encode(&mut buf);
            let decoded = SessionMessage::decode(&mut buf.freeze()).unwrap();
            assert_eq!(decoded.kind(), msg.kind());
        }
    }

    #[test]
    fn truncated_welcome_is_eof() {
        let msg = SessionMessage::from(Welcome {
            session: Id(1),
            party: Id(2),
            state: Bytes::from_static(&[0xAA; 32]),
        });
        let mut buf = BytesMut::new();
        msg.encode(&mut buf);
        let full = buf.freeze();
        let mut short = full.slice(..10);
        assert!(matches!(
            SessionMessage::decode(&mut short),
            Err(DecodeError::UnexpectedEof)
        ));
    }
}
