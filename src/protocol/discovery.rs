//! Discovery datagrams exchanged on the control side-channel.
//!
//! Every body leads with [`constants::DISCOVERY_MAGIC`] so that foreign
//! traffic arriving on the control port is cheaply recognised and dropped
//! before any further decoding.

use bytes::{Buf, BufMut};

use crate::protocol::{
    DecodeError, HostInfo, Message, WireEncodable, constants,
    message::define_message_family,
    types::{Magic, WireTime},
};

/// Info request broadcast (or unicast) by parties looking for servers.
#[derive(Debug, Clone)]
pub struct InfoRequest {
    pub magic: Magic,
    /// Sender's millisecond clock, echoed back in the reply for latency
    /// measurement.
    pub time: WireTime,
}

impl Message for InfoRequest {
    const KIND: u8 = 0x01;

    fn encode_body(&self, dst: &mut impl BufMut) {
        self.magic.encode_wire(dst);
        self.time.encode_wire(dst);
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(Self {
            magic: Magic::decode_wire(src)?,
            time: WireTime::decode_wire(src)?,
        })
    }
}

/// Info reply sent by servers in response to an [`InfoRequest`].
#[derive(Debug, Clone)]
pub struct InfoReply {
    pub magic: Magic,
    /// The request's `time`, echoed untouched.
    pub time: WireTime,
    pub info: HostInfo,
}

impl Message for InfoReply {
    const KIND: u8 = 0x02;

    fn encode_body(&self, dst: &mut impl BufMut) {
        self.magic.encode_wire(dst);
        self.time.encode_wire(dst);
        self.info.encode_wire(dst);
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(Self {
            magic: Magic::decode_wire(src)?,
            time: WireTime::decode_wire(src)?,
            info: HostInfo::decode_wire(src)?,
        })
    }
}

/// Notice that the sender is leaving, so peers can drop their bookkeeping
/// without waiting for a timeout.
#[derive(Debug, Clone)]
pub struct QuitNotice {
    pub magic: Magic,
}

impl Message for QuitNotice {
    const KIND: u8 = 0x03;

    fn encode_body(&self, dst: &mut impl BufMut) {
        self.magic.encode_wire(dst);
    }

    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(Self {
            magic: Magic::decode_wire(src)?,
        })
    }
}

define_message_family! {
    /// Registry of all datagrams spoken on the control socket.
    DiscoveryMessage {
        InfoRequest,
        InfoReply,
        QuitNotice,
    }
}

impl DiscoveryMessage {
    /// The magic carried by this datagram's body.
    pub fn magic(&self) -> &Magic {
        match self {
            DiscoveryMessage::InfoRequest(m) => &m.magic,
            DiscoveryMessage::InfoReply(m) => &m.magic,
            DiscoveryMessage::QuitNotice(m) => &m.magic,
        }
    }

    /// Decode and check the magic in one step, as the control socket's
    /// receive path wants it.
    pub fn decode_checked(src: &mut impl Buf) -> Result<Self, DecodeError> {
        let msg = Self::decode(src)?;
        if msg.magic() != &constants::DISCOVERY_MAGIC {
            return Err(DecodeError::BadMagic);
        }
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn info_request_roundtrip() {
        let msg = DiscoveryMessage::from(InfoRequest {
            magic: constants::DISCOVERY_MAGIC,
            time: WireTime(123_456),
        });
        let mut buf = BytesMut::new();
        msg.encode(&mut buf);
        let decoded = DiscoveryMessage::decode_checked(&mut buf.freeze()).unwrap();
        match decoded {
            DiscoveryMessage::InfoRequest(req) => assert_eq!(req.time, WireTime(123_456)),
            other => panic!("expected InfoRequest, got {other:?}"),
        }
    }

    #[test]
    fn info_reply_roundtrip() {
        let msg = DiscoveryMessage::from(InfoReply {
            magic: constants::DISCOVERY_MAGIC,
            time: WireTime(7),
            info: HostInfo {
                name: "corner server".into(),
                map: "MAP01".into(),
                game: "coop".into(),
                players: 1,
                max_players: 4,
            },
        });
        let mut buf = BytesMut::new();
        msg.encode(&mut buf);
        let decoded = DiscoveryMessage::decode_checked(&mut buf.freeze()).unwrap();
        match decoded {
            DiscoveryMessage::InfoReply(rep) => {
                assert_eq!(rep.time, WireTime(7));
                assert_eq!(rep.info.players, 1);
            }
            other => panic!("expected InfoReply, got {other:?}"),
        }
    }

    #[test]
    fn foreign_magic_is_rejected() {
        let msg = DiscoveryMessage::from(QuitNotice { magic: [0xAB; 16] });
        let mut buf = BytesMut::new();
        msg.encode(&mut buf);
        assert!(matches!(
            DiscoveryMessage::decode_checked(&mut buf.freeze()),
            Err(DecodeError::BadMagic)
        ));
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u8(0x77);
        assert!(matches!(
            DiscoveryMessage::decode(&mut buf.freeze()),
            Err(DecodeError::UnknownKind(0x77))
        ));
    }
}
