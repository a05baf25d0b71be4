use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use bytes::{Buf, BufMut};

use crate::protocol::{DecodeError, WireEncodable, constants};

/// Magic byte sequence prefixing every discovery datagram.
pub type Magic = [u8; 16];

/// A network endpoint: host plus port.
///
/// Immutable once constructed; equality and hashing are structural, so an
/// `Address` can key the discovered-host table and route outbound
/// consignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    addr: SocketAddr,
}

impl Address {
    pub fn new(host: IpAddr, port: u16) -> Self {
        Self {
            addr: SocketAddr::new(host, port),
        }
    }

    pub fn host(&self) -> IpAddr {
        self.addr.ip()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn socket_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Whether the host is the local machine (loopback).
    ///
    /// Connections from a local address are the ones granted administration
    /// rights automatically.
    pub fn is_local(&self) -> bool {
        self.addr.ip().is_loopback()
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        Self { addr }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.addr.fmt(f)
    }
}

impl WireEncodable for Address {
    fn encode_wire(&self, dst: &mut impl BufMut) {
        match self.addr.ip() {
            IpAddr::V4(ip) => {
                dst.put_u8(4);
                dst.put_slice(&ip.octets());
            }
            IpAddr::V6(ip) => {
                dst.put_u8(6);
                dst.put_slice(&ip.octets());
            }
        }
        dst.put_u16(self.addr.port());
    }

    fn decode_wire(src: &mut impl Buf) -> Result<Self, DecodeError> {
        let version = u8::decode_wire(src)?;
        let host = match version {
            4 => {
                if src.remaining() < 4 {
                    return Err(DecodeError::UnexpectedEof);
                }
                let mut octets = [0u8; 4];
                src.copy_to_slice(&mut octets);
                IpAddr::V4(Ipv4Addr::from(octets))
            }
            6 => {
                if src.remaining() < 16 {
                    return Err(DecodeError::UnexpectedEof);
                }
                let mut octets = [0u8; 16];
                src.copy_to_slice(&mut octets);
                IpAddr::V6(Ipv6Addr::from(octets))
            }
            other => return Err(DecodeError::InvalidAddrVersion(other)),
        };
        let port = u16::decode_wire(src)?;
        Ok(Address::new(host, port))
    }
}

/// Tag partitioning the independent data streams multiplexed over one link.
///
/// Channels fit the frame header's 4-bit field, so only values below
/// [`constants::CHANNEL_COUNT`] exist. Construction is the only checkpoint;
/// everything downstream can index queues with a channel unchecked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Channel(u8);

impl Channel {
    /// Session control traffic: welcomes, join/leave notices, teardown.
    pub const CONTROL: Channel = Channel(0);
    /// Per-tick game state.
    pub const STATE: Channel = Channel(1);

    /// A channel with the given tag, or `None` when the tag does not fit the
    /// frame header's channel field.
    pub fn new(tag: u8) -> Option<Self> {
        if (tag as usize) < constants::CHANNEL_COUNT {
            Some(Self(tag))
        } else {
            None
        }
    }

    /// A channel from a frame header nibble. The mask makes the 4-bit range
    /// explicit, so this cannot fail.
    pub(crate) fn from_nibble(tag: u8) -> Self {
        Self(tag & 0x0F)
    }

    pub fn tag(&self) -> u8 {
        self.0
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch{}", self.0)
    }
}

/// Millisecond timestamp carried in discovery datagrams.
///
/// The requester stamps its own clock; the replier echoes it back untouched,
/// which is enough to measure round-trip latency without synchronised
/// clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireTime(pub u64);

impl WireEncodable for WireTime {
    fn encode_wire(&self, dst: &mut impl BufMut) {
        self.0.encode_wire(dst);
    }

    fn decode_wire(src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(Self(u64::decode_wire(src)?))
    }
}

impl From<WireTime> for Duration {
    fn from(value: WireTime) -> Self {
        Duration::from_millis(value.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn address_roundtrip_v4() {
        let addr = Address::new(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 7)), 13209);
        let mut buf = BytesMut::new();
        addr.encode_wire(&mut buf);
        let decoded = Address::decode_wire(&mut buf.freeze()).unwrap();
        assert_eq!(decoded, addr);
    }

    #[test]
    fn address_roundtrip_v6() {
        let addr = Address::new(IpAddr::V6(Ipv6Addr::LOCALHOST), 40000);
        let mut buf = BytesMut::new();
        addr.encode_wire(&mut buf);
        let decoded = Address::decode_wire(&mut buf.freeze()).unwrap();
        assert_eq!(decoded, addr);
    }

    #[test]
    fn address_rejects_unknown_version() {
        let mut buf = BytesMut::new();
        buf.put_u8(9);
        buf.put_slice(&[0u8; 6]);
        assert!(matches!(
            Address::decode_wire(&mut buf.freeze()),
            Err(DecodeError::InvalidAddrVersion(9))
        ));
    }

    #[test]
    fn loopback_is_local() {
        assert!(Address::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 1).is_local());
        assert!(!Address::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)), 1).is_local());
    }

    #[test]
    fn channel_tags_are_bounded() {
        assert_eq!(Channel::new(15).map(|c| c.tag()), Some(15));
        assert!(Channel::new(16).is_none());
        assert_eq!(Channel::CONTROL.index(), 0);
    }
}
