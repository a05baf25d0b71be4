use bytes::{Buf, BufMut};

use crate::protocol::{DecodeError, WireEncodable, constants};

/// A server's advertised metadata, carried in info replies.
///
/// The encoding leads with an explicit version byte so the field set can
/// evolve; a reply with an unrecognised version is discarded, never guessed
/// at.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HostInfo {
    /// Server name as shown in the host browser.
    pub name: String,
    /// Current map.
    pub map: String,
    /// Game mode identifier.
    pub game: String,
    pub players: u16,
    pub max_players: u16,
}

impl WireEncodable for HostInfo {
    fn encode_wire(&self, dst: &mut impl BufMut) {
        dst.put_u8(constants::HOST_INFO_VERSION);
        self.name.encode_wire(dst);
        self.map.encode_wire(dst);
        self.game.encode_wire(dst);
        self.players.encode_wire(dst);
        self.max_players.encode_wire(dst);
    }

    fn decode_wire(src: &mut impl Buf) -> Result<Self, DecodeError> {
        let version = u8::decode_wire(src)?;
        if version != constants::HOST_INFO_VERSION {
            return Err(DecodeError::UnsupportedVersion(version));
        }
        Ok(Self {
            name: String::decode_wire(src)?,
            map: String::decode_wire(src)?,
            game: String::decode_wire(src)?,
            players: u16::decode_wire(src)?,
            max_players: u16::decode_wire(src)?,
        })
    }
}
