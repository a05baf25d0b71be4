//! The link wire unit: one packed header word plus the consignment body.
//!
//! Header layout, big-endian: `version:4 | channel:4 | length:24`. The
//! receiver can demultiplex with no out-of-band state; partial reads are
//! buffered by `read_exact` until a full frame is available.

use bytes::Bytes;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::protocol::{DecodeError, constants, types::Channel};

/// Errors from reading a frame off a link's transport.
///
/// Both variants are terminal for the link that hit them: an undecodable
/// frame leaves the stream with no recoverable framing.
#[derive(Error, Debug)]
pub enum FrameError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Decoded form of the packed header word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub channel: Channel,
    pub length: usize,
}

impl FrameHeader {
    pub fn pack(&self) -> u32 {
        ((constants::PROTOCOL_VERSION as u32) << 28)
            | ((self.channel.tag() as u32) << 24)
            | (self.length as u32)
    }

    pub fn unpack(word: u32) -> Result<Self, DecodeError> {
        let version = (word >> 28) as u8;
        if version != constants::PROTOCOL_VERSION {
            return Err(DecodeError::UnsupportedVersion(version));
        }
        let length = (word & 0x00FF_FFFF) as usize;
        if length > constants::MAX_FRAME_PAYLOAD {
            return Err(DecodeError::FrameTooLarge(length));
        }
        Ok(Self {
            channel: Channel::from_nibble((word >> 24) as u8),
            length,
        })
    }
}

/// Writes one frame. The caller has already bounded the payload against
/// [`constants::MAX_FRAME_PAYLOAD`].
pub async fn write_frame<W>(dst: &mut W, channel: Channel, payload: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    debug_assert!(payload.len() <= constants::MAX_FRAME_PAYLOAD);
    let header = FrameHeader {
        channel,
        length: payload.len(),
    };
    dst.write_all(&header.pack().to_be_bytes()).await?;
    dst.write_all(payload).await
}

/// Reads the next frame, buffering until it is complete.
///
/// `Ok(None)` is a clean close: the transport reached end-of-stream on a
/// frame boundary. End-of-stream inside a frame's payload is an error like
/// any other truncation.
pub async fn read_frame<R>(src: &mut R) -> Result<Option<(Channel, Bytes)>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut word = [0u8; constants::FRAME_HEADER_SIZE];
    match src.read_exact(&mut word).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let header = FrameHeader::unpack(u32::from_be_bytes(word))?;

    let mut payload = vec![0u8; header.length];
    src.read_exact(&mut payload).await?;
    Ok(Some((header.channel, Bytes::from(payload))))
}
