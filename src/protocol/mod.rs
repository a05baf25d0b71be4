//! Wire formats, constants, and codec for the control and link protocols.
//!
//! This module houses the encoding trait, the frame layout used by muxed
//! links, the discovery datagrams, and the session messages exchanged as
//! control-channel consignments.

pub mod codec;
pub mod constants;
pub mod discovery;
pub mod frame;
pub mod host_info;
mod message;
pub mod session;
pub mod types;

pub use codec::WireEncodable;
pub use host_info::HostInfo;
pub use message::Message;

use bytes::Bytes;
use thiserror::Error;

/// Errors that may occur while decoding wire values or messages.
///
/// Kept small and generic so it can be shared by all `WireEncodable`
/// implementations and message bodies. Decode failures are recoverable
/// values; receivers discard the offending input and carry on.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The buffer did not contain enough bytes to decode the requested value.
    #[error("Unexpected EoF, not enough bytes to read requested type.")]
    UnexpectedEof,

    /// A message kind byte was not recognised by the registry.
    #[error("Unknown message kind: {0:#04x}")]
    UnknownKind(u8),

    /// A string field held bytes that are not valid UTF-8.
    #[error("String field is not valid UTF-8.")]
    InvalidUtf8,

    /// An address encoding used an unsupported version field.
    #[error(
        "An invalid address version was encountered:\n\
        Provided: {0}, expected: 4 or 6."
    )]
    InvalidAddrVersion(u8),

    /// An encoding version this build does not speak, in a frame header or a
    /// host info record.
    #[error("Unsupported encoding version: {0}")]
    UnsupportedVersion(u8),

    /// A frame header claimed a payload larger than the permitted maximum.
    #[error("Frame payload length {0} exceeds the permitted maximum.")]
    FrameTooLarge(usize),

    /// A datagram did not carry the discovery magic and is not ours.
    #[error("Datagram does not carry the discovery magic.")]
    BadMagic,

    /// Application payload that failed the collaborator's own validation.
    #[error("Invalid payload: {reason}")]
    InvalidPayload { reason: String, payload: Bytes },
}
