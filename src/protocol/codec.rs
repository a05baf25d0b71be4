//! The wire encoding trait and implementations for primitive values.
//!
//! Everything that crosses a socket goes through [`WireEncodable`]: discovery
//! datagrams, frame payloads, session messages. Integers are big-endian;
//! strings are u16-length-prefixed UTF-8; byte strings are u32-length-prefixed.

use std::mem;

use bytes::{Buf, BufMut, Bytes};

use crate::data::Id;
use crate::protocol::DecodeError;
use crate::protocol::types::Magic;

/// Trait for types that know how to encode/decode themselves using the
/// link wire format.
pub trait WireEncodable: Sized {
    /// Encode this value into the destination buffer.
    fn encode_wire(&self, dst: &mut impl BufMut);

    /// Decode a value of this type from the source buffer.
    fn decode_wire(src: &mut impl Buf) -> Result<Self, DecodeError>;
}

macro_rules! impl_wire_int {
    ($ty:ty, $put:ident, $get:ident) => {
        impl WireEncodable for $ty {
            fn encode_wire(&self, dst: &mut impl BufMut) {
                dst.$put(*self);
            }

            fn decode_wire(src: &mut impl Buf) -> Result<Self, DecodeError> {
                let size = mem::size_of::<$ty>();
                if src.remaining() < size {
                    return Err(DecodeError::UnexpectedEof);
                }
                Ok(src.$get())
            }
        }
    };
}

// Unsigned big-endian ints:
impl_wire_int!(u16, put_u16, get_u16);
impl_wire_int!(u32, put_u32, get_u32);
impl_wire_int!(u64, put_u64, get_u64);

impl WireEncodable for u8 {
    fn encode_wire(&self, dst: &mut impl BufMut) {
        dst.put_u8(*self);
    }

    fn decode_wire(src: &mut impl Buf) -> Result<Self, DecodeError> {
        if !src.has_remaining() {
            return Err(DecodeError::UnexpectedEof);
        }
        Ok(src.get_u8())
    }
}

impl WireEncodable for bool {
    fn encode_wire(&self, dst: &mut impl BufMut) {
        dst.put_u8(if *self { 1 } else { 0 });
    }

    fn decode_wire(src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(u8::decode_wire(src)? == 1)
    }
}

impl WireEncodable for Magic {
    fn encode_wire(&self, dst: &mut impl BufMut) {
        dst.put_slice(self);
    }

    fn decode_wire(src: &mut impl Buf) -> Result<Self, DecodeError> {
        if src.remaining() < mem::size_of::<Self>() {
            return Err(DecodeError::UnexpectedEof);
        }
        let mut magic = [0u8; 16];
        src.copy_to_slice(&mut magic);
        Ok(magic)
    }
}

impl WireEncodable for String {
    fn encode_wire(&self, dst: &mut impl BufMut) {
        // Longer strings are truncated at the length-prefix limit.
        let len = self.len().min(u16::MAX as usize);
        dst.put_u16(len as u16);
        dst.put_slice(&self.as_bytes()[..len]);
    }

    fn decode_wire(src: &mut impl Buf) -> Result<Self, DecodeError> {
        let len = u16::decode_wire(src)? as usize;
        if src.remaining() < len {
            return Err(DecodeError::UnexpectedEof);
        }
        let bytes = src.copy_to_bytes(len);
        String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8)
    }
}

impl WireEncodable for Bytes {
    fn encode_wire(&self, dst: &mut impl BufMut) {
        dst.put_u32(self.len() as u32);
        dst.put_slice(self);
    }

    fn decode_wire(src: &mut impl Buf) -> Result<Self, DecodeError> {
        let len = u32::decode_wire(src)? as usize;
        if src.remaining() < len {
            return Err(DecodeError::UnexpectedEof);
        }
        Ok(src.copy_to_bytes(len))
    }
}

impl WireEncodable for Id {
    fn encode_wire(&self, dst: &mut impl BufMut) {
        self.0.encode_wire(dst);
    }

    fn decode_wire(src: &mut impl Buf) -> Result<Self, DecodeError> {
        Ok(Id(u32::decode_wire(src)?))
    }
}
