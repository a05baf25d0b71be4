use bytes::{Buf, BufMut};

use crate::protocol::DecodeError;

/// Trait implemented by all concrete message body types.
///
/// Implementations are responsible for encoding/decoding only the message
/// body; the leading kind byte is handled by the family registry enum.
pub trait Message: Sized {
    /// The fixed kind byte used to identify this message on the wire.
    const KIND: u8;

    /// Encode the body of this message into the destination buffer.
    fn encode_body(&self, dst: &mut impl BufMut);

    /// Decode the body of this message from the source buffer.
    fn decode_body(src: &mut impl Buf) -> Result<Self, DecodeError>;
}

/// INTERNAL
/// Generates the registry enum for one message family (discovery datagrams,
/// session control). The enum dispatches on the kind byte when decoding and
/// prepends it when encoding; an unrecognised kind is a recoverable
/// [`DecodeError::UnknownKind`].
macro_rules! define_message_family {
    (
        $(#[$meta:meta])*
        $registry:ident {
            $(
                $name:ident,
            )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub enum $registry {
            $(
                $name($name),
            )+
        }

        impl $registry {
            pub fn decode(src: &mut impl Buf) -> Result<Self, DecodeError> {
                if !src.has_remaining() {
                    return Err(DecodeError::UnexpectedEof);
                }
                let kind = src.get_u8();
                Ok(match kind {
                    $(
                        <$name as Message>::KIND => {
                            $registry::$name(<$name as Message>::decode_body(src)?)
                        }
                    )+
                    other => return Err(DecodeError::UnknownKind(other)),
                })
            }

            pub fn kind(&self) -> u8 {
                match self {
                    $(
                        $registry::$name(_inner) => <$name as Message>::KIND,
                    )+
                }
            }

            pub fn encode(&self, dst: &mut impl BufMut) {
                dst.put_u8(self.kind());
                match self {
                    $(
                        $registry::$name(inner) => inner.encode_body(dst),
                    )+
                }
            }
        }

        $(
            impl From<$name> for $registry {
                fn from(body: $name) -> Self {
                    $registry::$name(body)
                }
            }
        )+
    }
}
pub(crate) use define_message_family;
