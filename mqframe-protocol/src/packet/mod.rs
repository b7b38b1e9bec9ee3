//! Control packet model.
//!
//! Every control packet is a struct owning its fields; [`Packet`] is the
//! tagged union over all of them. A zero-value packet for a given type comes
//! from [`PacketType::new_packet`], is populated by [`Packet::decode`] from a
//! complete frame, and is serialised back by [`Packet::encode`] into a buffer
//! of at least [`Packet::encoded_len`] bytes.

mod ack;
mod connack;
mod connect;
mod empty;
mod publish;
mod subscribe;

pub use ack::{Puback, Pubcomp, Pubrec, Pubrel, Unsuback};
pub use connack::{Connack, ConnackCode};
pub use connect::{Connect, ProtocolLevel, Will};
pub use empty::{Disconnect, Pingreq, Pingresp};
pub use publish::Publish;
pub use subscribe::{Suback, Subscribe, Subscription, Unsubscribe, SUBACK_FAILURE};

use crate::error::ProtocolError;
use crate::frame::{FrameSize, PacketType, Scan};
use crate::remaining_length;
use crate::MAX_REMAINING_LENGTH;
use bytes::{BufMut, BytesMut};

/// Body codec of a single packet type. The fixed header is handled once,
/// generically, by `encode_frame` / `decode_frame`.
pub(crate) trait PacketBody {
    const PACKET_TYPE: PacketType;

    /// Flags nibble written into the header byte.
    fn flags(&self) -> u8 {
        Self::PACKET_TYPE.fixed_flags().unwrap_or(0)
    }

    /// Exact number of body bytes `encode_body` writes.
    fn body_len(&self) -> usize;

    /// Field rules shared by both directions: checked before anything is
    /// encoded and again once a body has been decoded.
    fn validate(&self) -> Result<(), ProtocolError> {
        Ok(())
    }

    /// Writes the body. Capacity has already been checked.
    fn encode_body<B: BufMut>(&self, dst: &mut B);

    /// Reads the body, advancing `src` past everything consumed.
    fn decode_body(&mut self, flags: u8, src: &mut &[u8]) -> Result<(), ProtocolError>;
}

fn frame_len<T: PacketBody>(packet: &T) -> usize {
    let body = packet.body_len();
    1 + remaining_length::encoded_len(body) + body
}

fn check_frame<T: PacketBody>(packet: &T) -> Result<(), ProtocolError> {
    packet.validate()?;

    let body = packet.body_len();
    if body > MAX_REMAINING_LENGTH {
        return Err(ProtocolError::PacketTooLarge {
            size: body,
            max: MAX_REMAINING_LENGTH,
        });
    }
    Ok(())
}

fn encode_frame<T: PacketBody>(packet: &T, dst: &mut [u8]) -> Result<usize, ProtocolError> {
    check_frame(packet)?;

    let body = packet.body_len();
    let total = frame_len(packet);
    if dst.len() < total {
        return Err(ProtocolError::BufferTooSmall {
            needed: total,
            available: dst.len(),
        });
    }

    let mut cursor = &mut dst[..total];
    cursor.put_u8(T::PACKET_TYPE.header_byte(packet.flags()));
    remaining_length::put(body, &mut cursor)?;
    packet.encode_body(&mut cursor);
    debug_assert!(cursor.is_empty(), "body_len disagrees with encode_body");

    Ok(total)
}

fn decode_frame<T: PacketBody>(packet: &mut T, src: &[u8]) -> Result<usize, ProtocolError> {
    let header = *src.first().ok_or(ProtocolError::IncompletePacket {
        needed: 2,
        available: 0,
    })?;

    if header >> 4 != T::PACKET_TYPE as u8 {
        return Err(ProtocolError::UnexpectedPacketType {
            expected: T::PACKET_TYPE,
            actual: header >> 4,
        });
    }
    let flags = header & 0x0f;
    T::PACKET_TYPE.validate_flags(flags)?;

    let (body_len, len_bytes) =
        remaining_length::decode(&src[1..])?.ok_or(ProtocolError::IncompletePacket {
            needed: src.len() + 1,
            available: src.len(),
        })?;

    let total = 1 + len_bytes + body_len;
    if src.len() < total {
        return Err(ProtocolError::IncompletePacket {
            needed: total,
            available: src.len(),
        });
    }

    let mut body = &src[1 + len_bytes..total];
    packet.decode_body(flags, &mut body)?;
    if !body.is_empty() {
        return Err(ProtocolError::malformed(format!(
            "{} trailing bytes in {:?} body",
            body.len(),
            T::PACKET_TYPE
        )));
    }
    packet.validate()?;

    Ok(total)
}

/// A control packet of any type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Connect(Connect),
    Connack(Connack),
    Publish(Publish),
    Puback(Puback),
    Pubrec(Pubrec),
    Pubrel(Pubrel),
    Pubcomp(Pubcomp),
    Subscribe(Subscribe),
    Suback(Suback),
    Unsubscribe(Unsubscribe),
    Unsuback(Unsuback),
    Pingreq(Pingreq),
    Pingresp(Pingresp),
    Disconnect(Disconnect),
}

macro_rules! dispatch {
    ($packet:expr, $inner:ident => $body:expr) => {
        match $packet {
            Packet::Connect($inner) => $body,
            Packet::Connack($inner) => $body,
            Packet::Publish($inner) => $body,
            Packet::Puback($inner) => $body,
            Packet::Pubrec($inner) => $body,
            Packet::Pubrel($inner) => $body,
            Packet::Pubcomp($inner) => $body,
            Packet::Subscribe($inner) => $body,
            Packet::Suback($inner) => $body,
            Packet::Unsubscribe($inner) => $body,
            Packet::Unsuback($inner) => $body,
            Packet::Pingreq($inner) => $body,
            Packet::Pingresp($inner) => $body,
            Packet::Disconnect($inner) => $body,
        }
    };
}

macro_rules! impl_from {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Packet {
                fn from(packet: $variant) -> Self {
                    Packet::$variant(packet)
                }
            }
        )*
    };
}

impl_from!(
    Connect,
    Connack,
    Publish,
    Puback,
    Pubrec,
    Pubrel,
    Pubcomp,
    Subscribe,
    Suback,
    Unsubscribe,
    Unsuback,
    Pingreq,
    Pingresp,
    Disconnect,
);

impl PacketType {
    /// Returns a zero-value packet of this type, ready to be decoded into.
    pub fn new_packet(self) -> Packet {
        match self {
            PacketType::Connect => Packet::Connect(Connect::default()),
            PacketType::Connack => Packet::Connack(Connack::default()),
            PacketType::Publish => Packet::Publish(Publish::default()),
            PacketType::Puback => Packet::Puback(Puback::default()),
            PacketType::Pubrec => Packet::Pubrec(Pubrec::default()),
            PacketType::Pubrel => Packet::Pubrel(Pubrel::default()),
            PacketType::Pubcomp => Packet::Pubcomp(Pubcomp::default()),
            PacketType::Subscribe => Packet::Subscribe(Subscribe::default()),
            PacketType::Suback => Packet::Suback(Suback::default()),
            PacketType::Unsubscribe => Packet::Unsubscribe(Unsubscribe::default()),
            PacketType::Unsuback => Packet::Unsuback(Unsuback::default()),
            PacketType::Pingreq => Packet::Pingreq(Pingreq),
            PacketType::Pingresp => Packet::Pingresp(Pingresp),
            PacketType::Disconnect => Packet::Disconnect(Disconnect),
        }
    }
}

impl Packet {
    /// Returns the packet's type.
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::Connect(_) => PacketType::Connect,
            Packet::Connack(_) => PacketType::Connack,
            Packet::Publish(_) => PacketType::Publish,
            Packet::Puback(_) => PacketType::Puback,
            Packet::Pubrec(_) => PacketType::Pubrec,
            Packet::Pubrel(_) => PacketType::Pubrel,
            Packet::Pubcomp(_) => PacketType::Pubcomp,
            Packet::Subscribe(_) => PacketType::Subscribe,
            Packet::Suback(_) => PacketType::Suback,
            Packet::Unsubscribe(_) => PacketType::Unsubscribe,
            Packet::Unsuback(_) => PacketType::Unsuback,
            Packet::Pingreq(_) => PacketType::Pingreq,
            Packet::Pingresp(_) => PacketType::Pingresp,
            Packet::Disconnect(_) => PacketType::Disconnect,
        }
    }

    /// Exact size of the encoded frame, header included.
    pub fn encoded_len(&self) -> usize {
        dispatch!(self, p => frame_len(p))
    }

    /// Checks that the packet can be encoded and that a peer would decode
    /// it back unchanged. [`encode`](Self::encode) runs the same checks.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        dispatch!(self, p => check_frame(p))
    }

    /// Encodes the full frame into the front of `dst`, returning the bytes written.
    pub fn encode(&self, dst: &mut [u8]) -> Result<usize, ProtocolError> {
        dispatch!(self, p => encode_frame(p, dst))
    }

    /// Decodes one complete frame of this packet's type from the front of
    /// `src`, replacing the packet's fields. Returns the bytes consumed.
    pub fn decode(&mut self, src: &[u8]) -> Result<usize, ProtocolError> {
        dispatch!(self, p => decode_frame(p, src))
    }

    /// Encodes into a freshly allocated buffer.
    pub fn to_bytes(&self) -> Result<BytesMut, ProtocolError> {
        let mut buf = BytesMut::zeroed(self.encoded_len());
        let n = self.encode(&mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Sizes and decodes the frame at the front of `src` in one step.
    ///
    /// Returns `Ok(None)` if `src` does not yet hold a complete frame.
    pub fn parse(src: &[u8]) -> Result<Option<(Packet, usize)>, ProtocolError> {
        let size = match FrameSize::scan(src)? {
            Scan::Complete(size) => size,
            Scan::NeedMore(_) => return Ok(None),
        };
        if src.len() < size.total {
            return Ok(None);
        }

        let mut packet = size.packet_type.new_packet();
        let n = packet.decode(&src[..size.total])?;
        Ok(Some((packet, n)))
    }
}
