//! Fixed header and frame sizing.
//!
//! Frame layout (1 header byte + 1..4 remaining-length bytes + body):
//!
//! ```text
//! +-------------+-----------+--------------------+----------------------+
//! | packet type |   flags   | remaining length   | body                 |
//! |   bits 7-4  |  bits 3-0 | 1..4 bytes, varint | remaining length     |
//! +-------------+-----------+--------------------+----------------------+
//! ```
//!
//! PUBLISH flags: bit 3 DUP, bits 2-1 QoS, bit 0 RETAIN. PUBREL, SUBSCRIBE
//! and UNSUBSCRIBE carry the fixed flags `0b0010`; every other type carries 0.

use crate::error::ProtocolError;
use crate::remaining_length;

/// Bytes peeked before the first look at the remaining-length field.
pub const MIN_HEADER_PEEK: usize = 2;

/// Longest possible fixed header: type byte plus four remaining-length bytes.
pub const MAX_HEADER_LEN: usize = 1 + remaining_length::MAX_LEN;

/// Control packet types (upper nibble of the header byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    Connect = 1,
    Connack = 2,
    Publish = 3,
    Puback = 4,
    Pubrec = 5,
    Pubrel = 6,
    Pubcomp = 7,
    Subscribe = 8,
    Suback = 9,
    Unsubscribe = 10,
    Unsuback = 11,
    Pingreq = 12,
    Pingresp = 13,
    Disconnect = 14,
}

impl PacketType {
    /// Returns the flags nibble this type must carry, or `None` for PUBLISH
    /// whose flags are variable.
    pub fn fixed_flags(self) -> Option<u8> {
        match self {
            PacketType::Publish => None,
            PacketType::Pubrel | PacketType::Subscribe | PacketType::Unsubscribe => Some(0b0010),
            _ => Some(0),
        }
    }

    /// Checks a header flags nibble against the rules for this type.
    pub fn validate_flags(self, flags: u8) -> Result<(), ProtocolError> {
        match self.fixed_flags() {
            Some(expected) if expected != flags => Err(ProtocolError::InvalidFlags {
                packet_type: self,
                flags,
            }),
            _ => Ok(()),
        }
    }

    /// Builds the header byte for this type with the given flags nibble.
    pub fn header_byte(self, flags: u8) -> u8 {
        (self as u8) << 4 | (flags & 0x0f)
    }
}

impl TryFrom<u8> for PacketType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(PacketType::Connect),
            2 => Ok(PacketType::Connack),
            3 => Ok(PacketType::Publish),
            4 => Ok(PacketType::Puback),
            5 => Ok(PacketType::Pubrec),
            6 => Ok(PacketType::Pubrel),
            7 => Ok(PacketType::Pubcomp),
            8 => Ok(PacketType::Subscribe),
            9 => Ok(PacketType::Suback),
            10 => Ok(PacketType::Unsubscribe),
            11 => Ok(PacketType::Unsuback),
            12 => Ok(PacketType::Pingreq),
            13 => Ok(PacketType::Pingresp),
            14 => Ok(PacketType::Disconnect),
            _ => Err(ProtocolError::InvalidPacketType(value)),
        }
    }
}

/// Quality of service levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
#[allow(clippy::enum_variant_names)]
pub enum QoS {
    #[default]
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

impl TryFrom<u8> for QoS {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            _ => Err(ProtocolError::InvalidQos(value)),
        }
    }
}

/// Size and kind of the frame at the front of a byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    /// Packet type from the header's upper nibble.
    pub packet_type: PacketType,
    /// Raw QoS bits (`(flags >> 1) & 0x3`). Only meaningful for PUBLISH.
    pub qos: u8,
    /// Value of the remaining-length field.
    pub remaining_length: usize,
    /// Header byte + remaining-length bytes + body.
    pub total: usize,
}

/// Outcome of scanning a peeked prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    /// The prefix ends inside the remaining-length field; peek this many bytes next.
    NeedMore(usize),
    /// The fixed header is complete.
    Complete(FrameSize),
}

impl FrameSize {
    /// Scans a peeked prefix of the stream for a complete fixed header.
    ///
    /// The prefix is never consumed; callers re-peek a longer prefix on
    /// `Scan::NeedMore`. Fails once the remaining-length field would need a
    /// fifth byte.
    pub fn scan(peeked: &[u8]) -> Result<Scan, ProtocolError> {
        if peeked.len() < MIN_HEADER_PEEK {
            return Ok(Scan::NeedMore(MIN_HEADER_PEEK));
        }

        let (remaining_length, len_bytes) = match remaining_length::decode(&peeked[1..])? {
            Some(decoded) => decoded,
            None => return Ok(Scan::NeedMore(peeked.len() + 1)),
        };

        let header = peeked[0];
        let packet_type = PacketType::try_from(header >> 4)?;
        let qos = ((header & 0x0f) >> 1) & 0x3;

        Ok(Scan::Complete(FrameSize {
            packet_type,
            qos,
            remaining_length,
            total: remaining_length + 1 + len_bytes,
        }))
    }
}
