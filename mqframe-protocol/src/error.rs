//! Protocol error types.

use crate::frame::PacketType;
use thiserror::Error;

/// Protocol-level errors that can occur while sizing, decoding or encoding packets.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("remaining length field has its 4th byte continuation bit set")]
    RemainingLengthTooLong,

    #[error("packet too large: remaining length {size} (max {max})")]
    PacketTooLarge { size: usize, max: usize },

    #[error("invalid packet type: {0}")]
    InvalidPacketType(u8),

    #[error("invalid flags {flags:#06b} for {packet_type:?}")]
    InvalidFlags { packet_type: PacketType, flags: u8 },

    #[error("invalid QoS level: {0}")]
    InvalidQos(u8),

    #[error("unexpected packet type: expected {expected:?}, got {actual}")]
    UnexpectedPacketType { expected: PacketType, actual: u8 },

    #[error("incomplete packet: need {needed} bytes, have {available}")]
    IncompletePacket { needed: usize, available: usize },

    #[error("buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    #[error("invalid UTF-8 in string field")]
    InvalidUtf8,

    #[error("string field too long: {0} bytes")]
    StringTooLong(usize),

    #[error("malformed packet: {0}")]
    MalformedPacket(String),

    #[error("unsupported protocol {name:?} level {level}")]
    UnsupportedProtocol { name: String, level: u8 },
}

impl ProtocolError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        ProtocolError::MalformedPacket(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::RemainingLengthTooLong;
        assert!(err.to_string().contains("4th byte"));

        let err = ProtocolError::InvalidPacketType(15);
        assert!(err.to_string().contains("15"));

        let err = ProtocolError::InvalidFlags {
            packet_type: PacketType::Subscribe,
            flags: 0,
        };
        let msg = err.to_string();
        assert!(msg.contains("Subscribe"));
        assert!(msg.contains("0b0000"));

        let err = ProtocolError::IncompletePacket {
            needed: 12,
            available: 3,
        };
        assert!(err.to_string().contains("12"));

        let err = ProtocolError::UnsupportedProtocol {
            name: "AMQP".to_string(),
            level: 9,
        };
        assert!(err.to_string().contains("AMQP"));
    }
}
