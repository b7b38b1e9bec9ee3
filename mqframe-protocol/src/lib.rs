//! # mqframe-protocol
//!
//! Wire protocol implementation for mqframe (MQTT 3.1.1 control packets).
//!
//! This crate provides:
//! - The remaining-length variable byte integer
//! - Fixed header parsing and frame sizing over a peeked prefix
//! - A typed model of every control packet with encode/decode
//! - Protocol error types

pub mod codec;
pub mod error;
pub mod frame;
pub mod packet;
pub mod remaining_length;

pub use error::ProtocolError;
pub use frame::{FrameSize, PacketType, QoS, Scan, MAX_HEADER_LEN, MIN_HEADER_PEEK};
pub use packet::{
    ConnackCode, Connack, Connect, Disconnect, Packet, Pingreq, Pingresp, ProtocolLevel, Puback,
    Pubcomp, Publish, Pubrec, Pubrel, Suback, Subscribe, Subscription, Unsuback, Unsubscribe, Will,
    SUBACK_FAILURE,
};

/// Maximum value the remaining-length field can carry (256 MiB - 1).
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;

/// Maximum length of a UTF-8 string field.
pub const MAX_STRING_LEN: usize = u16::MAX as usize;
