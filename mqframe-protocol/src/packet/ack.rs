//! Packets whose body is a single packet identifier.

use super::PacketBody;
use crate::codec;
use crate::error::ProtocolError;
use crate::frame::PacketType;
use bytes::BufMut;

macro_rules! packet_id_packet {
    ($(#[$meta:meta])* $name:ident, $packet_type:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name {
            pub packet_id: u16,
        }

        impl $name {
            pub fn new(packet_id: u16) -> Self {
                Self { packet_id }
            }
        }

        impl PacketBody for $name {
            const PACKET_TYPE: PacketType = $packet_type;

            fn body_len(&self) -> usize {
                2
            }

            fn encode_body<B: BufMut>(&self, dst: &mut B) {
                dst.put_u16(self.packet_id);
            }

            fn decode_body(&mut self, _flags: u8, src: &mut &[u8]) -> Result<(), ProtocolError> {
                self.packet_id = codec::read_u16(src)?;
                Ok(())
            }
        }
    };
}

packet_id_packet!(
    /// PUBACK: acknowledges a QoS 1 PUBLISH.
    Puback,
    PacketType::Puback
);

packet_id_packet!(
    /// PUBREC: first acknowledgement of a QoS 2 PUBLISH.
    Pubrec,
    PacketType::Pubrec
);

packet_id_packet!(
    /// PUBREL: response to PUBREC. Carries the fixed flags `0b0010`.
    Pubrel,
    PacketType::Pubrel
);

packet_id_packet!(
    /// PUBCOMP: completes the QoS 2 exchange.
    Pubcomp,
    PacketType::Pubcomp
);

packet_id_packet!(
    /// UNSUBACK: acknowledges an UNSUBSCRIBE.
    Unsuback,
    PacketType::Unsuback
);
