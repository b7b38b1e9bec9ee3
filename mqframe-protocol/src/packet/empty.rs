//! Packets with no body.

use super::PacketBody;
use crate::error::ProtocolError;
use crate::frame::PacketType;
use bytes::BufMut;

macro_rules! empty_packet {
    ($(#[$meta:meta])* $name:ident, $packet_type:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name;

        impl PacketBody for $name {
            const PACKET_TYPE: PacketType = $packet_type;

            fn body_len(&self) -> usize {
                0
            }

            fn encode_body<B: BufMut>(&self, _dst: &mut B) {}

            fn decode_body(&mut self, _flags: u8, _src: &mut &[u8]) -> Result<(), ProtocolError> {
                Ok(())
            }
        }
    };
}

empty_packet!(
    /// PINGREQ: client keep-alive ping.
    Pingreq,
    PacketType::Pingreq
);

empty_packet!(
    /// PINGRESP: answer to PINGREQ.
    Pingresp,
    PacketType::Pingresp
);

empty_packet!(
    /// DISCONNECT: clean client shutdown.
    Disconnect,
    PacketType::Disconnect
);

#[cfg(test)]
mod tests {
    use crate::frame::PacketType;
    use crate::packet::{Disconnect, Packet, Pingresp};

    #[test]
    fn test_two_byte_frames() {
        assert_eq!(&Packet::from(Pingresp).to_bytes().unwrap()[..], &[0xD0, 0x00]);
        assert_eq!(&Packet::from(Disconnect).to_bytes().unwrap()[..], &[0xE0, 0x00]);
    }

    #[test]
    fn test_nonempty_body_rejected() {
        let mut packet = PacketType::Disconnect.new_packet();
        assert!(packet.decode(&[0xE0, 0x01, 0x00]).is_err());
    }
}
