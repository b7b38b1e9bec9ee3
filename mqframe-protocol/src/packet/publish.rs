//! PUBLISH packet.

use super::PacketBody;
use crate::codec;
use crate::error::ProtocolError;
use crate::frame::{PacketType, QoS};
use bytes::{Buf, BufMut, Bytes};

const DUP: u8 = 0b1000;
const RETAIN: u8 = 0b0001;

/// PUBLISH: an application message travelling in either direction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Publish {
    pub dup: bool,
    pub qos: QoS,
    pub retain: bool,
    pub topic: String,
    /// Present on the wire only when `qos` is above `AtMostOnce`.
    pub packet_id: u16,
    pub payload: Bytes,
}

impl Publish {
    pub fn new(topic: impl Into<String>, qos: QoS, payload: Bytes) -> Self {
        Self {
            topic: topic.into(),
            qos,
            payload,
            ..Default::default()
        }
    }

    pub fn with_packet_id(mut self, packet_id: u16) -> Self {
        self.packet_id = packet_id;
        self
    }

    pub fn with_retain(mut self) -> Self {
        self.retain = true;
        self
    }

    pub fn with_dup(mut self) -> Self {
        self.dup = true;
        self
    }

    fn has_packet_id(&self) -> bool {
        self.qos != QoS::AtMostOnce
    }
}

impl PacketBody for Publish {
    const PACKET_TYPE: PacketType = PacketType::Publish;

    fn flags(&self) -> u8 {
        let mut flags = (self.qos as u8) << 1;
        if self.dup {
            flags |= DUP;
        }
        if self.retain {
            flags |= RETAIN;
        }
        flags
    }

    fn body_len(&self) -> usize {
        let id_len = if self.has_packet_id() { 2 } else { 0 };
        codec::field_len(self.topic.as_bytes()) + id_len + self.payload.len()
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        codec::check_string(&self.topic)?;
        if self.topic.is_empty() {
            return Err(ProtocolError::malformed("empty PUBLISH topic"));
        }
        if self.topic.contains(&['+', '#'][..]) {
            return Err(ProtocolError::malformed(format!(
                "wildcard in PUBLISH topic {:?}",
                self.topic
            )));
        }

        if self.has_packet_id() {
            if self.packet_id == 0 {
                return Err(ProtocolError::malformed("zero packet id on QoS > 0 PUBLISH"));
            }
        } else {
            if self.dup {
                return Err(ProtocolError::malformed("DUP set on a QoS 0 PUBLISH"));
            }
            // Not carried on the wire at QoS 0
            if self.packet_id != 0 {
                return Err(ProtocolError::malformed(format!(
                    "packet id {} on a QoS 0 PUBLISH",
                    self.packet_id
                )));
            }
        }
        Ok(())
    }

    fn encode_body<B: BufMut>(&self, dst: &mut B) {
        codec::put_field(dst, self.topic.as_bytes());
        if self.has_packet_id() {
            dst.put_u16(self.packet_id);
        }
        dst.put_slice(&self.payload);
    }

    fn decode_body(&mut self, flags: u8, src: &mut &[u8]) -> Result<(), ProtocolError> {
        self.qos = QoS::try_from((flags >> 1) & 0x3)?;
        self.dup = flags & DUP != 0;
        self.retain = flags & RETAIN != 0;

        self.topic = codec::read_string(src)?;
        self.packet_id = 0;
        if self.has_packet_id() {
            self.packet_id = codec::read_u16(src)?;
        }

        let payload_len = src.remaining();
        self.payload = src.copy_to_bytes(payload_len);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::Packet;
    use proptest::prelude::*;

    #[test]
    fn test_qos0_has_no_packet_id() {
        let publish = Publish::new("a/b", QoS::AtMostOnce, Bytes::from_static(b"hi"));
        let encoded = Packet::from(publish).to_bytes().unwrap();
        assert_eq!(
            &encoded[..],
            &[0x30, 0x07, 0x00, 0x03, b'a', b'/', b'b', b'h', b'i']
        );
    }

    #[test]
    fn test_header_flags() {
        let publish = Publish::new("t", QoS::AtLeastOnce, Bytes::new())
            .with_packet_id(1)
            .with_dup()
            .with_retain();
        let encoded = Packet::from(publish).to_bytes().unwrap();
        assert_eq!(encoded[0], 0x3B);
    }

    #[test]
    fn test_qos3_rejected() {
        let mut packet = PacketType::Publish.new_packet();
        let result = packet.decode(&[0x36, 0x05, 0x00, 0x01, b't', 0x00, 0x01]);
        assert_eq!(result, Err(ProtocolError::InvalidQos(3)));
    }

    #[test]
    fn test_wildcard_topic_rejected() {
        let mut packet = PacketType::Publish.new_packet();
        let result = packet.decode(&[0x30, 0x03, 0x00, 0x01, b'#']);
        assert!(matches!(result, Err(ProtocolError::MalformedPacket(_))));
    }

    #[test]
    fn test_zero_packet_id_rejected() {
        let mut packet = PacketType::Publish.new_packet();
        let result = packet.decode(&[0x32, 0x05, 0x00, 0x01, b't', 0x00, 0x00]);
        assert!(matches!(result, Err(ProtocolError::MalformedPacket(_))));
    }

    #[test]
    fn test_empty_payload() {
        let publish = Publish::new("t", QoS::AtMostOnce, Bytes::new());
        let packet = Packet::from(publish.clone());
        let encoded = packet.to_bytes().unwrap();

        let mut decoded = PacketType::Publish.new_packet();
        decoded.decode(&encoded).unwrap();
        assert_eq!(decoded, Packet::Publish(publish));
    }

    #[test]
    fn test_qos0_dup_decode_rejected() {
        let mut packet = PacketType::Publish.new_packet();
        let result = packet.decode(&[0x38, 0x03, 0x00, 0x01, b't']);
        assert!(matches!(result, Err(ProtocolError::MalformedPacket(_))));
    }

    #[test]
    fn test_encoder_rejects_what_decoder_rejects() {
        let invalid = [
            Publish::new("t", QoS::AtMostOnce, Bytes::new()).with_dup(),
            Publish::new("t", QoS::AtMostOnce, Bytes::new()).with_packet_id(5),
            Publish::new("t", QoS::AtLeastOnce, Bytes::new()),
            Publish::new("", QoS::AtMostOnce, Bytes::new()),
            Publish::new("a/+", QoS::AtMostOnce, Bytes::new()),
            Publish::new("a/#", QoS::AtLeastOnce, Bytes::new()).with_packet_id(1),
            Publish::new("a\0b", QoS::AtMostOnce, Bytes::new()),
        ];

        for publish in invalid {
            let packet = Packet::from(publish);
            let mut buf = vec![0u8; packet.encoded_len()];
            assert!(
                matches!(packet.encode(&mut buf), Err(ProtocolError::MalformedPacket(_))),
                "{:?}",
                packet
            );
            assert!(buf.iter().all(|b| *b == 0), "{:?} wrote bytes", packet);
        }
    }

    #[test]
    fn test_topic_too_long() {
        let publish = Publish::new("x".repeat(70_000), QoS::AtMostOnce, Bytes::new());
        let packet = Packet::from(publish);
        let mut buf = vec![0u8; packet.encoded_len()];
        assert_eq!(
            packet.encode(&mut buf),
            Err(ProtocolError::StringTooLong(70_000))
        );
    }

    proptest! {
        #[test]
        fn prop_publish_survives_codec(
            topic in "[a-z0-9/]{1,64}",
            qos in 0u8..=2,
            packet_id in 1u16..=u16::MAX,
            retain in any::<bool>(),
            payload in proptest::collection::vec(any::<u8>(), 0..2048),
        ) {
            let qos = QoS::try_from(qos).unwrap();
            let mut publish = Publish::new(topic, qos, Bytes::from(payload));
            publish.retain = retain;
            if qos != QoS::AtMostOnce {
                publish.packet_id = packet_id;
            }
            let packet = Packet::from(publish);

            let encoded = packet.to_bytes().unwrap();
            let (decoded, n) = Packet::parse(&encoded).unwrap().unwrap();
            prop_assert_eq!(n, encoded.len());
            prop_assert_eq!(decoded, packet);
        }
    }
}
