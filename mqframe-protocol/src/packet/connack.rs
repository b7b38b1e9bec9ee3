//! CONNACK packet.

use super::PacketBody;
use crate::codec;
use crate::error::ProtocolError;
use crate::frame::PacketType;
use bytes::BufMut;

/// CONNACK return codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ConnackCode {
    #[default]
    Accepted = 0,
    UnacceptableProtocolVersion = 1,
    IdentifierRejected = 2,
    ServerUnavailable = 3,
    BadUsernamePassword = 4,
    NotAuthorized = 5,
}

impl TryFrom<u8> for ConnackCode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ConnackCode::Accepted),
            1 => Ok(ConnackCode::UnacceptableProtocolVersion),
            2 => Ok(ConnackCode::IdentifierRejected),
            3 => Ok(ConnackCode::ServerUnavailable),
            4 => Ok(ConnackCode::BadUsernamePassword),
            5 => Ok(ConnackCode::NotAuthorized),
            _ => Err(ProtocolError::malformed(format!(
                "invalid CONNACK return code {}",
                value
            ))),
        }
    }
}

/// CONNACK: the server's answer to CONNECT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Connack {
    pub session_present: bool,
    pub return_code: ConnackCode,
}

impl Connack {
    pub fn new(session_present: bool, return_code: ConnackCode) -> Self {
        Self {
            session_present,
            return_code,
        }
    }
}

impl PacketBody for Connack {
    const PACKET_TYPE: PacketType = PacketType::Connack;

    fn body_len(&self) -> usize {
        2
    }

    fn encode_body<B: BufMut>(&self, dst: &mut B) {
        dst.put_u8(self.session_present as u8);
        dst.put_u8(self.return_code as u8);
    }

    fn decode_body(&mut self, _flags: u8, src: &mut &[u8]) -> Result<(), ProtocolError> {
        let ack_flags = codec::read_u8(src)?;
        if ack_flags & !0x01 != 0 {
            return Err(ProtocolError::malformed(format!(
                "reserved CONNACK flag bits set: {:#04x}",
                ack_flags
            )));
        }
        self.session_present = ack_flags & 0x01 != 0;
        self.return_code = ConnackCode::try_from(codec::read_u8(src)?)?;
        Ok(())
    }
}
