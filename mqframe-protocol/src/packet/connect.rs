//! CONNECT packet.

use super::PacketBody;
use crate::codec;
use crate::error::ProtocolError;
use crate::frame::{PacketType, QoS};
use bytes::{BufMut, Bytes};

const RESERVED: u8 = 0b0000_0001;
const CLEAN_SESSION: u8 = 0b0000_0010;
const WILL: u8 = 0b0000_0100;
const WILL_QOS_SHIFT: u8 = 3;
const WILL_RETAIN: u8 = 0b0010_0000;
const PASSWORD: u8 = 0b0100_0000;
const USERNAME: u8 = 0b1000_0000;

/// Protocol name and level announced in CONNECT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolLevel {
    /// "MQIsdp", level 3.
    V31,
    /// "MQTT", level 4.
    #[default]
    V311,
}

impl ProtocolLevel {
    pub fn name(self) -> &'static str {
        match self {
            ProtocolLevel::V31 => "MQIsdp",
            ProtocolLevel::V311 => "MQTT",
        }
    }

    pub fn level(self) -> u8 {
        match self {
            ProtocolLevel::V31 => 3,
            ProtocolLevel::V311 => 4,
        }
    }

    fn from_wire(name: &str, level: u8) -> Result<Self, ProtocolError> {
        match (name, level) {
            ("MQIsdp", 3) => Ok(ProtocolLevel::V31),
            ("MQTT", 4) => Ok(ProtocolLevel::V311),
            _ => Err(ProtocolError::UnsupportedProtocol {
                name: name.to_string(),
                level,
            }),
        }
    }
}

/// Last-will message published by the server if the client vanishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Will {
    pub topic: String,
    pub message: Bytes,
    pub qos: QoS,
    pub retain: bool,
}

/// CONNECT: the first packet a client sends.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Connect {
    pub protocol: ProtocolLevel,
    pub clean_session: bool,
    pub keep_alive: u16,
    pub client_id: String,
    pub will: Option<Will>,
    pub username: Option<String>,
    pub password: Option<Bytes>,
}

impl Connect {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            clean_session: true,
            ..Default::default()
        }
    }

    fn connect_flags(&self) -> u8 {
        let mut flags = 0;
        if self.clean_session {
            flags |= CLEAN_SESSION;
        }
        if let Some(will) = &self.will {
            flags |= WILL | (will.qos as u8) << WILL_QOS_SHIFT;
            if will.retain {
                flags |= WILL_RETAIN;
            }
        }
        if self.username.is_some() {
            flags |= USERNAME;
        }
        if self.password.is_some() {
            flags |= PASSWORD;
        }
        flags
    }
}

impl PacketBody for Connect {
    const PACKET_TYPE: PacketType = PacketType::Connect;

    fn body_len(&self) -> usize {
        let mut len = codec::field_len(self.protocol.name().as_bytes()) + 1 + 1 + 2;
        len += codec::field_len(self.client_id.as_bytes());
        if let Some(will) = &self.will {
            len += codec::field_len(will.topic.as_bytes()) + codec::field_len(&will.message);
        }
        if let Some(username) = &self.username {
            len += codec::field_len(username.as_bytes());
        }
        if let Some(password) = &self.password {
            len += codec::field_len(password);
        }
        len
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        codec::check_string(&self.client_id)?;
        if self.client_id.is_empty() && !self.clean_session {
            return Err(ProtocolError::malformed(
                "empty client id requires a clean session",
            ));
        }
        if let Some(will) = &self.will {
            codec::check_string(&will.topic)?;
            codec::check_field(&will.message)?;
        }
        if let Some(username) = &self.username {
            codec::check_string(username)?;
        }
        if let Some(password) = &self.password {
            if self.username.is_none() {
                return Err(ProtocolError::malformed("password without username"));
            }
            codec::check_field(password)?;
        }
        Ok(())
    }

    fn encode_body<B: BufMut>(&self, dst: &mut B) {
        codec::put_field(dst, self.protocol.name().as_bytes());
        dst.put_u8(self.protocol.level());
        dst.put_u8(self.connect_flags());
        dst.put_u16(self.keep_alive);
        codec::put_field(dst, self.client_id.as_bytes());
        if let Some(will) = &self.will {
            codec::put_field(dst, will.topic.as_bytes());
            codec::put_field(dst, &will.message);
        }
        if let Some(username) = &self.username {
            codec::put_field(dst, username.as_bytes());
        }
        if let Some(password) = &self.password {
            codec::put_field(dst, password);
        }
    }

    fn decode_body(&mut self, _flags: u8, src: &mut &[u8]) -> Result<(), ProtocolError> {
        let name = codec::read_string(src)?;
        let level = codec::read_u8(src)?;
        self.protocol = ProtocolLevel::from_wire(&name, level)?;

        let flags = codec::read_u8(src)?;
        if flags & RESERVED != 0 {
            return Err(ProtocolError::malformed("reserved CONNECT flag set"));
        }
        self.clean_session = flags & CLEAN_SESSION != 0;

        let will_qos = (flags >> WILL_QOS_SHIFT) & 0x3;
        let will_retain = flags & WILL_RETAIN != 0;
        let has_will = flags & WILL != 0;
        if !has_will && (will_qos != 0 || will_retain) {
            return Err(ProtocolError::malformed("will QoS/retain set without will flag"));
        }
        let will_qos = QoS::try_from(will_qos)?;

        let has_username = flags & USERNAME != 0;
        let has_password = flags & PASSWORD != 0;
        if has_password && !has_username {
            return Err(ProtocolError::malformed("password flag set without username"));
        }

        self.keep_alive = codec::read_u16(src)?;

        self.client_id = codec::read_string(src)?;

        self.will = None;
        if has_will {
            let topic = codec::read_string(src)?;
            let message = codec::read_binary(src)?;
            self.will = Some(Will {
                topic,
                message,
                qos: will_qos,
                retain: will_retain,
            });
        }

        self.username = None;
        if has_username {
            self.username = Some(codec::read_string(src)?);
        }
        self.password = None;
        if has_password {
            self.password = Some(codec::read_binary(src)?);
        }
        Ok(())
    }
}
