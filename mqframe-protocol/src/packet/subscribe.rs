//! SUBSCRIBE, SUBACK and UNSUBSCRIBE packets.

use super::PacketBody;
use crate::codec;
use crate::error::ProtocolError;
use crate::frame::{PacketType, QoS};
use bytes::{Buf, BufMut};

/// SUBACK return code for a rejected subscription.
pub const SUBACK_FAILURE: u8 = 0x80;

fn check_packet_id(packet_id: u16) -> Result<(), ProtocolError> {
    if packet_id == 0 {
        return Err(ProtocolError::malformed("zero packet id"));
    }
    Ok(())
}

/// One topic filter with its requested QoS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub filter: String,
    pub qos: QoS,
}

impl Subscription {
    pub fn new(filter: impl Into<String>, qos: QoS) -> Self {
        Self {
            filter: filter.into(),
            qos,
        }
    }
}

/// SUBSCRIBE: one or more topic filters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Subscribe {
    pub packet_id: u16,
    pub subscriptions: Vec<Subscription>,
}

impl Subscribe {
    pub fn new(packet_id: u16, subscriptions: Vec<Subscription>) -> Self {
        Self {
            packet_id,
            subscriptions,
        }
    }
}

impl PacketBody for Subscribe {
    const PACKET_TYPE: PacketType = PacketType::Subscribe;

    fn body_len(&self) -> usize {
        2 + self
            .subscriptions
            .iter()
            .map(|s| codec::field_len(s.filter.as_bytes()) + 1)
            .sum::<usize>()
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        check_packet_id(self.packet_id)?;
        if self.subscriptions.is_empty() {
            return Err(ProtocolError::malformed("SUBSCRIBE without topic filters"));
        }
        for subscription in &self.subscriptions {
            codec::check_string(&subscription.filter)?;
        }
        Ok(())
    }

    fn encode_body<B: BufMut>(&self, dst: &mut B) {
        dst.put_u16(self.packet_id);
        for subscription in &self.subscriptions {
            codec::put_field(dst, subscription.filter.as_bytes());
            dst.put_u8(subscription.qos as u8);
        }
    }

    fn decode_body(&mut self, _flags: u8, src: &mut &[u8]) -> Result<(), ProtocolError> {
        self.packet_id = codec::read_u16(src)?;
        self.subscriptions.clear();

        while !src.is_empty() {
            let filter = codec::read_string(src)?;
            let options = codec::read_u8(src)?;
            if options & !0x03 != 0 {
                return Err(ProtocolError::malformed(format!(
                    "reserved bits set in requested QoS {:#04x}",
                    options
                )));
            }
            self.subscriptions
                .push(Subscription::new(filter, QoS::try_from(options)?));
        }
        Ok(())
    }
}

/// SUBACK: one return code per requested filter, in request order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Suback {
    pub packet_id: u16,
    /// Granted QoS (0, 1, 2) or [`SUBACK_FAILURE`].
    pub return_codes: Vec<u8>,
}

impl Suback {
    pub fn new(packet_id: u16, return_codes: Vec<u8>) -> Self {
        Self {
            packet_id,
            return_codes,
        }
    }
}

impl PacketBody for Suback {
    const PACKET_TYPE: PacketType = PacketType::Suback;

    fn body_len(&self) -> usize {
        2 + self.return_codes.len()
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        if self.return_codes.is_empty() {
            return Err(ProtocolError::malformed("SUBACK without return codes"));
        }
        for &code in &self.return_codes {
            if code > QoS::ExactlyOnce as u8 && code != SUBACK_FAILURE {
                return Err(ProtocolError::malformed(format!(
                    "invalid SUBACK return code {:#04x}",
                    code
                )));
            }
        }
        Ok(())
    }

    fn encode_body<B: BufMut>(&self, dst: &mut B) {
        dst.put_u16(self.packet_id);
        dst.put_slice(&self.return_codes);
    }

    fn decode_body(&mut self, _flags: u8, src: &mut &[u8]) -> Result<(), ProtocolError> {
        self.packet_id = codec::read_u16(src)?;
        self.return_codes.clear();

        let n = src.len();
        self.return_codes.extend_from_slice(&src[..n]);
        src.advance(n);
        Ok(())
    }
}

/// UNSUBSCRIBE: one or more topic filters to drop.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Unsubscribe {
    pub packet_id: u16,
    pub filters: Vec<String>,
}

impl Unsubscribe {
    pub fn new(packet_id: u16, filters: Vec<String>) -> Self {
        Self { packet_id, filters }
    }
}

impl PacketBody for Unsubscribe {
    const PACKET_TYPE: PacketType = PacketType::Unsubscribe;

    fn body_len(&self) -> usize {
        2 + self
            .filters
            .iter()
            .map(|f| codec::field_len(f.as_bytes()))
            .sum::<usize>()
    }

    fn validate(&self) -> Result<(), ProtocolError> {
        check_packet_id(self.packet_id)?;
        if self.filters.is_empty() {
            return Err(ProtocolError::malformed("UNSUBSCRIBE without topic filters"));
        }
        for filter in &self.filters {
            codec::check_string(filter)?;
        }
        Ok(())
    }

    fn encode_body<B: BufMut>(&self, dst: &mut B) {
        dst.put_u16(self.packet_id);
        for filter in &self.filters {
            codec::put_field(dst, filter.as_bytes());
        }
    }

    fn decode_body(&mut self, _flags: u8, src: &mut &[u8]) -> Result<(), ProtocolError> {
        self.packet_id = codec::read_u16(src)?;
        self.filters.clear();

        while !src.is_empty() {
            self.filters.push(codec::read_string(src)?);
        }
        Ok(())
    }
}
