//! MQTT Protocol definitions and types
//!
//! Defines the control-packet subset understood by the broker: CONNECT,
//! CONNACK, PUBLISH, SUBSCRIBE, SUBACK, PINGREQ and PINGRESP.

mod error;
mod packet;

pub use error::{DecodeError, EncodeError, ProtocolError};
pub use packet::*;

/// Quality of Service levels
///
/// Parsed where the wire carries it, never enforced: every delivery is
/// at-most-once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum QoS {
    /// At most once delivery
    #[default]
    AtMostOnce = 0,
    /// At least once delivery
    AtLeastOnce = 1,
    /// Exactly once delivery
    ExactlyOnce = 2,
}

impl QoS {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(QoS::AtMostOnce),
            1 => Some(QoS::AtLeastOnce),
            2 => Some(QoS::ExactlyOnce),
            _ => None,
        }
    }
}

/// MQTT Packet Type (top nibble of the fixed header)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    Connect = 1,
    ConnAck = 2,
    Publish = 3,
    Subscribe = 8,
    SubAck = 9,
    PingReq = 12,
    PingResp = 13,
}

impl PacketType {
    /// Map a packet type nibble to a supported type
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(PacketType::Connect),
            2 => Some(PacketType::ConnAck),
            3 => Some(PacketType::Publish),
            8 => Some(PacketType::Subscribe),
            9 => Some(PacketType::SubAck),
            12 => Some(PacketType::PingReq),
            13 => Some(PacketType::PingResp),
            _ => None,
        }
    }

    /// First byte of a fixed header carrying this type and the given flags
    pub fn header_byte(self, flags: u8) -> u8 {
        ((self as u8) << 4) | (flags & 0x0F)
    }
}

/// Decoded first byte of a control packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedHeader {
    /// Packet type nibble (0-15)
    pub packet_type: u8,
    /// Flags nibble (0-15)
    pub flags: u8,
}

impl FixedHeader {
    /// Split a fixed header byte into its type and flags nibbles
    #[inline]
    pub fn from_byte(byte: u8) -> Self {
        Self {
            packet_type: byte >> 4,
            flags: byte & 0x0F,
        }
    }

    /// The supported packet type, if any
    pub fn kind(&self) -> Option<PacketType> {
        PacketType::from_u8(self.packet_type)
    }
}

/// CONNECT flags byte, decoded into its bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectFlags {
    pub clean_session: bool,
    pub will: bool,
    pub will_qos: u8,
    pub will_retain: bool,
    pub password: bool,
    pub username: bool,
}

impl ConnectFlags {
    pub fn from_byte(byte: u8) -> Self {
        Self {
            clean_session: (byte & 0x02) != 0,
            will: (byte & 0x04) != 0,
            will_qos: (byte >> 3) & 0x03,
            will_retain: (byte & 0x20) != 0,
            password: (byte & 0x40) != 0,
            username: (byte & 0x80) != 0,
        }
    }
}
