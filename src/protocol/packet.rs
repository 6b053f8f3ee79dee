//! MQTT Packet Definitions
//!
//! Typed views of the control packets the broker reads and writes.

use std::sync::Arc;

use bytes::Bytes;

use super::{ConnectFlags, QoS};

/// MQTT Packet - decoded inbound control packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Connect(Connect),
    Publish(Publish),
    Subscribe(Subscribe),
    PingReq,
    /// Any other packet type; its body has been skipped
    Unknown { packet_type: u8, flags: u8 },
}

impl Packet {
    /// Get packet type as u8
    pub fn packet_type(&self) -> u8 {
        match self {
            Packet::Connect(_) => 1,
            Packet::Publish(_) => 3,
            Packet::Subscribe(_) => 8,
            Packet::PingReq => 12,
            Packet::Unknown { packet_type, .. } => *packet_type,
        }
    }
}

/// CONNECT packet (client -> server)
///
/// Only the fixed variable header is interpreted. The flags are exposed for
/// logging; no will, credential or clean-session behavior hangs off them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connect {
    /// Protocol name ("MQTT", or "MQIsdp" for 3.1 clients)
    pub protocol_name: String,
    /// Protocol level byte
    pub protocol_level: u8,
    /// Raw connect flags byte
    pub connect_flags: u8,
    /// Keep alive interval in seconds
    pub keep_alive: u16,
}

impl Connect {
    pub fn flags(&self) -> ConnectFlags {
        ConnectFlags::from_byte(self.connect_flags)
    }
}

impl Default for Connect {
    fn default() -> Self {
        Self {
            protocol_name: "MQTT".to_string(),
            protocol_level: 4,
            connect_flags: 0x02,
            keep_alive: 60,
        }
    }
}

/// PUBLISH packet (bidirectional)
///
/// The topic uses `Arc<str>` so fan-out can share it across subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publish {
    /// Duplicate delivery flag (informational)
    pub dup: bool,
    /// Requested quality of service (informational)
    pub qos: QoS,
    /// Retain flag (informational)
    pub retain: bool,
    /// Topic name
    pub topic: Arc<str>,
    /// Application message
    pub payload: Bytes,
}

impl Publish {
    pub fn new(topic: impl Into<Arc<str>>, payload: impl Into<Bytes>) -> Self {
        Self {
            dup: false,
            qos: QoS::AtMostOnce,
            retain: false,
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// SUBSCRIBE packet (client -> server)
///
/// Only the first topic filter entry of the payload is carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscribe {
    /// Packet identifier, echoed back in SUBACK
    pub packet_id: u16,
    /// First topic filter
    pub filter: String,
    /// Requested QoS byte of the first entry (not granted or enforced)
    pub requested_qos: u8,
}

/// SUBACK packet (server -> client)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubAck {
    /// Packet identifier from the SUBSCRIBE being acknowledged
    pub packet_id: u16,
    /// One return code per processed filter
    pub return_codes: Vec<u8>,
}

impl SubAck {
    /// A SUBACK granting a single filter
    pub fn success(packet_id: u16) -> Self {
        Self {
            packet_id,
            return_codes: vec![0x00],
        }
    }
}
