//! MQTT Packet Decoder

use std::sync::Arc;

use bytes::Bytes;

use super::{read_string, read_u16, read_variable_int};
use crate::protocol::{
    Connect, DecodeError, FixedHeader, Packet, PacketType, Publish, QoS, Subscribe,
};

/// MQTT Packet Decoder
///
/// Holds no state between packets; the connection owns the read buffer.
#[derive(Debug, Default, Clone, Copy)]
pub struct Decoder;

impl Decoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode a packet from the buffer
    ///
    /// Returns `Ok(None)` until a complete packet (fixed header plus
    /// `remaining_length` bytes) is buffered, then `(packet, bytes_consumed)`.
    /// Packet types without a decoder are skipped whole and surface as
    /// [`Packet::Unknown`].
    pub fn decode(&self, buf: &[u8]) -> Result<Option<(Packet, usize)>, DecodeError> {
        if buf.len() < 2 {
            return Ok(None);
        }

        let header = FixedHeader::from_byte(buf[0]);

        let (remaining_length, len_bytes) = match read_variable_int(&buf[1..]) {
            Ok(r) => r,
            Err(DecodeError::InsufficientData) => return Ok(None),
            Err(e) => return Err(e),
        };

        let payload_start = 1 + len_bytes;
        let total_len = payload_start + remaining_length as usize;

        // Wait for complete packet
        if buf.len() < total_len {
            return Ok(None);
        }

        let payload = &buf[payload_start..total_len];

        let packet = match header.kind() {
            Some(PacketType::Connect) => Packet::Connect(
                decode_connect(payload).map_err(|e| truncated(e, "truncated CONNECT"))?,
            ),
            Some(PacketType::Publish) => Packet::Publish(
                decode_publish(header.flags, payload)
                    .map_err(|e| truncated(e, "truncated PUBLISH"))?,
            ),
            Some(PacketType::Subscribe) => Packet::Subscribe(
                decode_subscribe(payload).map_err(|e| truncated(e, "truncated SUBSCRIBE"))?,
            ),
            Some(PacketType::PingReq) => Packet::PingReq,
            _ => Packet::Unknown {
                packet_type: header.packet_type,
                flags: header.flags,
            },
        };

        Ok(Some((packet, total_len)))
    }
}

/// Inside a fully buffered packet, running out of bytes means the packet
/// itself is malformed, not that more data is on the way.
fn truncated(e: DecodeError, msg: &'static str) -> DecodeError {
    match e {
        DecodeError::InsufficientData => DecodeError::MalformedPacket(msg),
        other => other,
    }
}

/// Decode the CONNECT variable header: protocol name, level, flags, keep alive.
/// Anything after the keep alive (client identifier, will, credentials) is
/// left uninterpreted.
pub(crate) fn decode_connect(payload: &[u8]) -> Result<Connect, DecodeError> {
    let (protocol_name, mut pos) = read_string(payload)?;

    if pos + 2 > payload.len() {
        return Err(DecodeError::InsufficientData);
    }
    let protocol_level = payload[pos];
    let connect_flags = payload[pos + 1];
    pos += 2;

    let keep_alive = read_u16(&payload[pos..])?;

    Ok(Connect {
        protocol_name: protocol_name.to_string(),
        protocol_level,
        connect_flags,
        keep_alive,
    })
}

/// Decode a QoS 0 framed PUBLISH: topic, then the message is whatever is
/// left of the remaining length. No packet identifier is read.
pub(crate) fn decode_publish(flags: u8, payload: &[u8]) -> Result<Publish, DecodeError> {
    let dup = (flags & 0x08) != 0;
    let qos = QoS::from_u8((flags >> 1) & 0x03).unwrap_or(QoS::AtMostOnce);
    let retain = (flags & 0x01) != 0;

    let topic_len = read_u16(payload)? as usize;
    if 2 + topic_len > payload.len() {
        return Err(DecodeError::MalformedPacket(
            "topic length exceeds remaining length",
        ));
    }

    let (topic, pos) = read_string(payload)?;

    Ok(Publish {
        dup,
        qos,
        retain,
        topic: Arc::from(topic),
        payload: Bytes::copy_from_slice(&payload[pos..]),
    })
}

/// Decode the packet identifier and the first topic filter entry.
pub(crate) fn decode_subscribe(payload: &[u8]) -> Result<Subscribe, DecodeError> {
    let packet_id = read_u16(payload)?;
    let (filter, len) = read_string(&payload[2..])?;
    let pos = 2 + len;

    // The requested QoS byte is read when present but never enforced
    let requested_qos = payload.get(pos).copied().unwrap_or(0);

    Ok(Subscribe {
        packet_id,
        filter: filter.to_string(),
        requested_qos,
    })
}
