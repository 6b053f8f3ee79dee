//! MQTT Packet Encoder
//!
//! Server replies (CONNACK, SUBACK, PUBLISH, PINGRESP) plus the client-side
//! packets used by tests and the connect probe.

use bytes::{BufMut, BytesMut};

use super::{variable_int_len, write_string, write_variable_int, MAX_REMAINING_LENGTH};
use crate::protocol::{Connect, EncodeError, PacketType, SubAck};

/// CONNACK: session-present 0, reason code 0 (always success)
pub const CONNACK: [u8; 4] = [0x20, 0x02, 0x00, 0x00];

/// PINGRESP
pub const PINGRESP: [u8; 2] = [0xD0, 0x00];

pub fn encode_connack(buf: &mut BytesMut) {
    buf.put_slice(&CONNACK);
}

pub fn encode_pingresp(buf: &mut BytesMut) {
    buf.put_slice(&PINGRESP);
}

/// SUBACK: packet identifier echoed, then the return codes verbatim
pub fn encode_suback(packet: &SubAck, buf: &mut BytesMut) -> Result<(), EncodeError> {
    let remaining_length = 2 + packet.return_codes.len();

    buf.put_u8(PacketType::SubAck.header_byte(0));
    write_variable_int(buf, remaining_length as u32)?;
    buf.put_u16(packet.packet_id);
    buf.put_slice(&packet.return_codes);
    Ok(())
}

/// PUBLISH with QoS 0 framing: no packet identifier
pub fn encode_publish(topic: &str, payload: &[u8], buf: &mut BytesMut) -> Result<(), EncodeError> {
    if topic.len() > 65535 {
        return Err(EncodeError::StringTooLong);
    }
    let remaining_length = 2 + topic.len() + payload.len();
    if remaining_length > MAX_REMAINING_LENGTH {
        return Err(EncodeError::PacketTooLarge);
    }

    buf.reserve(1 + variable_int_len(remaining_length as u32) + remaining_length);
    buf.put_u8(PacketType::Publish.header_byte(0));
    write_variable_int(buf, remaining_length as u32)?;
    write_string(buf, topic)?;
    buf.put_slice(payload);
    Ok(())
}

/// CONNECT carrying only the variable header the broker reads
pub fn encode_connect(packet: &Connect, buf: &mut BytesMut) -> Result<(), EncodeError> {
    // name prefix + name + level + flags + keep alive
    let remaining_length = 2 + packet.protocol_name.len() + 1 + 1 + 2;

    buf.put_u8(PacketType::Connect.header_byte(0));
    write_variable_int(buf, remaining_length as u32)?;
    write_string(buf, &packet.protocol_name)?;
    buf.put_u8(packet.protocol_level);
    buf.put_u8(packet.connect_flags);
    buf.put_u16(packet.keep_alive);
    Ok(())
}

/// SUBSCRIBE with a single topic filter entry
pub fn encode_subscribe(
    packet_id: u16,
    filter: &str,
    qos: u8,
    buf: &mut BytesMut,
) -> Result<(), EncodeError> {
    let remaining_length = 2 + 2 + filter.len() + 1;

    // SUBSCRIBE fixed header flags are 0b0010
    buf.put_u8(PacketType::Subscribe.header_byte(0x02));
    write_variable_int(buf, remaining_length as u32)?;
    buf.put_u16(packet_id);
    write_string(buf, filter)?;
    buf.put_u8(qos);
    Ok(())
}

pub fn encode_pingreq(buf: &mut BytesMut) {
    buf.put_u8(PacketType::PingReq.header_byte(0));
    buf.put_u8(0x00);
}
