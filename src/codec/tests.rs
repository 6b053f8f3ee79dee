//! Codec Tests
//!
//! Byte-level checks for the decoder and the reply encoders.

use bytes::{Bytes, BytesMut};
use pretty_assertions::assert_eq;

use crate::codec::{
    encode_connack, encode_connect, encode_pingresp, encode_publish, encode_suback,
    encode_subscribe, read_variable_int, write_variable_int, Decoder, MAX_REMAINING_LENGTH,
};
use crate::protocol::{Connect, DecodeError, EncodeError, Packet, Publish, QoS, SubAck};

fn decode_one(buf: &[u8]) -> Result<Option<(Packet, usize)>, DecodeError> {
    Decoder::new().decode(buf)
}

// ============================================================================
// Variable Length Integer Tests
// ============================================================================

#[test]
fn test_variable_int_boundary_values() {
    let test_cases = [
        (0, vec![0x00]),
        (127, vec![0x7F]),
        (128, vec![0x80, 0x01]),
        (16383, vec![0xFF, 0x7F]),
        (16384, vec![0x80, 0x80, 0x01]),
        (2097151, vec![0xFF, 0xFF, 0x7F]),
        (2097152, vec![0x80, 0x80, 0x80, 0x01]),
        (268435455, vec![0xFF, 0xFF, 0xFF, 0x7F]),
    ];

    for (value, expected_bytes) in test_cases {
        let mut buf = BytesMut::new();
        write_variable_int(&mut buf, value).unwrap();
        assert_eq!(
            &buf[..],
            &expected_bytes[..],
            "Encoding failed for {}",
            value
        );

        let (decoded, consumed) = read_variable_int(&expected_bytes).unwrap();
        assert_eq!(decoded, value, "Decoding failed for {:?}", expected_bytes);
        assert_eq!(consumed, expected_bytes.len());
    }
}

#[test]
fn test_variable_int_too_large() {
    let mut buf = BytesMut::new();
    assert_eq!(
        write_variable_int(&mut buf, MAX_REMAINING_LENGTH as u32 + 1),
        Err(EncodeError::PacketTooLarge)
    );
    assert!(buf.is_empty());
}

#[test]
fn test_variable_int_truncated() {
    assert_eq!(read_variable_int(&[]), Err(DecodeError::InsufficientData));
    assert_eq!(
        read_variable_int(&[0x80, 0x80]),
        Err(DecodeError::InsufficientData)
    );
}

#[test]
fn test_variable_int_unterminated() {
    assert_eq!(
        read_variable_int(&[0xFF, 0xFF, 0xFF, 0xFF]),
        Err(DecodeError::InvalidRemainingLength)
    );
    assert_eq!(
        read_variable_int(&[0x80, 0x80, 0x80, 0x80, 0x01]),
        Err(DecodeError::InvalidRemainingLength)
    );
}

#[test]
fn test_variable_int_ignores_trailing_bytes() {
    let (value, consumed) = read_variable_int(&[0x0A, 0x00, 0x04]).unwrap();
    assert_eq!(value, 10);
    assert_eq!(consumed, 1);
}

// ============================================================================
// Decoder Tests
// ============================================================================

#[test]
fn test_decode_connect() {
    let bytes = [
        0x10, 0x0A, 0x00, 0x04, b'M', b'Q', b'T', b'T', 0x04, 0x02, 0x00, 0x0A,
    ];
    let (packet, consumed) = decode_one(&bytes).unwrap().unwrap();
    assert_eq!(consumed, bytes.len());
    assert_eq!(
        packet,
        Packet::Connect(Connect {
            protocol_name: "MQTT".to_string(),
            protocol_level: 4,
            connect_flags: 0x02,
            keep_alive: 10,
        })
    );
    if let Packet::Connect(connect) = packet {
        assert!(connect.flags().clean_session);
    }
}

#[test]
fn test_decode_connect_ignores_client_identifier() {
    // v3.1.1 CONNECT with a client identifier after the keep alive
    let bytes = [
        0x10, 0x0F, 0x00, 0x04, b'M', b'Q', b'T', b'T', 0x04, 0x02, 0x00, 0x3C, 0x00, 0x03,
        b'a', b'b', b'c',
    ];
    let (packet, consumed) = decode_one(&bytes).unwrap().unwrap();
    assert_eq!(consumed, 17);
    match packet {
        Packet::Connect(connect) => assert_eq!(connect.keep_alive, 60),
        other => panic!("Expected CONNECT, got {:?}", other),
    }
}

#[test]
fn test_decode_connect_truncated_body() {
    // Remaining length says 3 bytes; protocol name claims 4
    let bytes = [0x10, 0x03, 0x00, 0x04, b'M'];
    assert!(matches!(
        decode_one(&bytes),
        Err(DecodeError::MalformedPacket(_))
    ));
}

#[test]
fn test_decode_waits_for_complete_packet() {
    let bytes = [
        0x10, 0x0A, 0x00, 0x04, b'M', b'Q', b'T', b'T', 0x04, 0x02, 0x00, 0x0A,
    ];
    for cut in 0..bytes.len() {
        assert_eq!(decode_one(&bytes[..cut]), Ok(None), "cut at {}", cut);
    }
}

#[test]
fn test_decode_publish() {
    let bytes = [
        0x30, 0x0A, 0x00, 0x05, b'a', b'/', b'b', b'/', b'c', b'h', b'i', b'!',
    ];
    let (packet, consumed) = decode_one(&bytes).unwrap().unwrap();
    assert_eq!(consumed, 12);
    assert_eq!(
        packet,
        Packet::Publish(Publish::new("a/b/c", Bytes::from_static(b"hi!")))
    );
}

#[test]
fn test_decode_publish_empty_payload_and_flags() {
    // QoS 1 + retain flags; the framing still has no packet identifier
    let bytes = [0x33, 0x03, 0x00, 0x01, b'x'];
    let (packet, _) = decode_one(&bytes).unwrap().unwrap();
    match packet {
        Packet::Publish(publish) => {
            assert_eq!(&*publish.topic, "x");
            assert!(publish.payload.is_empty());
            assert_eq!(publish.qos, QoS::AtLeastOnce);
            assert!(publish.retain);
        }
        other => panic!("Expected PUBLISH, got {:?}", other),
    }
}

#[test]
fn test_decode_publish_topic_longer_than_packet() {
    let bytes = [0x30, 0x04, 0x00, 0x09, b'a', b'b'];
    assert_eq!(
        decode_one(&bytes),
        Err(DecodeError::MalformedPacket(
            "topic length exceeds remaining length"
        ))
    );
}

#[test]
fn test_decode_publish_invalid_utf8() {
    let bytes = [0x30, 0x04, 0x00, 0x02, 0xC3, 0x28];
    assert_eq!(decode_one(&bytes), Err(DecodeError::InvalidUtf8));
}

#[test]
fn test_decode_subscribe() {
    let bytes = [
        0x82, 0x0A, 0x00, 0x07, 0x00, 0x05, b'a', b'/', b'+', b'/', b'c', 0x01,
    ];
    let (packet, consumed) = decode_one(&bytes).unwrap().unwrap();
    assert_eq!(consumed, 12);
    match packet {
        Packet::Subscribe(subscribe) => {
            assert_eq!(subscribe.packet_id, 7);
            assert_eq!(subscribe.filter, "a/+/c");
            assert_eq!(subscribe.requested_qos, 1);
        }
        other => panic!("Expected SUBSCRIBE, got {:?}", other),
    }
}

#[test]
fn test_decode_subscribe_reads_first_filter_only() {
    let bytes = [
        0x82, 0x0C, 0x00, 0x01, 0x00, 0x01, b'a', 0x00, 0x00, 0x03, b'b', b'/', b'#', 0x00,
    ];
    let (packet, consumed) = decode_one(&bytes).unwrap().unwrap();
    assert_eq!(consumed, bytes.len());
    match packet {
        Packet::Subscribe(subscribe) => assert_eq!(subscribe.filter, "a"),
        other => panic!("Expected SUBSCRIBE, got {:?}", other),
    }
}

#[test]
fn test_decode_subscribe_without_filter() {
    let bytes = [0x82, 0x02, 0x00, 0x01];
    assert!(matches!(
        decode_one(&bytes),
        Err(DecodeError::MalformedPacket(_))
    ));
}

#[test]
fn test_decode_pingreq() {
    let (packet, consumed) = decode_one(&[0xC0, 0x00]).unwrap().unwrap();
    assert_eq!(packet, Packet::PingReq);
    assert_eq!(consumed, 2);
}

#[test]
fn test_decode_unknown_skips_body() {
    // UNSUBSCRIBE is not handled; its whole body must be consumed
    let bytes = [0xA2, 0x05, 0x00, 0x01, 0x00, 0x01, b'a', 0xC0, 0x00];
    let (packet, consumed) = decode_one(&bytes).unwrap().unwrap();
    assert_eq!(
        packet,
        Packet::Unknown {
            packet_type: 10,
            flags: 0x02
        }
    );
    assert_eq!(consumed, 7);

    let (next, _) = decode_one(&bytes[consumed..]).unwrap().unwrap();
    assert_eq!(next, Packet::PingReq);
}

#[test]
fn test_decode_malformed_remaining_length() {
    let bytes = [0x30, 0xFF, 0xFF, 0xFF, 0xFF, 0x01];
    assert_eq!(
        decode_one(&bytes),
        Err(DecodeError::InvalidRemainingLength)
    );
}

// ============================================================================
// Encoder Tests
// ============================================================================

#[test]
fn test_encode_connack() {
    let mut buf = BytesMut::new();
    encode_connack(&mut buf);
    assert_eq!(&buf[..], &[0x20, 0x02, 0x00, 0x00]);
}

#[test]
fn test_encode_pingresp() {
    let mut buf = BytesMut::new();
    encode_pingresp(&mut buf);
    assert_eq!(&buf[..], &[0xD0, 0x00]);
}

#[test]
fn test_encode_suback() {
    let mut buf = BytesMut::new();
    encode_suback(&SubAck::success(0x1234), &mut buf).unwrap();
    assert_eq!(&buf[..], &[0x90, 0x03, 0x12, 0x34, 0x00]);
}

#[test]
fn test_encode_suback_return_codes_verbatim() {
    let suback = SubAck {
        packet_id: 7,
        return_codes: vec![0x00, 0x01, 0x80],
    };
    let mut buf = BytesMut::new();
    encode_suback(&suback, &mut buf).unwrap();
    assert_eq!(&buf[..], &[0x90, 0x05, 0x00, 0x07, 0x00, 0x01, 0x80]);
}

#[test]
fn test_encode_publish() {
    let mut buf = BytesMut::new();
    encode_publish("a/b/c", b"hi", &mut buf).unwrap();
    assert_eq!(
        &buf[..],
        &[0x30, 0x09, 0x00, 0x05, b'a', b'/', b'b', b'/', b'c', b'h', b'i']
    );
}

#[test]
fn test_encode_publish_long_payload_uses_multibyte_length() {
    let payload = vec![0xAB; 200];
    let mut buf = BytesMut::new();
    encode_publish("t", &payload, &mut buf).unwrap();
    // remaining length 203 = 0xCB 0x01
    assert_eq!(&buf[..3], &[0x30, 0xCB, 0x01]);
    assert_eq!(buf.len(), 3 + 203);

    let (packet, consumed) = decode_one(&buf).unwrap().unwrap();
    assert_eq!(consumed, buf.len());
    match packet {
        Packet::Publish(publish) => assert_eq!(&publish.payload[..], &payload[..]),
        other => panic!("Expected PUBLISH, got {:?}", other),
    }
}

#[test]
fn test_encode_connect_matches_reference_bytes() {
    let connect = Connect {
        keep_alive: 10,
        ..Connect::default()
    };
    let mut buf = BytesMut::new();
    encode_connect(&connect, &mut buf).unwrap();
    assert_eq!(
        &buf[..],
        &[0x10, 0x0A, 0x00, 0x04, b'M', b'Q', b'T', b'T', 0x04, 0x02, 0x00, 0x0A]
    );
}

#[test]
fn test_encode_subscribe_decodes() {
    let mut buf = BytesMut::new();
    encode_subscribe(42, "sensors/#", 0, &mut buf).unwrap();
    let (packet, consumed) = decode_one(&buf).unwrap().unwrap();
    assert_eq!(consumed, buf.len());
    match packet {
        Packet::Subscribe(subscribe) => {
            assert_eq!(subscribe.packet_id, 42);
            assert_eq!(subscribe.filter, "sensors/#");
        }
        other => panic!("Expected SUBSCRIBE, got {:?}", other),
    }
}

// ============================================================================
// Property-Based Tests (using proptest)
// ============================================================================

mod proptest_tests {
    use super::*;
    use crate::codec::variable_int_len;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(1000))]

        // Variable byte integer roundtrip
        #[test]
        fn prop_variable_int_roundtrip(value in 0u32..=268_435_455u32) {
            let mut buf = BytesMut::new();
            let written = write_variable_int(&mut buf, value).unwrap();
            let (decoded, consumed) = read_variable_int(&buf).unwrap();
            prop_assert_eq!(value, decoded);
            prop_assert_eq!(written, consumed);
        }

        // Encoding is minimal
        #[test]
        fn prop_variable_int_length(value in 0u32..=268_435_455u32) {
            let mut buf = BytesMut::new();
            let written = write_variable_int(&mut buf, value).unwrap();
            let expected_len = if value < 128 { 1 }
                else if value < 16_384 { 2 }
                else if value < 2_097_152 { 3 }
                else { 4 };
            prop_assert_eq!(written, expected_len);
            prop_assert_eq!(written, variable_int_len(value));
            // Last byte never has the continuation bit; no trailing zero padding
            prop_assert_eq!(buf[written - 1] & 0x80, 0);
            if written > 1 {
                prop_assert_ne!(buf[written - 1], 0);
            }
        }

        // PUBLISH survives an encode/decode pass
        #[test]
        fn prop_publish_roundtrip(
            topic in "[a-z0-9]{1,10}(/[a-z0-9]{1,10}){0,4}",
            payload in proptest::collection::vec(any::<u8>(), 0..512),
        ) {
            let mut buf = BytesMut::new();
            encode_publish(&topic, &payload, &mut buf).unwrap();
            let (packet, consumed) = Decoder::new().decode(&buf).unwrap().unwrap();
            prop_assert_eq!(consumed, buf.len());
            prop_assert_eq!(
                packet,
                Packet::Publish(Publish::new(topic.as_str(), payload.clone()))
            );
        }
    }
}
