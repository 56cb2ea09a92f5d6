//! Codec Tests
//!
//! Tests for command encoding and packet decoding.

use wireless_uart::error::UartError;
use wireless_uart::protocol::{
    decode_command, decode_packet, encode_command, encode_packet, registry, AsciiString, Command,
    CommandType, Event, IntervalSeconds, RegisterNumber, Response, RxPacket, SamplingState,
    MAX_PAYLOAD_LEN,
};

fn all_commands() -> Vec<Command> {
    vec![
        Command::ConnectionTest,
        Command::RegisterRead {
            register: RegisterNumber::new(3).unwrap(),
        },
        Command::RegisterWrite {
            register: RegisterNumber::new(7).unwrap(),
            value: 0xFF,
        },
        Command::VersionRead,
        Command::SensorSampling {
            interval: IntervalSeconds::new(60).unwrap(),
        },
        Command::DeviceNameRead,
        Command::DeviceNameWrite {
            name: AsciiString::new("Sample-UartController-001").unwrap(),
        },
    ]
}

// =============================================================================
// Command Encoding Tests
// =============================================================================

#[test]
fn test_encode_connection_test() {
    assert_eq!(encode_command(&Command::ConnectionTest), vec![0x01, 0x00]);
}

#[test]
fn test_encode_register_read() {
    let cmd = Command::RegisterRead {
        register: RegisterNumber::new(5).unwrap(),
    };
    assert_eq!(encode_command(&cmd), vec![0x02, 0x01, 0x05]);
}

#[test]
fn test_encode_register_write() {
    let cmd = Command::RegisterWrite {
        register: RegisterNumber::new(2).unwrap(),
        value: 0xAB,
    };
    assert_eq!(encode_command(&cmd), vec![0x03, 0x02, 0x02, 0xAB]);
}

#[test]
fn test_encode_version_read() {
    assert_eq!(encode_command(&Command::VersionRead), vec![0x01, 0x03]);
}

#[test]
fn test_encode_sensor_sampling() {
    let cmd = Command::SensorSampling {
        interval: IntervalSeconds::new(10).unwrap(),
    };
    assert_eq!(encode_command(&cmd), vec![0x02, 0x04, 0x0A]);
}

#[test]
fn test_encode_device_name_read() {
    assert_eq!(encode_command(&Command::DeviceNameRead), vec![0x01, 0x05]);
}

#[test]
fn test_encode_device_name_write() {
    let cmd = Command::DeviceNameWrite {
        name: AsciiString::new("abc").unwrap(),
    };
    assert_eq!(encode_command(&cmd), vec![0x04, 0x06, b'a', b'b', b'c']);
}

#[test]
fn test_encode_empty_device_name() {
    let cmd = Command::DeviceNameWrite {
        name: AsciiString::new("").unwrap(),
    };
    assert_eq!(encode_command(&cmd), vec![0x01, 0x06]);
}

#[test]
fn test_length_and_type_fields_match_every_command() {
    for cmd in all_commands() {
        let encoded = encode_command(&cmd);
        assert_eq!(encoded[0] as usize, encoded.len() - 1, "{:?}", cmd);
        assert_eq!(encoded[1], cmd.command_type() as u8, "{:?}", cmd);
        assert_eq!(encoded[0], cmd.wire_length());
    }
}

#[test]
fn test_decode_command_inverts_encode() {
    for cmd in all_commands() {
        let decoded = decode_command(&encode_command(&cmd)).unwrap();
        assert_eq!(decoded, cmd);
    }
}

#[test]
fn test_max_length_name_fills_length_byte() {
    let name = "x".repeat(MAX_PAYLOAD_LEN);
    let cmd = Command::DeviceNameWrite {
        name: AsciiString::new(name).unwrap(),
    };
    let encoded = encode_command(&cmd);

    assert_eq!(encoded.len(), 256);
    assert_eq!(encoded[0], 0xFF);
}

// =============================================================================
// Argument Validation Tests
// =============================================================================

#[test]
fn test_register_number_range() {
    assert!(RegisterNumber::new(0).is_ok());
    assert!(RegisterNumber::new(7).is_ok());
    assert!(matches!(
        RegisterNumber::new(8),
        Err(UartError::InvalidArgument(_))
    ));
}

#[test]
fn test_interval_range() {
    assert!(IntervalSeconds::new(0).is_err());
    assert!(IntervalSeconds::new(1).is_ok());
    assert!(IntervalSeconds::new(60).is_ok());
    assert!(IntervalSeconds::new(61).is_err());
}

#[test]
fn test_ascii_string_rejects_non_ascii() {
    assert!(matches!(
        AsciiString::new("café"),
        Err(UartError::InvalidArgument(_))
    ));
}

#[test]
fn test_ascii_string_rejects_oversized() {
    assert!(AsciiString::new("x".repeat(MAX_PAYLOAD_LEN)).is_ok());
    assert!(AsciiString::new("x".repeat(MAX_PAYLOAD_LEN + 1)).is_err());
}

#[test]
fn test_command_type_from_byte() {
    assert_eq!(CommandType::from_byte(0x00), Some(CommandType::ConnectionTest));
    assert_eq!(CommandType::from_byte(0x06), Some(CommandType::DeviceNameWrite));
    assert_eq!(CommandType::from_byte(0x07), None);
}

// =============================================================================
// Command Decoding Error Tests
// =============================================================================

#[test]
fn test_decode_command_incomplete_header() {
    assert!(matches!(decode_command(&[0x01]), Err(UartError::Protocol(_))));
}

#[test]
fn test_decode_command_zero_length() {
    assert!(matches!(decode_command(&[0x00, 0x00]), Err(UartError::Protocol(_))));
}

#[test]
fn test_decode_command_size_mismatch() {
    // Length says 3 bytes follow, only 2 present
    assert!(decode_command(&[0x03, 0x02, 0x01]).is_err());
}

#[test]
fn test_decode_command_unknown_type() {
    assert!(decode_command(&[0x01, 0x20]).is_err());
}

#[test]
fn test_decode_command_unexpected_payload() {
    assert!(decode_command(&[0x02, 0x00, 0x01]).is_err());
}

#[test]
fn test_decode_command_bad_register() {
    assert!(decode_command(&[0x02, 0x01, 0x08]).is_err());
}

// =============================================================================
// Packet Decoding Tests
// =============================================================================

#[test]
fn test_decode_connection_test_response() {
    let packet = decode_packet(&[0x01, 0x40]).unwrap();
    assert_eq!(packet, RxPacket::Response(Response::ConnectionTest));
}

#[test]
fn test_decode_register_read_response() {
    let packet = decode_packet(&[0x03, 0x41, 0x02, 0xFF]).unwrap();
    match packet {
        RxPacket::Response(Response::RegisterRead { register, value }) => {
            assert_eq!(register.value(), 2);
            assert_eq!(value, 0xFF);
        }
        other => panic!("Expected RegisterRead response, got {:?}", other),
    }
}

#[test]
fn test_decode_version_response() {
    let mut frame = vec![0x0D, 0x43];
    frame.extend_from_slice(b"1.2.3.987654");

    match decode_packet(&frame).unwrap() {
        RxPacket::Response(Response::VersionRead { version }) => {
            assert_eq!(version.as_str(), "1.2.3.987654")
        }
        other => panic!("Expected VersionRead response, got {:?}", other),
    }
}

#[test]
fn test_decode_sampling_event_with_value() {
    let packet = decode_packet(&[0x06, 0x84, 0x01, 0x42, 0xF7, 0xD2, 0xF1]).unwrap();
    match packet {
        RxPacket::Event(Event::SensorSampling { state, value }) => {
            assert_eq!(state, SamplingState::Sampling);
            let value = value.unwrap();
            assert_eq!(value.to_bits(), 0x42F7_D2F1);
            assert!((value as f64 - 123.91199493408203125).abs() < 1e-12);
        }
        other => panic!("Expected sampling event, got {:?}", other),
    }
}

#[test]
fn test_decode_sampling_event_stopped() {
    let packet = decode_packet(&[0x02, 0x84, 0x00]).unwrap();
    assert_eq!(
        packet,
        RxPacket::Event(Event::SensorSampling {
            state: SamplingState::Stopped,
            value: None,
        })
    );
}

#[test]
fn test_decode_fixed_size_packet_ignores_trailing_bytes() {
    let packet = decode_packet(&[0x03, 0x42, 0x09, 0x09]).unwrap();
    assert_eq!(packet, RxPacket::Response(Response::RegisterWrite));
}

#[test]
fn test_decode_truncated_sampling_value() {
    assert!(matches!(
        decode_packet(&[0x03, 0x84, 0x01, 0x42]),
        Err(UartError::Protocol(_))
    ));
}

#[test]
fn test_decode_unknown_sampling_state() {
    assert!(decode_packet(&[0x02, 0x84, 0x07]).is_err());
}

#[test]
fn test_decode_unknown_packet_type() {
    assert!(decode_packet(&[0x01, 0xFF]).is_err());
}

#[test]
fn test_encode_packet_matches_wire_vectors() {
    let event: RxPacket = Event::SensorSampling {
        state: SamplingState::Sampling,
        value: Some(f32::from_bits(0x42F7_D2F1)),
    }
    .into();
    assert_eq!(encode_packet(&event), vec![0x06, 0x84, 0x01, 0x42, 0xF7, 0xD2, 0xF1]);

    let name: RxPacket = Response::DeviceNameRead {
        name: AsciiString::new("ab").unwrap(),
    }
    .into();
    assert_eq!(encode_packet(&name), vec![0x03, 0x45, b'a', b'b']);
}

// =============================================================================
// Registry Tests
// =============================================================================

#[test]
fn test_registry_covers_every_response_type() {
    for cmd_type in 0x00..=0x06u8 {
        assert!(registry::lookup(cmd_type | 0x40).is_some(), "0x{:02x}", cmd_type);
    }
    assert!(registry::lookup(0x84).is_some());
    assert!(registry::lookup(0x00).is_none());
}

#[test]
fn test_registry_type_codes_unique() {
    let entries = registry::entries();
    for (i, a) in entries.iter().enumerate() {
        for b in &entries[i + 1..] {
            assert_ne!(a.type_code, b.type_code);
        }
    }
}
