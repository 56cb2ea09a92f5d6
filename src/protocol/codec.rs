//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Len (1)  │ Type (1) │     Payload (Len - 1)       │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! `Len` counts the type byte plus the payload. Frames carry no checksum.
//!
//! ### Payload by Command Type
//! - CONNECTION_TEST:   empty
//! - REGISTER_READ:     register (1)
//! - REGISTER_WRITE:    register (1) + value (1)
//! - VERSION_READ:      empty
//! - SENSOR_SAMPLING:   interval seconds (1)
//! - DEVICE_NAME_READ:  empty
//! - DEVICE_NAME_WRITE: ASCII name, no terminator

use crate::error::{Result, UartError};
use super::packet::{Event, Response, RxPacket};
use super::types::{AsciiString, IntervalSeconds, RegisterNumber};
use super::{Command, CommandType};

/// Length byte + type byte
pub const HEADER_SIZE: usize = 2;

// =============================================================================
// Command Encoding/Decoding
// =============================================================================

/// Encode a command to bytes
///
/// Format: length (1) + cmd_type (1) + payload
pub fn encode_command(command: &Command) -> Vec<u8> {
    let mut message = Vec::with_capacity(1 + command.wire_length() as usize);
    message.push(command.wire_length());
    message.push(command.command_type() as u8);

    match command {
        Command::ConnectionTest | Command::VersionRead | Command::DeviceNameRead => {}
        Command::RegisterRead { register } => message.push(register.value()),
        Command::RegisterWrite { register, value } => {
            message.push(register.value());
            message.push(*value);
        }
        Command::SensorSampling { interval } => message.push(interval.value()),
        Command::DeviceNameWrite { name } => message.extend_from_slice(name.as_bytes()),
    }

    message
}

/// Decode one complete command frame
///
/// Bytes past the end of the frame are rejected.
pub fn decode_command(bytes: &[u8]) -> Result<Command> {
    let (type_byte, payload) = split_frame(bytes)?;

    let cmd_type = CommandType::from_byte(type_byte).ok_or_else(|| {
        UartError::Protocol(format!("Unknown command type: 0x{:02x}", type_byte))
    })?;

    let expect = |len: usize| -> Result<()> {
        if payload.len() != len {
            return Err(UartError::Protocol(format!(
                "{:?} command: expected {} payload bytes, got {}",
                cmd_type,
                len,
                payload.len()
            )));
        }
        Ok(())
    };

    let command = match cmd_type {
        CommandType::ConnectionTest => {
            expect(0)?;
            Command::ConnectionTest
        }
        CommandType::RegisterRead => {
            expect(1)?;
            Command::RegisterRead {
                register: RegisterNumber::new(payload[0])?,
            }
        }
        CommandType::RegisterWrite => {
            expect(2)?;
            Command::RegisterWrite {
                register: RegisterNumber::new(payload[0])?,
                value: payload[1],
            }
        }
        CommandType::VersionRead => {
            expect(0)?;
            Command::VersionRead
        }
        CommandType::SensorSampling => {
            expect(1)?;
            Command::SensorSampling {
                interval: IntervalSeconds::new(payload[0])?,
            }
        }
        CommandType::DeviceNameRead => {
            expect(0)?;
            Command::DeviceNameRead
        }
        CommandType::DeviceNameWrite => Command::DeviceNameWrite {
            name: AsciiString::from_bytes(payload)?,
        },
    };

    Ok(command)
}

// =============================================================================
// Packet Encoding/Decoding
// =============================================================================

/// Encode an inbound packet the way the peer puts it on the wire
pub fn encode_packet(packet: &RxPacket) -> Vec<u8> {
    let mut payload = Vec::new();

    match packet {
        RxPacket::Response(response) => match response {
            Response::RegisterRead { register, value } => {
                payload.push(register.value());
                payload.push(*value);
            }
            Response::VersionRead { version } => payload.extend_from_slice(version.as_bytes()),
            Response::DeviceNameRead { name } => payload.extend_from_slice(name.as_bytes()),
            Response::ConnectionTest
            | Response::RegisterWrite
            | Response::SensorSampling
            | Response::DeviceNameWrite => {}
        },
        RxPacket::Event(Event::SensorSampling { state, value }) => {
            payload.push(*state as u8);
            if let Some(value) = value {
                payload.extend_from_slice(&value.to_bits().to_be_bytes());
            }
        }
    }

    let mut message = Vec::with_capacity(HEADER_SIZE + payload.len());
    message.push((1 + payload.len()) as u8);
    message.push(packet.type_code());
    message.extend_from_slice(&payload);

    message
}

/// Decode one complete packet frame through the type registry
pub fn decode_packet(bytes: &[u8]) -> Result<RxPacket> {
    let (type_byte, payload) = split_frame(bytes)?;

    let entry = super::registry::lookup(type_byte).ok_or_else(|| {
        UartError::Protocol(format!("Unknown packet type: 0x{:02x}", type_byte))
    })?;

    (entry.decode)(payload)
}

/// Split an exact frame into its type byte and payload
fn split_frame(bytes: &[u8]) -> Result<(u8, &[u8])> {
    if bytes.len() < HEADER_SIZE {
        return Err(UartError::Protocol(format!(
            "Incomplete header: expected {} bytes, got {}",
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let length = bytes[0] as usize;
    if length == 0 {
        return Err(UartError::Protocol("Frame length 0 has no type byte".to_string()));
    }

    let total_len = 1 + length;
    if bytes.len() != total_len {
        return Err(UartError::Protocol(format!(
            "Frame size mismatch: length field says {} bytes, got {}",
            total_len,
            bytes.len()
        )));
    }

    Ok((bytes[1], &bytes[HEADER_SIZE..total_len]))
}
