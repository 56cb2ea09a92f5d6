//! Command definitions
//!
//! Represents commands sent to the peer.

use super::types::{AsciiString, IntervalSeconds, RegisterNumber};

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandType {
    ConnectionTest = 0x00,
    RegisterRead = 0x01,
    RegisterWrite = 0x02,
    VersionRead = 0x03,
    SensorSampling = 0x04,
    DeviceNameRead = 0x05,
    DeviceNameWrite = 0x06,
}

impl CommandType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(CommandType::ConnectionTest),
            0x01 => Some(CommandType::RegisterRead),
            0x02 => Some(CommandType::RegisterWrite),
            0x03 => Some(CommandType::VersionRead),
            0x04 => Some(CommandType::SensorSampling),
            0x05 => Some(CommandType::DeviceNameRead),
            0x06 => Some(CommandType::DeviceNameWrite),
            _ => None,
        }
    }
}

/// A validated command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Link check; the peer echoes an empty response
    ConnectionTest,

    /// Read one register of the host controller
    RegisterRead { register: RegisterNumber },

    /// Write one register of the host controller
    RegisterWrite { register: RegisterNumber, value: u8 },

    /// Read the host controller's firmware version string
    VersionRead,

    /// Start periodic sensor sampling
    SensorSampling { interval: IntervalSeconds },

    /// Read the peer's device name
    DeviceNameRead,

    /// Set the peer's device name
    DeviceNameWrite { name: AsciiString },
}

impl Command {
    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::ConnectionTest => CommandType::ConnectionTest,
            Command::RegisterRead { .. } => CommandType::RegisterRead,
            Command::RegisterWrite { .. } => CommandType::RegisterWrite,
            Command::VersionRead => CommandType::VersionRead,
            Command::SensorSampling { .. } => CommandType::SensorSampling,
            Command::DeviceNameRead => CommandType::DeviceNameRead,
            Command::DeviceNameWrite { .. } => CommandType::DeviceNameWrite,
        }
    }

    /// Bytes following the type byte on the wire
    pub fn payload_len(&self) -> usize {
        match self {
            Command::ConnectionTest | Command::VersionRead | Command::DeviceNameRead => 0,
            Command::RegisterRead { .. } | Command::SensorSampling { .. } => 1,
            Command::RegisterWrite { .. } => 2,
            Command::DeviceNameWrite { name } => name.len(),
        }
    }

    /// Value of the wire length field (type byte + payload)
    pub fn wire_length(&self) -> u8 {
        // AsciiString caps payloads at 254 bytes, so this cannot overflow
        (1 + self.payload_len()) as u8
    }
}
