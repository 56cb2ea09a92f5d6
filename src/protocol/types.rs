//! Validated field types
//!
//! Every value that travels inside a command or packet is checked when it is
//! built, so encoding never fails.

use std::fmt;

use crate::error::{Result, UartError};

/// Largest payload a single frame can carry (length byte minus the type byte)
pub const MAX_PAYLOAD_LEN: usize = u8::MAX as usize - 1;

/// Register index on the peer's host controller (0..=7)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegisterNumber(u8);

impl RegisterNumber {
    pub const MAX: u8 = 7;

    pub fn new(value: u8) -> Result<Self> {
        if value > Self::MAX {
            return Err(UartError::InvalidArgument(format!(
                "register number {} out of range 0..={}",
                value,
                Self::MAX
            )));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl fmt::Display for RegisterNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

/// Sensor sampling interval in whole seconds (1..=60)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntervalSeconds(u8);

impl IntervalSeconds {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 60;

    pub fn new(value: u8) -> Result<Self> {
        if !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(UartError::InvalidArgument(format!(
                "sampling interval {}s out of range {}..={}",
                value,
                Self::MIN,
                Self::MAX
            )));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

/// A string restricted to 7-bit ASCII that fits in one frame payload
///
/// Decoding the encoded bytes always yields the original string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AsciiString(String);

impl AsciiString {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if !value.is_ascii() {
            return Err(UartError::InvalidArgument(format!(
                "{:?} contains non-ASCII characters",
                value
            )));
        }
        if value.len() > MAX_PAYLOAD_LEN {
            return Err(UartError::InvalidArgument(format!(
                "string of {} bytes exceeds the {}-byte frame payload",
                value.len(),
                MAX_PAYLOAD_LEN
            )));
        }
        Ok(Self(value))
    }

    /// Decode raw payload bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let value = std::str::from_utf8(bytes)
            .map_err(|_| UartError::Protocol("string payload is not ASCII".to_string()))?;
        Self::new(value).map_err(|e| UartError::Protocol(e.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for AsciiString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether the peer is still producing sensor samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SamplingState {
    Stopped = 0x00,
    Sampling = 0x01,
}

impl SamplingState {
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0x00 => Ok(SamplingState::Stopped),
            0x01 => Ok(SamplingState::Sampling),
            other => Err(UartError::Protocol(format!(
                "unknown sampling state 0x{:02x}",
                other
            ))),
        }
    }
}
