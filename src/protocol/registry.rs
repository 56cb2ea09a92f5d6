//! Response/event type registry
//!
//! Maps a wire type byte to the function that decodes its payload. Fixed-size
//! decoders read only the bytes they need and ignore the rest.

use crate::error::{Result, UartError};
use super::packet::{type_code, Event, Response, RxPacket};
use super::types::{AsciiString, RegisterNumber, SamplingState};

/// Payload decoder for one type code
pub type Decoder = fn(&[u8]) -> Result<RxPacket>;

/// One registry entry
#[derive(Debug, Clone, Copy)]
pub struct RegistryEntry {
    pub type_code: u8,
    pub name: &'static str,
    pub decode: Decoder,
}

static REGISTRY: &[RegistryEntry] = &[
    RegistryEntry {
        type_code: type_code::CONNECTION_TEST,
        name: "ConnectionTest",
        decode: decode_connection_test,
    },
    RegistryEntry {
        type_code: type_code::REGISTER_READ,
        name: "RegisterRead",
        decode: decode_register_read,
    },
    RegistryEntry {
        type_code: type_code::REGISTER_WRITE,
        name: "RegisterWrite",
        decode: decode_register_write,
    },
    RegistryEntry {
        type_code: type_code::VERSION_READ,
        name: "VersionRead",
        decode: decode_version_read,
    },
    RegistryEntry {
        type_code: type_code::SENSOR_SAMPLING,
        name: "SensorSampling",
        decode: decode_sensor_sampling,
    },
    RegistryEntry {
        type_code: type_code::DEVICE_NAME_READ,
        name: "DeviceNameRead",
        decode: decode_device_name_read,
    },
    RegistryEntry {
        type_code: type_code::DEVICE_NAME_WRITE,
        name: "DeviceNameWrite",
        decode: decode_device_name_write,
    },
    RegistryEntry {
        type_code: type_code::SENSOR_SAMPLING_EVENT,
        name: "SensorSamplingEvent",
        decode: decode_sensor_sampling_event,
    },
];

/// Find the entry for a type code
pub fn lookup(type_code: u8) -> Option<&'static RegistryEntry> {
    REGISTRY.iter().find(|entry| entry.type_code == type_code)
}

/// Every registered entry, in type code order
pub fn entries() -> &'static [RegistryEntry] {
    REGISTRY
}

fn need(payload: &[u8], len: usize, what: &str) -> Result<()> {
    if payload.len() < len {
        return Err(UartError::Protocol(format!(
            "{}: expected at least {} payload bytes, got {}",
            what,
            len,
            payload.len()
        )));
    }
    Ok(())
}

fn decode_connection_test(_payload: &[u8]) -> Result<RxPacket> {
    Ok(Response::ConnectionTest.into())
}

fn decode_register_read(payload: &[u8]) -> Result<RxPacket> {
    need(payload, 2, "RegisterRead response")?;
    let register =
        RegisterNumber::new(payload[0]).map_err(|e| UartError::Protocol(e.to_string()))?;
    Ok(Response::RegisterRead {
        register,
        value: payload[1],
    }
    .into())
}

fn decode_register_write(_payload: &[u8]) -> Result<RxPacket> {
    Ok(Response::RegisterWrite.into())
}

fn decode_version_read(payload: &[u8]) -> Result<RxPacket> {
    Ok(Response::VersionRead {
        version: AsciiString::from_bytes(payload)?,
    }
    .into())
}

fn decode_sensor_sampling(_payload: &[u8]) -> Result<RxPacket> {
    Ok(Response::SensorSampling.into())
}

fn decode_device_name_read(payload: &[u8]) -> Result<RxPacket> {
    Ok(Response::DeviceNameRead {
        name: AsciiString::from_bytes(payload)?,
    }
    .into())
}

fn decode_device_name_write(_payload: &[u8]) -> Result<RxPacket> {
    Ok(Response::DeviceNameWrite.into())
}

/// `state` byte, then a big-endian IEEE-754 f32 only while sampling
fn decode_sensor_sampling_event(payload: &[u8]) -> Result<RxPacket> {
    need(payload, 1, "SensorSampling event")?;
    let state = SamplingState::from_byte(payload[0])?;

    let value = match state {
        SamplingState::Sampling => {
            need(payload, 5, "SensorSampling event")?;
            let bits = u32::from_be_bytes([payload[1], payload[2], payload[3], payload[4]]);
            Some(f32::from_bits(bits))
        }
        SamplingState::Stopped => None,
    };

    Ok(Event::SensorSampling { state, value }.into())
}
