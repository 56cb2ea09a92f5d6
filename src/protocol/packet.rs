//! Inbound packet definitions
//!
//! Represents responses and unsolicited events received from the peer.

use super::types::{AsciiString, RegisterNumber, SamplingState};

/// Wire type codes of every packet the registry knows
pub mod type_code {
    pub const CONNECTION_TEST: u8 = 0x40;
    pub const REGISTER_READ: u8 = 0x41;
    pub const REGISTER_WRITE: u8 = 0x42;
    pub const VERSION_READ: u8 = 0x43;
    pub const SENSOR_SAMPLING: u8 = 0x44;
    pub const DEVICE_NAME_READ: u8 = 0x45;
    pub const DEVICE_NAME_WRITE: u8 = 0x46;
    pub const SENSOR_SAMPLING_EVENT: u8 = 0x84;
}

/// A decoded inbound packet
#[derive(Debug, Clone, PartialEq)]
pub enum RxPacket {
    /// Reply to a specific command
    Response(Response),

    /// Unsolicited notification
    Event(Event),
}

/// Replies, one per command type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    ConnectionTest,
    RegisterRead { register: RegisterNumber, value: u8 },
    RegisterWrite,
    VersionRead { version: AsciiString },
    SensorSampling,
    DeviceNameRead { name: AsciiString },
    DeviceNameWrite,
}

/// Unsolicited events
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Periodic sensor sample; `value` is present only while sampling
    SensorSampling {
        state: SamplingState,
        value: Option<f32>,
    },
}

impl RxPacket {
    /// Wire type code of this packet
    pub fn type_code(&self) -> u8 {
        match self {
            RxPacket::Response(response) => response.type_code(),
            RxPacket::Event(event) => event.type_code(),
        }
    }
}

impl Response {
    pub fn type_code(&self) -> u8 {
        match self {
            Response::ConnectionTest => type_code::CONNECTION_TEST,
            Response::RegisterRead { .. } => type_code::REGISTER_READ,
            Response::RegisterWrite => type_code::REGISTER_WRITE,
            Response::VersionRead { .. } => type_code::VERSION_READ,
            Response::SensorSampling => type_code::SENSOR_SAMPLING,
            Response::DeviceNameRead { .. } => type_code::DEVICE_NAME_READ,
            Response::DeviceNameWrite => type_code::DEVICE_NAME_WRITE,
        }
    }
}

impl Event {
    pub fn type_code(&self) -> u8 {
        match self {
            Event::SensorSampling { .. } => type_code::SENSOR_SAMPLING_EVENT,
        }
    }
}

impl From<Response> for RxPacket {
    fn from(response: Response) -> Self {
        RxPacket::Response(response)
    }
}

impl From<Event> for RxPacket {
    fn from(event: Event) -> Self {
        RxPacket::Event(event)
    }
}
