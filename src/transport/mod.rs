//! Transport Module
//!
//! The radio link the engine drives. The engine never talks to a radio stack
//! directly; it issues requests through [`Transport`] and is told about their
//! outcomes through [`TransportEvent`]s.
//!
//! ## Contract
//! - Request methods return `Err` only when the request could not be started
//!   at all. Everything else is reported later as an event.
//! - Events for one transport are delivered to the engine in the order they
//!   happened, never re-entrantly from inside a request method.
//! - After `connect` succeeds the link reports `LinkEstablished` (or
//!   `Disconnected`); `discover_services` reports `ServicesDiscovered`;
//!   `enable_notifications` reports `NotificationsEnabled`; each `write`
//!   reports exactly one `WriteCompleted`.

pub mod sim;

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use crossbeam::channel::{self, Receiver, Sender};

use crate::error::{Result, UartError};

/// Requests the engine can make of the radio link
pub trait Transport: Send {
    /// Begin reporting `AdapterStateChanged`
    fn start_monitoring(&mut self) -> Result<()>;

    fn stop_monitoring(&mut self);

    /// Begin reporting `PeerDiscovered` for nearby advertisers
    fn start_scan(&mut self) -> Result<()>;

    fn stop_scan(&mut self);

    /// Open a link to `peer`
    fn connect(&mut self, peer: &PeerAddress) -> Result<()>;

    /// Locate the UART service and its characteristics on the open link
    fn discover_services(&mut self) -> Result<()>;

    /// Subscribe to the peer's data-out characteristic
    fn enable_notifications(&mut self) -> Result<()>;

    /// Write one chunk to the peer's data-in characteristic
    fn write(&mut self, chunk: &[u8]) -> Result<()>;

    /// Tear down the link and release every handle; safe to call when idle
    fn disconnect(&mut self);
}

/// Everything a transport reports back
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    AdapterStateChanged(AdapterState),
    PeerDiscovered(Advertisement),
    LinkEstablished,
    ServicesDiscovered(std::result::Result<(), GattStatus>),
    NotificationsEnabled(std::result::Result<(), GattStatus>),
    WriteCompleted(std::result::Result<(), GattStatus>),
    Notification(Bytes),
    Disconnected,
}

/// Local radio adapter condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    Unknown,
    PoweredOff,
    /// Powered but unusable, e.g. the platform requires location services
    PoweredOnRestricted,
    PoweredOn,
}

impl AdapterState {
    pub fn is_ready(self) -> bool {
        self == AdapterState::PoweredOn
    }
}

/// Non-success status reported by the peer or the radio stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GattStatus {
    /// Raw ATT/GATT error code
    Failure(u8),

    /// The peer does not expose the UART service
    UnsupportedPeer,
}

impl fmt::Display for GattStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GattStatus::Failure(code) => write!(f, "GATT status 0x{:02x}", code),
            GattStatus::UnsupportedPeer => f.write_str("UART service not found"),
        }
    }
}

/// A 48-bit device address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerAddress([u8; 6]);

impl PeerAddress {
    pub const BROADCAST: PeerAddress = PeerAddress([0xFF; 6]);

    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            a, b, c, d, e, g
        )
    }
}

impl FromStr for PeerAddress {
    type Err = UartError;

    /// Accepts `AABBCCDDEEFF` or `AA:BB:CC:DD:EE:FF`, any case
    fn from_str(s: &str) -> Result<Self> {
        let hex: String = s.chars().filter(|c| *c != ':').collect();
        let bad = || UartError::Config(format!("invalid peer address {:?}", s));

        if hex.len() != 12 || !hex.is_ascii() {
            return Err(bad());
        }

        let mut bytes = [0u8; 6];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).map_err(|_| bad())?;
        }
        Ok(Self(bytes))
    }
}

/// A discovered advertiser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    pub address: PeerAddress,
    pub name: Option<String>,
    pub rssi: Option<i8>,
}

impl Advertisement {
    pub fn new(address: PeerAddress) -> Self {
        Self {
            address,
            name: None,
            rssi: None,
        }
    }
}

/// Sending half of a transport's event queue
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Sender<TransportEvent>,
}

impl EventSink {
    /// Report an event; dropped silently once the engine side is gone
    pub fn emit(&self, event: TransportEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Event receiver gone, dropping transport event");
        }
    }
}

/// Create an unbounded transport event queue
pub fn event_channel() -> (EventSink, Receiver<TransportEvent>) {
    let (tx, rx) = channel::unbounded();
    (EventSink { tx }, rx)
}
