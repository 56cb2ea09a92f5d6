//! In-memory transport and peer
//!
//! `SimulatedTransport` honors the transport contract without a radio: it
//! reports readiness, advertises the target among a few decoys, walks link
//! setup, and hands every written chunk to a `SimulatedPeer` that answers the
//! way the UART controller firmware does. Replies come back as notifications
//! cut to the configured chunk size.
//!
//! A [`SimControl`] handle shares the transport's state so a caller that no
//! longer owns the transport (it usually lives inside the engine) can inject
//! faults, drop the link, or inspect what was written.

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::error::{Result, UartError};
use crate::link::{FailureKind, SetupStep};
use crate::protocol::{
    decode_command, encode_packet, AsciiString, Command, Event, FrameBuffer, PacketFragmenter,
    RegisterNumber, Response, RxPacket, SamplingState,
};

use super::{
    AdapterState, Advertisement, EventSink, GattStatus, PeerAddress, Transport, TransportEvent,
};

/// Firmware version string reported by the simulated controller
pub const SIM_FIRMWARE_VERSION: &str = "1.2.3.987654";

/// First value of a simulated sampling burst
const SAMPLE_BASE: f32 = 123.912;

/// Number of registers the controller exposes
const REGISTER_COUNT: usize = 8;

/// A failure to inject at one setup step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault {
    pub step: SetupStep,
    pub kind: FailureKind,
}

impl Fault {
    pub fn new(step: SetupStep, kind: FailureKind) -> Self {
        Self { step, kind }
    }
}

/// What the simulated transport has been asked to do
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SimStats {
    pub monitoring: bool,
    pub scanning: bool,
    pub scan_requests: u32,
    pub connect_requests: u32,
    pub discovery_requests: u32,
    pub subscribe_requests: u32,
    pub disconnects: u32,
    /// Every chunk accepted by `write`, in order
    pub writes: Vec<Bytes>,
}

// =============================================================================
// Simulated Peer
// =============================================================================

/// Firmware-like responder behind the simulated link
#[derive(Debug)]
pub struct SimulatedPeer {
    address: PeerAddress,
    name: AsciiString,
    version: AsciiString,
    registers: [u8; REGISTER_COUNT],
    samples_per_burst: usize,
    inbound: FrameBuffer,
}

impl SimulatedPeer {
    /// A controller advertising as `name`; fails if `name` is not ASCII
    pub fn new(address: PeerAddress, name: &str) -> Result<Self> {
        Ok(Self {
            address,
            name: AsciiString::new(name)?,
            version: AsciiString::new(SIM_FIRMWARE_VERSION)?,
            registers: [0; REGISTER_COUNT],
            samples_per_burst: 3,
            inbound: FrameBuffer::new(),
        })
    }

    /// Samples reported after each sampling command, before the stop event
    pub fn with_samples(mut self, samples: usize) -> Self {
        self.samples_per_burst = samples;
        self
    }

    pub fn address(&self) -> PeerAddress {
        self.address
    }

    pub fn name(&self) -> &AsciiString {
        &self.name
    }

    pub fn register(&self, register: RegisterNumber) -> u8 {
        self.registers[register.value() as usize]
    }

    pub fn advertisement(&self) -> Advertisement {
        Advertisement {
            address: self.address,
            name: Some(self.name.as_str().to_string()),
            rssi: Some(-58),
        }
    }

    /// Accept one written chunk and return the packets it provokes
    ///
    /// Commands may span several chunks; nothing is answered until a frame
    /// is complete. Frames that do not decode as commands are ignored.
    pub fn receive(&mut self, chunk: &[u8]) -> Vec<RxPacket> {
        self.inbound.push(chunk);

        let mut replies = Vec::new();
        while let Some(frame) = self.inbound.next_frame() {
            let mut bytes = Vec::with_capacity(2 + frame.payload.len());
            bytes.push((1 + frame.payload.len()) as u8);
            bytes.push(frame.type_code);
            bytes.extend_from_slice(&frame.payload);

            match decode_command(&bytes) {
                Ok(command) => self.execute(command, &mut replies),
                Err(e) => tracing::debug!("sim peer: ignoring frame: {}", e),
            }
        }
        replies
    }

    /// Forget any partial command, as a real controller does on disconnect
    pub fn reset_link(&mut self) {
        self.inbound.clear();
    }

    fn execute(&mut self, command: Command, replies: &mut Vec<RxPacket>) {
        tracing::trace!("sim peer: {:?}", command);

        let response = match command {
            Command::ConnectionTest => Response::ConnectionTest,
            Command::RegisterRead { register } => Response::RegisterRead {
                register,
                value: self.register(register),
            },
            Command::RegisterWrite { register, value } => {
                self.registers[register.value() as usize] = value;
                Response::RegisterWrite
            }
            Command::VersionRead => Response::VersionRead {
                version: self.version.clone(),
            },
            Command::SensorSampling { .. } => {
                replies.push(Response::SensorSampling.into());
                for i in 0..self.samples_per_burst {
                    replies.push(
                        Event::SensorSampling {
                            state: SamplingState::Sampling,
                            value: Some(SAMPLE_BASE + i as f32),
                        }
                        .into(),
                    );
                }
                replies.push(
                    Event::SensorSampling {
                        state: SamplingState::Stopped,
                        value: None,
                    }
                    .into(),
                );
                return;
            }
            Command::DeviceNameRead => Response::DeviceNameRead {
                name: self.name.clone(),
            },
            Command::DeviceNameWrite { name } => {
                self.name = name;
                Response::DeviceNameWrite
            }
        };

        replies.push(response.into());
    }
}

// =============================================================================
// Simulated Transport
// =============================================================================

#[derive(Debug)]
struct SimState {
    adapter: AdapterState,
    decoys: Vec<Advertisement>,
    faults: VecDeque<Fault>,
    write_failure: Option<GattStatus>,
    linked: bool,
    subscribed: bool,
    peer: SimulatedPeer,
    stats: SimStats,
}

impl SimState {
    /// Pop the next fault if it targets `step`
    fn take_fault(&mut self, step: SetupStep) -> Option<FailureKind> {
        match self.faults.front() {
            Some(fault) if fault.step == step => self.faults.pop_front().map(|fault| fault.kind),
            _ => None,
        }
    }

    fn drop_link(&mut self) {
        self.linked = false;
        self.subscribed = false;
        self.peer.reset_link();
    }
}

pub struct SimulatedTransport {
    sink: EventSink,
    chunk_size: usize,
    state: Arc<Mutex<SimState>>,
}

impl SimulatedTransport {
    /// A powered-on adapter with `peer` in range
    pub fn new(sink: EventSink, peer: SimulatedPeer, chunk_size: usize) -> Self {
        let decoys = vec![
            Advertisement {
                address: PeerAddress::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]),
                name: Some("Thermostat".to_string()),
                rssi: Some(-71),
            },
            Advertisement::new(PeerAddress::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x02])),
        ];

        let state = SimState {
            adapter: AdapterState::PoweredOn,
            decoys,
            faults: VecDeque::new(),
            write_failure: None,
            linked: false,
            subscribed: false,
            peer,
            stats: SimStats::default(),
        };

        Self {
            sink,
            chunk_size: chunk_size.max(1),
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Queue setup faults; each is consumed by the first attempt at its step
    pub fn with_faults(self, faults: impl IntoIterator<Item = Fault>) -> Self {
        self.state.lock().faults.extend(faults);
        self
    }

    pub fn with_adapter_state(self, adapter: AdapterState) -> Self {
        self.state.lock().adapter = adapter;
        self
    }

    /// Handle for steering the transport after it has been moved away
    pub fn control(&self) -> SimControl {
        SimControl {
            sink: self.sink.clone(),
            state: Arc::clone(&self.state),
        }
    }

    fn emit(&self, event: TransportEvent) {
        self.sink.emit(event);
    }
}

impl Transport for SimulatedTransport {
    fn start_monitoring(&mut self) -> Result<()> {
        let adapter = {
            let mut state = self.state.lock();
            state.stats.monitoring = true;
            state.adapter
        };
        self.emit(TransportEvent::AdapterStateChanged(adapter));
        Ok(())
    }

    fn stop_monitoring(&mut self) {
        self.state.lock().stats.monitoring = false;
    }

    fn start_scan(&mut self) -> Result<()> {
        let advertisements = {
            let mut state = self.state.lock();
            state.stats.scan_requests += 1;
            if !state.adapter.is_ready() {
                return Err(UartError::Request(format!("adapter {:?}", state.adapter)));
            }
            state.stats.scanning = true;

            let mut advertisements = state.decoys.clone();
            advertisements.push(state.peer.advertisement());
            advertisements
        };

        for advertisement in advertisements {
            self.emit(TransportEvent::PeerDiscovered(advertisement));
        }
        Ok(())
    }

    fn stop_scan(&mut self) {
        self.state.lock().stats.scanning = false;
    }

    fn connect(&mut self, peer: &PeerAddress) -> Result<()> {
        let event = {
            let mut state = self.state.lock();
            state.stats.connect_requests += 1;

            if *peer != state.peer.address() {
                return Err(UartError::Request(format!("{} is not in range", peer)));
            }

            match state.take_fault(SetupStep::Connect) {
                Some(FailureKind::Request) => {
                    return Err(UartError::Request("connect refused".to_string()))
                }
                Some(FailureKind::Response) => Some(TransportEvent::Disconnected),
                Some(FailureKind::Timeout) => None,
                None => {
                    state.linked = true;
                    Some(TransportEvent::LinkEstablished)
                }
            }
        };

        if let Some(event) = event {
            self.emit(event);
        }
        Ok(())
    }

    fn discover_services(&mut self) -> Result<()> {
        let event = {
            let mut state = self.state.lock();
            state.stats.discovery_requests += 1;

            if !state.linked {
                return Err(UartError::Request("no link".to_string()));
            }

            match state.take_fault(SetupStep::DiscoverServices) {
                Some(FailureKind::Request) => {
                    return Err(UartError::Request("discovery refused".to_string()))
                }
                Some(FailureKind::Response) => Some(Err(GattStatus::UnsupportedPeer)),
                Some(FailureKind::Timeout) => None,
                None => Some(Ok(())),
            }
        };

        if let Some(result) = event {
            self.emit(TransportEvent::ServicesDiscovered(result));
        }
        Ok(())
    }

    fn enable_notifications(&mut self) -> Result<()> {
        let event = {
            let mut state = self.state.lock();
            state.stats.subscribe_requests += 1;

            if !state.linked {
                return Err(UartError::Request("no link".to_string()));
            }

            match state.take_fault(SetupStep::EnableNotifications) {
                Some(FailureKind::Request) => {
                    return Err(UartError::Request("subscribe refused".to_string()))
                }
                Some(FailureKind::Response) => Some(Err(GattStatus::Failure(0x0D))),
                Some(FailureKind::Timeout) => None,
                None => {
                    state.subscribed = true;
                    Some(Ok(()))
                }
            }
        };

        if let Some(result) = event {
            self.emit(TransportEvent::NotificationsEnabled(result));
        }
        Ok(())
    }

    fn write(&mut self, chunk: &[u8]) -> Result<()> {
        let (result, replies) = {
            let mut state = self.state.lock();

            if !state.linked || !state.subscribed {
                return Err(UartError::Request("no link".to_string()));
            }

            state.stats.writes.push(Bytes::copy_from_slice(chunk));

            match state.write_failure.take() {
                Some(status) => (Err(status), Vec::new()),
                None => (Ok(()), state.peer.receive(chunk)),
            }
        };

        self.emit(TransportEvent::WriteCompleted(result));

        if !replies.is_empty() {
            let stream: Vec<u8> = replies.iter().flat_map(encode_packet).collect();
            for notification in PacketFragmenter::new(stream, self.chunk_size) {
                self.emit(TransportEvent::Notification(notification));
            }
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        let mut state = self.state.lock();
        if state.linked {
            state.stats.disconnects += 1;
        }
        state.drop_link();
    }
}

// =============================================================================
// Control Handle
// =============================================================================

/// Shared handle onto a `SimulatedTransport`
#[derive(Clone)]
pub struct SimControl {
    sink: EventSink,
    state: Arc<Mutex<SimState>>,
}

impl SimControl {
    /// Queue a setup fault
    pub fn push_fault(&self, fault: Fault) {
        self.state.lock().faults.push_back(fault);
    }

    /// Make the next write complete with `status`
    pub fn fail_next_write(&self, status: GattStatus) {
        self.state.lock().write_failure = Some(status);
    }

    /// Change the adapter state and report it
    pub fn set_adapter_state(&self, adapter: AdapterState) {
        {
            let mut state = self.state.lock();
            state.adapter = adapter;
            if !adapter.is_ready() {
                state.stats.scanning = false;
                state.drop_link();
            }
        }
        self.sink.emit(TransportEvent::AdapterStateChanged(adapter));
    }

    /// The peer walks out of range
    pub fn drop_link(&self) {
        let was_linked = {
            let mut state = self.state.lock();
            let was_linked = state.linked;
            state.drop_link();
            was_linked
        };
        if was_linked {
            self.sink.emit(TransportEvent::Disconnected);
        }
    }

    pub fn is_linked(&self) -> bool {
        self.state.lock().linked
    }

    pub fn peer_name(&self) -> String {
        self.state.lock().peer.name().as_str().to_string()
    }

    pub fn peer_register(&self, register: RegisterNumber) -> u8 {
        self.state.lock().peer.register(register)
    }

    pub fn stats(&self) -> SimStats {
        self.state.lock().stats.clone()
    }
}
