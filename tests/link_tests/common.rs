//! Shared fixtures for link tests

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use wireless_uart::error::Result;
use wireless_uart::link::{OperationStep, WriteReport};
use wireless_uart::protocol::RxPacket;
use wireless_uart::transport::{
    AdapterState, Advertisement, PeerAddress, Transport, TransportEvent,
};
use wireless_uart::{Config, Engine, SubmitPolicy, UartError};

pub const TARGET: PeerAddress = PeerAddress::new([0xC0, 0xFF, 0xEE, 0x00, 0x00, 0x01]);
pub const DECOY: PeerAddress = PeerAddress::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x09]);

/// Every request the engine made, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    StartMonitoring,
    StopMonitoring,
    StartScan,
    StopScan,
    Connect(PeerAddress),
    DiscoverServices,
    EnableNotifications,
    Write(Vec<u8>),
    Disconnect,
}

/// Transport that records requests and never emits events by itself
#[derive(Debug, Default)]
pub struct RecordingTransport {
    pub calls: Vec<Call>,
    pub refuse_scan: bool,
    pub refuse_connect: bool,
    pub refuse_write: bool,
}

impl RecordingTransport {
    pub fn count(&self, call: &Call) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Write(bytes) => Some(bytes.clone()),
                _ => None,
            })
            .collect()
    }
}

impl Transport for RecordingTransport {
    fn start_monitoring(&mut self) -> Result<()> {
        self.calls.push(Call::StartMonitoring);
        Ok(())
    }

    fn stop_monitoring(&mut self) {
        self.calls.push(Call::StopMonitoring);
    }

    fn start_scan(&mut self) -> Result<()> {
        self.calls.push(Call::StartScan);
        if self.refuse_scan {
            return Err(UartError::Request("scan refused".to_string()));
        }
        Ok(())
    }

    fn stop_scan(&mut self) {
        self.calls.push(Call::StopScan);
    }

    fn connect(&mut self, peer: &PeerAddress) -> Result<()> {
        self.calls.push(Call::Connect(*peer));
        if self.refuse_connect {
            return Err(UartError::Request("connect refused".to_string()));
        }
        Ok(())
    }

    fn discover_services(&mut self) -> Result<()> {
        self.calls.push(Call::DiscoverServices);
        Ok(())
    }

    fn enable_notifications(&mut self) -> Result<()> {
        self.calls.push(Call::EnableNotifications);
        Ok(())
    }

    fn write(&mut self, chunk: &[u8]) -> Result<()> {
        self.calls.push(Call::Write(chunk.to_vec()));
        if self.refuse_write {
            return Err(UartError::Request("write refused".to_string()));
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        self.calls.push(Call::Disconnect);
    }
}

/// What subscribers saw
#[derive(Default)]
pub struct Observed {
    pub steps: Mutex<Vec<OperationStep>>,
    pub packets: Mutex<Vec<RxPacket>>,
    pub reports: Mutex<Vec<WriteReport>>,
}

pub type TestEngine = Engine<RecordingTransport>;

pub fn config() -> Config {
    Config::builder().target(TARGET).build()
}

pub fn engine_with(config: Config) -> (TestEngine, Arc<Observed>) {
    let mut engine = Engine::new(config, RecordingTransport::default()).unwrap();
    let observed = Arc::new(Observed::default());

    let o = Arc::clone(&observed);
    engine.on_step_change(move |step| o.steps.lock().push(step));
    let o = Arc::clone(&observed);
    engine.on_packet(move |packet| o.packets.lock().push(packet.clone()));
    let o = Arc::clone(&observed);
    engine.on_write_report(move |report| o.reports.lock().push(report.clone()));

    (engine, observed)
}

/// Started engine with a ready adapter, i.e. scanning
pub fn scanning_engine() -> (TestEngine, Arc<Observed>) {
    scanning_engine_with(config())
}

pub fn scanning_engine_with(config: Config) -> (TestEngine, Arc<Observed>) {
    let (mut engine, observed) = engine_with(config);
    engine.start().unwrap();
    engine.handle_event(TransportEvent::AdapterStateChanged(AdapterState::PoweredOn));
    (engine, observed)
}

/// Feed the events of one successful link setup
pub fn complete_setup(engine: &mut TestEngine) {
    engine.handle_event(TransportEvent::PeerDiscovered(Advertisement::new(TARGET)));
    engine.handle_event(TransportEvent::LinkEstablished);
    engine.handle_event(TransportEvent::ServicesDiscovered(Ok(())));
    engine.handle_event(TransportEvent::NotificationsEnabled(Ok(())));
}

pub fn connected_engine() -> (TestEngine, Arc<Observed>) {
    connected_engine_with(config())
}

pub fn connected_engine_with(config: Config) -> (TestEngine, Arc<Observed>) {
    let (mut engine, observed) = scanning_engine_with(config);
    complete_setup(&mut engine);
    assert_eq!(engine.operation_step(), OperationStep::Connected);
    (engine, observed)
}

pub fn reject_policy() -> Config {
    Config::builder()
        .target(TARGET)
        .submit_policy(SubmitPolicy::RejectWhileBusy)
        .build()
}

/// Comfortably past every default deadline except the scan restart
pub fn past_deadlines() -> std::time::Instant {
    std::time::Instant::now() + Duration::from_secs(10)
}
