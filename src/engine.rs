//! Engine Module
//!
//! The wireless UART engine that coordinates all components.
//!
//! ## Responsibilities
//! - Feed transport events to the connection state machine
//! - Encode, fragment and sequence outbound commands
//! - Reassemble inbound notifications and dispatch typed packets
//! - Fire expired deadlines on `tick`
//! - Notify subscribers of step changes, packets and write outcomes

use std::time::Instant;

use crate::config::Config;
use crate::error::{Result, UartError};
use crate::link::{
    ConnectionStateMachine, FailureKind, JobId, LinkNotice, OperationStep, SetupStep, TimerKind,
    TimerSet, WriteOutcome, WriteReport, WriteSequencer,
};
use crate::protocol::{encode_command, Command, FrameReassembler, RxPacket};
use crate::transport::{AdapterState, Transport, TransportEvent};

type StepListener = Box<dyn FnMut(OperationStep) + Send>;
type PacketListener = Box<dyn FnMut(&RxPacket) + Send>;
type WriteListener = Box<dyn FnMut(&WriteReport) + Send>;
type AdapterListener = Box<dyn FnMut(AdapterState) + Send>;

/// Running counters for one engine
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LinkStats {
    /// Times the link reached `Connected`
    pub sessions: u64,

    /// Setup attempts that ended in a failure, by kind
    pub setup_failures: SetupFailureCounts,

    /// Connected sessions that ended
    pub disconnects: u64,

    pub chunks_written: u64,
    pub writes_completed: u64,
    pub writes_failed: u64,
    pub writes_superseded: u64,

    pub packets_received: u64,
    pub frames_unknown: u64,
    pub frames_malformed: u64,

    /// Packets and reports a driver handle had no room for; zero for a bare engine
    pub packets_dropped: u64,
    pub reports_dropped: u64,

    /// Most recent setup failure
    pub last_setup_failure: Option<(SetupStep, FailureKind)>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SetupFailureCounts {
    pub request: u64,
    pub response: u64,
    pub timeout: u64,
}

impl SetupFailureCounts {
    pub fn total(&self) -> u64 {
        self.request + self.response + self.timeout
    }
}

/// Single-threaded engine owning one transport
///
/// Every entry point takes `&mut self`; run it on one thread (see
/// [`crate::driver`]) and deliver the transport's events in order.
///
/// ## Lifecycle
/// 1. `new` validates the configuration
/// 2. `start` begins adapter monitoring
/// 3. events and ticks drive the link to `Connected`
/// 4. `submit` writes commands, packets flow to subscribers
/// 5. `stop` tears everything down; later events and ticks are ignored
pub struct Engine<T: Transport> {
    /// Engine configuration
    config: Config,

    transport: T,

    /// Deadlines for both the link and the writer
    timers: TimerSet,

    link: ConnectionStateMachine,

    writer: WriteSequencer,

    reassembler: FrameReassembler,

    /// Cleared by `stop`; nothing is processed afterwards
    running: bool,

    adapter: AdapterState,

    stats: LinkStats,

    step_listeners: Vec<StepListener>,
    packet_listeners: Vec<PacketListener>,
    write_listeners: Vec<WriteListener>,
    adapter_listeners: Vec<AdapterListener>,
}

impl<T: Transport> Engine<T> {
    /// Create an engine around `transport`
    pub fn new(config: Config, transport: T) -> Result<Self> {
        config.validate()?;

        let link = ConnectionStateMachine::new(&config);
        let writer = WriteSequencer::new(&config);

        Ok(Self {
            config,
            transport,
            timers: TimerSet::new(),
            link,
            writer,
            reassembler: FrameReassembler::new(),
            running: false,
            adapter: AdapterState::Unknown,
            stats: LinkStats::default(),
            step_listeners: Vec::new(),
            packet_listeners: Vec::new(),
            write_listeners: Vec::new(),
            adapter_listeners: Vec::new(),
        })
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Called with each new operation step
    pub fn on_step_change<F>(&mut self, listener: F)
    where
        F: FnMut(OperationStep) + Send + 'static,
    {
        self.step_listeners.push(Box::new(listener));
    }

    /// Called with every decoded inbound packet, in arrival order
    pub fn on_packet<F>(&mut self, listener: F)
    where
        F: FnMut(&RxPacket) + Send + 'static,
    {
        self.packet_listeners.push(Box::new(listener));
    }

    /// Called once per submitted job when it finishes
    pub fn on_write_report<F>(&mut self, listener: F)
    where
        F: FnMut(&WriteReport) + Send + 'static,
    {
        self.write_listeners.push(Box::new(listener));
    }

    /// Called whenever the adapter reports a new state
    pub fn on_adapter_state<F>(&mut self, listener: F)
    where
        F: FnMut(AdapterState) + Send + 'static,
    {
        self.adapter_listeners.push(Box::new(listener));
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Start monitoring the adapter; connecting follows once it is ready
    pub fn start(&mut self) -> Result<()> {
        if self.running {
            return Ok(());
        }

        tracing::info!("Starting engine for {}", self.config.target);
        self.link.start(&mut self.transport)?;
        self.running = true;

        Ok(())
    }

    /// Cancel scanning, link setup and any pending write; idempotent
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }

        tracing::info!("Stopping engine");
        self.running = false;

        self.writer.abandon(UartError::EngineStopped, &mut self.timers);
        self.link.stop(&mut self.transport, &mut self.timers);
        self.timers.clear();
        self.reassembler.clear();

        self.flush_notices();
    }

    /// Encode `command` and start writing it
    ///
    /// Fails immediately when the link is not connected or, under
    /// `RejectWhileBusy`, while another command is pending. Later failures
    /// arrive as a [`WriteReport`].
    pub fn submit(&mut self, command: &Command) -> Result<JobId> {
        if !self.running {
            return Err(UartError::EngineStopped);
        }
        if self.link.step() != OperationStep::Connected {
            return Err(UartError::NotConnected);
        }

        let frame = encode_command(command);
        tracing::debug!("submit: {:?} ({} bytes)", command.command_type(), frame.len());

        let result = self
            .writer
            .submit(frame, &mut self.transport, &mut self.timers);
        self.flush_notices();

        result
    }

    /// Process one transport event
    pub fn handle_event(&mut self, event: TransportEvent) {
        if !self.running {
            tracing::trace!("Ignoring {:?} after stop", event);
            return;
        }

        let transport = &mut self.transport;
        let timers = &mut self.timers;

        match event {
            TransportEvent::AdapterStateChanged(state) => {
                self.adapter = state;
                for listener in self.adapter_listeners.iter_mut() {
                    listener(state);
                }
                self.link.on_adapter_state(state, transport, timers);
            }
            TransportEvent::PeerDiscovered(advertisement) => {
                self.link.on_peer_discovered(&advertisement, transport, timers);
            }
            TransportEvent::LinkEstablished => {
                self.link.on_link_established(transport, timers);
            }
            TransportEvent::ServicesDiscovered(result) => {
                self.link.on_services_discovered(result, transport, timers);
            }
            TransportEvent::NotificationsEnabled(result) => {
                self.link.on_notifications_enabled(result, transport, timers);
            }
            TransportEvent::WriteCompleted(result) => {
                self.writer.on_write_completed(result, transport, timers);
            }
            TransportEvent::Notification(bytes) => {
                self.receive(&bytes);
            }
            TransportEvent::Disconnected => {
                self.link.on_disconnected(transport, timers);
            }
        }

        self.flush_notices();
    }

    /// Fire every deadline at or before `now`
    pub fn tick(&mut self, now: Instant) {
        if !self.running {
            return;
        }

        for (id, kind) in self.timers.expired(now) {
            match kind {
                TimerKind::Write => self.writer.on_timer(id, &mut self.transport, &mut self.timers),
                _ => self
                    .link
                    .on_timer(id, kind, &mut self.transport, &mut self.timers),
            }
            self.flush_notices();
        }
    }

    /// When `tick` next has work to do
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.running {
            self.timers.next_deadline()
        } else {
            None
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn receive(&mut self, bytes: &[u8]) {
        if self.link.step() != OperationStep::Connected {
            tracing::debug!("Dropping {} notification bytes while {}", bytes.len(), self.link.step());
            return;
        }

        let listeners = &mut self.packet_listeners;
        let summary = self.reassembler.feed(bytes, |packet| {
            for listener in listeners.iter_mut() {
                listener(&packet);
            }
        });

        self.stats.packets_received += summary.dispatched as u64;
        self.stats.frames_unknown += summary.unknown as u64;
        self.stats.frames_malformed += summary.malformed as u64;
    }

    /// Apply link notices and publish write reports
    fn flush_notices(&mut self) {
        for notice in self.link.take_notices() {
            match notice {
                LinkNotice::StepChanged(step) => {
                    for listener in self.step_listeners.iter_mut() {
                        listener(step);
                    }
                }
                LinkNotice::SessionStarted => {
                    self.stats.sessions += 1;
                    self.reassembler.clear();
                }
                LinkNotice::SessionEnded(reason) => {
                    self.stats.disconnects += 1;
                    self.writer.abandon(reason, &mut self.timers);
                    self.reassembler.clear();
                }
                LinkNotice::SetupFailed { step, kind } => {
                    let counts = &mut self.stats.setup_failures;
                    match kind {
                        FailureKind::Request => counts.request += 1,
                        FailureKind::Response => counts.response += 1,
                        FailureKind::Timeout => counts.timeout += 1,
                    }
                    self.stats.last_setup_failure = Some((step, kind));
                }
            }
        }

        self.stats.chunks_written = self.writer.chunks_written();
        for report in self.writer.take_reports() {
            match &report.outcome {
                WriteOutcome::Completed => self.stats.writes_completed += 1,
                WriteOutcome::Failed(_) => self.stats.writes_failed += 1,
                WriteOutcome::Superseded => self.stats.writes_superseded += 1,
            }
            for listener in self.write_listeners.iter_mut() {
                listener(&report);
            }
        }
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the current operation step
    pub fn operation_step(&self) -> OperationStep {
        self.link.step()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Last adapter state reported by the transport
    pub fn adapter_state(&self) -> AdapterState {
        self.adapter
    }

    /// True while a submitted command has not finished
    pub fn is_writing(&self) -> bool {
        self.writer.is_busy()
    }

    /// Bytes held back waiting for the rest of a frame
    pub fn buffered_len(&self) -> usize {
        self.reassembler.buffered_len()
    }

    /// Number of pending deadlines
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
