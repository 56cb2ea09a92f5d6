//! Connection state machine
//!
//! Drives the transport from "adapter ready" to "notifications enabled" and
//! back to scanning whenever anything along the way fails.
//!
//! ```text
//!  Initializing ──ready──▶ Scanning ──target seen──▶ Connecting ──setup done──▶ Connected
//!       ▲                     ▲                          │                          │
//!       │                     └────── any failure ───────┴───── disconnect ─────────┘
//!       └──────────────────── adapter not ready (from any state) ────────────────────
//! ```
//!
//! Link setup is three asynchronous steps (connect, service discovery,
//! notification enable). Exactly one is active at a time and each has its own
//! deadline; the deadline is canceled the moment the step resolves. Any
//! failure, whether the request was refused, the peer answered with an
//! error, or the deadline passed, tears the link down and scans again.
//! Retries are unbounded.

use std::time::Duration;

use crate::config::Config;
use crate::error::{Result, UartError};
use crate::transport::{AdapterState, Advertisement, GattStatus, PeerAddress, Transport};

use super::state::{FailureKind, OperationStep, SetupStep};
use super::timer::{TimerId, TimerKind, TimerSet};

/// Things the engine must react to after driving the machine
#[derive(Debug, Clone, PartialEq)]
pub enum LinkNotice {
    /// The observable step changed
    StepChanged(OperationStep),

    /// Setup finished; a fresh protocol session begins
    SessionStarted,

    /// A connected session ended for the given reason
    SessionEnded(UartError),

    /// A setup step failed and scanning restarts
    SetupFailed { step: SetupStep, kind: FailureKind },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// `start` not called, or `stop` called
    Idle,

    AwaitingReadiness,

    Scanning {
        /// Scan accepted by the transport and not yet stopped
        active: bool,
        retry: Option<TimerId>,
        restart: Option<TimerId>,
    },

    Connecting { step: SetupStep, timer: TimerId },

    Connected,
}

/// Owns the lifecycle of the single link to the target peer
#[derive(Debug)]
pub struct ConnectionStateMachine {
    target: PeerAddress,
    connect_timeout: Duration,
    operation_timeout: Duration,
    scan_retry_delay: Duration,
    scan_restart_interval: Duration,
    phase: Phase,
    step: OperationStep,
    notices: Vec<LinkNotice>,
}

impl ConnectionStateMachine {
    pub fn new(config: &Config) -> Self {
        Self {
            target: config.target,
            connect_timeout: config.connect_timeout,
            operation_timeout: config.operation_timeout,
            scan_retry_delay: config.scan_retry_delay,
            scan_restart_interval: config.scan_restart_interval,
            phase: Phase::Idle,
            step: OperationStep::Initializing,
            notices: Vec::new(),
        }
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Begin watching adapter readiness
    ///
    /// Calling `start` on a running machine does nothing.
    pub fn start<T: Transport>(&mut self, transport: &mut T) -> Result<()> {
        if self.phase != Phase::Idle {
            tracing::debug!("start: already running");
            return Ok(());
        }

        tracing::debug!("start: monitoring adapter for target {}", self.target);
        transport
            .start_monitoring()
            .map_err(|e| UartError::TransportUnavailable(e.to_string()))?;
        self.phase = Phase::AwaitingReadiness;

        Ok(())
    }

    /// Cancel everything in progress and go inert; idempotent
    pub fn stop<T: Transport>(&mut self, transport: &mut T, timers: &mut TimerSet) {
        if self.phase == Phase::Idle {
            return;
        }

        tracing::info!("stop: tearing down link to {}", self.target);

        self.cancel_phase_timers(timers);
        if self.phase == Phase::Connected {
            self.notices.push(LinkNotice::SessionEnded(UartError::EngineStopped));
        }

        transport.stop_monitoring();
        transport.stop_scan();
        transport.disconnect();

        self.phase = Phase::Idle;
        self.set_step(OperationStep::Initializing);
    }

    // =========================================================================
    // Transport Events
    // =========================================================================

    pub fn on_adapter_state<T: Transport>(
        &mut self,
        state: AdapterState,
        transport: &mut T,
        timers: &mut TimerSet,
    ) {
        tracing::debug!("Adapter state: {:?} (phase {:?})", state, self.phase);

        if state.is_ready() {
            match self.phase {
                Phase::Idle => {}
                Phase::AwaitingReadiness => self.begin_scan(transport, timers),
                Phase::Scanning { .. } => tracing::debug!("Adapter ready: already scanning"),
                Phase::Connecting { .. } | Phase::Connected => {
                    // A repeated readiness signal must not tear down a live link
                    tracing::warn!("Adapter ready: scan suppressed while {}", self.step);
                }
            }
            return;
        }

        match self.phase {
            Phase::Idle | Phase::AwaitingReadiness => {}
            Phase::Scanning { .. } | Phase::Connecting { .. } | Phase::Connected => {
                tracing::warn!("Adapter not ready ({:?}), abandoning {}", state, self.step);

                self.cancel_phase_timers(timers);
                if self.phase == Phase::Connected {
                    self.notices.push(LinkNotice::SessionEnded(UartError::TransportUnavailable(
                        format!("adapter {:?}", state),
                    )));
                }

                transport.stop_scan();
                transport.disconnect();

                self.phase = Phase::AwaitingReadiness;
                self.set_step(OperationStep::Initializing);
            }
        }
    }

    pub fn on_peer_discovered<T: Transport>(
        &mut self,
        advertisement: &Advertisement,
        transport: &mut T,
        timers: &mut TimerSet,
    ) {
        if !matches!(self.phase, Phase::Scanning { .. }) {
            tracing::trace!("Ignoring advertisement from {} while {:?}", advertisement.address, self.phase);
            return;
        }

        if advertisement.address != self.target {
            tracing::trace!("Ignoring advertisement from {}", advertisement.address);
            return;
        }

        tracing::info!(
            "Found target {} (name={:?}, rssi={:?})",
            advertisement.address,
            advertisement.name,
            advertisement.rssi
        );

        self.cancel_phase_timers(timers);
        transport.stop_scan();

        let timer = timers.schedule(TimerKind::Setup(SetupStep::Connect), self.connect_timeout);
        self.phase = Phase::Connecting {
            step: SetupStep::Connect,
            timer,
        };
        self.set_step(OperationStep::Connecting);

        let target = self.target;
        if let Err(e) = transport.connect(&target) {
            tracing::error!("connect request failed: {}", e);
            self.fail(SetupStep::Connect, FailureKind::Request, transport, timers);
        }
    }

    pub fn on_link_established<T: Transport>(&mut self, transport: &mut T, timers: &mut TimerSet) {
        if !self.resolve_step(SetupStep::Connect, timers) {
            tracing::debug!("Ignoring link-established outside connect step");
            return;
        }

        tracing::debug!("Link established, discovering services");
        self.advance(SetupStep::DiscoverServices, transport, timers);
    }

    pub fn on_services_discovered<T: Transport>(
        &mut self,
        result: std::result::Result<(), GattStatus>,
        transport: &mut T,
        timers: &mut TimerSet,
    ) {
        if !self.resolve_step(SetupStep::DiscoverServices, timers) {
            tracing::debug!("Ignoring stale service discovery result");
            return;
        }

        match result {
            Ok(()) => {
                tracing::debug!("Services discovered, enabling notifications");
                self.advance(SetupStep::EnableNotifications, transport, timers);
            }
            Err(status) => {
                tracing::error!("Service discovery failed: {}", status);
                self.fail(SetupStep::DiscoverServices, FailureKind::Response, transport, timers);
            }
        }
    }

    pub fn on_notifications_enabled<T: Transport>(
        &mut self,
        result: std::result::Result<(), GattStatus>,
        transport: &mut T,
        timers: &mut TimerSet,
    ) {
        if !self.resolve_step(SetupStep::EnableNotifications, timers) {
            tracing::debug!("Ignoring stale notification enable result");
            return;
        }

        match result {
            Ok(()) => {
                tracing::info!("Link to {} ready", self.target);
                self.phase = Phase::Connected;
                self.notices.push(LinkNotice::SessionStarted);
                self.set_step(OperationStep::Connected);
            }
            Err(status) => {
                tracing::error!("Notification enable failed: {}", status);
                self.fail(SetupStep::EnableNotifications, FailureKind::Response, transport, timers);
            }
        }
    }

    pub fn on_disconnected<T: Transport>(&mut self, transport: &mut T, timers: &mut TimerSet) {
        match self.phase {
            Phase::Connecting { step, timer } => {
                timers.cancel(timer);
                tracing::error!("Link dropped during {}", step);
                self.fail(step, FailureKind::Response, transport, timers);
            }
            Phase::Connected => {
                tracing::warn!("Link to {} lost, rescanning", self.target);
                self.notices.push(LinkNotice::SessionEnded(UartError::Disconnected));
                self.rescan(transport, timers);
            }
            _ => tracing::trace!("Ignoring disconnect while {:?}", self.phase),
        }
    }

    /// A deadline owned by this machine passed
    ///
    /// Ids that no longer match the active operation are ignored.
    pub fn on_timer<T: Transport>(
        &mut self,
        id: TimerId,
        kind: TimerKind,
        transport: &mut T,
        timers: &mut TimerSet,
    ) {
        match (kind, self.phase) {
            (TimerKind::Setup(_), Phase::Connecting { step, timer }) if timer == id => {
                tracing::error!("{} timed out", step);
                self.fail(step, FailureKind::Timeout, transport, timers);
            }
            (TimerKind::ScanRetry, Phase::Scanning { retry: Some(timer), .. }) if timer == id => {
                tracing::debug!("Retrying scan request");
                self.request_scan(transport, timers);
            }
            (TimerKind::ScanRestart, Phase::Scanning { active: true, restart: Some(timer), .. })
                if timer == id =>
            {
                tracing::debug!("Restarting long-running scan");
                transport.stop_scan();
                self.request_scan(transport, timers);
            }
            _ => tracing::trace!("Stale timer {:?} ({:?}) ignored", id, kind),
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn begin_scan<T: Transport>(&mut self, transport: &mut T, timers: &mut TimerSet) {
        self.set_step(OperationStep::Scanning);
        self.request_scan(transport, timers);
    }

    /// Ask the transport to scan; on refusal retry after a delay
    fn request_scan<T: Transport>(&mut self, transport: &mut T, timers: &mut TimerSet) {
        match transport.start_scan() {
            Ok(()) => {
                tracing::debug!("Scanning for {}", self.target);
                let restart = timers.schedule(TimerKind::ScanRestart, self.scan_restart_interval);
                self.phase = Phase::Scanning {
                    active: true,
                    retry: None,
                    restart: Some(restart),
                };
            }
            Err(e) => {
                tracing::warn!("Scan request failed: {}; retrying in {:?}", e, self.scan_retry_delay);
                let retry = timers.schedule(TimerKind::ScanRetry, self.scan_retry_delay);
                self.phase = Phase::Scanning {
                    active: false,
                    retry: Some(retry),
                    restart: None,
                };
            }
        }
    }

    /// Force teardown of any handle, then scan from scratch
    fn rescan<T: Transport>(&mut self, transport: &mut T, timers: &mut TimerSet) {
        self.cancel_phase_timers(timers);
        transport.disconnect();
        self.begin_scan(transport, timers);
    }

    fn fail<T: Transport>(
        &mut self,
        step: SetupStep,
        kind: FailureKind,
        transport: &mut T,
        timers: &mut TimerSet,
    ) {
        tracing::warn!("{}; rescanning", UartError::Setup { step, kind });
        self.notices.push(LinkNotice::SetupFailed { step, kind });
        self.rescan(transport, timers);
    }

    /// If `step` is the active one, cancel its deadline and return true
    fn resolve_step(&mut self, expected: SetupStep, timers: &mut TimerSet) -> bool {
        match self.phase {
            Phase::Connecting { step, timer } if step == expected => {
                timers.cancel(timer);
                true
            }
            _ => false,
        }
    }

    fn advance<T: Transport>(&mut self, next: SetupStep, transport: &mut T, timers: &mut TimerSet) {
        let timer = timers.schedule(TimerKind::Setup(next), self.operation_timeout);
        self.phase = Phase::Connecting { step: next, timer };

        let requested = match next {
            SetupStep::Connect => {
                let target = self.target;
                transport.connect(&target)
            }
            SetupStep::DiscoverServices => transport.discover_services(),
            SetupStep::EnableNotifications => transport.enable_notifications(),
        };

        if let Err(e) = requested {
            tracing::error!("{} request failed: {}", next, e);
            self.fail(next, FailureKind::Request, transport, timers);
        }
    }

    fn cancel_phase_timers(&self, timers: &mut TimerSet) {
        match self.phase {
            Phase::Scanning { retry, restart, .. } => {
                for timer in [retry, restart].into_iter().flatten() {
                    timers.cancel(timer);
                }
            }
            Phase::Connecting { timer, .. } => {
                timers.cancel(timer);
            }
            Phase::Idle | Phase::AwaitingReadiness | Phase::Connected => {}
        }
    }

    fn set_step(&mut self, step: OperationStep) {
        if self.step != step {
            tracing::debug!("Operation step: {} -> {}", self.step, step);
            self.step = step;
            self.notices.push(LinkNotice::StepChanged(step));
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn step(&self) -> OperationStep {
        self.step
    }

    /// Drain notices produced since the last call
    pub fn take_notices(&mut self) -> Vec<LinkNotice> {
        std::mem::take(&mut self.notices)
    }
}
