//! Threaded driver
//!
//! Runs an [`Engine`] on a dedicated thread. Transport events and caller
//! requests are multiplexed over `crossbeam` channels; the loop sleeps until
//! the next event, request, or engine deadline, whichever comes first.
//!
//! ```text
//!  transport ──events──┐
//!                      ▼
//!  EngineHandle ──requests──▶ [ engine thread ] ──packets──▶ EngineHandle
//!        ▲                           │          ──reports──▶
//!        └───── step (Mutex+Condvar) ┘
//! ```
//!
//! Packet and report queues hold at most `Config::delivery_backlog` entries.
//! The engine thread never blocks on a slow reader: overflow is dropped and
//! counted in [`LinkStats`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use parking_lot::{Condvar, Mutex};

use crate::config::Config;
use crate::engine::{Engine, LinkStats};
use crate::error::{Result, UartError};
use crate::link::{JobId, OperationStep, WriteReport};
use crate::protocol::{Command, RxPacket};
use crate::transport::{event_channel, AdapterState, EventSink, Transport, TransportEvent};

/// Longest the loop sleeps with no deadline pending
const IDLE_WAIT: Duration = Duration::from_millis(500);

enum Request {
    Submit(Command, Sender<Result<JobId>>),
    Stats(Sender<LinkStats>),
    Stop,
}

/// State mirrored out of the engine thread
struct Shared {
    step: Mutex<OperationStep>,
    step_changed: Condvar,
    adapter: Mutex<AdapterState>,
    packets_dropped: AtomicU64,
    reports_dropped: AtomicU64,
}

impl Shared {
    /// Stamp the delivery counters onto an engine snapshot
    fn stats(&self, engine_stats: &LinkStats) -> LinkStats {
        LinkStats {
            packets_dropped: self.packets_dropped.load(Ordering::Relaxed),
            reports_dropped: self.reports_dropped.load(Ordering::Relaxed),
            ..engine_stats.clone()
        }
    }
}

/// Queue `item` without blocking; count it in `dropped` if the queue is full
fn deliver<M>(tx: &Sender<M>, item: M, dropped: &AtomicU64, what: &str) {
    match tx.try_send(item) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            let total = dropped.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::warn!("{} queue full, dropped {} so far", what, total);
        }
        Err(TrySendError::Disconnected(_)) => {}
    }
}

/// Caller-side handle to an engine running on its own thread
///
/// Dropping the handle stops the engine and joins the thread.
pub struct EngineHandle {
    requests: Sender<Request>,
    shared: Arc<Shared>,
    packets: Receiver<RxPacket>,
    reports: Receiver<WriteReport>,
    thread: Option<JoinHandle<()>>,
}

/// Build a transport around a fresh event queue and run an engine on it
///
/// `make_transport` receives the sink the transport must report through.
pub fn spawn<T, F>(config: Config, make_transport: F) -> Result<EngineHandle>
where
    T: Transport + 'static,
    F: FnOnce(EventSink) -> T,
{
    let (sink, events) = event_channel();
    let backlog = config.delivery_backlog;
    let mut engine = Engine::new(config, make_transport(sink))?;

    let shared = Arc::new(Shared {
        step: Mutex::new(OperationStep::Initializing),
        step_changed: Condvar::new(),
        adapter: Mutex::new(AdapterState::Unknown),
        packets_dropped: AtomicU64::new(0),
        reports_dropped: AtomicU64::new(0),
    });

    let (packet_tx, packets) = channel::bounded(backlog);
    let (report_tx, reports) = channel::bounded(backlog);
    let (requests, request_rx) = channel::unbounded();

    {
        let shared = Arc::clone(&shared);
        engine.on_step_change(move |step| {
            *shared.step.lock() = step;
            shared.step_changed.notify_all();
        });
    }
    {
        let shared = Arc::clone(&shared);
        engine.on_adapter_state(move |state| {
            *shared.adapter.lock() = state;
        });
    }
    {
        let shared = Arc::clone(&shared);
        engine.on_packet(move |packet| {
            deliver(&packet_tx, packet.clone(), &shared.packets_dropped, "Packet");
        });
    }
    {
        let shared = Arc::clone(&shared);
        engine.on_write_report(move |report| {
            deliver(&report_tx, report.clone(), &shared.reports_dropped, "Write report");
        });
    }

    engine.start()?;

    let thread_shared = Arc::clone(&shared);
    let thread = thread::Builder::new()
        .name("wireless-uart".to_string())
        .spawn(move || run(engine, events, request_rx, thread_shared))
        .map_err(|e| UartError::Spawn(e.to_string()))?;

    Ok(EngineHandle {
        requests,
        shared,
        packets,
        reports,
        thread: Some(thread),
    })
}

fn run<T: Transport>(
    mut engine: Engine<T>,
    events: Receiver<TransportEvent>,
    requests: Receiver<Request>,
    shared: Arc<Shared>,
) {
    tracing::debug!("Engine thread started");

    loop {
        let timeout = engine
            .next_deadline()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
            .unwrap_or(IDLE_WAIT);

        crossbeam::select! {
            recv(events) -> event => match event {
                Ok(event) => engine.handle_event(event),
                Err(_) => {
                    tracing::warn!("Transport event queue closed");
                    break;
                }
            },
            recv(requests) -> request => match request {
                Ok(Request::Submit(command, reply)) => {
                    let _ = reply.send(engine.submit(&command));
                }
                Ok(Request::Stats(reply)) => {
                    let _ = reply.send(shared.stats(engine.stats()));
                }
                Ok(Request::Stop) | Err(_) => break,
            },
            default(timeout) => {}
        }

        engine.tick(Instant::now());
    }

    engine.stop();
    tracing::debug!("Engine thread exiting");
}

impl EngineHandle {
    /// Write `command` to the peer
    ///
    /// Returns once the engine has accepted or rejected it; the write itself
    /// finishes later and is reported on [`write_reports`](Self::write_reports).
    pub fn submit(&self, command: Command) -> Result<JobId> {
        let (reply_tx, reply_rx) = channel::bounded(1);
        self.requests
            .send(Request::Submit(command, reply_tx))
            .map_err(|_| UartError::EngineStopped)?;
        reply_rx.recv().map_err(|_| UartError::EngineStopped)?
    }

    pub fn operation_step(&self) -> OperationStep {
        *self.shared.step.lock()
    }

    pub fn adapter_state(&self) -> AdapterState {
        *self.shared.adapter.lock()
    }

    /// Block until the engine reaches `step`; false on timeout
    pub fn wait_for_step(&self, step: OperationStep, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut current = self.shared.step.lock();

        while *current != step {
            if self
                .shared
                .step_changed
                .wait_until(&mut current, deadline)
                .timed_out()
            {
                return *current == step;
            }
        }
        true
    }

    /// Snapshot of the engine's counters
    pub fn stats(&self) -> Result<LinkStats> {
        let (reply_tx, reply_rx) = channel::bounded(1);
        self.requests
            .send(Request::Stats(reply_tx))
            .map_err(|_| UartError::EngineStopped)?;
        reply_rx.recv().map_err(|_| UartError::EngineStopped)
    }

    /// Decoded packets, in arrival order
    ///
    /// Holds up to `delivery_backlog` packets; later ones are dropped until
    /// the caller drains it (see `LinkStats::packets_dropped`).
    pub fn packets(&self) -> &Receiver<RxPacket> {
        &self.packets
    }

    /// One report per submitted job, bounded like [`packets`](Self::packets)
    pub fn write_reports(&self) -> &Receiver<WriteReport> {
        &self.reports
    }

    /// Stop the engine and wait for its thread
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        let _ = self.requests.send(Request::Stop);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Engine thread panicked");
            }
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}
