//! Write sequencer
//!
//! Turns one encoded command into a series of chunk writes with at most one
//! write in flight. The next chunk goes out only after the transport confirms
//! the previous one; a failure drops whatever is left of the command.
//!
//! A job that is replaced while one of its chunks is still in flight leaves
//! that chunk orphaned. Its completion (or its deadline) is swallowed and only
//! then does the replacement start writing.
//!
//! A chunk whose deadline passes is still owed a completion by the transport.
//! Completions arrive in write order, so the next one that shows up belongs
//! to the timed-out chunk and is swallowed rather than credited to whatever
//! chunk went out afterwards.

use std::fmt;
use std::time::Duration;

use crate::config::{Config, SubmitPolicy};
use crate::error::{Result, UartError};
use crate::protocol::PacketFragmenter;
use crate::transport::{GattStatus, Transport};

use super::timer::{TimerId, TimerKind, TimerSet};

/// Identifies one submitted command
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(u64);

impl JobId {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job#{}", self.0)
    }
}

/// How a write job ended
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// Every chunk was acknowledged
    Completed,

    /// The job stopped early; later chunks were never written
    Failed(UartError),

    /// A newer command took its place
    Superseded,
}

/// Final report for one job
#[derive(Debug, Clone, PartialEq)]
pub struct WriteReport {
    pub job: JobId,
    pub outcome: WriteOutcome,
}

#[derive(Debug)]
struct WriteJob {
    id: JobId,
    chunks: PacketFragmenter,
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    job: JobId,
    timer: TimerId,
}

#[derive(Debug)]
pub struct WriteSequencer {
    chunk_size: usize,
    write_timeout: Duration,
    policy: SubmitPolicy,
    next_job: u64,
    job: Option<WriteJob>,
    in_flight: Option<InFlight>,
    /// Timed-out writes the transport has not acknowledged yet
    overdue: usize,
    reports: Vec<WriteReport>,
    chunks_written: u64,
}

impl WriteSequencer {
    pub fn new(config: &Config) -> Self {
        Self {
            chunk_size: config.chunk_size,
            write_timeout: config.write_timeout,
            policy: config.submit_policy,
            next_job: 0,
            job: None,
            in_flight: None,
            overdue: 0,
            reports: Vec::new(),
            chunks_written: 0,
        }
    }

    /// Queue `frame` for writing and start on the first chunk
    ///
    /// Request failures after this returns are reported through
    /// [`take_reports`](Self::take_reports), not here.
    pub fn submit<T: Transport>(
        &mut self,
        frame: Vec<u8>,
        transport: &mut T,
        timers: &mut TimerSet,
    ) -> Result<JobId> {
        if let Some(current) = &self.job {
            match self.policy {
                SubmitPolicy::RejectWhileBusy => {
                    tracing::debug!("submit: rejected, {} still pending", current.id);
                    return Err(UartError::WriteInProgress);
                }
                SubmitPolicy::Supersede => {
                    tracing::warn!(
                        "submit: {} superseded with {} chunk(s) unwritten",
                        current.id,
                        current.chunks.remaining_count()
                    );
                    let id = current.id;
                    self.job = None;
                    self.report(id, WriteOutcome::Superseded);
                }
            }
        }

        self.next_job += 1;
        let id = JobId(self.next_job);
        let chunks = PacketFragmenter::new(frame, self.chunk_size);
        tracing::debug!("submit: {} as {} chunk(s)", id, chunks.remaining_count());

        self.job = Some(WriteJob { id, chunks });
        self.pump(transport, timers);

        Ok(id)
    }

    /// The transport finished the write in flight
    pub fn on_write_completed<T: Transport>(
        &mut self,
        result: std::result::Result<(), GattStatus>,
        transport: &mut T,
        timers: &mut TimerSet,
    ) {
        if self.overdue > 0 {
            self.overdue -= 1;
            tracing::debug!("Late completion of a timed-out chunk swallowed ({:?})", result);
            return;
        }

        let Some(flight) = self.in_flight.take() else {
            tracing::warn!("Write completion with no write in flight");
            return;
        };
        timers.cancel(flight.timer);

        if !self.owns(flight.job) {
            tracing::debug!("Orphaned chunk of {} completed", flight.job);
            self.pump(transport, timers);
            return;
        }

        match result {
            Ok(()) => self.pump(transport, timers),
            Err(status) => {
                tracing::error!("Chunk of {} rejected: {}", flight.job, status);
                self.fail_current(UartError::WriteStatus(status));
            }
        }
    }

    /// A write deadline passed; ids other than the in-flight one are ignored
    pub fn on_timer<T: Transport>(&mut self, id: TimerId, transport: &mut T, timers: &mut TimerSet) {
        let flight = match self.in_flight {
            Some(flight) if flight.timer == id => flight,
            _ => {
                tracing::trace!("Stale write timer {:?} ignored", id);
                return;
            }
        };
        self.in_flight = None;
        self.overdue += 1;

        if self.owns(flight.job) {
            tracing::error!("Chunk of {} timed out", flight.job);
            self.fail_current(UartError::WriteTimeout(self.write_timeout));
        } else {
            tracing::debug!("Orphaned chunk of {} timed out", flight.job);
            self.pump(transport, timers);
        }
    }

    /// Drop the pending job (and forget any chunk in flight)
    ///
    /// Called when the link goes away, so no outstanding completion is
    /// expected afterwards.
    pub fn abandon(&mut self, reason: UartError, timers: &mut TimerSet) {
        if let Some(flight) = self.in_flight.take() {
            timers.cancel(flight.timer);
        }
        self.overdue = 0;
        if self.job.is_some() {
            tracing::debug!("Abandoning pending write: {}", reason);
            self.fail_current(reason);
        }
    }

    /// Write the next chunk if nothing is in flight
    fn pump<T: Transport>(&mut self, transport: &mut T, timers: &mut TimerSet) {
        if self.in_flight.is_some() {
            return;
        }
        let Some(job) = self.job.as_mut() else {
            return;
        };

        let id = job.id;
        let Some(chunk) = job.chunks.next() else {
            tracing::debug!("{} completed", id);
            self.job = None;
            self.report(id, WriteOutcome::Completed);
            return;
        };

        match transport.write(&chunk) {
            Ok(()) => {
                tracing::trace!("{}: wrote {} byte chunk", id, chunk.len());
                self.chunks_written += 1;
                let timer = timers.schedule(TimerKind::Write, self.write_timeout);
                self.in_flight = Some(InFlight { job: id, timer });
            }
            Err(e) => {
                tracing::error!("{}: write request failed: {}", id, e);
                self.fail_current(UartError::WriteRequest(e.to_string()));
            }
        }
    }

    fn owns(&self, job: JobId) -> bool {
        self.job.as_ref().map(|current| current.id) == Some(job)
    }

    fn fail_current(&mut self, error: UartError) {
        if let Some(job) = self.job.take() {
            self.report(job.id, WriteOutcome::Failed(error));
        }
    }

    fn report(&mut self, job: JobId, outcome: WriteOutcome) {
        self.reports.push(WriteReport { job, outcome });
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// True while a job is pending
    pub fn is_busy(&self) -> bool {
        self.job.is_some()
    }

    pub fn chunks_written(&self) -> u64 {
        self.chunks_written
    }

    /// Drain job reports produced since the last call
    pub fn take_reports(&mut self) -> Vec<WriteReport> {
        std::mem::take(&mut self.reports)
    }
}
