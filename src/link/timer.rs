//! Deadline table shared by the state machine and the write sequencer
//!
//! Nothing here sleeps. Owners schedule deadlines, the engine asks for the
//! ones that have passed, and each owner checks that a fired id is still the
//! one it is waiting on before acting. A stale id is ignored.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use super::state::SetupStep;

/// Handle to one scheduled deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

/// What a deadline guards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Setup(SetupStep),
    ScanRetry,
    ScanRestart,
    Write,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    deadline: Instant,
    kind: TimerKind,
}

#[derive(Debug, Default)]
pub struct TimerSet {
    next_id: u64,
    pending: BTreeMap<TimerId, Entry>,
}

impl TimerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `kind` to fire `after` from now
    pub fn schedule(&mut self, kind: TimerKind, after: Duration) -> TimerId {
        self.schedule_at(kind, Instant::now() + after)
    }

    pub fn schedule_at(&mut self, kind: TimerKind, deadline: Instant) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.pending.insert(id, Entry { deadline, kind });
        id
    }

    /// Cancel a deadline; returns false if it already fired or was canceled
    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.pending.remove(&id).is_some()
    }

    /// Remove and return every deadline at or before `now`, earliest first
    pub fn expired(&mut self, now: Instant) -> Vec<(TimerId, TimerKind)> {
        let mut fired: Vec<(TimerId, Entry)> = self
            .pending
            .iter()
            .filter(|(_, entry)| entry.deadline <= now)
            .map(|(id, entry)| (*id, *entry))
            .collect();

        for (id, _) in &fired {
            self.pending.remove(id);
        }

        fired.sort_by_key(|(id, entry)| (entry.deadline, *id));
        fired.into_iter().map(|(id, entry)| (id, entry.kind)).collect()
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|entry| entry.deadline).min()
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
