//! Link Module
//!
//! Connection lifecycle and outbound write sequencing.
//!
//! ## Architecture
//! - `ConnectionStateMachine` walks scan → connect → discover → subscribe
//! - `WriteSequencer` keeps at most one chunk write in flight
//! - Both share one `TimerSet`; the engine fires expired deadlines

mod machine;
mod sequencer;
mod state;
mod timer;

pub use machine::{ConnectionStateMachine, LinkNotice};
pub use sequencer::{JobId, WriteOutcome, WriteReport, WriteSequencer};
pub use state::{FailureKind, OperationStep, SetupStep};
pub use timer::{TimerId, TimerKind, TimerSet};
