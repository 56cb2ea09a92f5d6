//! # Wireless UART
//!
//! Host-side engine for a UART service carried over a low-energy radio link:
//! - Automatic discovery, connection and recovery for one target peer
//! - Length-prefixed command frames fragmented to the link's MTU
//! - Stream reassembly of notifications into typed responses and events
//! - Pluggable transport with an in-memory simulator
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       EngineHandle                           │
//! │              (submit / wait_for_step / packets)              │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ requests            ▲ packets, reports
//! ┌─────────────────────▼─────────────────────┴─────────────────┐
//! │                     Engine (one thread)                      │
//! └──────────┬──────────────────────┬────────────────┬──────────┘
//!            │                      │                │
//!            ▼                      ▼                ▼
//!   ┌─────────────────┐   ┌─────────────────┐ ┌─────────────┐
//!   │ ConnectionState │   │ WriteSequencer  │ │ Reassembler │
//!   │    Machine      │   │  (fragmenter)   │ │ (registry)  │
//!   └────────┬────────┘   └────────┬────────┘ └──────▲──────┘
//!            │                     │                 │
//!            ▼                     ▼                 │
//!   ┌─────────────────────────────────────────────────┴───────┐
//!   │                  Transport (events in order)             │
//!   └──────────────────────────────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod transport;
pub mod link;
pub mod engine;
pub mod driver;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{UartError, Result};
pub use config::{Config, SubmitPolicy};
pub use engine::{Engine, LinkStats};
pub use driver::EngineHandle;
pub use link::{JobId, OperationStep, WriteOutcome, WriteReport};
pub use protocol::{Command, RxPacket};
pub use transport::{PeerAddress, Transport, TransportEvent};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of the wireless UART engine
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
