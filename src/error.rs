//! Error types for the wireless UART engine
//!
//! Provides a unified error type for all operations.

use std::time::Duration;

use thiserror::Error;

use crate::link::{FailureKind, SetupStep};
use crate::transport::GattStatus;

/// Result type alias using UartError
pub type Result<T> = std::result::Result<T, UartError>;

/// Unified error type for wireless UART operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UartError {
    // -------------------------------------------------------------------------
    // Transport Errors
    // -------------------------------------------------------------------------
    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),

    #[error("Transport request rejected: {0}")]
    Request(String),

    #[error("Link setup failed during {step} ({kind})")]
    Setup { step: SetupStep, kind: FailureKind },

    #[error("Link disconnected")]
    Disconnected,

    // -------------------------------------------------------------------------
    // Write Errors
    // -------------------------------------------------------------------------
    #[error("Not connected")]
    NotConnected,

    #[error("A write is already in progress")]
    WriteInProgress,

    #[error("Write superseded by a newer command")]
    Superseded,

    #[error("Write request failed: {0}")]
    WriteRequest(String),

    #[error("Write rejected by peer: {0}")]
    WriteStatus(GattStatus),

    #[error("Write timed out after {0:?}")]
    WriteTimeout(Duration),

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Engine Errors
    // -------------------------------------------------------------------------
    #[error("Engine stopped")]
    EngineStopped,

    #[error("Failed to spawn engine thread: {0}")]
    Spawn(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
