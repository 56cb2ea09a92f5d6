//! Link lifecycle states

use std::fmt;

/// Externally observable connection progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OperationStep {
    /// Not started, or waiting for the adapter to become ready
    #[default]
    Initializing,
    /// Looking for the target peer
    Scanning,
    /// Target found; link setup in progress
    Connecting,
    /// Notifications enabled; commands may be written
    Connected,
}

impl fmt::Display for OperationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OperationStep::Initializing => "initializing",
            OperationStep::Scanning => "scanning",
            OperationStep::Connecting => "connecting",
            OperationStep::Connected => "connected",
        };
        f.write_str(label)
    }
}

/// The asynchronous steps of link setup, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetupStep {
    Connect,
    DiscoverServices,
    EnableNotifications,
}

impl fmt::Display for SetupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SetupStep::Connect => "connect",
            SetupStep::DiscoverServices => "service discovery",
            SetupStep::EnableNotifications => "notification enable",
        };
        f.write_str(label)
    }
}

/// How a setup step failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The request could not be started
    Request,
    /// The transport reported a non-success status
    Response,
    /// No response before the step's deadline
    Timeout,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::Request => "request failure",
            FailureKind::Response => "response failure",
            FailureKind::Timeout => "timeout",
        };
        f.write_str(label)
    }
}
