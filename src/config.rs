//! Configuration for the wireless UART engine
//!
//! Centralized configuration with sensible defaults.

use std::time::Duration;

use crate::error::{Result, UartError};
use crate::transport::PeerAddress;

/// Main configuration for an engine instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Peer Configuration
    // -------------------------------------------------------------------------
    /// Address of the single peer this engine connects to
    pub target: PeerAddress,

    // -------------------------------------------------------------------------
    // Link Setup Configuration
    // -------------------------------------------------------------------------
    /// Deadline for link establishment after a discovery match
    pub connect_timeout: Duration,

    /// Deadline for each later setup step (service discovery, notification enable)
    pub operation_timeout: Duration,

    /// Delay before retrying a scan request that could not be started
    pub scan_retry_delay: Duration,

    /// A scan running this long is stopped and restarted
    pub scan_restart_interval: Duration,

    // -------------------------------------------------------------------------
    // Write Configuration
    // -------------------------------------------------------------------------
    /// Max bytes per transport write
    pub chunk_size: usize,

    /// Deadline for a single chunk write to complete
    pub write_timeout: Duration,

    /// What a submit does while another command is still being written
    pub submit_policy: SubmitPolicy,

    // -------------------------------------------------------------------------
    // Delivery Configuration
    // -------------------------------------------------------------------------
    /// Packets (and write reports) a threaded handle queues before dropping
    pub delivery_backlog: usize,
}

/// Behavior of `submit` while a write job is pending
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitPolicy {
    /// The new command replaces the pending one (reported as superseded)
    Supersede,

    /// The new command is rejected with `WriteInProgress`
    RejectWhileBusy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target: PeerAddress::BROADCAST,
            connect_timeout: Duration::from_millis(7000),
            operation_timeout: Duration::from_millis(5000),
            scan_retry_delay: Duration::from_millis(1000),
            scan_restart_interval: Duration::from_secs(25 * 60),
            chunk_size: 20, // 23-byte default ATT MTU minus 3-byte header
            write_timeout: Duration::from_millis(5000),
            submit_policy: SubmitPolicy::Supersede,
            delivery_backlog: 1024,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check that the values can drive an engine
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(UartError::Config("chunk_size must be at least 1".to_string()));
        }
        if self.delivery_backlog == 0 {
            return Err(UartError::Config(
                "delivery_backlog must be at least 1".to_string(),
            ));
        }

        let timeouts = [
            ("connect_timeout", self.connect_timeout),
            ("operation_timeout", self.operation_timeout),
            ("write_timeout", self.write_timeout),
            ("scan_retry_delay", self.scan_retry_delay),
            ("scan_restart_interval", self.scan_restart_interval),
        ];
        for (name, value) in timeouts {
            if value.is_zero() {
                return Err(UartError::Config(format!("{} must be non-zero", name)));
            }
        }

        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the target peer address
    pub fn target(mut self, address: PeerAddress) -> Self {
        self.config.target = address;
        self
    }

    /// Set the link establishment deadline
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the per-step setup deadline
    pub fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.config.operation_timeout = timeout;
        self
    }

    /// Set the delay before a failed scan request is retried
    pub fn scan_retry_delay(mut self, delay: Duration) -> Self {
        self.config.scan_retry_delay = delay;
        self
    }

    /// Set how long a scan may run before it is restarted
    pub fn scan_restart_interval(mut self, interval: Duration) -> Self {
        self.config.scan_restart_interval = interval;
        self
    }

    /// Set the maximum bytes per transport write
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the per-chunk write deadline
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout = timeout;
        self
    }

    /// Set the submit policy
    pub fn submit_policy(mut self, policy: SubmitPolicy) -> Self {
        self.config.submit_policy = policy;
        self
    }

    /// Set how many undrained packets a driver handle holds
    pub fn delivery_backlog(mut self, backlog: usize) -> Self {
        self.config.delivery_backlog = backlog;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
