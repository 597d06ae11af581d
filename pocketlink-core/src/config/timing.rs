//! Timing contract
//!
//! Every bounded wait in the bridge reads its limit from here. Once a set of
//! values ships in `bridge.toml`, host tooling depends on it.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Longest settle delay accepted by validation
pub const MAX_SETTLE_US: u32 = 1_000;

/// Bus and host timing parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TimingConfig {
    /// Default wait for one host byte (ms)
    pub host_byte_timeout_ms: u32,
    /// Wait for the host's answer to a forwarded disk command (ms)
    pub host_response_timeout_ms: u32,
    /// Bound on a single BUSY edge wait (µs)
    pub handshake_timeout_us: u32,
    /// Data line settle time before sampling or strobing (µs)
    pub settle_us: u32,
    /// Poll step inside bounded waits (µs)
    pub poll_interval_us: u32,
    /// Wait for XOUT before a disk command (ms)
    pub disk_command_timeout_ms: u32,
    /// Wait for the first tape tone on save (ms)
    pub tape_start_timeout_ms: u32,
    /// Silence that ends a tape recording (ms)
    pub tape_silence_ms: u32,
}

impl TimingConfig {
    pub const DEFAULT: Self = Self {
        host_byte_timeout_ms: 1_000,
        host_response_timeout_ms: 5_000,
        handshake_timeout_us: 50_000,
        settle_us: 10,
        poll_interval_us: 2,
        disk_command_timeout_ms: 2_000,
        tape_start_timeout_ms: 60_000,
        tape_silence_ms: 100,
    };

    /// Check the invariants between the values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host_byte_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.handshake_timeout_us == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        // The disk bridge interleaves one device handshake with one host
        // send, so the device must give up before the host does.
        if u64::from(self.handshake_timeout_us) >= u64::from(self.host_byte_timeout_ms) * 1000 {
            return Err(ConfigError::HandshakeExceedsHostTimeout);
        }
        if self.settle_us > MAX_SETTLE_US {
            return Err(ConfigError::SettleTooLong);
        }
        if self.poll_interval_us == 0 || self.poll_interval_us >= self.handshake_timeout_us {
            return Err(ConfigError::InvalidPollInterval);
        }
        if self.tape_silence_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Complete bridge configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BridgeConfig {
    pub timing: TimingConfig,
    /// Sound the beeper when a command fails with a bus fault
    pub beep_on_fault: bool,
}

impl BridgeConfig {
    pub const DEFAULT: Self = Self {
        timing: TimingConfig::DEFAULT,
        beep_on_fault: true,
    };

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timing.validate()
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// A timeout is zero
    ZeroTimeout,
    /// handshake_timeout_us is not below host_byte_timeout_ms
    HandshakeExceedsHostTimeout,
    /// settle_us above MAX_SETTLE_US
    SettleTooLong,
    /// poll_interval_us is zero or not below the handshake timeout
    InvalidPollInterval,
}
