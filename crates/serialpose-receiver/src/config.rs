use std::path::PathBuf;
use std::time::Duration;

use serialpose_frame::{DEFAULT_CAPACITY, MAX_CAPACITY, MIN_CAPACITY};
use serialpose_transport::LinkConfig;

use crate::error::{ReceiverError, Result};

/// Default raw log file prefix; files are named `pose0.log`, `pose1.log`, ...
pub const DEFAULT_LOG_PREFIX: &str = "pose";
/// Default bound on raw log name probing.
pub const DEFAULT_MAX_LOG_ATTEMPTS: u32 = 1000;
/// Default wait for the receive thread on stop.
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_millis(100);
pub const DEFAULT_REOPEN_INITIAL_BACKOFF: Duration = Duration::from_millis(10);
pub const DEFAULT_REOPEN_MAX_BACKOFF: Duration = Duration::from_secs(1);
/// Reopen failures between two warnings.
pub const DEFAULT_REOPEN_WARN_AFTER: u32 = 10;

#[cfg(windows)]
const DEFAULT_DEVICE: &str = "COM3";
#[cfg(not(windows))]
const DEFAULT_DEVICE: &str = "/dev/ttyACM0";

/// Receiver settings. Fixed once the receiver is constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiverConfig {
    pub link: LinkConfig,
    /// Size of each of the two working buffers.
    pub buffer_capacity: usize,
    /// Directory the raw log is created in.
    pub log_dir: PathBuf,
    pub log_prefix: String,
    /// Raw log names tried before giving up.
    pub max_log_attempts: u32,
    /// How long `stop` waits for the receive thread.
    pub join_timeout: Duration,
    pub reopen_initial_backoff: Duration,
    pub reopen_max_backoff: Duration,
    /// Emit a warning every this many consecutive reopen failures.
    pub reopen_warn_after: u32,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self::new(LinkConfig::new(DEFAULT_DEVICE, LinkConfig::DEFAULT_BAUD_RATE))
    }
}

impl ReceiverConfig {
    pub fn new(link: LinkConfig) -> Self {
        Self {
            link,
            buffer_capacity: DEFAULT_CAPACITY,
            log_dir: PathBuf::from("."),
            log_prefix: DEFAULT_LOG_PREFIX.to_string(),
            max_log_attempts: DEFAULT_MAX_LOG_ATTEMPTS,
            join_timeout: DEFAULT_JOIN_TIMEOUT,
            reopen_initial_backoff: DEFAULT_REOPEN_INITIAL_BACKOFF,
            reopen_max_backoff: DEFAULT_REOPEN_MAX_BACKOFF,
            reopen_warn_after: DEFAULT_REOPEN_WARN_AFTER,
        }
    }

    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }

    pub fn with_log_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.log_prefix = prefix.into();
        self
    }

    pub fn with_max_log_attempts(mut self, attempts: u32) -> Self {
        self.max_log_attempts = attempts;
        self
    }

    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    /// Reopen delay starts at `initial` and doubles up to `max`.
    pub fn with_reopen_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.reopen_initial_backoff = initial;
        self.reopen_max_backoff = max;
        self
    }

    pub fn with_reopen_warn_after(mut self, failures: u32) -> Self {
        self.reopen_warn_after = failures;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.link.validate()?;

        if !(MIN_CAPACITY..=MAX_CAPACITY).contains(&self.buffer_capacity) {
            return Err(invalid(format!(
                "buffer capacity {} outside {MIN_CAPACITY}..={MAX_CAPACITY}",
                self.buffer_capacity
            )));
        }
        if self.log_prefix.is_empty() {
            return Err(invalid("log prefix must not be empty".to_string()));
        }
        if self.log_prefix.contains(['/', '\\']) {
            return Err(invalid(format!(
                "log prefix {:?} must not contain path separators",
                self.log_prefix
            )));
        }
        if self.max_log_attempts == 0 {
            return Err(invalid("max log attempts must be greater than zero".to_string()));
        }
        if self.join_timeout.is_zero() {
            return Err(invalid("join timeout must be greater than zero".to_string()));
        }
        if self.reopen_initial_backoff.is_zero()
            || self.reopen_initial_backoff > self.reopen_max_backoff
        {
            return Err(invalid(format!(
                "reopen backoff must satisfy 0 < initial ({:?}) <= max ({:?})",
                self.reopen_initial_backoff, self.reopen_max_backoff
            )));
        }
        if self.reopen_warn_after == 0 {
            return Err(invalid("reopen warning cadence must be greater than zero".to_string()));
        }
        Ok(())
    }
}

fn invalid(message: String) -> ReceiverError {
    ReceiverError::InvalidConfig(message)
}
