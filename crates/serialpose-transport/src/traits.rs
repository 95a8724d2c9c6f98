use std::io::ErrorKind;
use std::time::Duration;

use crate::error::{Result, TransportError};

/// Identifier and line settings of a physical link.
///
/// Built once before the receiver starts and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// Device path or name (e.g. `/dev/ttyACM0`, `COM3`).
    pub device: String,
    /// Symbol rate in baud.
    pub baud_rate: u32,
    /// Read/write timeout applied when the link is opened.
    pub timeout: Duration,
}

impl LinkConfig {
    /// Default symbol rate.
    pub const DEFAULT_BAUD_RATE: u32 = 115_200;
    /// Default I/O timeout: short enough that an idle link never stalls the loop.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1);

    /// Create a config with the default timeout.
    pub fn new(device: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            device: device.into(),
            baud_rate,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Override the I/O timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reject configurations no link can be opened with.
    pub fn validate(&self) -> Result<()> {
        if self.device.trim().is_empty() {
            return Err(TransportError::InvalidConfig(
                "device identifier must not be empty".to_string(),
            ));
        }
        if self.baud_rate == 0 {
            return Err(TransportError::InvalidConfig(
                "baud rate must be greater than zero".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(TransportError::InvalidConfig(
                "timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// An open physical link.
pub trait Link: Send + 'static {
    /// Read up to `buf.len()` bytes, blocking at most for the configured timeout.
    ///
    /// A timeout surfaces as `ErrorKind::TimedOut`; callers treat it as
    /// "nothing available".
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;

    /// Number of bytes waiting in the driver. Only a sizing hint.
    fn bytes_to_read(&mut self) -> std::io::Result<usize>;

    /// Whether the link is still usable. A closed link gets reopened.
    fn is_open(&self) -> bool {
        true
    }
}

/// Opens links. Shared with the receive thread, which reopens on loss.
pub trait Connector: Send + Sync + 'static {
    type Link: Link;

    /// Open a link with the given settings.
    fn open(&self, config: &LinkConfig) -> Result<Self::Link>;
}

/// Returns true for read errors that only mean "no data this time".
pub fn is_transient(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timeout_is_one_millisecond() {
        let cfg = LinkConfig::new("/dev/ttyACM0", 115_200);
        assert_eq!(cfg.timeout, Duration::from_millis(1));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_device() {
        let cfg = LinkConfig::new("  ", 115_200);
        assert!(matches!(
            cfg.validate(),
            Err(TransportError::InvalidConfig(_))
        ));
    }

    #[test]
    fn validate_rejects_zero_baud_and_timeout() {
        assert!(LinkConfig::new("/dev/ttyS0", 0).validate().is_err());
        assert!(LinkConfig::new("/dev/ttyS0", 9600)
            .with_timeout(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn transient_kinds() {
        assert!(is_transient(ErrorKind::TimedOut));
        assert!(is_transient(ErrorKind::WouldBlock));
        assert!(is_transient(ErrorKind::Interrupted));
        assert!(!is_transient(ErrorKind::BrokenPipe));
        assert!(!is_transient(ErrorKind::NotConnected));
    }
}
