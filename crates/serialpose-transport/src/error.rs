/// Errors that can occur on the physical link.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The device could not be opened.
    #[error("failed to open {device} at {baud_rate} baud: {source}")]
    Open {
        device: String,
        baud_rate: u32,
        source: std::io::Error,
    },

    /// An I/O error occurred on an open link.
    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The link configuration is unusable.
    #[error("invalid link configuration: {0}")]
    InvalidConfig(String),

    /// Port enumeration failed.
    #[error("failed to enumerate serial ports: {0}")]
    Enumerate(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;
