use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur while running a receiver or relay.
#[derive(Debug, thiserror::Error)]
pub enum ReceiverError {
    /// Link-level error.
    #[error("transport error: {0}")]
    Transport(#[from] serialpose_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] serialpose_frame::FrameError),

    /// The raw log file could not be created.
    #[error("failed to create raw log {path}: {source}")]
    LogCreate {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Every candidate raw log name is taken.
    #[error("no free raw log name in {dir} after {attempts} attempts")]
    LogNamesExhausted { dir: PathBuf, attempts: u32 },

    /// The receiver configuration is unusable.
    #[error("invalid receiver configuration: {0}")]
    InvalidConfig(String),

    /// The receive thread did not finish in time and was left detached.
    #[error("receive thread did not stop within {0:?}")]
    JoinTimeout(Duration),

    /// The receive thread panicked.
    #[error("receive thread panicked")]
    WorkerPanicked,

    /// The receive thread could not be spawned.
    #[error("failed to spawn receive thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// `start` or `open` was called while the receive thread is running.
    #[error("receiver is already running")]
    AlreadyRunning,

    /// A relay socket could not be bound.
    #[error("failed to bind relay socket {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ReceiverError>;
