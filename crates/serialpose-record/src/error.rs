/// Errors that can occur while decoding a record payload.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// The payload is not a valid `SimulationMessage`.
    #[error("malformed record: {0}")]
    Decode(#[from] prost::DecodeError),

    /// The envelope decoded but carries no pose.
    #[error("record has no pose")]
    MissingPose,
}

pub type Result<T> = std::result::Result<T, RecordError>;
