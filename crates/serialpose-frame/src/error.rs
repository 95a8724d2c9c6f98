/// Errors that can occur while locating and unstuffing frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A code byte points past the end of the frame. Usually means decoding
    /// started in the middle of a frame; the next frame decodes normally.
    #[error("stuffing code {code:#04x} at offset {offset} overruns a {len}-byte frame")]
    Desync { code: u8, offset: usize, len: usize },

    /// The unstuffed length does not match the stuffed length.
    #[error("unstuffed {written} bytes from a {len}-byte frame (expected {expected})")]
    Integrity {
        written: usize,
        len: usize,
        expected: usize,
    },

    /// A delimiter with no stuffed bytes in front of it.
    #[error("empty frame")]
    EmptyFrame,

    /// A whole working buffer went by without a delimiter; its bytes were dropped.
    #[error("no delimiter within {capacity} bytes; buffer discarded")]
    Overflow { capacity: usize },

    /// The output buffer cannot hold the unstuffed frame.
    #[error("output buffer too small ({available} bytes, need {needed})")]
    OutputTooSmall { available: usize, needed: usize },

    /// Working buffer capacity outside the supported range.
    #[error("buffer capacity {capacity} outside {min}..={max}")]
    InvalidCapacity {
        capacity: usize,
        min: usize,
        max: usize,
    },

    /// An I/O error occurred while reading the byte stream.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The byte source ended.
    #[error("end of stream")]
    EndOfStream,
}

impl FrameError {
    /// True for per-frame faults the stream recovers from by itself.
    pub fn is_frame_fault(&self) -> bool {
        matches!(
            self,
            FrameError::Desync { .. }
                | FrameError::Integrity { .. }
                | FrameError::EmptyFrame
                | FrameError::Overflow { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
