//! Zero-delimited COBS framing for the serialpose link.
//!
//! The device stuffs every record so that `0x00` never appears inside it and
//! terminates each frame with a single `0x00`. This crate finds those frames in
//! an arbitrarily fragmented byte stream and undoes the stuffing:
//!
//! - [`unstuff`] decodes one delimited frame into a separate buffer
//! - [`StreamReassembler`] keeps the two working buffers, scans for
//!   delimiters, and rotates unconsumed bytes when the active buffer fills
//! - [`FrameReader`] drives a reassembler from any `Read` (log replay)
//!
//! Decode faults are never fatal to the stream: scanning resumes at the next
//! delimiter.

pub mod cobs;
pub mod error;
pub mod reader;
pub mod reassembler;

pub use cobs::{encode_frame, unstuff, DELIMITER, FRAME_OVERHEAD};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use reassembler::{
    FrameHandler, ReassemblyStats, StreamReassembler, DEFAULT_CAPACITY, MAX_CAPACITY,
    MIN_CAPACITY,
};
