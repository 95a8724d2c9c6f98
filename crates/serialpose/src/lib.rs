//! Serial telemetry receiver for COBS-framed bicycle pose records.
//!
//! serialpose reads a zero-delimited, byte-stuffed record stream from a serial
//! device, keeps the newest decoded pose for a consumer, and logs the raw
//! stream to disk.
//!
//! # Crate Structure
//!
//! - [`transport`]: Physical link boundary (serial ports, scripted in-memory links)
//! - [`frame`]: COBS unstuffing and double-buffered stream reassembly
//! - [`record`]: Pose record schema and decoding
//! - [`receiver`]: Threaded link receiver, raw log and datagram relay (behind `receiver` feature)

/// Re-export transport types.
pub mod transport {
    pub use serialpose_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use serialpose_frame::*;
}

/// Re-export record types.
pub mod record {
    pub use serialpose_record::*;
}

/// Re-export receiver types (requires `receiver` feature).
#[cfg(feature = "receiver")]
pub mod receiver {
    pub use serialpose_receiver::*;
}
