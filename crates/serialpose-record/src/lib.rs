//! Telemetry records carried inside serialpose frames.
//!
//! Each frame payload is a protobuf `SimulationMessage` envelope holding a
//! timestamp, the bicycle pose, and optionally the firmware build tag.
//! [`PoseRecord::decode`] turns one unstuffed payload into a [`PoseRecord`].

pub mod error;
pub mod record;
pub mod schema;

pub use error::{RecordError, Result};
pub use record::{Pose, PoseRecord};
