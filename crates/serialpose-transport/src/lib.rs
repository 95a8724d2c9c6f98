//! Physical link boundary for the serialpose receiver.
//!
//! The receiver only needs a narrow slice of a serial port: open with a
//! short timeout, ask how many bytes are waiting, read, and notice when the
//! device went away. That slice is the [`Link`] trait; a [`Connector`]
//! (re)opens links from a [`LinkConfig`].
//!
//! - [`SerialConnector`] opens real ports through the `serialport` crate.
//! - [`MemoryConnector`] serves scripted chunks for tests and demos.

pub mod error;
pub mod memory;
pub mod serial;
pub mod traits;

pub use error::{Result, TransportError};
pub use memory::{MemoryConnector, MemoryLink};
pub use serial::{available_ports, PortSummary, SerialConnector, SerialLink};
pub use traits::{is_transient, Connector, Link, LinkConfig};
