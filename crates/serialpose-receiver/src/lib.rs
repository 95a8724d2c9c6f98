//! Receive side of the serialpose link.
//!
//! A [`LinkReceiver`] owns the physical link and a dedicated `serial` thread
//! that reads, reassembles, and decodes frames into [`PoseRecord`]s. The newest
//! record is kept in a [`LatestCell`] for a consumer that polls at its own
//! rate; raw bytes are appended to a [`RawLog`] as the reassembler retires
//! them.
//!
//! ```no_run
//! use serialpose_receiver::{LinkReceiver, ReceiverConfig};
//! use serialpose_transport::{LinkConfig, SerialConnector};
//!
//! let config = ReceiverConfig::new(LinkConfig::new("/dev/ttyACM0", 115_200));
//! let mut receiver = LinkReceiver::new(SerialConnector, config)?;
//! receiver.start()?;
//! if let Some(record) = receiver.take_latest_record() {
//!     println!("{} {:?}", record.timestamp, record.pose);
//! }
//! receiver.stop()?;
//! # Ok::<(), serialpose_receiver::ReceiverError>(())
//! ```

pub mod cell;
pub mod config;
pub mod error;
pub mod raw_log;
pub mod receiver;
pub mod relay;
pub mod stats;

pub use cell::LatestCell;
pub use config::ReceiverConfig;
pub use error::{ReceiverError, Result};
pub use raw_log::RawLog;
pub use receiver::{LinkReceiver, ReceiverState};
pub use relay::{DatagramRelay, RelayReceiver, RELAY_READ_TIMEOUT};
pub use stats::{ReceiverStats, ReceiverStatsSnapshot};

pub use serialpose_record::PoseRecord;
