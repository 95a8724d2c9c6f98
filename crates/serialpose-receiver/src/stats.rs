use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters updated by the receive thread and read from any thread.
#[derive(Debug, Default)]
pub struct ReceiverStats {
    bytes_received: AtomicU64,
    frames_decoded: AtomicU64,
    desync_faults: AtomicU64,
    empty_frames: AtomicU64,
    integrity_faults: AtomicU64,
    overflow_discards: AtomicU64,
    record_faults: AtomicU64,
    records_published: AtomicU64,
    records_superseded: AtomicU64,
    rotations: AtomicU64,
    log_bytes: AtomicU64,
    log_write_errors: AtomicU64,
    read_errors: AtomicU64,
    reopen_attempts: AtomicU64,
    reopen_failures: AtomicU64,
}

/// Point-in-time copy of [`ReceiverStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReceiverStatsSnapshot {
    pub bytes_received: u64,
    /// Frames that unstuffed cleanly, whether or not they held a valid record.
    pub frames_decoded: u64,
    pub desync_faults: u64,
    pub empty_frames: u64,
    pub integrity_faults: u64,
    pub overflow_discards: u64,
    pub record_faults: u64,
    pub records_published: u64,
    /// Records replaced before the consumer took them.
    pub records_superseded: u64,
    pub rotations: u64,
    pub log_bytes: u64,
    pub log_write_errors: u64,
    pub read_errors: u64,
    pub reopen_attempts: u64,
    pub reopen_failures: u64,
}

macro_rules! counters {
    ($($field:ident => $bump:ident),* $(,)?) => {
        impl ReceiverStats {
            $(
                pub(crate) fn $bump(&self, n: u64) {
                    self.$field.fetch_add(n, Ordering::Relaxed);
                }
            )*

            pub fn snapshot(&self) -> ReceiverStatsSnapshot {
                ReceiverStatsSnapshot {
                    $($field: self.$field.load(Ordering::Relaxed),)*
                }
            }
        }
    };
}

counters! {
    bytes_received => add_bytes_received,
    frames_decoded => add_frames_decoded,
    desync_faults => add_desync_faults,
    empty_frames => add_empty_frames,
    integrity_faults => add_integrity_faults,
    overflow_discards => add_overflow_discards,
    record_faults => add_record_faults,
    records_published => add_records_published,
    records_superseded => add_records_superseded,
    rotations => add_rotations,
    log_bytes => add_log_bytes,
    log_write_errors => add_log_write_errors,
    read_errors => add_read_errors,
    reopen_attempts => add_reopen_attempts,
    reopen_failures => add_reopen_failures,
}

impl ReceiverStatsSnapshot {
    /// Frames and records dropped for any reason.
    pub fn total_faults(&self) -> u64 {
        self.desync_faults
            + self.empty_frames
            + self.integrity_faults
            + self.overflow_discards
            + self.record_faults
    }
}
