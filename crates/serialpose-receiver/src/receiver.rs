use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serialpose_frame::{FrameError, FrameHandler, StreamReassembler};
use serialpose_record::PoseRecord;
use serialpose_transport::{is_transient, Connector, Link};
use tracing::{debug, info, warn};

use crate::cell::LatestCell;
use crate::config::ReceiverConfig;
use crate::error::{ReceiverError, Result};
use crate::raw_log::RawLog;
use crate::stats::{ReceiverStats, ReceiverStatsSnapshot};

/// Longest single sleep while backing off, so a stop request is noticed quickly.
const BACKOFF_SLICE: Duration = Duration::from_millis(5);

/// Receiver lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReceiverState {
    /// No link is held.
    Closed = 0,
    /// The link is open; the receive thread is not running.
    Open = 1,
    /// The receive thread owns the link.
    Running = 2,
    /// Stop requested; waiting for the receive thread.
    Stopping = 3,
}

impl ReceiverState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Open,
            2 => Self::Running,
            3 => Self::Stopping,
            _ => Self::Closed,
        }
    }
}

/// State shared between the receiver handle and its thread.
#[derive(Debug)]
struct Shared {
    state: AtomicU8,
    latest: LatestCell<PoseRecord>,
    firmware_build: Mutex<Option<String>>,
    stats: ReceiverStats,
}

impl Shared {
    fn set_state(&self, state: ReceiverState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn state(&self) -> ReceiverState {
        ReceiverState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn note_build(&self, build: &str) {
        let mut current = self
            .firmware_build
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if current.as_deref() != Some(build) {
            info!(build, "device firmware build");
            *current = Some(build.to_string());
        }
    }
}

/// Reads a serial link on a dedicated thread and publishes decoded records.
///
/// Decoding faults never stop the thread; they are counted in
/// [`stats`](Self::stats) and the stream resynchronizes on the next delimiter.
/// Dropping the receiver stops it.
pub struct LinkReceiver<C: Connector> {
    connector: Arc<C>,
    config: ReceiverConfig,
    shared: Arc<Shared>,
    session: Option<Session<C::Link>>,
    worker: Option<Worker>,
    log_path: PathBuf,
}

/// Everything the receive thread owns while running.
struct Session<L> {
    link: Option<L>,
    reassembler: StreamReassembler,
    sink: Sink,
}

/// Frame handler: decodes records, publishes them, and logs retired bytes.
struct Sink {
    shared: Arc<Shared>,
    raw_log: RawLog,
}

/// A running receive thread. The stop flag belongs to this thread alone, so a
/// detached thread stays stopped across a later restart.
struct Worker {
    handle: JoinHandle<()>,
    stop: Arc<AtomicBool>,
    done: mpsc::Receiver<RawLog>,
}

impl<C: Connector> LinkReceiver<C> {
    /// Validate `config` and create the raw log. The link is not opened yet.
    pub fn new(connector: C, config: ReceiverConfig) -> Result<Self> {
        config.validate()?;
        let shared = Arc::new(Shared {
            state: AtomicU8::new(ReceiverState::Closed as u8),
            latest: LatestCell::new(),
            firmware_build: Mutex::new(None),
            stats: ReceiverStats::default(),
        });
        let session = Session::create(&config, &shared)?;
        let log_path = session.sink.raw_log.path().to_path_buf();
        Ok(Self {
            connector: Arc::new(connector),
            config,
            shared,
            session: Some(session),
            worker: None,
            log_path,
        })
    }

    /// Open the link without starting the receive thread.
    pub fn open(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Err(ReceiverError::AlreadyRunning);
        }
        let session = match self.session.take() {
            Some(session) => session,
            None => {
                let session = Session::create(&self.config, &self.shared)?;
                self.log_path = session.sink.raw_log.path().to_path_buf();
                session
            }
        };
        let session = self.session.insert(session);
        if session.link.is_none() {
            session.link = Some(self.connector.open(&self.config.link)?);
        }
        self.shared.set_state(ReceiverState::Open);
        Ok(())
    }

    /// Open the link if needed and spawn the `serial` receive thread.
    pub fn start(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Err(ReceiverError::AlreadyRunning);
        }
        self.open()?;
        let Some(session) = self.session.take() else {
            return Err(ReceiverError::InvalidConfig(
                "receiver has no session to run".to_string(),
            ));
        };

        let stop = Arc::new(AtomicBool::new(false));
        let (done_tx, done) = mpsc::channel();
        let connector = Arc::clone(&self.connector);
        let config = self.config.clone();
        let shared = Arc::clone(&self.shared);
        let thread_stop = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("serial".into())
            .spawn(move || {
                let raw_log =
                    run_loop(session, connector.as_ref(), &config, &shared, &thread_stop);
                let _ = done_tx.send(raw_log);
            })
            .map_err(|err| {
                self.shared.set_state(ReceiverState::Closed);
                ReceiverError::Spawn(err)
            })?;

        self.shared.set_state(ReceiverState::Running);
        info!(device = %self.config.link.device, "receiver started");
        self.worker = Some(Worker { handle, stop, done });
        Ok(())
    }

    /// Ask the receive thread to finish and wait up to the join timeout.
    ///
    /// On success the link is closed and the raw log flushed, synced, and
    /// closed. The sync happens here, after the thread has signalled. On
    /// timeout the thread is left to finish on its own and
    /// [`ReceiverError::JoinTimeout`] is returned; the receiver is `Closed`
    /// either way.
    pub fn stop(&mut self) -> Result<()> {
        let result = match self.worker.take() {
            Some(worker) => self.join(worker),
            None => {
                if let Some(session) = self.session.take() {
                    close_log(session.finish());
                }
                Ok(())
            }
        };
        self.shared.set_state(ReceiverState::Closed);
        result
    }

    fn join(&self, worker: Worker) -> Result<()> {
        self.shared.set_state(ReceiverState::Stopping);
        worker.stop.store(true, Ordering::Release);

        match worker.done.recv_timeout(self.config.join_timeout) {
            Ok(raw_log) => {
                let joined = worker.handle.join();
                close_log(raw_log);
                if joined.is_err() {
                    return Err(ReceiverError::WorkerPanicked);
                }
                info!(device = %self.config.link.device, "receiver stopped");
                Ok(())
            }
            Err(RecvTimeoutError::Disconnected) => {
                let _ = worker.handle.join();
                warn!("receive thread exited without completing shutdown");
                Err(ReceiverError::WorkerPanicked)
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    timeout = ?self.config.join_timeout,
                    "receive thread did not stop in time; detaching"
                );
                Err(ReceiverError::JoinTimeout(self.config.join_timeout))
            }
        }
    }

    /// Remove and return the newest decoded record, if one arrived since the
    /// last call.
    pub fn take_latest_record(&self) -> Option<PoseRecord> {
        self.shared.latest.take()
    }

    /// Firmware build tag most recently reported by the device.
    pub fn firmware_build(&self) -> Option<String> {
        self.shared
            .firmware_build
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn state(&self) -> ReceiverState {
        self.shared.state()
    }

    pub fn stats(&self) -> ReceiverStatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Path of the current (or most recent) raw log.
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn config(&self) -> &ReceiverConfig {
        &self.config
    }
}

impl<C: Connector> Drop for LinkReceiver<C> {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            warn!(error = %err, "receiver did not shut down cleanly");
        }
    }
}

impl<L: Link> Session<L> {
    fn create(config: &ReceiverConfig, shared: &Arc<Shared>) -> Result<Self> {
        let raw_log = RawLog::create(&config.log_dir, &config.log_prefix, config.max_log_attempts)?;
        Ok(Self {
            link: None,
            reassembler: StreamReassembler::new(config.buffer_capacity)?,
            sink: Sink {
                shared: Arc::clone(shared),
                raw_log,
            },
        })
    }

    /// One read from the link into the reassembler.
    fn poll(&mut self) {
        let Some(link) = self.link.as_mut() else {
            return;
        };
        let stats = &self.sink.shared.stats;

        let spare = self.reassembler.spare_len();
        let wanted = link.bytes_to_read().unwrap_or(spare).clamp(1, spare);

        match link.read(&mut self.reassembler.spare_mut()[..wanted]) {
            Ok(0) => {}
            Ok(n) => {
                stats.add_bytes_received(n as u64);
                self.reassembler.commit(n, &mut self.sink);
            }
            Err(err) if is_transient(err.kind()) => {}
            Err(err) => {
                stats.add_read_errors(1);
                warn!(error = %err, "link read failed; reopening");
                self.link = None;
            }
        }
    }

    /// Close the link and write out the unrotated bytes. The returned log is
    /// flushed but not yet synced.
    fn finish(mut self) -> RawLog {
        self.link = None;
        let remainder = self.reassembler.remainder();
        if let Err(err) = self.sink.raw_log.append(remainder) {
            self.sink.shared.stats.add_log_write_errors(1);
            warn!(error = %err, "failed to flush raw log remainder");
        } else {
            self.sink.shared.stats.add_log_bytes(remainder.len() as u64);
        }
        self.sink.raw_log
    }
}

fn close_log(raw_log: RawLog) {
    let path = raw_log.path().to_path_buf();
    let written = raw_log.bytes_written();
    match raw_log.close() {
        Ok(()) => debug!(path = %path.display(), bytes = written, "raw log closed"),
        Err(err) => warn!(path = %path.display(), error = %err, "failed to close raw log"),
    }
}

impl FrameHandler for Sink {
    fn on_frame(&mut self, payload: &[u8]) {
        let stats = &self.shared.stats;
        stats.add_frames_decoded(1);
        match PoseRecord::decode(payload) {
            Ok(record) => {
                if let Some(build) = record.build.as_deref() {
                    self.shared.note_build(build);
                }
                if self.shared.latest.publish(record) {
                    stats.add_records_superseded(1);
                }
                stats.add_records_published(1);
            }
            Err(err) => {
                stats.add_record_faults(1);
                debug!(error = %err, len = payload.len(), "dropping record");
            }
        }
    }

    fn on_fault(&mut self, fault: &FrameError) {
        let stats = &self.shared.stats;
        match fault {
            FrameError::Desync { .. } => stats.add_desync_faults(1),
            FrameError::EmptyFrame => stats.add_empty_frames(1),
            FrameError::Integrity { .. } => stats.add_integrity_faults(1),
            FrameError::Overflow { .. } => stats.add_overflow_discards(1),
            _ => {}
        }
    }

    fn on_rotate(&mut self, segment: &[u8]) {
        let stats = &self.shared.stats;
        stats.add_rotations(1);
        match self.raw_log.append(segment) {
            Ok(()) => stats.add_log_bytes(segment.len() as u64),
            Err(err) => {
                stats.add_log_write_errors(1);
                warn!(
                    path = %self.raw_log.path().display(),
                    error = %err,
                    "raw log write failed"
                );
            }
        }
    }
}

/// Doubling delay between reopen attempts.
struct Backoff {
    initial: Duration,
    max: Duration,
    next: Duration,
}

impl Backoff {
    fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            next: initial,
        }
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = self.next.saturating_mul(2).min(self.max);
        delay
    }

    fn reset(&mut self) {
        self.next = self.initial;
    }
}

fn run_loop<C: Connector>(
    mut session: Session<C::Link>,
    connector: &C,
    config: &ReceiverConfig,
    shared: &Shared,
    stop: &AtomicBool,
) -> RawLog {
    let mut backoff = Backoff::new(config.reopen_initial_backoff, config.reopen_max_backoff);
    let mut failures: u32 = 0;

    while !stop.load(Ordering::Acquire) {
        let link_lost = session.link.as_ref().is_none_or(|link| !link.is_open());
        if link_lost {
            session.link = None;
            shared.stats.add_reopen_attempts(1);
            match connector.open(&config.link) {
                Ok(link) => {
                    if failures > 0 {
                        info!(device = %config.link.device, failures, "link reopened");
                    }
                    failures = 0;
                    backoff.reset();
                    session.link = Some(link);
                }
                Err(err) => {
                    failures = failures.saturating_add(1);
                    shared.stats.add_reopen_failures(1);
                    if failures % config.reopen_warn_after == 0 {
                        warn!(
                            device = %config.link.device,
                            failures,
                            error = %err,
                            "link still unavailable"
                        );
                    } else {
                        debug!(error = %err, "reopen failed");
                    }
                    pause(stop, backoff.next_delay());
                    continue;
                }
            }
        }

        session.poll();
        thread::yield_now();
    }

    session.finish()
}

/// Sleep for `delay`, returning early once `stop` is set. A delay past the
/// clock's range waits for `stop` alone.
fn pause(stop: &AtomicBool, delay: Duration) {
    let deadline = Instant::now().checked_add(delay);
    while !stop.load(Ordering::Acquire) {
        let remaining = match deadline {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()),
            None => BACKOFF_SLICE,
        };
        if remaining.is_zero() {
            return;
        }
        thread::sleep(remaining.min(BACKOFF_SLICE));
    }
}
