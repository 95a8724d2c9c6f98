//! Loopback datagram relay.
//!
//! Forwards encoded records to another local process without any session or
//! handshake: each datagram is one `SimulationMessage`, sent and forgotten.

use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::error::{ReceiverError, Result};

/// Socket read timeout of a relay receiver; also bounds how long a stop waits.
pub const RELAY_READ_TIMEOUT: Duration = Duration::from_millis(200);

/// Largest datagram a relay receiver accepts.
const MAX_DATAGRAM_SIZE: usize = 2048;

/// A UDP socket on the loopback interface.
#[derive(Debug)]
pub struct DatagramRelay {
    socket: UdpSocket,
    target: Option<SocketAddr>,
    sent: AtomicU64,
    send_errors: AtomicU64,
}

impl DatagramRelay {
    /// Bind `127.0.0.1:port` for receiving. Port 0 picks a free port.
    pub fn bind_loopback(port: u16) -> Result<Self> {
        let addr = loopback(port);
        let socket = UdpSocket::bind(addr).map_err(|source| ReceiverError::Bind { addr, source })?;
        socket.set_read_timeout(Some(RELAY_READ_TIMEOUT))?;
        info!(addr = %socket.local_addr()?, "relay bound");
        Ok(Self::from_socket(socket, None))
    }

    /// Socket that sends to `127.0.0.1:port`.
    pub fn sender(port: u16) -> Result<Self> {
        let addr = loopback(0);
        let socket = UdpSocket::bind(addr).map_err(|source| ReceiverError::Bind { addr, source })?;
        Ok(Self::from_socket(socket, Some(loopback(port))))
    }

    fn from_socket(socket: UdpSocket, target: Option<SocketAddr>) -> Self {
        Self {
            socket,
            target,
            sent: AtomicU64::new(0),
            send_errors: AtomicU64::new(0),
        }
    }

    /// Send one datagram. Failures are logged and counted, never returned.
    pub fn send(&self, payload: &[u8]) {
        let Some(target) = self.target else {
            debug!("relay has no target; datagram dropped");
            return;
        };
        match self.socket.send_to(payload, target) {
            Ok(_) => {
                self.sent.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                self.send_errors.fetch_add(1, Ordering::Relaxed);
                debug!(%target, error = %err, "relay send failed");
            }
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn target(&self) -> Option<SocketAddr> {
        self.target
    }

    /// Datagrams handed to the socket.
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn send_errors(&self) -> u64 {
        self.send_errors.load(Ordering::Relaxed)
    }

    /// Run `on_datagram` for every datagram received, on a `relay` thread.
    pub fn spawn_receiver<F>(self, mut on_datagram: F) -> Result<RelayReceiver>
    where
        F: FnMut(Bytes) + Send + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let (done_tx, done) = mpsc::channel();
        let addr = self.local_addr()?;
        let flag = Arc::clone(&shutdown);

        let handle = thread::Builder::new()
            .name("relay".into())
            .spawn(move || {
                let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
                while !flag.load(Ordering::Acquire) {
                    match self.socket.recv_from(&mut buf) {
                        Ok((len, _from)) => on_datagram(Bytes::copy_from_slice(&buf[..len])),
                        Err(err)
                            if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
                        Err(err) => {
                            warn!(error = %err, "relay receive failed");
                            thread::sleep(RELAY_READ_TIMEOUT);
                        }
                    }
                }
                let _ = done_tx.send(());
            })
            .map_err(ReceiverError::Spawn)?;

        Ok(RelayReceiver {
            addr,
            shutdown,
            worker: Some((handle, done)),
        })
    }
}

fn loopback(port: u16) -> SocketAddr {
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port))
}

/// Handle to a running relay receive thread. Dropping it stops the thread.
#[derive(Debug)]
pub struct RelayReceiver {
    addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    worker: Option<(JoinHandle<()>, mpsc::Receiver<()>)>,
}

impl RelayReceiver {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop the receive thread, waiting at most one socket timeout past the
    /// current read.
    pub fn stop(&mut self) -> Result<()> {
        let Some((handle, done)) = self.worker.take() else {
            return Ok(());
        };
        self.shutdown.store(true, Ordering::Release);
        let wait = RELAY_READ_TIMEOUT * 2;
        match done.recv_timeout(wait) {
            Ok(()) => {
                if handle.join().is_err() {
                    return Err(ReceiverError::WorkerPanicked);
                }
                debug!(addr = %self.addr, "relay stopped");
                Ok(())
            }
            Err(RecvTimeoutError::Disconnected) => {
                let _ = handle.join();
                Err(ReceiverError::WorkerPanicked)
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(addr = %self.addr, "relay thread did not stop in time; detaching");
                Err(ReceiverError::JoinTimeout(wait))
            }
        }
    }
}

impl Drop for RelayReceiver {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            warn!(error = %err, "relay did not shut down cleanly");
        }
    }
}
