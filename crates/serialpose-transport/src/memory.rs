use std::collections::VecDeque;
use std::io::ErrorKind;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::{Connector, Link, LinkConfig};

/// Scripted in-memory link source.
///
/// Every pushed chunk is served by at most one `read` call, so tests control
/// exactly how the byte stream is fragmented. Clones share the same script.
#[derive(Clone, Default)]
pub struct MemoryConnector {
    shared: Arc<Mutex<Script>>,
}

#[derive(Default)]
struct Script {
    chunks: VecDeque<Vec<u8>>,
    generation: u64,
    connected: bool,
    opens: usize,
    failing_opens: usize,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one chunk; it is delivered by a single read (split only if the
    /// reader's buffer is smaller).
    pub fn push(&self, chunk: impl Into<Vec<u8>>) {
        let chunk = chunk.into();
        if chunk.is_empty() {
            return;
        }
        self.script().chunks.push_back(chunk);
    }

    /// Queue `bytes` as chunks of at most `chunk_size` bytes.
    pub fn push_chunked(&self, bytes: &[u8], chunk_size: usize) {
        for chunk in bytes.chunks(chunk_size.max(1)) {
            self.push(chunk.to_vec());
        }
    }

    /// Drop the current link, as if the device were unplugged.
    pub fn disconnect(&self) {
        self.script().connected = false;
    }

    /// Make the next `count` open attempts fail.
    pub fn fail_next_opens(&self, count: usize) {
        self.script().failing_opens = count;
    }

    /// Number of open attempts so far, failed ones included.
    pub fn open_count(&self) -> usize {
        self.script().opens
    }

    /// Bytes queued but not yet read.
    pub fn pending_bytes(&self) -> usize {
        self.script().chunks.iter().map(Vec::len).sum()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Connector for MemoryConnector {
    type Link = MemoryLink;

    fn open(&self, config: &LinkConfig) -> Result<MemoryLink> {
        config.validate()?;
        let mut script = self.script();
        script.opens += 1;
        if script.failing_opens > 0 {
            script.failing_opens -= 1;
            return Err(TransportError::Open {
                device: config.device.clone(),
                baud_rate: config.baud_rate,
                source: std::io::Error::new(ErrorKind::NotFound, "scripted open failure"),
            });
        }
        script.generation += 1;
        script.connected = true;
        debug!(device = %config.device, generation = script.generation, "opened memory link");
        Ok(MemoryLink {
            shared: Arc::clone(&self.shared),
            generation: script.generation,
        })
    }
}

/// Link handed out by [`MemoryConnector`].
pub struct MemoryLink {
    shared: Arc<Mutex<Script>>,
    generation: u64,
}

impl MemoryLink {
    fn script(&self) -> MutexGuard<'_, Script> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Link for MemoryLink {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut script = self.script();
        if !script.connected || script.generation != self.generation {
            return Err(std::io::Error::from(ErrorKind::NotConnected));
        }
        if buf.is_empty() {
            return Ok(0);
        }
        let Some(mut chunk) = script.chunks.pop_front() else {
            return Err(std::io::Error::from(ErrorKind::TimedOut));
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            chunk.drain(..n);
            script.chunks.push_front(chunk);
        }
        Ok(n)
    }

    fn bytes_to_read(&mut self) -> std::io::Result<usize> {
        let script = self.script();
        if !script.connected || script.generation != self.generation {
            return Err(std::io::Error::from(ErrorKind::NotConnected));
        }
        Ok(script.chunks.iter().map(Vec::len).sum())
    }

    fn is_open(&self) -> bool {
        let script = self.script();
        script.connected && script.generation == self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LinkConfig {
        LinkConfig::new("memory", 115_200)
    }

    #[test]
    fn reads_follow_pushed_chunks() {
        let connector = MemoryConnector::new();
        connector.push(vec![1, 2, 3]);
        connector.push(vec![4]);

        let mut link = connector.open(&config()).unwrap();
        assert_eq!(link.bytes_to_read().unwrap(), 4);

        let mut buf = [0u8; 8];
        assert_eq!(link.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);
        assert_eq!(link.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 4);
    }

    #[test]
    fn short_buffer_splits_chunk() {
        let connector = MemoryConnector::new();
        connector.push(vec![9, 8, 7, 6]);
        let mut link = connector.open(&config()).unwrap();

        let mut buf = [0u8; 3];
        assert_eq!(link.read(&mut buf).unwrap(), 3);
        assert_eq!(buf, [9, 8, 7]);
        assert_eq!(link.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 6);
    }

    #[test]
    fn empty_script_times_out() {
        let connector = MemoryConnector::new();
        let mut link = connector.open(&config()).unwrap();
        let err = link.read(&mut [0u8; 4]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TimedOut);
    }

    #[test]
    fn disconnect_closes_current_link_until_reopened() {
        let connector = MemoryConnector::new();
        let mut first = connector.open(&config()).unwrap();
        connector.disconnect();

        assert!(!first.is_open());
        assert_eq!(
            first.read(&mut [0u8; 1]).unwrap_err().kind(),
            ErrorKind::NotConnected
        );

        let second = connector.open(&config()).unwrap();
        assert!(second.is_open());
        assert!(!first.is_open(), "stale link must stay closed");
        assert_eq!(connector.open_count(), 2);
    }

    #[test]
    fn scripted_open_failures() {
        let connector = MemoryConnector::new();
        connector.fail_next_opens(2);

        assert!(matches!(
            connector.open(&config()),
            Err(TransportError::Open { .. })
        ));
        assert!(connector.open(&config()).is_err());
        assert!(connector.open(&config()).is_ok());
        assert_eq!(connector.open_count(), 3);
    }

    #[test]
    fn push_chunked_and_pending_bytes() {
        let connector = MemoryConnector::new();
        connector.push_chunked(&[0u8; 10], 3);
        assert_eq!(connector.pending_bytes(), 10);

        let mut link = connector.open(&config()).unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(link.read(&mut buf).unwrap(), 3);
        assert_eq!(connector.pending_bytes(), 7);
    }
}
