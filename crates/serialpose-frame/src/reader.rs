use std::collections::VecDeque;
use std::io::{ErrorKind, Read};

use bytes::Bytes;

use crate::error::{FrameError, Result};
use crate::reassembler::{FrameHandler, ReassemblyStats, StreamReassembler};

/// Reads unstuffed frames from any `Read` stream.
///
/// Handles partial reads and resynchronization internally. Faulty frames are
/// counted in [`stats`](Self::stats) and skipped; callers only see payloads.
pub struct FrameReader<R> {
    inner: R,
    reassembler: StreamReassembler,
    ready: Ready,
}

#[derive(Default)]
struct Ready {
    frames: VecDeque<Bytes>,
}

impl FrameHandler for Ready {
    fn on_frame(&mut self, payload: &[u8]) {
        self.frames.push_back(Bytes::copy_from_slice(payload));
    }
}

impl<R: Read> FrameReader<R> {
    /// Create a frame reader with the default working buffer size.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            reassembler: StreamReassembler::default(),
            ready: Ready::default(),
        }
    }

    /// Create a frame reader whose working buffers hold `capacity` bytes.
    pub fn with_capacity(inner: R, capacity: usize) -> Result<Self> {
        Ok(Self {
            inner,
            reassembler: StreamReassembler::new(capacity)?,
            ready: Ready::default(),
        })
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::EndOfStream)` once the stream is exhausted.
    /// Bytes after the last delimiter are left in
    /// [`partial_frame`](Self::partial_frame).
    pub fn read_frame(&mut self) -> Result<Bytes> {
        loop {
            if let Some(frame) = self.ready.frames.pop_front() {
                return Ok(frame);
            }

            let read = match self.inner.read(self.reassembler.spare_mut()) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::EndOfStream);
            }

            self.reassembler.commit(read, &mut self.ready);
        }
    }

    /// Bytes received after the last delimiter.
    pub fn partial_frame(&self) -> &[u8] {
        self.reassembler.partial_frame()
    }

    /// Reassembly counters so far.
    pub fn stats(&self) -> ReassemblyStats {
        self.reassembler.stats()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Iterator for FrameReader<R> {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_frame() {
            Err(FrameError::EndOfStream) => None,
            other => Some(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BytesMut;

    use super::*;
    use crate::cobs::encode_frame;

    fn wire(payloads: &[&[u8]]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for payload in payloads {
            encode_frame(payload, &mut buf);
        }
        buf.to_vec()
    }

    #[test]
    fn read_single_frame() {
        let mut reader = FrameReader::new(Cursor::new(wire(&[b"hello"])));
        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.as_ref(), b"hello");
    }

    #[test]
    fn read_multiple_frames() {
        let mut reader = FrameReader::new(Cursor::new(wire(&[b"one", b"two", b"three"])));

        assert_eq!(reader.read_frame().unwrap().as_ref(), b"one");
        assert_eq!(reader.read_frame().unwrap().as_ref(), b"two");
        assert_eq!(reader.read_frame().unwrap().as_ref(), b"three");
        assert!(matches!(reader.read_frame(), Err(FrameError::EndOfStream)));
    }

    #[test]
    fn long_stream_spans_many_rotations() {
        let payloads: Vec<Vec<u8>> = (0..200u32)
            .map(|i| i.to_le_bytes().iter().chain(b"pose").copied().collect())
            .collect();
        let refs: Vec<&[u8]> = payloads.iter().map(Vec::as_slice).collect();

        let reader = FrameReader::with_capacity(Cursor::new(wire(&refs)), 16).unwrap();
        let frames: Vec<Bytes> = reader.map(|f| f.unwrap()).collect();

        assert_eq!(frames.len(), payloads.len());
        for (frame, payload) in frames.iter().zip(&payloads) {
            assert_eq!(frame.as_ref(), payload.as_slice());
        }
    }

    #[test]
    fn partial_read_handling() {
        let byte_reader = ByteByByteReader {
            bytes: wire(&[b"slow"]),
            pos: 0,
        };
        let mut reader = FrameReader::new(byte_reader);

        assert_eq!(reader.read_frame().unwrap().as_ref(), b"slow");
    }

    #[test]
    fn interrupted_reads_are_retried() {
        let inner = InterruptOnce {
            inner: Cursor::new(wire(&[b"again"])),
            interrupted: false,
        };
        let mut reader = FrameReader::new(inner);

        assert_eq!(reader.read_frame().unwrap().as_ref(), b"again");
    }

    #[test]
    fn end_of_stream_cleanly() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::EndOfStream));
    }

    #[test]
    fn end_of_stream_mid_frame_keeps_partial_bytes() {
        let mut bytes = wire(&[b"whole"]);
        bytes.extend_from_slice(&[0x04, b'c', b'u']);
        let mut reader = FrameReader::new(Cursor::new(bytes));

        assert_eq!(reader.read_frame().unwrap().as_ref(), b"whole");
        assert!(matches!(reader.read_frame(), Err(FrameError::EndOfStream)));
        assert_eq!(reader.partial_frame(), &[0x04, b'c', b'u']);
    }

    #[test]
    fn faulty_frames_are_skipped_and_counted() {
        let mut bytes = vec![0x20, 0x01, 0x00];
        bytes.extend(wire(&[b"fine"]));
        let mut reader = FrameReader::new(Cursor::new(bytes));

        assert_eq!(reader.read_frame().unwrap().as_ref(), b"fine");
        assert_eq!(reader.stats().desync_faults, 1);
        assert_eq!(reader.stats().frames, 1);
    }

    #[test]
    fn io_error_is_surfaced() {
        let mut reader = FrameReader::new(FailingReader);
        assert!(matches!(reader.read_frame(), Err(FrameError::Io(_))));
    }

    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() {
                return Ok(0);
            }
            if buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct InterruptOnce {
        inner: Cursor<Vec<u8>>,
        interrupted: bool,
    }

    impl Read for InterruptOnce {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.inner.read(buf)
        }
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("wire unplugged"))
        }
    }
}
