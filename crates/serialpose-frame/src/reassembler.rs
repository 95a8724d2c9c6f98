use tracing::{debug, trace};

use crate::cobs::{unstuff, DELIMITER};
use crate::error::{FrameError, Result};

/// Default working buffer size. Holds one framed pose record with room to
/// spare.
pub const DEFAULT_CAPACITY: usize = 64;

/// Smallest supported working buffer.
pub const MIN_CAPACITY: usize = 8;

/// Largest supported working buffer. Keeps every frame shorter than a full
/// 0xFF stuffing group, so the unstuffed length check always applies.
pub const MAX_CAPACITY: usize = 255;

/// Receives the results of reassembly.
pub trait FrameHandler {
    /// A frame was unstuffed. `payload` is only valid for this call.
    fn on_frame(&mut self, payload: &[u8]);

    /// A frame could not be decoded; scanning continues at the next delimiter.
    fn on_fault(&mut self, _fault: &FrameError) {}

    /// `segment` was fully consumed and is about to be overwritten.
    fn on_rotate(&mut self, _segment: &[u8]) {}
}

/// Counters kept by a [`StreamReassembler`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReassemblyStats {
    pub bytes: u64,
    pub frames: u64,
    pub desync_faults: u64,
    pub integrity_faults: u64,
    pub empty_frames: u64,
    pub overflows: u64,
    pub rotations: u64,
}

/// Double-buffered delimiter scanner.
///
/// Bytes land in the active slot, either read directly into
/// [`spare_mut`](Self::spare_mut) and announced with [`commit`](Self::commit),
/// or copied in by [`feed`](Self::feed). Frames are unstuffed into the inactive
/// slot, never in place. When the active slot is full, the partial frame at
/// its tail moves to the inactive slot, the slots swap roles, and the consumed
/// head is handed to [`FrameHandler::on_rotate`].
pub struct StreamReassembler {
    slots: [Box<[u8]>; 2],
    active: usize,
    fill: usize,
    frame_start: usize,
    unstuffed: Option<usize>,
    stats: ReassemblyStats,
}

impl StreamReassembler {
    /// Create a reassembler with two working buffers of `capacity` bytes.
    pub fn new(capacity: usize) -> Result<Self> {
        if !(MIN_CAPACITY..=MAX_CAPACITY).contains(&capacity) {
            return Err(FrameError::InvalidCapacity {
                capacity,
                min: MIN_CAPACITY,
                max: MAX_CAPACITY,
            });
        }
        Ok(Self::allocate(capacity))
    }

    fn allocate(capacity: usize) -> Self {
        Self {
            slots: [
                vec![0u8; capacity].into_boxed_slice(),
                vec![0u8; capacity].into_boxed_slice(),
            ],
            active: 0,
            fill: 0,
            frame_start: 0,
            unstuffed: None,
            stats: ReassemblyStats::default(),
        }
    }

    /// Size of each working buffer.
    pub fn capacity(&self) -> usize {
        self.slots[0].len()
    }

    /// Free tail of the active buffer. Never empty between calls.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        let fill = self.fill;
        &mut self.slots[self.active][fill..]
    }

    /// Number of bytes [`spare_mut`](Self::spare_mut) currently offers.
    pub fn spare_len(&self) -> usize {
        self.capacity() - self.fill
    }

    /// Account for `count` bytes just written into the spare region and
    /// dispatch every frame they complete.
    pub fn commit<H: FrameHandler + ?Sized>(&mut self, count: usize, handler: &mut H) {
        let count = count.min(self.spare_len());
        if count == 0 {
            return;
        }

        let mut scan = self.fill;
        let end = self.fill + count;
        self.fill = end;
        self.stats.bytes += count as u64;

        loop {
            let Some(pos) = self.slots[self.active][scan..end]
                .iter()
                .position(|&b| b == DELIMITER)
            else {
                break;
            };
            let delimiter = scan + pos;
            self.decode(delimiter, handler);
            self.frame_start = delimiter + 1;
            scan = delimiter + 1;
        }

        if self.fill == self.capacity() {
            self.rotate(handler);
        }
    }

    /// Copy `bytes` in, committing as the active buffer allows.
    pub fn feed<H: FrameHandler + ?Sized>(&mut self, mut bytes: &[u8], handler: &mut H) {
        while !bytes.is_empty() {
            let spare = self.spare_mut();
            let n = spare.len().min(bytes.len());
            spare[..n].copy_from_slice(&bytes[..n]);
            self.commit(n, handler);
            bytes = &bytes[n..];
        }
    }

    /// Bytes in the active buffer that have not been rotated out yet.
    pub fn remainder(&self) -> &[u8] {
        &self.slots[self.active][..self.fill]
    }

    /// Bytes of the frame currently being received.
    pub fn partial_frame(&self) -> &[u8] {
        &self.slots[self.active][self.frame_start..self.fill]
    }

    /// Output of the most recent successful unstuff, unless a rotation has
    /// since reused its buffer.
    pub fn last_unstuffed(&self) -> Option<&[u8]> {
        self.unstuffed.map(|len| &self.slots[self.active ^ 1][..len])
    }

    /// Counters since construction.
    pub fn stats(&self) -> ReassemblyStats {
        self.stats
    }

    fn decode<H: FrameHandler + ?Sized>(&mut self, delimiter: usize, handler: &mut H) {
        let start = self.frame_start;
        let (src, dst) = self.split_slots();
        match unstuff(&src[start..=delimiter], dst) {
            Ok(len) => {
                self.unstuffed = Some(len);
                self.stats.frames += 1;
                trace!(len, "frame unstuffed");
                let payload = &self.slots[self.active ^ 1][..len];
                handler.on_frame(payload);
            }
            Err(fault) => {
                self.unstuffed = None;
                match fault {
                    FrameError::Desync { .. } => self.stats.desync_faults += 1,
                    FrameError::Integrity { .. } => self.stats.integrity_faults += 1,
                    FrameError::EmptyFrame => self.stats.empty_frames += 1,
                    _ => {}
                }
                debug!(%fault, start, delimiter, "dropping frame");
                handler.on_fault(&fault);
            }
        }
    }

    fn rotate<H: FrameHandler + ?Sized>(&mut self, handler: &mut H) {
        self.stats.rotations += 1;
        self.unstuffed = None;

        if self.frame_start == 0 {
            // The whole buffer is one unterminated frame; nothing can complete it.
            let fault = FrameError::Overflow {
                capacity: self.capacity(),
            };
            self.stats.overflows += 1;
            debug!(%fault, "discarding working buffer");
            handler.on_rotate(&self.slots[self.active][..self.fill]);
            handler.on_fault(&fault);
            self.fill = 0;
            return;
        }

        let consumed = self.frame_start;
        let tail = self.fill - consumed;
        let (src, dst) = self.split_slots();
        dst[..tail].copy_from_slice(&src[consumed..]);
        handler.on_rotate(&self.slots[self.active][..consumed]);

        self.active ^= 1;
        self.fill = tail;
        self.frame_start = 0;
        trace!(consumed, tail, "rotated working buffers");
    }

    /// (active, inactive)
    fn split_slots(&mut self) -> (&mut [u8], &mut [u8]) {
        let [first, second] = &mut self.slots;
        if self.active == 0 {
            (&mut first[..], &mut second[..])
        } else {
            (&mut second[..], &mut first[..])
        }
    }
}

impl Default for StreamReassembler {
    fn default() -> Self {
        Self::allocate(DEFAULT_CAPACITY)
    }
}

impl std::fmt::Debug for StreamReassembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamReassembler")
            .field("capacity", &self.capacity())
            .field("active", &self.active)
            .field("fill", &self.fill)
            .field("frame_start", &self.frame_start)
            .field("stats", &self.stats)
            .finish()
    }
}
