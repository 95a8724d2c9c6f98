use std::fs::File;
use std::io::{BufReader, Read};

use serialpose_frame::{FrameError, FrameReader};
use serialpose_receiver::{DatagramRelay, ReceiverStatsSnapshot};
use serialpose_record::PoseRecord;
use tracing::{debug, info};

use crate::cmd::ReplayArgs;
use crate::exit::{frame_error, io_error, receiver_error, CliResult, SUCCESS};
use crate::output::{print_record, print_stats, OutputFormat};

/// Caps every read at `limit` bytes, to replay a log the way a slow link
/// would deliver it.
struct Chunked<R> {
    inner: R,
    limit: usize,
}

impl<R: Read> Read for Chunked<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = buf.len().min(self.limit);
        self.inner.read(&mut buf[..n])
    }
}

pub fn run(args: ReplayArgs, format: OutputFormat) -> CliResult<i32> {
    let file = File::open(&args.file)
        .map_err(|err| io_error(&format!("failed opening {}", args.file.display()), err))?;
    let source = args.file.display().to_string();

    let relay = args
        .relay_port
        .map(DatagramRelay::sender)
        .transpose()
        .map_err(|err| receiver_error("relay setup failed", err))?;

    let input: Box<dyn Read> = match args.chunk_size {
        Some(limit) => Box::new(Chunked {
            inner: BufReader::new(file),
            limit: usize::try_from(limit).unwrap_or(usize::MAX),
        }),
        None => Box::new(BufReader::new(file)),
    };
    let reader = FrameReader::with_capacity(input, args.buffer_size)
        .map_err(|err| frame_error("invalid buffer size", err))?;

    let stats = replay(reader, |record| {
        if let Some(relay) = &relay {
            relay.send(&record.encode_to_vec());
        }
        print_record(record, &source, format);
    })
    .map_err(|err| frame_error(&format!("failed reading {source}"), err))?;

    info!(
        records = stats.records_published,
        faults = stats.total_faults(),
        "replay finished"
    );
    if args.summary {
        print_stats(&stats, format);
    }
    Ok(SUCCESS)
}

/// Decode every record in `reader`, in stream order.
fn replay<R: Read>(
    mut reader: FrameReader<R>,
    mut on_record: impl FnMut(&PoseRecord),
) -> Result<ReceiverStatsSnapshot, FrameError> {
    let mut stats = ReceiverStatsSnapshot::default();
    loop {
        let payload = match reader.read_frame() {
            Ok(payload) => payload,
            Err(FrameError::EndOfStream) => break,
            Err(err) => return Err(err),
        };
        match PoseRecord::decode(&payload) {
            Ok(record) => {
                stats.records_published += 1;
                on_record(&record);
            }
            Err(err) => {
                stats.record_faults += 1;
                debug!(error = %err, len = payload.len(), "skipping record");
            }
        }
    }

    let partial = reader.partial_frame().len();
    if partial > 0 {
        debug!(bytes = partial, "log ends inside a frame");
    }

    let frames = reader.stats();
    stats.bytes_received = frames.bytes;
    stats.frames_decoded = frames.frames;
    stats.desync_faults = frames.desync_faults;
    stats.empty_frames = frames.empty_frames;
    stats.integrity_faults = frames.integrity_faults;
    stats.overflow_discards = frames.overflows;
    stats.rotations = frames.rotations;
    Ok(stats)
}
