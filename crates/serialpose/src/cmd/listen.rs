use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use serialpose_receiver::{DatagramRelay, LinkReceiver, ReceiverConfig};
use serialpose_record::PoseRecord;
use serialpose_transport::{Connector, LinkConfig, SerialConnector};
use tracing::info;

use crate::cmd::{install_ctrlc_handler, parse_duration, parse_optional_duration, ListenArgs};
use crate::exit::{io_error, receiver_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_record, print_stats, OutputFormat};

/// Why the consume loop ended.
#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    Interrupted,
    CountReached,
    Idle(Duration),
}

struct Limits {
    poll_interval: Duration,
    count: Option<usize>,
    idle_timeout: Option<Duration>,
}

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let limits = Limits {
        poll_interval: parse_duration(&args.poll_interval)?,
        count: args.count,
        idle_timeout: parse_optional_duration(args.timeout.as_deref())?,
    };

    std::fs::create_dir_all(&args.log_dir).map_err(|err| {
        io_error(
            &format!("failed creating log directory {}", args.log_dir.display()),
            err,
        )
    })?;

    let config = ReceiverConfig::new(LinkConfig::new(args.device.clone(), args.baud))
        .with_buffer_capacity(args.buffer_size)
        .with_log_dir(&args.log_dir)
        .with_log_prefix(&args.log_prefix);

    let relay = args
        .relay_port
        .map(DatagramRelay::sender)
        .transpose()
        .map_err(|err| receiver_error("relay setup failed", err))?;

    let mut receiver = LinkReceiver::new(SerialConnector, config)
        .map_err(|err| receiver_error("receiver setup failed", err))?;
    info!(log = %receiver.log_path().display(), "logging raw stream");
    receiver
        .start()
        .map_err(|err| receiver_error("failed to open device", err))?;

    let running = install_ctrlc_handler()?;
    let outcome = consume(&receiver, &limits, &running, |record| {
        if let Some(relay) = &relay {
            relay.send(&record.encode_to_vec());
        }
        print_record(record, &args.device, format);
    });

    let stop = receiver.stop();
    let stats = receiver.stats();
    if let Some(build) = receiver.firmware_build() {
        info!(build, "session firmware");
    }
    info!(
        records = stats.records_published,
        faults = stats.total_faults(),
        bytes = stats.bytes_received,
        "listen finished"
    );
    if matches!(format, OutputFormat::Table | OutputFormat::Pretty) {
        print_stats(&stats, format);
    }
    stop.map_err(|err| receiver_error("shutdown failed", err))?;

    match outcome {
        Outcome::Idle(waited) => Err(CliError::new(
            TIMEOUT,
            format!("no record received within {waited:?}"),
        )),
        Outcome::Interrupted | Outcome::CountReached => Ok(SUCCESS),
    }
}

/// Poll the receiver until interrupted, `count` records were handled, or no
/// record arrived for `idle_timeout`.
fn consume<C: Connector>(
    receiver: &LinkReceiver<C>,
    limits: &Limits,
    running: &AtomicBool,
    mut on_record: impl FnMut(&PoseRecord),
) -> Outcome {
    let mut handled = 0usize;
    let mut last_record = Instant::now();

    while running.load(Ordering::SeqCst) {
        if let Some(record) = receiver.take_latest_record() {
            on_record(&record);
            handled = handled.saturating_add(1);
            last_record = Instant::now();
            if limits.count.is_some_and(|count| handled >= count) {
                return Outcome::CountReached;
            }
        } else if let Some(idle) = limits.idle_timeout {
            if last_record.elapsed() >= idle {
                return Outcome::Idle(idle);
            }
        }
        thread::sleep(limits.poll_interval);
    }
    Outcome::Interrupted
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use serialpose_frame::encode_frame;
    use serialpose_record::Pose;
    use serialpose_transport::MemoryConnector;

    use super::*;

    fn temp_dir(tag: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("serialpose-cli-{tag}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir
    }

    fn receiver(tag: &str, link: &MemoryConnector) -> (LinkReceiver<MemoryConnector>, std::path::PathBuf) {
        let dir = temp_dir(tag);
        let config = ReceiverConfig::new(LinkConfig::new("mem0", 115_200)).with_log_dir(&dir);
        let mut receiver = LinkReceiver::new(link.clone(), config).expect("receiver should build");
        receiver.start().expect("receiver should start");
        (receiver, dir)
    }

    fn framed(timestamp: u32) -> Vec<u8> {
        let record = PoseRecord::new(timestamp, Pose::default());
        let mut buf = BytesMut::new();
        encode_frame(&record.encode_to_vec(), &mut buf);
        buf.to_vec()
    }

    #[test]
    fn stops_after_count() {
        let link = MemoryConnector::new();
        let (mut receiver, dir) = receiver("count", &link);
        let limits = Limits {
            poll_interval: Duration::from_millis(1),
            count: Some(2),
            idle_timeout: Some(Duration::from_secs(5)),
        };

        let feeder = {
            let link = link.clone();
            thread::spawn(move || {
                for t in 1..=5 {
                    link.push(framed(t));
                    thread::sleep(Duration::from_millis(20));
                }
            })
        };

        let mut seen = Vec::new();
        let outcome = consume(&receiver, &limits, &AtomicBool::new(true), |r| {
            seen.push(r.timestamp)
        });

        assert_eq!(outcome, Outcome::CountReached);
        assert_eq!(seen.len(), 2);
        assert!(seen[0] < seen[1]);

        feeder.join().unwrap();
        receiver.stop().unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn idle_timeout_fires_without_records() {
        let link = MemoryConnector::new();
        let (mut receiver, dir) = receiver("idle", &link);
        let limits = Limits {
            poll_interval: Duration::from_millis(1),
            count: None,
            idle_timeout: Some(Duration::from_millis(30)),
        };

        let outcome = consume(&receiver, &limits, &AtomicBool::new(true), |_| {
            panic!("no record expected")
        });
        assert_eq!(outcome, Outcome::Idle(Duration::from_millis(30)));

        receiver.stop().unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn cleared_flag_interrupts() {
        let link = MemoryConnector::new();
        let (mut receiver, dir) = receiver("interrupt", &link);
        let limits = Limits {
            poll_interval: Duration::from_millis(1),
            count: None,
            idle_timeout: None,
        };

        let outcome = consume(&receiver, &limits, &AtomicBool::new(false), |_| {});
        assert_eq!(outcome, Outcome::Interrupted);

        receiver.stop().unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }
}
