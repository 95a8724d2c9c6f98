use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use serialpose_receiver::DatagramRelay;
use serialpose_record::PoseRecord;
use tracing::{debug, info};

use crate::cmd::{install_ctrlc_handler, parse_optional_duration, MonitorArgs};
use crate::exit::{receiver_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_record, OutputFormat};

/// Granularity of Ctrl-C and timeout checks.
const WAKE_INTERVAL: Duration = Duration::from_millis(100);

pub fn run(args: MonitorArgs, format: OutputFormat) -> CliResult<i32> {
    let idle_timeout = parse_optional_duration(args.timeout.as_deref())?;
    let relay = DatagramRelay::bind_loopback(args.port)
        .map_err(|err| receiver_error("relay bind failed", err))?;
    let source = relay
        .local_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| format!("127.0.0.1:{}", args.port));

    let (tx, rx) = mpsc::channel();
    let mut receiver = relay
        .spawn_receiver(move |datagram| {
            let _ = tx.send(datagram);
        })
        .map_err(|err| receiver_error("relay start failed", err))?;
    info!(addr = %source, "monitoring relay");

    let running = install_ctrlc_handler()?;
    let mut printed = 0usize;
    let mut last_datagram = Instant::now();
    let mut result = Ok(SUCCESS);

    while running.load(Ordering::SeqCst) {
        match rx.recv_timeout(WAKE_INTERVAL) {
            Ok(datagram) => {
                last_datagram = Instant::now();
                match PoseRecord::decode(&datagram) {
                    Ok(record) => {
                        print_record(&record, &source, format);
                        printed = printed.saturating_add(1);
                    }
                    Err(err) => debug!(error = %err, len = datagram.len(), "ignoring datagram"),
                }
                if args.count.is_some_and(|count| printed >= count) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if let Some(idle) = idle_timeout {
                    if last_datagram.elapsed() >= idle {
                        result = Err(CliError::new(
                            TIMEOUT,
                            format!("no datagram received within {idle:?}"),
                        ));
                        break;
                    }
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    receiver
        .stop()
        .map_err(|err| receiver_error("relay shutdown failed", err))?;
    result
}
