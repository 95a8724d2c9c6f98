use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use serialpose_frame::{DEFAULT_CAPACITY, MAX_CAPACITY, MIN_CAPACITY};
use serialpose_transport::LinkConfig;

use crate::exit::{CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod listen;
pub mod monitor;
pub mod ports;
pub mod replay;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Receive records from a serial device and print them.
    Listen(ListenArgs),
    /// Decode a raw log file written by `listen`.
    Replay(ReplayArgs),
    /// Print records relayed to a loopback UDP port.
    Monitor(MonitorArgs),
    /// List serial ports.
    Ports(PortsArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Listen(args) => listen::run(args, format),
        Command::Replay(args) => replay::run(args, format),
        Command::Monitor(args) => monitor::run(args, format),
        Command::Ports(args) => ports::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

fn parse_capacity(input: &str) -> Result<usize, String> {
    let value: usize = input.parse().map_err(|_| format!("not a number: {input}"))?;
    if (MIN_CAPACITY..=MAX_CAPACITY).contains(&value) {
        Ok(value)
    } else {
        Err(format!("must be within {MIN_CAPACITY}..={MAX_CAPACITY}"))
    }
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Serial device (e.g. /dev/ttyACM0, COM3).
    pub device: String,
    /// Baud rate.
    #[arg(long, default_value_t = LinkConfig::DEFAULT_BAUD_RATE)]
    pub baud: u32,
    /// Working buffer size in bytes.
    #[arg(long, default_value_t = DEFAULT_CAPACITY, value_parser = parse_capacity)]
    pub buffer_size: usize,
    /// Directory for the raw stream log.
    #[arg(long, value_name = "DIR", default_value = ".", env = "SERIALPOSE_LOG_DIR")]
    pub log_dir: PathBuf,
    /// Raw log file prefix (files are named PREFIX0.log, PREFIX1.log, ...).
    #[arg(long, default_value = "pose")]
    pub log_prefix: String,
    /// How often to take the latest record (e.g. 20ms, 1s).
    #[arg(long, default_value = "10ms")]
    pub poll_interval: String,
    /// Exit after printing N records.
    #[arg(long)]
    pub count: Option<usize>,
    /// Forward each record to this loopback UDP port.
    #[arg(long, value_name = "PORT")]
    pub relay_port: Option<u16>,
    /// Give up when no record arrives for this long (e.g. 5s, 500ms).
    #[arg(long)]
    pub timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Raw log file.
    pub file: PathBuf,
    /// Working buffer size in bytes.
    #[arg(long, default_value_t = DEFAULT_CAPACITY, value_parser = parse_capacity)]
    pub buffer_size: usize,
    /// Feed the decoder at most this many bytes per read.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub chunk_size: Option<u64>,
    /// Forward each record to this loopback UDP port.
    #[arg(long, value_name = "PORT")]
    pub relay_port: Option<u16>,
    /// Print a summary of frame and record counters at the end.
    #[arg(long)]
    pub summary: bool,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Loopback UDP port to listen on.
    pub port: u16,
    /// Exit after printing N records.
    #[arg(long)]
    pub count: Option<usize>,
    /// Give up when no datagram arrives for this long (e.g. 5s, 500ms).
    #[arg(long)]
    pub timeout: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct PortsArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

pub(crate) fn parse_optional_duration(input: Option<&str>) -> CliResult<Option<Duration>> {
    input.map(parse_duration).transpose()
}

/// Flag cleared by Ctrl-C.
pub(crate) fn install_ctrlc_handler() -> CliResult<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        flag.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))?;
    Ok(running)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration(" 3 ").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_garbage() {
        assert_eq!(parse_duration("").unwrap_err().code, USAGE);
        assert_eq!(parse_duration("0ms").unwrap_err().code, USAGE);
        assert_eq!(parse_duration("fast").unwrap_err().code, USAGE);
    }

    #[test]
    fn capacity_bounds() {
        assert_eq!(parse_capacity("64"), Ok(64));
        assert!(parse_capacity("7").is_err());
        assert!(parse_capacity("256").is_err());
        assert!(parse_capacity("lots").is_err());
    }
}
