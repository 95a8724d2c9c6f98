use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serialpose_receiver::ReceiverStatsSnapshot;
use serialpose_record::PoseRecord;
use serialpose_transport::PortSummary;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    /// Encoded record bytes, one datagram-sized message per record.
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct RecordOutput<'a> {
    source: &'a str,
    #[serde(flatten)]
    record: &'a PoseRecord,
    received_at: u64,
}

const RECORD_HEADER: [&str; 9] = [
    "TIMESTAMP", "X", "Y", "REAR WHEEL", "PITCH", "YAW", "ROLL", "STEER", "BUILD",
];

fn record_row(record: &PoseRecord) -> Vec<String> {
    let p = &record.pose;
    let mut row = vec![record.timestamp.to_string()];
    row.extend(
        [p.x, p.y, p.rear_wheel, p.pitch, p.yaw, p.roll, p.steer]
            .iter()
            .map(|v| format!("{v:.4}")),
    );
    row.push(record.build.clone().unwrap_or_else(|| "-".to_string()));
    row
}

/// Print one record. `source` names where it came from (device, file, port).
pub fn print_record(record: &PoseRecord, source: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = RecordOutput {
                source,
                record,
                received_at: now_unix_millis(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(RECORD_HEADER.to_vec())
                .add_row(record_row(record));
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let p = &record.pose;
            println!(
                "t={} x={:.3} y={:.3} yaw={:.3} pitch={:.3} roll={:.3} steer={:.3} wheel={:.3}",
                record.timestamp, p.x, p.y, p.yaw, p.pitch, p.roll, p.steer, p.rear_wheel
            );
        }
        OutputFormat::Raw => {
            print_raw(&record.encode_to_vec());
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// Print end-of-session counters. Raw output gets none.
pub fn print_stats(stats: &ReceiverStatsSnapshot, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct StatsOutput<'a> {
                summary: &'a ReceiverStatsSnapshot,
            }
            println!(
                "{}",
                serde_json::to_string(&StatsOutput { summary: stats })
                    .unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_header(vec!["COUNTER", "VALUE"]);
            for (name, value) in stat_rows(stats) {
                table.add_row(vec![name.to_string(), value.to_string()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let line: Vec<String> = stat_rows(stats)
                .into_iter()
                .filter(|(_, value)| *value > 0)
                .map(|(name, value)| format!("{name}={value}"))
                .collect();
            println!("summary: {}", line.join(" "));
        }
        OutputFormat::Raw => {}
    }
}

fn stat_rows(stats: &ReceiverStatsSnapshot) -> [(&'static str, u64); 11] {
    [
        ("bytes_received", stats.bytes_received),
        ("frames_decoded", stats.frames_decoded),
        ("records_published", stats.records_published),
        ("records_superseded", stats.records_superseded),
        ("desync_faults", stats.desync_faults),
        ("empty_frames", stats.empty_frames),
        ("integrity_faults", stats.integrity_faults),
        ("overflow_discards", stats.overflow_discards),
        ("record_faults", stats.record_faults),
        ("rotations", stats.rotations),
        ("log_write_errors", stats.log_write_errors),
    ]
}

#[derive(Serialize)]
struct PortOutput<'a> {
    name: &'a str,
    kind: &'a str,
    description: Option<&'a str>,
}

pub fn print_ports(ports: &[PortSummary], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out: Vec<PortOutput<'_>> = ports
                .iter()
                .map(|p| PortOutput {
                    name: &p.name,
                    kind: p.kind,
                    description: p.description.as_deref(),
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "[]".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PORT", "TYPE", "DESCRIPTION"]);
            for port in ports {
                table.add_row(vec![
                    port.name.clone(),
                    port.kind.to_string(),
                    port.description.clone().unwrap_or_default(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for port in ports {
                match &port.description {
                    Some(desc) => println!("{}\t{}\t{}", port.name, port.kind, desc),
                    None => println!("{}\t{}", port.name, port.kind),
                }
            }
        }
    }
}

fn now_unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
