#![cfg(all(unix, feature = "cli"))]

use std::net::UdpSocket;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use bytes::BytesMut;
use serialpose::frame::encode_frame;
use serialpose::record::{Pose, PoseRecord};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "spcli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn write_log(dir: &std::path::Path, records: u32) -> PathBuf {
    let mut buf = BytesMut::new();
    for t in 1..=records {
        let record = PoseRecord::new(
            t,
            Pose {
                x: t as f32,
                y: 0.5,
                yaw: 1.25,
                ..Pose::default()
            },
        );
        encode_frame(&record.encode_to_vec(), &mut buf);
    }
    let path = dir.join("pose0.log");
    std::fs::write(&path, &buf).expect("log should be writable");
    path
}

fn serialpose() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_serialpose"));
    cmd.arg("--log-level").arg("error");
    cmd
}

#[test]
fn version_prints_package_version() {
    let output = serialpose().arg("version").output().expect("version should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn replay_emits_one_json_line_per_record() {
    let dir = unique_temp_dir("replay");
    let log = write_log(&dir, 8);

    let output = serialpose()
        .args(["--format", "json", "replay"])
        .arg(&log)
        .args(["--chunk-size", "3"])
        .output()
        .expect("replay should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line should be JSON"))
        .collect();
    assert_eq!(lines.len(), 8);
    assert_eq!(lines[0]["timestamp"], 1);
    assert_eq!(lines[7]["timestamp"], 8);
    assert_eq!(lines[7]["pose"]["yaw"], 1.25);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn replay_summary_counts_faults() {
    let dir = unique_temp_dir("summary");
    let log = write_log(&dir, 3);
    let mut bytes = vec![0x30, 0x01, 0x02, 0x00];
    bytes.extend(std::fs::read(&log).unwrap());
    std::fs::write(&log, bytes).unwrap();

    let output = serialpose()
        .args(["--format", "json", "replay", "--summary"])
        .arg(&log)
        .output()
        .expect("replay should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let summary: serde_json::Value = stdout
        .lines()
        .last()
        .map(|line| serde_json::from_str(line).expect("summary should be JSON"))
        .expect("summary line expected");
    assert_eq!(summary["summary"]["records_published"], 3);
    assert_eq!(summary["summary"]["desync_faults"], 1);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn replay_missing_file_fails() {
    let dir = unique_temp_dir("missing");
    let output = serialpose()
        .arg("replay")
        .arg(dir.join("nope.log"))
        .output()
        .expect("replay should run");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed opening"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn listen_on_missing_device_is_a_link_error() {
    let dir = unique_temp_dir("listen");
    let output = serialpose()
        .arg("listen")
        .arg(dir.join("ttyNOPE"))
        .arg("--log-dir")
        .arg(&dir)
        .output()
        .expect("listen should run");

    assert_eq!(output.status.code(), Some(3));
    // The raw log is created before the device is opened.
    assert!(dir.join("pose0.log").exists());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn replay_relays_records_to_monitor() {
    let dir = unique_temp_dir("relay");
    let log = write_log(&dir, 2);
    let port = {
        let probe = UdpSocket::bind("127.0.0.1:0").expect("probe should bind");
        probe.local_addr().unwrap().port()
    };

    let monitor = serialpose()
        .args(["--format", "json", "monitor"])
        .arg(port.to_string())
        .args(["--count", "2", "--timeout", "5s"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("monitor should start");

    thread::sleep(Duration::from_millis(500));
    let replay = serialpose()
        .args(["--format", "raw", "replay"])
        .arg(&log)
        .args(["--relay-port", &port.to_string()])
        .stdout(Stdio::null())
        .status()
        .expect("replay should run");
    assert!(replay.success());

    let output = monitor.wait_with_output().expect("monitor should exit");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 2);
    assert!(stdout.contains("\"timestamp\":2"));

    let _ = std::fs::remove_dir_all(&dir);
}
