#[path = "common/mod.rs"]
mod common;

use common::Fixture;
use framestat::config::LogConfig;
use framestat::logs::{last_matching_timestamp, read_snapshot, tail_lines};

#[test]
fn download_timestamp_from_single_line_log() {
    let fixture = Fixture::new();
    let log = fixture.write(
        "logs/frame_sync.log",
        "2025-11-29 08:00:05 rclone sync completed successfully.\n",
    );

    let snapshot = read_snapshot(&log, &LogConfig::default()).unwrap();
    assert_eq!(snapshot.last_file_download, "2025-11-29 08:00:05");
    assert_eq!(snapshot.last_service_restart, "--");
}

#[test]
fn missing_log_is_empty_not_error() {
    let fixture = Fixture::new();

    let snapshot = read_snapshot(&fixture.log_file(), &LogConfig::default()).unwrap();
    assert_eq!(snapshot.log_tail, "");
    assert_eq!(snapshot.last_file_download, "--");
    assert_eq!(snapshot.last_service_restart, "--");
}

#[test]
fn tail_is_bounded_and_markers_use_file_order() {
    let fixture = Fixture::new();
    let mut content = String::new();
    content.push_str("2025-11-30 09:00:00 Service picframe.service restarted successfully\n");
    for i in 0..200 {
        content.push_str(&format!("2025-11-29 10:{:02}:00 line {i}\n", i % 60));
    }
    // Older timestamp, later in the file: file order wins.
    content.push_str("2025-11-01 07:30:00 Service picframe.service restarted successfully\n");
    let log = fixture.write("logs/frame_sync.log", content);

    let snapshot = read_snapshot(&log, &LogConfig::default()).unwrap();
    assert_eq!(snapshot.log_tail.lines().count(), 60);
    assert!(snapshot.log_tail.ends_with("restarted successfully"));
    assert_eq!(snapshot.last_service_restart, "2025-11-01 07:30:00");
    assert_eq!(snapshot.last_file_download, "--");

    assert_eq!(tail_lines(&log, 2).unwrap().lines().count(), 2);
}

#[test]
fn garbage_timestamp_is_discarded() {
    let fixture = Fixture::new();
    let log = fixture.write(
        "logs/frame_sync.log",
        "2025-11-29 08:00:05 rclone sync completed successfully\n\
         [sync] rclone sync completed successfully\n",
    );

    assert_eq!(
        last_matching_timestamp(&log, "rclone sync completed successfully").unwrap(),
        None
    );
}

#[test]
fn invalid_utf8_is_decoded_lossily() {
    let fixture = Fixture::new();
    let mut bytes = b"2025-11-29 08:00:05 rclone sync completed successfully\n".to_vec();
    bytes.extend_from_slice(b"2025-11-29 08:01:00 bad bytes \xff\xfe here\n");
    let log = fixture.write("logs/frame_sync.log", bytes);

    let snapshot = read_snapshot(&log, &LogConfig::default()).unwrap();
    assert_eq!(snapshot.last_file_download, "2025-11-29 08:00:05");
    assert!(snapshot.log_tail.contains("bad bytes"));
}
