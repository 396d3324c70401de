//! Bounded-memory reader for the append-only sync log.
use std::{
    collections::VecDeque,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LogConfig;
use crate::constants::{LOG_TIMESTAMP_FORMAT, LOG_TIMESTAMP_WIDTH, UNKNOWN_SENTINEL};
use crate::error::LogError;

/// Activity derived from the sync log for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSnapshot {
    pub last_service_restart: String,
    pub last_file_download: String,
    pub log_tail: String,
}

impl LogSnapshot {
    /// Snapshot used when the log is missing or unreadable.
    pub fn empty() -> Self {
        Self {
            last_service_restart: UNKNOWN_SENTINEL.to_string(),
            last_file_download: UNKNOWN_SENTINEL.to_string(),
            log_tail: String::new(),
        }
    }
}

/// Result of a single pass over a log file.
#[derive(Debug, Default)]
pub struct LogScan {
    /// Last `tail_lines` lines, oldest first.
    pub tail: VecDeque<String>,
    /// Most recent line containing each marker, in marker order.
    pub last_matches: Vec<Option<String>>,
}

impl LogScan {
    /// Reads `path` once, keeping a sliding window of `tail_lines` lines and
    /// the last line matching each marker.
    ///
    /// A missing file is an empty scan. Invalid UTF-8 is decoded lossily.
    pub fn scan(path: &Path, tail_lines: usize, markers: &[&str]) -> Result<Self, LogError> {
        let mut scan = LogScan {
            tail: VecDeque::with_capacity(tail_lines.min(1024)),
            last_matches: vec![None; markers.len()],
        };

        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("Log file {} does not exist yet", path.display());
                return Ok(scan);
            }
            Err(source) => {
                return Err(LogError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = reader.read_until(b'\n', &mut buf).map_err(|source| LogError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            if read == 0 {
                break;
            }

            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_end_matches(['\n', '\r']);

            for (slot, marker) in scan.last_matches.iter_mut().zip(markers) {
                if !marker.is_empty() && line.contains(*marker) {
                    *slot = Some(line.to_string());
                }
            }

            if tail_lines > 0 {
                if scan.tail.len() == tail_lines {
                    scan.tail.pop_front();
                }
                scan.tail.push_back(line.to_string());
            }
        }

        Ok(scan)
    }

    /// Tail window joined with newlines.
    pub fn tail_text(&self) -> String {
        self.tail.iter().map(String::as_str).collect::<Vec<_>>().join("\n")
    }
}

/// Validated leading timestamp of a log line, if any.
pub fn leading_timestamp(line: &str) -> Option<String> {
    let prefix = line.get(..LOG_TIMESTAMP_WIDTH)?;
    NaiveDateTime::parse_from_str(prefix, LOG_TIMESTAMP_FORMAT)
        .ok()
        .map(|_| prefix.to_string())
}

/// Returns the last `lines` lines of the file joined by newlines; empty when
/// the file does not exist.
pub fn tail_lines(path: &Path, lines: usize) -> Result<String, LogError> {
    Ok(LogScan::scan(path, lines, &[])?.tail_text())
}

/// Timestamp of the most recent line (in file order) containing `needle`.
pub fn last_matching_timestamp(path: &Path, needle: &str) -> Result<Option<String>, LogError> {
    let scan = LogScan::scan(path, 0, &[needle])?;
    Ok(scan
        .last_matches
        .into_iter()
        .next()
        .flatten()
        .and_then(|line| leading_timestamp(&line)))
}

/// Builds the activity snapshot for the dashboard in a single pass.
pub fn read_snapshot(path: &Path, config: &LogConfig) -> Result<LogSnapshot, LogError> {
    let scan = LogScan::scan(
        path,
        config.tail_lines,
        &[config.restart_marker.as_str(), config.download_marker.as_str()],
    )?;

    let timestamp_for = |index: usize| {
        scan.last_matches
            .get(index)
            .cloned()
            .flatten()
            .and_then(|line| leading_timestamp(&line))
            .unwrap_or_else(|| UNKNOWN_SENTINEL.to_string())
    };

    Ok(LogSnapshot {
        last_service_restart: timestamp_for(0),
        last_file_download: timestamp_for(1),
        log_tail: scan.tail_text(),
    })
}
