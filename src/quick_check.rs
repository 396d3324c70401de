//! Quick (default-mode) sync check: run the check script and reconcile its
//! counts and verdict into a [`QuickCheckResult`].
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use tracing::{debug, warn};

use crate::config::DashboardConfig;
use crate::extract::{self, Verdict};
use crate::process::{self, CommandSpec};

/// Reconciled outcome of a quick check.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum QuickStatus {
    Match,
    Differ,
    Error,
    Unknown,
}

impl From<Verdict> for QuickStatus {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Match => QuickStatus::Match,
            Verdict::Differ => QuickStatus::Differ,
            Verdict::Error => QuickStatus::Error,
            Verdict::Unknown => QuickStatus::Unknown,
        }
    }
}

/// Parsed quick-check run.
///
/// `Error` may carry partial counts; so may a `Match`/`Differ` taken from the
/// script's own verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickCheckResult {
    pub remote_count: Option<u64>,
    pub local_count: Option<u64>,
    pub quick_status: QuickStatus,
    /// Verdict as worded by the script, before reconciliation.
    pub verdict: Option<Verdict>,
    pub exit_code: Option<i32>,
    pub raw_output: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QuickCheckResult {
    /// Result for a run that never produced output.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            remote_count: None,
            local_count: None,
            quick_status: QuickStatus::Error,
            verdict: None,
            exit_code: None,
            raw_output: Vec::new(),
            error: Some(error.into()),
        }
    }
}

const REMOTE_MARKERS: &[&str] = &["remote", "file count"];
const LOCAL_MARKERS: &[&str] = &["local", "file count"];
const VERDICT_MARKER: &str = "quick check";

/// Parses the combined output of a quick check.
///
/// Every line is scanned; a later match overrides an earlier one. Numeric
/// evidence decides the status whenever both counts are present, regardless
/// of the exit code or the worded verdict. Otherwise a failed run is an
/// error and a clean run takes the worded verdict.
pub fn parse_quick_check(lines: &[String], exit_code: Option<i32>) -> QuickCheckResult {
    let mut remote_count = None;
    let mut local_count = None;
    let mut verdict = None;

    for line in lines {
        if extract::contains_marker(line, VERDICT_MARKER) {
            verdict = Some(extract::classify_verdict(line));
        } else if extract::contains_all(line, REMOTE_MARKERS) {
            if let Some(count) = extract::extract_count(line) {
                remote_count = Some(count);
            }
        } else if extract::contains_all(line, LOCAL_MARKERS)
            && let Some(count) = extract::extract_count(line)
        {
            local_count = Some(count);
        }
    }

    let succeeded = exit_code == Some(0);
    let quick_status = match (remote_count, local_count) {
        (Some(remote), Some(local)) if remote == local => QuickStatus::Match,
        (Some(_), Some(_)) => QuickStatus::Differ,
        _ if !succeeded => QuickStatus::Error,
        _ => verdict.map_or(QuickStatus::Unknown, QuickStatus::from),
    };

    let error = (quick_status == QuickStatus::Error && !succeeded).then(|| match exit_code {
        Some(code) => format!("quick check exited with status {code}"),
        None => "quick check was terminated by a signal".to_string(),
    });

    QuickCheckResult {
        remote_count,
        local_count,
        quick_status,
        verdict,
        exit_code,
        raw_output: lines.to_vec(),
        error,
    }
}

/// Runs the check script without arguments and parses its output.
///
/// Stdout and stderr are merged because non-interactive runs often log to
/// stderr even on success. Invocation failures become an `Error` result.
pub fn run_quick_check(config: &DashboardConfig) -> QuickCheckResult {
    let script = config.paths.check_script();
    let spec = CommandSpec::new(
        script.to_string_lossy().into_owned(),
        config.timeouts.quick_check(),
    );

    match process::run(&spec) {
        Ok(output) => {
            let result = parse_quick_check(&output.lines(), output.exit_code);
            debug!(
                "Quick check: remote={:?} local={:?} status={}",
                result.remote_count, result.local_count, result.quick_status
            );
            result
        }
        Err(err) => {
            warn!("Quick check could not run: {err}");
            QuickCheckResult::failed(format!("Failed to run {}: {err}", script.display()))
        }
    }
}
