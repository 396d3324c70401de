//! Marker detection and value extraction over free-form script output.
//!
//! Lines are normalised before matching: ANSI escapes are removed, the text
//! is lower-cased and runs of whitespace collapse to one space. That makes
//! `"Local  file count:"` and `"\x1b[1mlocal file COUNT:"` equivalent.
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

fn ansi_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\x1b(?:\[[0-9;?]*[ -/]*[@-~]|\][^\x07\x1b]*(?:\x07|\x1b\\)|[@-_])")
            .expect("valid ansi regex")
    })
}

/// Removes ANSI colour and cursor escape sequences.
pub fn strip_ansi(line: &str) -> String {
    ansi_pattern().replace_all(line, "").into_owned()
}

/// Lower-cased, ANSI-free form of `line` with whitespace runs collapsed.
pub fn normalize(line: &str) -> String {
    strip_ansi(line)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Case-insensitive substring test, tolerant of irregular spacing.
pub fn contains_marker(line: &str, marker: &str) -> bool {
    let marker = normalize(marker);
    !marker.is_empty() && normalize(line).contains(&marker)
}

/// True when every marker is present somewhere in the line.
pub fn contains_all(line: &str, markers: &[&str]) -> bool {
    let normalized = normalize(line);
    markers.iter().all(|marker| {
        let marker = normalize(marker);
        !marker.is_empty() && normalized.contains(&marker)
    })
}

/// Text after the first `:`, trimmed. `None` when the line has no colon.
pub fn value_after_colon(line: &str) -> Option<String> {
    let cleaned = strip_ansi(line);
    cleaned
        .split_once(':')
        .map(|(_, rest)| rest.trim().to_string())
}

/// First whitespace-delimited token after the colon parsed as a count.
///
/// Trailing sentence punctuation is ignored; anything else that fails to
/// parse yields `None`.
pub fn extract_count(line: &str) -> Option<u64> {
    let value = value_after_colon(line)?;
    let token = value.split_whitespace().next()?;
    token
        .trim_end_matches(['.', ',', ';'])
        .parse::<u64>()
        .ok()
}

/// Outcome reported by a verdict line.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Verdict {
    Match,
    Differ,
    Error,
    Unknown,
}

/// Negative phrases are checked before the positive `match`: "mismatch"
/// and "do not match" both contain it.
const DIFFER_TOKENS: &[&str] = &[
    "mismatch",
    "differ",
    "do not match",
    "don't match",
    "not match",
    "not in sync",
    "out of sync",
];
const ERROR_TOKENS: &[&str] = &["error", "failed", "failure"];
const MATCH_TOKENS: &[&str] = &["match", "in sync"];

/// Classifies a verdict line.
pub fn classify_verdict(line: &str) -> Verdict {
    let normalized = normalize(line);
    let has_any = |tokens: &[&str]| tokens.iter().any(|token| normalized.contains(token));

    if has_any(DIFFER_TOKENS) {
        Verdict::Differ
    } else if has_any(ERROR_TOKENS) {
        Verdict::Error
    } else if has_any(MATCH_TOKENS) {
        Verdict::Match
    } else {
        Verdict::Unknown
    }
}
