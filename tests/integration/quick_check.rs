#[path = "common/mod.rs"]
mod common;

use common::Fixture;
use framestat::quick_check::{QuickStatus, run_quick_check};

#[test]
fn matching_counts_report_match() {
    let fixture = Fixture::new();
    fixture.check_script(
        "Remote file count: 10\nLocal  file count: 10\nQuick check: File counts match.",
        0,
    );

    let result = run_quick_check(&fixture.config());
    assert_eq!(result.remote_count, Some(10));
    assert_eq!(result.local_count, Some(10));
    assert_eq!(result.quick_status, QuickStatus::Match);
    assert_eq!(result.raw_output.len(), 3);
}

#[test]
fn differing_counts_without_verdict_are_inferred() {
    let fixture = Fixture::new();
    fixture.check_script("Remote file count: 10\nLocal  file count: 7\n", 0);

    let result = run_quick_check(&fixture.config());
    assert_eq!(result.quick_status, QuickStatus::Differ);
}

#[test]
fn counts_written_to_stderr_are_parsed() {
    let fixture = Fixture::new();
    fixture.script(
        "app/ops_tools/chk_sync.sh",
        "echo 'Remote file count: 5' >&2\necho 'Local file count: 5' >&2\necho done",
    );

    let result = run_quick_check(&fixture.config());
    assert_eq!(result.quick_status, QuickStatus::Match);
    assert_eq!(result.remote_count, Some(5));
}

#[test]
fn nonzero_exit_without_counts_is_error() {
    let fixture = Fixture::new();
    fixture.check_script("Checking remote kfr_frame...\nrclone: config file not found", 1);

    let result = run_quick_check(&fixture.config());
    assert_eq!(result.quick_status, QuickStatus::Error);
    assert_eq!(result.exit_code, Some(1));
    assert!(result.error.unwrap().contains("status 1"));
}

#[test]
fn missing_script_is_error_not_panic() {
    let fixture = Fixture::new();

    let result = run_quick_check(&fixture.config());
    assert_eq!(result.quick_status, QuickStatus::Error);
    assert!(result.raw_output.is_empty());
    assert!(result.error.unwrap().contains("not found"));
}

#[test]
fn hung_script_is_killed_at_timeout() {
    let fixture = Fixture::new();
    fixture.script("app/ops_tools/chk_sync.sh", "echo 'Remote file count: 1'\nsleep 30");
    let mut config = fixture.config();
    config.timeouts.quick_check = 1;

    let started = std::time::Instant::now();
    let result = run_quick_check(&config);
    assert!(started.elapsed() < std::time::Duration::from_secs(20));
    assert_eq!(result.quick_status, QuickStatus::Error);
    assert!(result.error.unwrap().contains("timed out"));
}

#[test]
fn worded_mismatch_without_counts_is_differ() {
    let fixture = Fixture::new();
    fixture.check_script("Quick check: File counts MISMATCH (do not match)", 0);

    let result = run_quick_check(&fixture.config());
    assert_eq!(result.quick_status, QuickStatus::Differ);
    assert_eq!(result.remote_count, None);
    assert_eq!(result.local_count, None);
}
