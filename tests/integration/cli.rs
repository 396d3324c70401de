#[path = "common/mod.rs"]
mod common;

use assert_cmd::Command;
use common::Fixture;
use predicates::prelude::*;
use serde_json::Value;

fn framestat(fixture: &Fixture) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("framestat"));
    cmd.arg("--config")
        .arg(fixture.config_file())
        .env_remove("FRAMESTAT_CONFIG")
        .env_remove("FRAMESTAT_PORT")
        .current_dir(fixture.root());
    cmd
}

#[test]
fn status_json_prints_full_payload() {
    let fixture = Fixture::new();
    fixture.check_script(
        "Remote file count: 10\nLocal  file count: 7\nQuick check: MISMATCH - counts do not match",
        0,
    );
    fixture.systemctl("active");
    fixture.write(
        "logs/frame_sync.log",
        "2025-11-29 08:00:05 rclone sync completed successfully.\n",
    );

    let output = framestat(&fixture)
        .args(["status", "--json"])
        .output()
        .expect("failed to run framestat");
    assert!(output.status.success());

    let payload: Value = serde_json::from_slice(&output.stdout).expect("stdout is JSON");
    assert_eq!(payload["overall"]["severity"], "WARN");
    assert_eq!(payload["overall"]["remote_count"], 10);
    assert_eq!(payload["overall"]["local_count"], 7);
    assert_eq!(payload["activity"]["last_file_download"], "2025-11-29 08:00:05");
    assert_eq!(payload["activity"]["last_service_restart"], "--");
}

#[test]
fn status_text_lists_diagnostics_when_degraded() {
    let fixture = Fixture::new();

    framestat(&fixture)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("ERROR Error running quick check"))
        .stdout(predicate::str::contains("Diagnostics:"))
        .stdout(predicate::str::contains("quick_check_error"));
}

#[test]
fn check_prints_parsed_quick_check() {
    let fixture = Fixture::new();
    fixture.check_script("Remote file count: 4\nLocal file count: 4", 0);

    framestat(&fixture)
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"quick_status\": \"match\""));
}

#[test]
fn sources_marks_the_active_one() {
    let fixture = Fixture::new();
    fixture.write(
        "app/config/sources.conf",
        "kfr|Koofr|/home/pi/Pictures/kfr|1\ngdt|Google Drive|/home/pi/Pictures/gdt|0\n",
    );
    fixture.write("app/config/frame_sources.conf", "ACTIVE_SOURCE=kfr\n");

    framestat(&fixture)
        .arg("sources")
        .assert()
        .success()
        .stdout(predicate::str::contains("* kfr"))
        .stdout(predicate::str::contains("Google Drive (disabled)"));
}

#[test]
fn auto_update_config_merges_defaults() {
    let fixture = Fixture::new();
    fixture.write(
        "app/config/picframe.conf",
        "AUTO_UPDATE_ENABLED=\"true\"\nAUTO_UPDATE_HOUR=\"4\"\n",
    );

    framestat(&fixture)
        .arg("auto-update-config")
        .assert()
        .success()
        .stdout("ENABLED=true\nFREQUENCY=monthly\nDAY=0\nHOUR=4\nMINUTE=30\n");
}

#[test]
fn missing_config_file_fails_cleanly() {
    let fixture = Fixture::new();

    Command::new(assert_cmd::cargo::cargo_bin!("framestat"))
        .args(["--config", "/nonexistent/framestat.yaml", "status"])
        .current_dir(fixture.root())
        .assert()
        .failure()
        .stderr(predicate::str::contains("/nonexistent/framestat.yaml"));
}
