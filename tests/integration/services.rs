#[path = "common/mod.rs"]
mod common;

use common::Fixture;
use framestat::services::{ProbeMethod, probe_all, probe_system_service, probe_user_service};

const BUS_DOWN: &str = "case \"$*\" in\n\
  *--machine=*) echo active ;;\n\
  *--user*) echo 'Failed to connect to bus: No medium found' >&2; exit 1 ;;\n\
  *) echo inactive; exit 3 ;;\n\
esac";

#[test]
fn system_service_uses_direct_query() {
    let fixture = Fixture::new();
    fixture.systemctl("active");

    let state = probe_system_service(&fixture.config(), "pf-web-status.service");
    assert_eq!(state.state, "active");
    assert_eq!(state.method, ProbeMethod::Direct);
    assert!(state.note.is_none());
}

#[test]
fn inactive_exit_code_still_yields_state() {
    let fixture = Fixture::new();
    fixture.script("bin/systemctl", "echo inactive\nexit 3");

    let state = probe_system_service(&fixture.config(), "pf-web-status.service");
    assert_eq!(state.state, "inactive");
}

#[test]
fn user_service_falls_back_to_machine_query() {
    let fixture = Fixture::new();
    fixture.script("bin/systemctl", BUS_DOWN);
    fixture.script("bin/loginctl", "exit 1");

    let state = probe_user_service(&fixture.config(), "picframe.service");
    assert_eq!(state.state, "active");
    assert_eq!(state.method, ProbeMethod::UserBus);
    assert!(state.note.unwrap().contains("Failed to connect to bus"));
}

#[test]
fn unreachable_manager_falls_back_to_process_list() {
    let fixture = Fixture::new();

    let state = probe_user_service(&fixture.config(), "picframe.service");
    assert_eq!(state.method, ProbeMethod::ProcessList);
    assert_eq!(state.state, "inactive");
    let note = state.note.unwrap();
    assert!(note.contains("not found"));
    assert!(note.contains("framestat-no-such-user"));
}

#[test]
fn running_process_owned_by_user_counts_as_active() {
    let fixture = Fixture::new();
    let mut config = fixture.config();
    config.services.pf_process_name = "sleep".into();
    if let Ok(Some(user)) = nix::unistd::User::from_uid(nix::unistd::getuid()) {
        config.services.frame_user = user.name;
    }
    let mut frame = std::process::Command::new("sleep").arg("30").spawn().unwrap();
    std::thread::sleep(std::time::Duration::from_millis(200));

    let state = probe_user_service(&config, "picframe.service");
    frame.kill().unwrap();
    frame.wait().unwrap();
    assert_eq!(state.method, ProbeMethod::ProcessList);
    assert_eq!(state.state, "active");
}

#[test]
fn process_mentioning_the_name_only_in_arguments_is_inactive() {
    let fixture = Fixture::new();
    let mut config = fixture.config();
    config.services.pf_process_name = "framestatframe".into();
    let config_path = fixture.root().join("framestatframe/config/framestat.yaml");
    let mut other = std::process::Command::new("sh")
        .arg("-c")
        .arg("sleep 30")
        .arg(&config_path)
        .spawn()
        .unwrap();
    std::thread::sleep(std::time::Duration::from_millis(200));

    let state = probe_user_service(&config, "picframe.service");
    other.kill().unwrap();
    other.wait().unwrap();
    assert_eq!(state.method, ProbeMethod::ProcessList);
    assert_eq!(state.state, "inactive");
}

#[test]
fn one_service_failing_does_not_block_the_other() {
    let fixture = Fixture::new();
    fixture.script(
        "bin/systemctl",
        "case \"$*\" in\n  *pf-web-status*) echo active ;;\n  *) echo 'Failed to connect to bus' >&2; exit 1 ;;\nesac",
    );

    let report = probe_all(&fixture.config());
    assert_eq!(report.web.state, "active");
    assert_eq!(report.pf.method, ProbeMethod::ProcessList);
    assert_eq!(report.pf.state, "inactive");
}
