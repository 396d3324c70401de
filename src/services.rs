//! Service state probes for the system-scoped web unit and the user-scoped
//! frame unit.
//!
//! A user unit is usually unreachable from a system service: there is no
//! login session and therefore no user bus. The user probe therefore walks a
//! chain (linger, direct `--user` query, `--machine` query with an explicit
//! runtime dir, process list) and stops at the first usable answer.
use std::{ffi::OsStr, path::Path};

use nix::unistd::User;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};
use sysinfo::{Pid, Process, ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::{debug, warn};

use crate::config::DashboardConfig;
use crate::constants::UNKNOWN_STATE;
use crate::process::{self, CommandSpec};

/// States `systemctl is-active` may legitimately print.
const KNOWN_STATES: &[&str] = &[
    "active",
    "inactive",
    "failed",
    "activating",
    "deactivating",
    "reloading",
    "refreshing",
    "maintenance",
];

/// Which probe step produced a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProbeMethod {
    Direct,
    UserBus,
    ProcessList,
    Unavailable,
}

/// Normalised state of one service plus how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceState {
    /// Lower-case state token such as `active` or `unknown`.
    pub state: String,
    pub method: ProbeMethod,
    /// Why earlier steps were skipped or failed, if they were.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl ServiceState {
    fn known(state: String, method: ProbeMethod) -> Self {
        Self {
            state,
            method,
            note: None,
        }
    }

    pub fn unknown(note: impl Into<String>) -> Self {
        Self {
            state: UNKNOWN_STATE.to_string(),
            method: ProbeMethod::Unavailable,
            note: Some(note.into()),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.state == UNKNOWN_STATE
    }

    pub fn is_active(&self) -> bool {
        self.state == "active"
    }

    fn with_note(mut self, notes: &[String]) -> Self {
        if !notes.is_empty() && self.note.is_none() {
            self.note = Some(notes.join("; "));
        }
        self
    }
}

/// Maps raw `is-active` output to a known state token.
///
/// Bus errors such as "Failed to connect to bus" come back as `None`.
pub fn normalize_state(raw: &str) -> Option<String> {
    let token = raw
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())?
        .split_whitespace()
        .next()?
        .to_lowercase();
    KNOWN_STATES.contains(&token.as_str()).then_some(token)
}

/// Runs one `systemctl ... is-active` style query; `Err` carries a note.
fn query_state(spec: &CommandSpec) -> Result<String, String> {
    let output = process::run(spec).map_err(|err| err.to_string())?;
    let raw = if output.stdout.trim().is_empty() {
        output.stderr.as_str()
    } else {
        output.stdout.as_str()
    };
    normalize_state(raw).ok_or_else(|| {
        let shown = raw.trim();
        if shown.is_empty() {
            format!("`{}` printed nothing", spec.display())
        } else {
            format!("`{}` said: {}", spec.display(), shown.lines().next().unwrap_or(shown))
        }
    })
}

/// Probes a system-scoped unit with a single direct query.
pub fn probe_system_service(config: &DashboardConfig, service: &str) -> ServiceState {
    let spec = CommandSpec::new(&config.services.systemctl, config.timeouts.service_query())
        .arg("is-active")
        .arg(service);

    match query_state(&spec) {
        Ok(state) => ServiceState::known(state, ProbeMethod::Direct),
        Err(note) => {
            warn!("System service {service} state unavailable: {note}");
            ServiceState::unknown(note)
        }
    }
}

/// Probes a user-scoped unit owned by `services.frame_user`.
pub fn probe_user_service(config: &DashboardConfig, service: &str) -> ServiceState {
    let services = &config.services;
    let timeout = config.timeouts.service_query();
    let user = lookup_user(&services.frame_user);
    let mut notes = Vec::new();

    enable_linger(config);

    let direct = CommandSpec::new(&services.systemctl, timeout)
        .arg("--user")
        .arg("is-active")
        .arg(service);
    match query_state(&direct) {
        Ok(state) => return ServiceState::known(state, ProbeMethod::Direct),
        Err(note) => notes.push(note),
    }

    let mut machine = CommandSpec::new(&services.systemctl, timeout)
        .arg("--user")
        .arg(format!("--machine={}@", services.frame_user))
        .arg("is-active")
        .arg(service);
    if let Some(user) = &user {
        let runtime_dir = format!("/run/user/{}", user.uid);
        machine = machine
            .env("DBUS_SESSION_BUS_ADDRESS", format!("unix:path={runtime_dir}/bus"))
            .env("XDG_RUNTIME_DIR", runtime_dir);
    }
    match query_state(&machine) {
        Ok(state) => {
            return ServiceState::known(state, ProbeMethod::UserBus).with_note(&notes);
        }
        Err(note) => notes.push(note),
    }

    debug!("User bus unreachable for {service}; scanning process list");
    let uid = user.map(|user| user.uid.as_raw());
    if uid.is_none() {
        notes.push(format!("user '{}' not found; matching any owner", services.frame_user));
    }
    let state = if process_running(&services.pf_process_name, uid) {
        "active"
    } else {
        "inactive"
    };
    ServiceState::known(state.to_string(), ProbeMethod::ProcessList).with_note(&notes)
}

/// Best-effort `loginctl enable-linger`; failures are only logged.
fn enable_linger(config: &DashboardConfig) {
    let spec = CommandSpec::new(&config.services.loginctl, config.timeouts.service_query())
        .arg("enable-linger")
        .arg(&config.services.frame_user);
    match process::run(&spec) {
        Ok(output) if output.success() => {}
        Ok(output) => debug!("enable-linger exited with {:?}", output.exit_code),
        Err(err) => debug!("enable-linger unavailable: {err}"),
    }
}

struct TargetUser {
    uid: nix::unistd::Uid,
}

fn lookup_user(name: &str) -> Option<TargetUser> {
    match User::from_name(name) {
        Ok(Some(user)) => Some(TargetUser { uid: user.uid }),
        Ok(None) => None,
        Err(err) => {
            debug!("User lookup for '{name}' failed: {err}");
            None
        }
    }
}

/// Whether `value` names the program `name`, ignoring directories and any
/// extension (`/usr/bin/picframe`, `picframe.py`).
fn names_program(value: &OsStr, name: &str) -> bool {
    Path::new(value).file_stem().is_some_and(|stem| stem == name)
}

/// Matches a process by its executable rather than by any argument that
/// happens to mention `name`. For interpreter-launched scripts the script
/// path in `argv[1]` counts as the program.
fn runs_program(process: &Process, name: &str) -> bool {
    let exe_matches = process
        .exe()
        .is_some_and(|exe| names_program(exe.as_os_str(), name));
    if process.name() == name || exe_matches {
        return true;
    }
    let cmd = process.cmd();
    cmd.first().is_some_and(|argv0| names_program(argv0, name))
        || cmd
            .get(1)
            .filter(|arg| !arg.to_string_lossy().starts_with('-'))
            .is_some_and(|script| names_program(script, name))
}

/// Whether a process running the program `name` exists, optionally restricted
/// to processes owned by `uid`. Our own process and its threads never count.
pub fn process_running(name: &str, uid: Option<u32>) -> bool {
    let name = name.trim();
    if name.is_empty() {
        return false;
    }

    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::All,
        true,
        ProcessRefreshKind::everything(),
    );

    let own_pid = Pid::from_u32(std::process::id());
    system.processes().values().any(|process| {
        if process.pid() == own_pid || process.thread_kind().is_some() {
            return false;
        }
        let owned = match uid {
            Some(uid) => process.user_id().is_some_and(|owner| **owner == uid),
            None => true,
        };
        owned && runs_program(process, name)
    })
}

/// Service states for both units on the dashboard.
#[derive(Debug, Clone)]
pub struct ServiceReport {
    pub web: ServiceState,
    pub pf: ServiceState,
}

/// Probes both units independently; one failing never blocks the other.
pub fn probe_all(config: &DashboardConfig) -> ServiceReport {
    ServiceReport {
        web: probe_system_service(config, &config.services.web_service),
        pf: probe_user_service(config, &config.services.pf_service),
    }
}
