//! Operator-triggered actions: deep check, manual sync, update, restarts,
//! source switching and remote connectivity tests.
//!
//! Each action runs once with its own timeout and reports `{ok, output}`.
//! Nothing is retried; the operator re-clicks if needed.
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::DashboardConfig;
use crate::error::{InvokeError, SourceError};
use crate::process::{self, CommandOutput, CommandSpec};
use crate::services::{self, ServiceState};
use crate::sources::SourceRegistry;

/// Uniform result shape for mutating endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub ok: bool,
    pub output: String,
}

impl ActionOutcome {
    /// Folds an invocation result into `{ok, output}`.
    pub fn from_invocation(label: &str, result: Result<CommandOutput, InvokeError>) -> Self {
        match result {
            Ok(output) => {
                let ok = output.success();
                if !ok {
                    warn!("{label} exited with {:?}", output.exit_code);
                }
                Self {
                    ok,
                    output: output.combined(),
                }
            }
            Err(err) => {
                warn!("{label} failed: {err}");
                Self {
                    ok: false,
                    output: format!("Error running {label}: {err}"),
                }
            }
        }
    }
}

fn run_script(label: &str, spec: CommandSpec) -> ActionOutcome {
    info!("Running {label}: `{}`", spec.display());
    ActionOutcome::from_invocation(label, process::run(&spec))
}

fn run_argv(label: &str, argv: &[String], timeout: std::time::Duration) -> ActionOutcome {
    match CommandSpec::from_argv(argv, timeout) {
        Ok(spec) => run_script(label, spec),
        Err(err) => ActionOutcome::from_invocation(label, Err(err)),
    }
}

/// Detailed check (`chk_sync.sh --d`).
pub fn run_deep_check(config: &DashboardConfig) -> ActionOutcome {
    let script = config.paths.check_script();
    let spec = CommandSpec::new(script.to_string_lossy().into_owned(), config.timeouts.deep_check())
        .arg("--d");
    run_script("deep check", spec)
}

/// Manually triggered sync.
pub fn sync_now(config: &DashboardConfig) -> ActionOutcome {
    let script = config.paths.sync_script();
    run_script(
        "sync",
        CommandSpec::new(script.to_string_lossy().into_owned(), config.timeouts.sync()),
    )
}

/// Application update.
pub fn run_update(config: &DashboardConfig) -> ActionOutcome {
    let script = config.paths.update_script();
    run_script(
        "update",
        CommandSpec::new(script.to_string_lossy().into_owned(), config.timeouts.update()),
    )
}

/// Restarts the user-scoped frame service.
pub fn restart_pf(config: &DashboardConfig) -> ActionOutcome {
    run_argv(
        "frame restart",
        &config.services.restart_pf_command(),
        config.timeouts.action(),
    )
}

/// Restarts the system-scoped web service.
pub fn restart_web(config: &DashboardConfig) -> ActionOutcome {
    run_argv(
        "web restart",
        &config.services.restart_web_command(),
        config.timeouts.action(),
    )
}

/// Switches the active source via `<source_ctl> set <id>`.
///
/// Unknown or empty ids are rejected before anything runs.
pub fn set_active_source(config: &DashboardConfig, id: &str) -> Result<ActionOutcome, SourceError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(SourceError::InvalidField {
            field: "source_id",
            reason: "must not be empty".to_string(),
        });
    }
    if SourceRegistry::from_config(config).get(id)?.is_none() {
        return Err(SourceError::NotFound(id.to_string()));
    }

    let script = config.paths.source_ctl_script();
    let spec = CommandSpec::new(script.to_string_lossy().into_owned(), config.timeouts.action())
        .arg("set")
        .arg(id);
    Ok(run_script("source switch", spec))
}

/// Outcome of an `rclone lsf` connectivity test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTest {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RemoteTest {
    fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            file_count: None,
            error: Some(error.into()),
        }
    }
}

/// Lists the top level of `remote` and counts the entries.
pub fn test_remote(config: &DashboardConfig, remote: &str) -> RemoteTest {
    let remote = remote.trim();
    if remote.is_empty() {
        return RemoteTest::failure("No remote specified");
    }

    let spec = CommandSpec::new("rclone", config.timeouts.remote_test())
        .arg("lsf")
        .arg(remote)
        .arg("--max-depth")
        .arg("1");

    match process::run(&spec) {
        Ok(output) if output.success() => RemoteTest {
            ok: true,
            file_count: Some(output.stdout.lines().filter(|l| !l.trim().is_empty()).count()),
            error: None,
        },
        Ok(output) => {
            let stderr = output.stderr.trim();
            RemoteTest::failure(if stderr.is_empty() {
                "Connection failed".to_string()
            } else {
                stderr.to_string()
            })
        }
        Err(InvokeError::NotFound { .. }) => {
            RemoteTest::failure("rclone not found - is it installed?")
        }
        Err(InvokeError::Timeout { after, .. }) => RemoteTest::failure(format!(
            "Connection timed out ({}s)",
            after.as_secs()
        )),
        Err(err) => RemoteTest::failure(err.to_string()),
    }
}

/// Whether the frame is currently displaying.
#[derive(Debug, Clone, Serialize)]
pub struct FrameLive {
    pub live: bool,
    pub state: ServiceState,
}

/// Reads the frame service state.
pub fn frame_live(config: &DashboardConfig) -> FrameLive {
    let state = services::probe_user_service(config, &config.services.pf_service);
    FrameLive {
        live: state.is_active(),
        state,
    }
}

/// Starts or stops the user-scoped frame service.
pub fn set_frame_live(config: &DashboardConfig, live: bool) -> ActionOutcome {
    let verb = if live { "start" } else { "stop" };
    let services = &config.services;
    let spec = CommandSpec::new(&services.systemctl, config.timeouts.action())
        .arg("--user")
        .arg(format!("--machine={}@", services.frame_user))
        .arg(verb)
        .arg(&services.pf_service);
    run_script(&format!("frame {verb}"), spec)
}
