//! Status reconciliation: turns the quick check, the sync log and the service
//! probes into one [`StatusPayload`].
//!
//! [`StatusReconciler::collect`] never fails. Sub-failures degrade their own
//! fields and are recorded in [`StatusPayload::debug`]; a panic anywhere in
//! the pipeline yields an `ERROR` payload carrying `top_level_error`.
use std::{
    any::Any,
    collections::BTreeMap,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use chrono::Local;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use tracing::{debug, error, warn};

use crate::config::DashboardConfig;
use crate::constants::{LOG_TIMESTAMP_FORMAT, UNKNOWN_SENTINEL, UNKNOWN_STATE};
use crate::error::LogError;
use crate::logs::{self, LogSnapshot};
use crate::quick_check::{self, QuickCheckResult, QuickStatus};
use crate::services::{self, ServiceReport, ServiceState};
use crate::sources;

/// Single reconciled health level shown to the user.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Severity {
    Ok,
    Warn,
    Error,
    Unknown,
}

impl From<QuickStatus> for Severity {
    fn from(status: QuickStatus) -> Self {
        match status {
            QuickStatus::Match => Severity::Ok,
            QuickStatus::Differ => Severity::Warn,
            QuickStatus::Error => Severity::Error,
            QuickStatus::Unknown => Severity::Unknown,
        }
    }
}

/// Human-readable headline for a quick-check outcome.
pub fn status_text(status: QuickStatus) -> &'static str {
    match status {
        QuickStatus::Match => "Last sync succeeded",
        QuickStatus::Differ => "Counts differ - check needed",
        QuickStatus::Error => "Error running quick check",
        QuickStatus::Unknown => "Status unknown",
    }
}

/// Overall sync health.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overall {
    pub remote_count: Option<u64>,
    pub local_count: Option<u64>,
    pub severity: Severity,
    pub status_text: String,
}

/// Log-derived activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub last_service_restart: String,
    pub last_file_download: String,
    pub log_tail: String,
}

impl From<LogSnapshot> for Activity {
    fn from(snapshot: LogSnapshot) -> Self {
        Self {
            last_service_restart: snapshot.last_service_restart,
            last_file_download: snapshot.last_file_download,
            log_tail: snapshot.log_tail,
        }
    }
}

/// Snapshot served by `GET /api/status`. Every field is always populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub timestamp: String,
    pub script_path: String,
    pub log_path: String,
    pub overall: Overall,
    pub web_status: String,
    pub pf_status: String,
    pub current_remote: String,
    pub activity: Activity,
    /// Diagnostics, present only when something degraded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<BTreeMap<String, String>>,
}

fn now() -> String {
    Local::now().format(LOG_TIMESTAMP_FORMAT).to_string()
}

impl StatusPayload {
    /// Payload used when the pipeline itself blew up.
    pub fn degraded(config: &DashboardConfig, reason: impl Into<String>) -> Self {
        let mut debug = BTreeMap::new();
        debug.insert("top_level_error".to_string(), reason.into());
        Self {
            timestamp: now(),
            script_path: config.paths.check_script().display().to_string(),
            log_path: config.paths.log_file.display().to_string(),
            overall: Overall {
                remote_count: None,
                local_count: None,
                severity: Severity::Error,
                status_text: status_text(QuickStatus::Error).to_string(),
            },
            web_status: UNKNOWN_STATE.to_string(),
            pf_status: UNKNOWN_STATE.to_string(),
            current_remote: UNKNOWN_SENTINEL.to_string(),
            activity: LogSnapshot::empty().into(),
            debug: Some(debug),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.debug.as_ref().is_some_and(|debug| !debug.is_empty())
    }
}

/// Raw inputs gathered by one pipeline run.
#[derive(Debug)]
pub struct StatusInputs {
    pub quick: QuickCheckResult,
    pub logs: Result<LogSnapshot, LogError>,
    pub services: ServiceReport,
    pub current_remote: (String, Option<String>),
}

fn record_service(debug: &mut BTreeMap<String, String>, key: &str, state: &ServiceState) {
    if let Some(note) = &state.note {
        debug.insert(key.to_string(), format!("{} via {}: {note}", state.state, state.method));
    }
}

/// Assembles a payload from already-gathered inputs.
///
/// Severity depends on the quick check alone.
pub fn assemble(config: &DashboardConfig, inputs: StatusInputs) -> StatusPayload {
    let mut debug = BTreeMap::new();
    let quick = inputs.quick;

    if let Some(err) = &quick.error {
        debug.insert("quick_check_error".to_string(), err.clone());
    }
    if quick.quick_status == QuickStatus::Unknown && !quick.raw_output.is_empty() {
        let shown = quick.raw_output.len().min(10);
        debug.insert(
            "quick_check_output".to_string(),
            quick.raw_output[quick.raw_output.len() - shown..].join("\n"),
        );
    }

    let activity = match inputs.logs {
        Ok(snapshot) => Activity::from(snapshot),
        Err(err) => {
            warn!("Log snapshot degraded: {err}");
            debug.insert("log_error".to_string(), err.to_string());
            LogSnapshot::empty().into()
        }
    };

    record_service(&mut debug, "web_status", &inputs.services.web);
    record_service(&mut debug, "pf_status", &inputs.services.pf);

    let (current_remote, remote_error) = inputs.current_remote;
    if let Some(err) = remote_error {
        debug.insert("current_remote_error".to_string(), err);
    }

    StatusPayload {
        timestamp: now(),
        script_path: config.paths.check_script().display().to_string(),
        log_path: config.paths.log_file.display().to_string(),
        overall: Overall {
            remote_count: quick.remote_count,
            local_count: quick.local_count,
            severity: quick.quick_status.into(),
            status_text: status_text(quick.quick_status).to_string(),
        },
        web_status: inputs.services.web.state,
        pf_status: inputs.services.pf.state,
        current_remote,
        activity,
        debug: (!debug.is_empty()).then_some(debug),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "status pipeline panicked".to_string()
    }
}

/// Runs `build`, substituting a degraded payload if it panics.
pub fn guarded<F>(config: &DashboardConfig, build: F) -> StatusPayload
where
    F: FnOnce() -> StatusPayload,
{
    match panic::catch_unwind(AssertUnwindSafe(build)) {
        Ok(payload) => payload,
        Err(payload) => {
            let message = panic_message(payload);
            error!("Status pipeline failed: {message}");
            StatusPayload::degraded(config, message)
        }
    }
}

/// Entry point for status assembly, built once with the shared config.
#[derive(Debug, Clone)]
pub struct StatusReconciler {
    config: Arc<DashboardConfig>,
}

impl StatusReconciler {
    pub fn new(config: Arc<DashboardConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// Runs every collector in turn.
    pub fn gather(&self) -> StatusInputs {
        let config = self.config.as_ref();
        let quick = quick_check::run_quick_check(config);
        let logs = logs::read_snapshot(&config.paths.log_file, &config.log);
        let services = services::probe_all(config);
        let current_remote = sources::resolve_current_remote(config, &quick.raw_output);
        StatusInputs {
            quick,
            logs,
            services,
            current_remote,
        }
    }

    /// Builds a fresh payload. Never panics and never fails.
    pub fn collect(&self) -> StatusPayload {
        let payload = guarded(&self.config, || assemble(&self.config, self.gather()));
        debug!(
            "Status collected: severity={} degraded={}",
            payload.overall.severity,
            payload.is_degraded()
        );
        payload
    }
}
