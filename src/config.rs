//! Configuration management for framestat.
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::OnceLock,
    time::Duration,
};

use crate::constants::*;
use crate::error::ConfigError;

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "framestat.yaml";

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "FRAMESTAT_CONFIG";

/// Environment variable overriding the listening port.
pub const PORT_ENV_VAR: &str = "FRAMESTAT_PORT";

/// Root configuration, resolved once at startup and shared read-only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// HTTP listener settings.
    pub server: ServerConfig,
    /// Filesystem locations of scripts, logs and registries.
    pub paths: PathsConfig,
    /// Service names and service-manager binaries.
    pub services: ServicesConfig,
    /// Sync log parsing settings.
    pub log: LogConfig,
    /// Per-operation timeouts, in seconds.
    pub timeouts: TimeoutConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Filesystem layout. Unset script and registry paths derive from `app_root`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub app_root: PathBuf,
    pub log_file: PathBuf,
    pub check_script: Option<PathBuf>,
    pub sync_script: Option<PathBuf>,
    pub update_script: Option<PathBuf>,
    pub source_ctl_script: Option<PathBuf>,
    pub sources_conf: Option<PathBuf>,
    pub sources_registry: Option<PathBuf>,
    pub settings_file: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            app_root: PathBuf::from(DEFAULT_APP_ROOT),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            check_script: None,
            sync_script: None,
            update_script: None,
            source_ctl_script: None,
            sources_conf: None,
            sources_registry: None,
            settings_file: None,
        }
    }
}

impl PathsConfig {
    fn under_root(&self, explicit: &Option<PathBuf>, relative: &str) -> PathBuf {
        explicit
            .clone()
            .unwrap_or_else(|| self.app_root.join(relative))
    }

    /// Sync check script (`chk_sync.sh`).
    pub fn check_script(&self) -> PathBuf {
        self.under_root(&self.check_script, "ops_tools/chk_sync.sh")
    }

    /// Manual sync trigger.
    pub fn sync_script(&self) -> PathBuf {
        self.under_root(&self.sync_script, "ops_tools/frame_sync.sh")
    }

    /// Application update script.
    pub fn update_script(&self) -> PathBuf {
        self.under_root(&self.update_script, "ops_tools/pf_update.sh")
    }

    /// Script that switches the active source.
    pub fn source_ctl_script(&self) -> PathBuf {
        self.under_root(&self.source_ctl_script, "ops_tools/pf_source_ctl.sh")
    }

    /// `KEY=VALUE` file naming the active source and its label.
    pub fn sources_conf(&self) -> PathBuf {
        self.under_root(&self.sources_conf, "config/frame_sources.conf")
    }

    /// Pipe-delimited source registry.
    pub fn sources_registry(&self) -> PathBuf {
        self.under_root(&self.sources_registry, "config/sources.conf")
    }

    /// Frame settings edited from the dashboard.
    pub fn settings_file(&self) -> PathBuf {
        self.under_root(&self.settings_file, "config/picframe.conf")
    }
}

/// Service names and the binaries used to query them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    /// System-scoped unit serving this dashboard.
    pub web_service: String,
    /// User-scoped unit running the frame.
    pub pf_service: String,
    /// Account that owns `pf_service`.
    pub frame_user: String,
    /// Process name matched when the user bus is unreachable.
    pub pf_process_name: String,
    pub systemctl: String,
    pub loginctl: String,
    /// Overrides the command used to restart the frame service.
    pub restart_pf_command: Option<Vec<String>>,
    /// Overrides the command used to restart the web service.
    pub restart_web_command: Option<Vec<String>>,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            web_service: DEFAULT_WEB_SERVICE.to_string(),
            pf_service: DEFAULT_PF_SERVICE.to_string(),
            frame_user: DEFAULT_FRAME_USER.to_string(),
            pf_process_name: DEFAULT_PF_PROCESS.to_string(),
            systemctl: "systemctl".to_string(),
            loginctl: "loginctl".to_string(),
            restart_pf_command: None,
            restart_web_command: None,
        }
    }
}

impl ServicesConfig {
    /// Command restarting the user-scoped frame service.
    pub fn restart_pf_command(&self) -> Vec<String> {
        self.restart_pf_command.clone().unwrap_or_else(|| {
            vec![
                self.systemctl.clone(),
                "--user".to_string(),
                format!("--machine={}@", self.frame_user),
                "restart".to_string(),
                self.pf_service.clone(),
            ]
        })
    }

    /// Command restarting the system-scoped web service.
    pub fn restart_web_command(&self) -> Vec<String> {
        self.restart_web_command.clone().unwrap_or_else(|| {
            vec![
                "sudo".to_string(),
                "-n".to_string(),
                self.systemctl.clone(),
                "restart".to_string(),
                self.web_service.clone(),
            ]
        })
    }
}

/// Sync log parsing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub tail_lines: usize,
    pub restart_marker: String,
    pub download_marker: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            tail_lines: DEFAULT_TAIL_LINES,
            restart_marker: DEFAULT_RESTART_MARKER.to_string(),
            download_marker: DEFAULT_DOWNLOAD_MARKER.to_string(),
        }
    }
}

/// Per-operation timeouts, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub service_query: u64,
    pub quick_check: u64,
    pub deep_check: u64,
    pub sync: u64,
    pub update: u64,
    pub action: u64,
    pub remote_test: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            service_query: SERVICE_QUERY_TIMEOUT_SECS,
            quick_check: QUICK_CHECK_TIMEOUT_SECS,
            deep_check: DEEP_CHECK_TIMEOUT_SECS,
            sync: SYNC_TIMEOUT_SECS,
            update: UPDATE_TIMEOUT_SECS,
            action: ACTION_TIMEOUT_SECS,
            remote_test: REMOTE_TEST_TIMEOUT_SECS,
        }
    }
}

impl TimeoutConfig {
    pub fn service_query(&self) -> Duration {
        Duration::from_secs(self.service_query)
    }

    pub fn quick_check(&self) -> Duration {
        Duration::from_secs(self.quick_check)
    }

    pub fn deep_check(&self) -> Duration {
        Duration::from_secs(self.deep_check)
    }

    pub fn sync(&self) -> Duration {
        Duration::from_secs(self.sync)
    }

    pub fn update(&self) -> Duration {
        Duration::from_secs(self.update)
    }

    pub fn action(&self) -> Duration {
        Duration::from_secs(self.action)
    }

    pub fn remote_test(&self) -> Duration {
        Duration::from_secs(self.remote_test)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("timeouts.service_query", self.service_query),
            ("timeouts.quick_check", self.quick_check),
            ("timeouts.deep_check", self.deep_check),
            ("timeouts.sync", self.sync),
            ("timeouts.update", self.update),
            ("timeouts.action", self.action),
            ("timeouts.remote_test", self.remote_test),
        ];
        for (field, value) in fields {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field: field.to_string(),
                    reason: "timeout must be at least one second".to_string(),
                });
            }
        }
        Ok(())
    }
}

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{?([A-Za-z_][A-Za-z0-9_]*)\}?").expect("valid env var regex")
    })
}

/// Expands `$VAR` and `${VAR}` references within a string.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = env_var_pattern();
    let mut missing = None;
    let result = re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        match env::var(var_name) {
            Ok(value) => value,
            Err(_) => {
                missing.get_or_insert_with(|| var_name.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(var_name) => Err(ConfigError::MissingEnvVar(var_name)),
        None => Ok(result.into_owned()),
    }
}

/// Parses a YAML document into a configuration, expanding environment references.
pub fn parse_config(content: &str) -> Result<DashboardConfig, ConfigError> {
    let expanded = expand_env_vars(content)?;
    let config: DashboardConfig = if expanded.trim().is_empty() {
        DashboardConfig::default()
    } else {
        serde_yaml::from_str(&expanded)?
    };
    config.timeouts.validate()?;
    Ok(config)
}

fn discover_config_path(explicit: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(PathBuf::from(path));
    }
    if let Ok(path) = env::var(CONFIG_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }
    let local = Path::new(DEFAULT_CONFIG_FILE);
    local.exists().then(|| local.to_path_buf())
}

/// Loads the dashboard configuration.
///
/// An explicitly named file (flag or `FRAMESTAT_CONFIG`) must exist; without
/// one, `framestat.yaml` in the working directory is used if present and the
/// built-in defaults otherwise.
pub fn load_config(config_path: Option<&str>) -> Result<DashboardConfig, ConfigError> {
    let mut config = match discover_config_path(config_path) {
        Some(path) => {
            let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            parse_config(&content)?
        }
        None => DashboardConfig::default(),
    };

    if let Ok(port) = env::var(PORT_ENV_VAR) {
        config.server.port = port.trim().parse().map_err(|_| ConfigError::Invalid {
            field: PORT_ENV_VAR.to_string(),
            reason: format!("'{port}' is not a port number"),
        })?;
    }

    Ok(config)
}
