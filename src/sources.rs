//! Photo source registry and active-source resolution.
//!
//! Two files are involved:
//! * the registry, one source per line as `id|label|path|enabled[|remote]`,
//!   with `#` comments and blank lines ignored;
//! * `frame_sources.conf`, shell-style `KEY=VALUE` lines carrying
//!   `ACTIVE_SOURCE` and optional `SOURCE_<id>_LABEL` entries.
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::DashboardConfig;
use crate::constants::UNKNOWN_SENTINEL;
use crate::error::SourceError;
use crate::extract;

/// One registered photo source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub label: String,
    pub path: String,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    #[serde(default)]
    pub active: bool,
}

impl Source {
    fn to_line(&self) -> String {
        let mut line = format!(
            "{}|{}|{}|{}",
            self.id,
            self.label,
            self.path,
            if self.enabled { "1" } else { "0" }
        );
        if let Some(remote) = &self.remote {
            line.push('|');
            line.push_str(remote);
        }
        line
    }
}

/// Request body for creating a source.
#[derive(Debug, Clone, Deserialize)]
pub struct NewSource {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub path: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub remote: Option<String>,
}

fn default_enabled() -> bool {
    true
}

fn parse_enabled(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on" | "enabled"
    )
}

/// Parses one registry line; `None` for comments, blanks and malformed lines.
pub fn parse_registry_line(line: &str) -> Option<Source> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }

    let fields: Vec<&str> = trimmed.split('|').map(str::trim).collect();
    if fields.len() < 4 || fields[0].is_empty() {
        warn!("Skipping malformed source registry line: {trimmed}");
        return None;
    }

    Some(Source {
        id: fields[0].to_string(),
        label: fields[1].to_string(),
        path: fields[2].to_string(),
        enabled: parse_enabled(fields[3]),
        remote: fields
            .get(4)
            .filter(|remote| !remote.is_empty())
            .map(|remote| remote.to_string()),
        active: false,
    })
}

/// Parses the whole registry text.
pub fn parse_registry(content: &str) -> Vec<Source> {
    content.lines().filter_map(parse_registry_line).collect()
}

fn unquote(value: &str) -> String {
    value.trim().trim_matches(|c| c == '"' || c == '\'').to_string()
}

/// `ACTIVE_SOURCE` and label entries from `frame_sources.conf`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourcesConf {
    pub active_source: Option<String>,
    pub labels: HashMap<String, String>,
}

impl SourcesConf {
    pub fn parse(content: &str) -> Self {
        let mut conf = SourcesConf::default();
        for raw in content.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line = line.strip_prefix("export ").unwrap_or(line);
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = unquote(value);

            if key == "ACTIVE_SOURCE" {
                conf.active_source = (!value.is_empty()).then_some(value);
            } else if let Some(id) = key
                .strip_prefix("SOURCE_")
                .and_then(|rest| rest.strip_suffix("_LABEL"))
            {
                conf.labels.insert(id.to_string(), value);
            }
        }
        conf
    }

    /// Reads the file; a missing file is an empty conf.
    pub fn load(path: &Path) -> Result<Self, SourceError> {
        match fs::read(path) {
            Ok(bytes) => Ok(Self::parse(&String::from_utf8_lossy(&bytes))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(SourceError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

/// Access to the registry file.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    registry: PathBuf,
    conf: PathBuf,
}

impl SourceRegistry {
    pub fn new(registry: PathBuf, conf: PathBuf) -> Self {
        Self { registry, conf }
    }

    pub fn from_config(config: &DashboardConfig) -> Self {
        Self::new(config.paths.sources_registry(), config.paths.sources_conf())
    }

    fn io_error(&self, source: std::io::Error) -> SourceError {
        SourceError::Io {
            path: self.registry.clone(),
            source,
        }
    }

    fn read_raw(&self) -> Result<String, SourceError> {
        match fs::read(&self.registry) {
            Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(source) => Err(self.io_error(source)),
        }
    }

    fn write_raw(&self, content: &str) -> Result<(), SourceError> {
        if let Some(parent) = self.registry.parent() {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }
        let tmp = self.registry.with_extension("tmp");
        fs::write(&tmp, content).map_err(|source| self.io_error(source))?;
        fs::rename(&tmp, &self.registry).map_err(|source| self.io_error(source))
    }

    /// All registered sources with the active one flagged.
    pub fn list(&self) -> Result<Vec<Source>, SourceError> {
        let active = SourcesConf::load(&self.conf)?.active_source;
        let mut sources = parse_registry(&self.read_raw()?);
        for source in &mut sources {
            source.active = active.as_deref() == Some(source.id.as_str());
        }
        Ok(sources)
    }

    pub fn get(&self, id: &str) -> Result<Option<Source>, SourceError> {
        Ok(self.list()?.into_iter().find(|source| source.id == id))
    }

    /// Appends a validated source to the registry.
    pub fn create(&self, request: NewSource) -> Result<Source, SourceError> {
        let source = validate_new_source(request)?;
        let mut content = self.read_raw()?;
        if parse_registry(&content).iter().any(|existing| existing.id == source.id) {
            return Err(SourceError::Duplicate(source.id));
        }

        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        content.push_str(&source.to_line());
        content.push('\n');
        self.write_raw(&content)?;
        debug!("Registered source {}", source.id);
        Ok(source)
    }

    /// Removes a source, keeping comments and unrelated lines untouched.
    pub fn delete(&self, id: &str) -> Result<(), SourceError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(SourceError::InvalidField {
                field: "id",
                reason: "must not be empty".to_string(),
            });
        }
        if SourcesConf::load(&self.conf)?.active_source.as_deref() == Some(id) {
            return Err(SourceError::Active(id.to_string()));
        }

        let content = self.read_raw()?;
        let mut found = false;
        let kept: Vec<&str> = content
            .lines()
            .filter(|line| {
                let matches = parse_registry_line(line).is_some_and(|source| source.id == id);
                found |= matches;
                !matches
            })
            .collect();

        if !found {
            return Err(SourceError::NotFound(id.to_string()));
        }

        let mut updated = kept.join("\n");
        if !updated.is_empty() {
            updated.push('\n');
        }
        self.write_raw(&updated)
    }
}

fn validate_field(field: &'static str, value: &str) -> Result<String, SourceError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(SourceError::InvalidField {
            field,
            reason: "must not be empty".to_string(),
        });
    }
    if value.contains('|') || value.contains('\n') || value.contains('\r') {
        return Err(SourceError::InvalidField {
            field,
            reason: "must not contain '|' or line breaks".to_string(),
        });
    }
    Ok(value.to_string())
}

fn validate_new_source(request: NewSource) -> Result<Source, SourceError> {
    let id = validate_field("id", &request.id)?;
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(SourceError::InvalidField {
            field: "id",
            reason: "only letters, digits, '_' and '-' are allowed".to_string(),
        });
    }

    let remote = match request.remote.as_deref().map(str::trim) {
        Some("") | None => None,
        Some(remote) => Some(validate_field("remote", remote)?),
    };

    Ok(Source {
        id,
        label: validate_field("label", &request.label)?,
        path: validate_field("path", &request.path)?,
        enabled: request.enabled,
        remote,
        active: false,
    })
}

/// Label of the active source according to the conf file and registry.
///
/// Errors come back next to whatever label could still be resolved: an
/// unreadable registry leaves the bare active id.
pub fn label_from_conf(config: &DashboardConfig) -> (Option<String>, Option<SourceError>) {
    let conf = match SourcesConf::load(&config.paths.sources_conf()) {
        Ok(conf) => conf,
        Err(err) => return (None, Some(err)),
    };
    let Some(active) = conf.active_source else {
        return (None, None);
    };

    if let Some(label) = conf.labels.get(&active).filter(|label| !label.is_empty()) {
        return (Some(label.clone()), None);
    }

    let registry = SourceRegistry::from_config(config);
    match registry.read_raw() {
        Ok(raw) => {
            let from_registry = parse_registry(&raw)
                .into_iter()
                .find(|source| source.id == active)
                .map(|source| source.label)
                .filter(|label| !label.is_empty());
            (Some(from_registry.unwrap_or(active)), None)
        }
        Err(err) => {
            warn!("Falling back to source id '{active}': {err}");
            (Some(active), Some(err))
        }
    }
}

const REMOTE_LABEL_PREFIXES: &[&str] = &[
    "active source:",
    "using remote:",
    "remote path:",
    "remote:",
    "source:",
];

/// Remote label printed by the check script, used when the conf has none.
pub fn label_from_output(lines: &[String]) -> Option<String> {
    lines.iter().rev().find_map(|line| {
        let normalized = extract::normalize(line);
        let trimmed = normalized.trim_start_matches(|c: char| !c.is_ascii_alphanumeric());
        if !REMOTE_LABEL_PREFIXES
            .iter()
            .any(|prefix| trimmed.starts_with(prefix))
        {
            return None;
        }
        extract::value_after_colon(line).filter(|value| !value.is_empty())
    })
}

/// Resolves the "current remote" label: conf file first, then the check
/// script's own output, then `--`.
pub fn resolve_current_remote(
    config: &DashboardConfig,
    quick_output: &[String],
) -> (String, Option<String>) {
    let (from_conf, error) = label_from_conf(config);
    let error = error.map(|err| err.to_string());

    let label = from_conf
        .or_else(|| label_from_output(quick_output))
        .unwrap_or_else(|| UNKNOWN_SENTINEL.to_string());
    (label, error)
}
