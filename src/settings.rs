//! Frame settings file (`KEY=VALUE` per line) edited from the dashboard.
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use serde::Serialize;
use tracing::{debug, info};

use crate::error::SettingsError;

/// Defaults applied to the auto-update settings when the file is silent.
pub const AUTO_UPDATE_DEFAULTS: &[(&str, &str)] = &[
    ("AUTO_UPDATE_ENABLED", "false"),
    ("AUTO_UPDATE_FREQUENCY", "monthly"),
    ("AUTO_UPDATE_DAY", "0"),
    ("AUTO_UPDATE_HOUR", "3"),
    ("AUTO_UPDATE_MINUTE", "30"),
];

/// Value shape of a known setting, as rendered by the settings form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingKind {
    Bool,
    Choice,
    Integer,
}

/// Form metadata for one known setting.
#[derive(Debug, Clone, Serialize)]
pub struct SettingSchema {
    #[serde(rename = "type")]
    pub kind: SettingKind,
    pub default: &'static str,
    pub description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<&'static [&'static str]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<u32>,
}

impl SettingSchema {
    const fn new(kind: SettingKind, default: &'static str, description: &'static str) -> Self {
        Self {
            kind,
            default,
            description,
            options: None,
            min: None,
            max: None,
        }
    }

    const fn range(mut self, min: u32, max: u32) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    /// Problem with `value` for this setting, if any.
    fn check(&self, key: &str, value: &str) -> Option<String> {
        let value = value.trim();
        match self.kind {
            SettingKind::Bool if !matches!(value, "true" | "false") => {
                Some(format!("{key}: must be true or false"))
            }
            SettingKind::Choice => {
                let options = self.options.unwrap_or_default();
                (!options.contains(&value))
                    .then(|| format!("{key}: must be one of {}", options.join(", ")))
            }
            SettingKind::Integer => {
                let in_range = value.parse::<u32>().is_ok_and(|number| {
                    self.min.is_none_or(|min| number >= min)
                        && self.max.is_none_or(|max| number <= max)
                });
                (!in_range).then(|| {
                    format!(
                        "{key}: must be a whole number from {} to {}",
                        self.min.unwrap_or(0),
                        self.max.unwrap_or(u32::MAX)
                    )
                })
            }
            _ => None,
        }
    }
}

/// Known settings and their form metadata, keyed by setting name.
pub fn settings_schema() -> BTreeMap<&'static str, SettingSchema> {
    use SettingKind::*;

    let mut frequency = SettingSchema::new(Choice, "monthly", "How often to check for updates");
    frequency.options = Some(&["daily", "weekly", "monthly"]);

    BTreeMap::from([
        (
            "AUTO_UPDATE_ENABLED",
            SettingSchema::new(Bool, "false", "Install updates automatically"),
        ),
        ("AUTO_UPDATE_FREQUENCY", frequency),
        (
            "AUTO_UPDATE_DAY",
            SettingSchema::new(Integer, "0", "Day of week (weekly) or month (monthly)")
                .range(0, 31),
        ),
        (
            "AUTO_UPDATE_HOUR",
            SettingSchema::new(Integer, "3", "Hour to run the update").range(0, 23),
        ),
        (
            "AUTO_UPDATE_MINUTE",
            SettingSchema::new(Integer, "30", "Minute to run the update").range(0, 59),
        ),
    ])
}

/// Snapshot returned by `GET /api/config`.
#[derive(Debug, Clone, Serialize)]
pub struct SettingsView {
    pub exists: bool,
    pub config: BTreeMap<String, String>,
    pub config_path: String,
}

/// Reads and writes the settings file.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

fn unquote(value: &str) -> String {
    let value = value.trim();
    let stripped = value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .or_else(|| {
            value
                .strip_prefix('\'')
                .and_then(|rest| rest.strip_suffix('\''))
        });
    stripped.unwrap_or(value).to_string()
}

/// Parses `KEY=VALUE` lines; comments, blanks and lines without `=` are skipped.
pub fn parse_settings(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), unquote(value)))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

fn valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    chars.next().is_some_and(|c| c.is_ascii_uppercase())
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Validates submitted settings, returning every problem found.
pub fn validate_settings(settings: &BTreeMap<String, String>) -> Vec<String> {
    let schema = settings_schema();
    let mut errors = Vec::new();
    for (key, value) in settings {
        if !valid_key(key) {
            errors.push(format!("{key}: keys must be upper-case identifiers"));
        }
        if value.contains('\n') || value.contains('\r') {
            errors.push(format!("{key}: value must be a single line"));
        }
        if value.contains('"') {
            errors.push(format!("{key}: value must not contain double quotes"));
        }
        if let Some(problem) = schema.get(key.as_str()).and_then(|entry| entry.check(key, value)) {
            errors.push(problem);
        }
    }
    errors
}

/// Non-fatal remarks about submitted settings: keys the form does not know.
pub fn settings_warnings(settings: &BTreeMap<String, String>) -> Vec<String> {
    let schema = settings_schema();
    settings
        .keys()
        .filter(|key| !schema.contains_key(key.as_str()))
        .map(|key| format!("{key}: not a known setting; stored as-is"))
        .collect()
}

/// Download name for an exported settings file.
pub fn export_filename() -> String {
    let host = match nix::unistd::gethostname() {
        Ok(name) => name.to_string_lossy().into_owned(),
        Err(err) => {
            debug!("gethostname failed: {err}");
            String::new()
        }
    };
    let host = host.trim();
    format!(
        "picframe-config-{}.txt",
        if host.is_empty() { "frame" } else { host }
    )
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn io_error(&self, source: std::io::Error) -> SettingsError {
        SettingsError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Current settings; a missing file reads as empty.
    pub fn read(&self) -> Result<BTreeMap<String, String>, SettingsError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(parse_settings(&String::from_utf8_lossy(&bytes))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(source) => Err(self.io_error(source)),
        }
    }

    pub fn view(&self) -> Result<SettingsView, SettingsError> {
        Ok(SettingsView {
            exists: self.exists(),
            config: self.read()?,
            config_path: self.path.display().to_string(),
        })
    }

    /// Raw file content for download; `None` when there is no file.
    pub fn export(&self) -> Result<Option<String>, SettingsError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(self.io_error(source)),
        }
    }

    /// Settings merged over [`AUTO_UPDATE_DEFAULTS`].
    pub fn with_defaults(&self) -> Result<BTreeMap<String, String>, SettingsError> {
        let mut merged: BTreeMap<String, String> = AUTO_UPDATE_DEFAULTS
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        merged.extend(self.read()?);
        Ok(merged)
    }

    /// Validates and merges `updates` into the file, rewriting it atomically.
    /// Returns the warnings for the accepted updates.
    pub fn write(&self, updates: &BTreeMap<String, String>) -> Result<Vec<String>, SettingsError> {
        let errors = validate_settings(updates);
        if !errors.is_empty() {
            return Err(SettingsError::Invalid(errors));
        }

        let mut merged = self.read()?;
        merged.extend(updates.iter().map(|(k, v)| (k.clone(), v.trim().to_string())));

        let mut content = String::from("# Managed by framestat\n");
        for (key, value) in &merged {
            content.push_str(&format!("{key}=\"{value}\"\n"));
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, content).map_err(|source| self.io_error(source))?;
        fs::rename(&tmp, &self.path).map_err(|source| self.io_error(source))?;
        info!("Wrote {} settings to {}", merged.len(), self.path.display());
        Ok(settings_warnings(updates))
    }
}

/// Auto-update settings in the `KEY=value` form consumed by shell scripts.
pub fn auto_update_lines(settings: &BTreeMap<String, String>) -> Vec<String> {
    AUTO_UPDATE_DEFAULTS
        .iter()
        .map(|(key, default)| {
            let short = key.trim_start_matches("AUTO_UPDATE_");
            let value = settings.get(*key).map(String::as_str).unwrap_or(*default);
            format!("{short}={value}")
        })
        .collect()
}
