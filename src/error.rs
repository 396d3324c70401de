//! Error handling for framestat.
use std::{path::PathBuf, time::Duration};

use thiserror::Error;

/// Errors raised while loading the dashboard configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Error reading or accessing a configuration file.
    #[error("Failed to read config file {path}: {source}")]
    Read {
        /// Path that could not be read.
        path: PathBuf,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },

    /// Error parsing YAML configuration.
    #[error("Invalid YAML format: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The configuration references an environment variable that is not set.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// A value is present but unusable (e.g. a zero timeout).
    #[error("Invalid configuration value for '{field}': {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: String,
        /// Human-readable explanation.
        reason: String,
    },
}

/// Uniform failure descriptor returned by the process invoker.
///
/// A nonzero exit status is *not* an error at this level; callers inspect
/// [`crate::process::CommandOutput::exit_code`] themselves.
#[derive(Debug, Error)]
pub enum InvokeError {
    /// The command vector was empty.
    #[error("No command given")]
    EmptyCommand,

    /// The binary could not be located.
    #[error("Command not found: {program}")]
    NotFound {
        /// Program that was requested.
        program: String,
    },

    /// The binary exists but may not be executed.
    #[error("Permission denied running {program}")]
    PermissionDenied {
        /// Program that was requested.
        program: String,
    },

    /// The command did not finish in time and was killed.
    #[error("{program} timed out after {}s", .after.as_secs())]
    Timeout {
        /// Program that was requested.
        program: String,
        /// Timeout that elapsed.
        after: Duration,
    },

    /// Any other I/O failure while spawning or waiting.
    #[error("Failed to run {program}: {source}")]
    Io {
        /// Program that was requested.
        program: String,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },
}

impl InvokeError {
    /// Stable short identifier for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            InvokeError::EmptyCommand => "empty_command",
            InvokeError::NotFound { .. } => "not_found",
            InvokeError::PermissionDenied { .. } => "permission_denied",
            InvokeError::Timeout { .. } => "timeout",
            InvokeError::Io { .. } => "io",
        }
    }

    /// Maps a spawn-time I/O error onto the matching variant.
    pub fn from_spawn(program: &str, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::NotFound => InvokeError::NotFound {
                program: program.to_string(),
            },
            std::io::ErrorKind::PermissionDenied => InvokeError::PermissionDenied {
                program: program.to_string(),
            },
            _ => InvokeError::Io {
                program: program.to_string(),
                source,
            },
        }
    }
}

/// Errors raised while reading the sync log.
#[derive(Debug, Error)]
pub enum LogError {
    /// The log exists but could not be read.
    #[error("Failed to read log file {path}: {source}")]
    Read {
        /// Path of the log file.
        path: PathBuf,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by source registry operations.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Registry or source conf could not be read or written.
    #[error("Source registry I/O failed for {path}: {source}")]
    Io {
        /// File being accessed.
        path: PathBuf,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },

    /// Request carried a missing or malformed field.
    #[error("Invalid source field '{field}': {reason}")]
    InvalidField {
        /// Field name.
        field: &'static str,
        /// Human-readable explanation.
        reason: String,
    },

    /// A source with this id already exists.
    #[error("Source '{0}' already exists")]
    Duplicate(String),

    /// No source with this id exists.
    #[error("Source '{0}' not found")]
    NotFound(String),

    /// The active source cannot be removed.
    #[error("Source '{0}' is active and cannot be deleted")]
    Active(String),
}

impl SourceError {
    /// Whether the error stems from the caller's request rather than the backend.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, SourceError::Io { .. })
    }
}

/// Errors raised by the settings store.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Settings file could not be read or written.
    #[error("Settings file I/O failed for {path}: {source}")]
    Io {
        /// File being accessed.
        path: PathBuf,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },

    /// One or more submitted settings failed validation.
    #[error("Invalid settings: {}", .0.join("; "))]
    Invalid(Vec<String>),
}
