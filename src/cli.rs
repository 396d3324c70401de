//! Command-line interface for framestat.
use std::str::FromStr;

use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;

/// Wrapper around `LevelFilter` so clap can parse log levels from either
/// string names ("info", "debug", etc.) or numeric shorthands (0-5).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LogLevelArg(LevelFilter);

impl LogLevelArg {
    /// Directive string suitable for `EnvFilter`.
    pub fn as_str(&self) -> &'static str {
        match self.0 {
            LevelFilter::OFF => "off",
            LevelFilter::ERROR => "error",
            LevelFilter::WARN => "warn",
            LevelFilter::INFO => "info",
            LevelFilter::DEBUG => "debug",
            LevelFilter::TRACE => "trace",
        }
    }
}

impl FromStr for LogLevelArg {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err("log level cannot be empty".into());
        }

        if let Ok(number) = trimmed.parse::<u8>() {
            let level = match number {
                0 => LevelFilter::OFF,
                1 => LevelFilter::ERROR,
                2 => LevelFilter::WARN,
                3 => LevelFilter::INFO,
                4 => LevelFilter::DEBUG,
                5 => LevelFilter::TRACE,
                _ => {
                    return Err(format!(
                        "unsupported log level number '{number}' (expected 0-5)"
                    ));
                }
            };
            return Ok(LogLevelArg(level));
        }

        let level = match trimmed.to_ascii_lowercase().as_str() {
            "off" => LevelFilter::OFF,
            "error" | "err" => LevelFilter::ERROR,
            "warn" | "warning" => LevelFilter::WARN,
            "info" => LevelFilter::INFO,
            "debug" => LevelFilter::DEBUG,
            "trace" => LevelFilter::TRACE,
            _ => return Err(format!("invalid log level '{trimmed}'")),
        };
        Ok(LogLevelArg(level))
    }
}

/// Command-line interface for framestat.
#[derive(Parser)]
#[command(name = "framestat", version, author)]
#[command(about = "Sync status dashboard for a photo frame", long_about = None)]
pub struct Cli {
    /// Path to the configuration file (defaults to `$FRAMESTAT_CONFIG`, then
    /// `framestat.yaml`, then built-in defaults).
    #[arg(short, long, value_name = "PATH", global = true)]
    pub config: Option<String>,

    /// Override the logging verbosity for this invocation only.
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevelArg>,

    /// The command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for framestat.
#[derive(Subcommand)]
pub enum Commands {
    /// Serve the dashboard and its JSON API.
    Serve {
        /// Address to bind, overriding the config file.
        #[arg(long)]
        bind: Option<String>,

        /// Port to listen on, overriding the config file.
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Collect the status once and print it.
    Status {
        /// Print the raw JSON payload.
        #[arg(long)]
        json: bool,
    },

    /// Run only the quick check and print the parsed result as JSON.
    Check,

    /// List the registered photo sources.
    Sources,

    /// Print the auto-update settings as `KEY=value` lines for shell scripts.
    AutoUpdateConfig,
}

/// Parse command-line arguments.
pub fn parse_args() -> Cli {
    Cli::parse()
}
