//! Framestat is a status dashboard for a photo-frame sync appliance. It shells out
//! to the frame's maintenance scripts and service managers, parses their loosely
//! structured output and the sync log, and serves one reconciled status payload
//! (plus a handful of operator actions) over HTTP.

/// Operator actions triggered from the dashboard.
pub mod actions;

/// CLI interface.
pub mod cli;

/// Configuration management.
pub mod config;

/// Default values shared across modules.
pub mod constants;

/// Error handling.
pub mod error;

/// Marker and value extraction from noisy text.
pub mod extract;

/// Sync log reader.
pub mod logs;

/// Subprocess execution with timeouts.
pub mod process;

/// Quick sync check runner and parser.
pub mod quick_check;

/// System and user service probes.
pub mod services;

/// Frame settings file.
pub mod settings;

/// Photo source registry.
pub mod sources;

/// Status reconciliation.
pub mod status;

/// HTTP server.
pub mod web;
