//! Constants and default values for the framestat dashboard.
//!
//! Everything here is a default; the live values come from
//! [`crate::config::DashboardConfig`].

use std::time::Duration;

// ============================================================================
// Process Environment
// ============================================================================

/// PATH handed to child processes when the host environment has none.
/// Service managers frequently start us with a stripped environment.
pub const DEFAULT_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

/// Polling interval while waiting on a child process.
pub const CHILD_POLL_INTERVAL: Duration = Duration::from_millis(50);

// ============================================================================
// Timeouts
// ============================================================================

/// Timeout for a single `systemctl`/`loginctl` query.
pub const SERVICE_QUERY_TIMEOUT_SECS: u64 = 10;

/// Timeout for the quick (default-mode) sync check.
pub const QUICK_CHECK_TIMEOUT_SECS: u64 = 120;

/// Timeout for the detailed (`--d`) sync check.
pub const DEEP_CHECK_TIMEOUT_SECS: u64 = 600;

/// Timeout for the update script.
pub const UPDATE_TIMEOUT_SECS: u64 = 600;

/// Timeout for a manually triggered sync.
pub const SYNC_TIMEOUT_SECS: u64 = 300;

/// Timeout for restarts, source switches and other short actions.
pub const ACTION_TIMEOUT_SECS: u64 = 60;

/// Timeout for an `rclone lsf` connectivity test.
pub const REMOTE_TEST_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Payload Sentinels
// ============================================================================

/// Placeholder shown for any unknown timestamp or label.
pub const UNKNOWN_SENTINEL: &str = "--";

/// Service state used when no probe produced a usable answer.
pub const UNKNOWN_STATE: &str = "unknown";

/// Format of the leading timestamp on every sync log line.
pub const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Byte width of [`LOG_TIMESTAMP_FORMAT`] once rendered.
pub const LOG_TIMESTAMP_WIDTH: usize = 19;

// ============================================================================
// Log Markers
// ============================================================================

/// Number of trailing log lines shipped to the dashboard.
pub const DEFAULT_TAIL_LINES: usize = 60;

/// Log line marker written after the frame service restarted.
pub const DEFAULT_RESTART_MARKER: &str = "Service picframe.service restarted successfully";

/// Log line marker written after a completed download.
pub const DEFAULT_DOWNLOAD_MARKER: &str = "rclone sync completed successfully";

// ============================================================================
// Appliance Layout
// ============================================================================

/// Root of the frame application checkout.
pub const DEFAULT_APP_ROOT: &str = "/home/pi/picframe_3.0";

/// Append-only sync log.
pub const DEFAULT_LOG_FILE: &str = "/home/pi/logs/frame_sync.log";

/// System-scoped unit serving this dashboard.
pub const DEFAULT_WEB_SERVICE: &str = "pf-web-status.service";

/// User-scoped unit running the frame itself.
pub const DEFAULT_PF_SERVICE: &str = "picframe.service";

/// Account owning the user-scoped frame service.
pub const DEFAULT_FRAME_USER: &str = "pi";

/// Process name matched during the process-list fallback.
pub const DEFAULT_PF_PROCESS: &str = "picframe";

/// Default listening port.
pub const DEFAULT_PORT: u16 = 5050;
