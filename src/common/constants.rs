//! Application-wide defaults and validation limits.

use std::time::Duration;

use crate::config::Authorization;
use crate::theme::Mode;

// # Application Identity

/// Configuration directory and file name under `$XDG_CONFIG_HOME`.
pub const CONFIG_DIR_NAME: &str = "duskmode";
pub const CONFIG_FILE_NAME: &str = "duskmode.toml";
pub const GEO_FILE_NAME: &str = "geo.toml";

/// Desktop id announced to the location service.
pub const DESKTOP_ID: &str = "duskmode";

// # Scheduling

/// Longest wait a single scheduling cycle may arm.
pub const MAXIMUM_DEADLINE_LEAD_SECS: i64 = 86_400;

pub const MINIMUM_RATE: u32 = 1;
pub const MAXIMUM_RATE: u32 = 1440;

pub const MINIMUM_INTERVAL_SECS: u64 = 10;
pub const MAXIMUM_INTERVAL_SECS: u64 = 86_400;

// # Location

/// Delay before asking again after an `unknown` answer.
pub const DEFAULT_UNKNOWN_RETRY_SECS: f64 = 2.5;

pub const MINIMUM_RETRY_SECS: f64 = 0.1;
pub const MAXIMUM_UNKNOWN_RETRY_SECS: f64 = 3_600.0;
pub const MAXIMUM_DENIED_RETRY_SECS: f64 = 86_400.0;

pub const MINIMUM_LOCATION_REFRESH_SECS: u64 = 60;
pub const MAXIMUM_LOCATION_REFRESH_SECS: u64 = 86_400;

/// How long one location request may wait for a fix.
pub const LOCATION_FIX_TIMEOUT: Duration = Duration::from_secs(10);
pub const LOCATION_POLL_INTERVAL: Duration = Duration::from_millis(250);

// # Theme

pub const DEFAULT_MODE: Mode = Mode::Auto;
pub const DEFAULT_TRANSITION: bool = false;
pub const DEFAULT_INTENSITY: bool = false;
pub const DEFAULT_AUTHORIZATION: Authorization = Authorization::Always;

/// Scripted fallback used when no `script_command` is configured.
pub const DEFAULT_SCRIPT_COMMAND: &str =
    "gsettings set org.gnome.desktop.interface color-scheme {scheme}";

// # Runtime

/// Debounce window for config file change events.
pub const CONFIG_DEBOUNCE_MS: u64 = 500;

/// How often the coordinator wakes to check on the supervisor.
pub const SUPERVISOR_POLL_INTERVAL: Duration = Duration::from_millis(500);

// # Exit Codes

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
