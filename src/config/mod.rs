//! Configuration system for duskmode.
//!
//! Settings live in `duskmode.toml` under `$XDG_CONFIG_HOME/duskmode/` (or the
//! directory given with `--config`). A commented default file is written on
//! first start. Every field is optional:
//!
//! ```toml
//! #[Theme]
//! mode = "auto"              # "auto" follows the sun, "light"/"dark" pin a theme
//! transition = false         # Cross-fade with transition_command when available
//! intensity = false          # Track closeness to the next sunrise/sunset
//!
//! #[Schedule]
//! rate = 4                   # Updates per half-cycle (1-1440), wins over interval
//! interval = 900             # Seconds between updates (10-86400)
//!
//! #[Location]
//! latitude = 52.52           # Stored coordinate, used until one is resolved
//! longitude = 13.405
//! authorization = "always"   # "none", "when-in-use" or "always"
//! unknown_retry = 2.5        # Seconds before asking again (0.1-3600 | 0 = give up)
//! denied_retry = 600         # Seconds before asking again (0.1-86400 | 0 = give up)
//! location_refresh = 3600    # Re-resolve periodically (60-86400 seconds)
//!
//! #[Commands]
//! script_command = "gsettings set org.gnome.desktop.interface color-scheme {scheme}"
//! transition_command = "my-crossfade {theme}"
//! ```
//!
//! An optional `geo.toml` next to the main file overrides `latitude` and
//! `longitude`. It is also where a newly resolved coordinate is persisted, which
//! keeps private location data out of a version-controlled main file.

pub mod builder;
pub mod loading;
pub mod validation;
pub mod watcher;

use serde::Deserialize;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;

use crate::common::constants::*;
use crate::common::utils::private_path;
use crate::core::{SchedulerConfig, SupervisorSettings};
use crate::geo::{AuthorizationLevel, Coordinate, Location, ResolverConfig};
use crate::theme::Mode;

pub use builder::{create_default_config, update_coordinates};
pub use loading::{get_config_path, get_geo_path, load, load_from_path, set_config_dir};
pub use validation::validate_config;
pub use watcher::start_config_watcher;


/// Contents of the optional `geo.toml`.
#[derive(Debug, Deserialize, Clone)]
pub(crate) struct GeoConfig {
    pub(crate) latitude: Option<f64>,
    pub(crate) longitude: Option<f64>,
}

/// Location authorization as written in the config file.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Authorization {
    /// Never ask the location service; use the stored coordinate only.
    None,
    WhenInUse,
    Always,
}

impl Authorization {
    pub fn level(self) -> Option<AuthorizationLevel> {
        match self {
            Authorization::None => None,
            Authorization::WhenInUse => Some(AuthorizationLevel::WhenInUse),
            Authorization::Always => Some(AuthorizationLevel::Always),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Authorization::None => "none",
            Authorization::WhenInUse => "when-in-use",
            Authorization::Always => "always",
        }
    }
}

/// Settings as read from disk.
///
/// All fields are optional in the file; [`loading::load_from_path`] fills in
/// defaults after validation, so a loaded `Config` has every defaulted field
/// set.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct Config {
    pub mode: Option<Mode>,
    pub transition: Option<bool>,
    pub intensity: Option<bool>,
    pub rate: Option<u32>,
    pub interval: Option<u64>, // seconds
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub authorization: Option<Authorization>,
    pub unknown_retry: Option<f64>, // seconds, 0 disables
    pub denied_retry: Option<f64>,  // seconds, 0 disables
    pub location_refresh: Option<u64>, // seconds
    pub script_command: Option<String>,
    pub transition_command: Option<String>,
}

impl Config {
    pub fn mode(&self) -> Mode {
        self.mode.unwrap_or(DEFAULT_MODE)
    }

    /// The coordinate stored in the config files, if complete.
    pub fn stored_location(&self) -> Location {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => {
                Location::Resolved(Coordinate::new(latitude, longitude))
            }
            _ => Location::Unknown,
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            rate: self.rate.and_then(NonZeroU32::new),
            interval: self.interval.map(Duration::from_secs),
            intensity: self.intensity.unwrap_or(DEFAULT_INTENSITY),
            transition: self.transition.unwrap_or(DEFAULT_TRANSITION),
        }
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        let retry = |secs: f64| (secs > 0.0).then(|| Duration::from_secs_f64(secs));
        ResolverConfig {
            authorization: self.authorization.unwrap_or(DEFAULT_AUTHORIZATION).level(),
            unknown_retry: retry(self.unknown_retry.unwrap_or(DEFAULT_UNKNOWN_RETRY_SECS)),
            denied_retry: self.denied_retry.and_then(retry),
            refresh_interval: self.location_refresh.map(Duration::from_secs),
        }
    }

    pub fn supervisor_settings(&self) -> SupervisorSettings {
        SupervisorSettings {
            scheduler: self.scheduler_config(),
            resolver: self.resolver_config(),
            stored_location: self.stored_location(),
        }
    }

    pub fn script_command(&self) -> String {
        self.script_command
            .clone()
            .unwrap_or_else(|| DEFAULT_SCRIPT_COMMAND.to_string())
    }

    pub fn log_config(&self, config_path: Option<&PathBuf>) {
        match config_path {
            Some(path) => log_block_start!("Loaded configuration from {}", private_path(path)),
            None => log_block_start!("Loaded configuration"),
        }

        if get_geo_path().is_ok_and(|path| path.exists()) {
            log_indented!("Loaded coordinates from geo.toml");
        }

        log_indented!("Mode: {}", self.mode());
        let scheduler = self.scheduler_config();
        log_indented!("Updates: {}", scheduler.policy());
        if scheduler.transition {
            log_indented!("Transition: enabled");
        }
        if scheduler.intensity {
            log_indented!("Intensity tracking: enabled");
        }

        match self.stored_location() {
            Location::Resolved(coordinate) => log_indented!("Location: {coordinate}"),
            _ => log_indented!("Location: not stored"),
        }
        log_indented!(
            "Authorization: {}",
            self.authorization.unwrap_or(DEFAULT_AUTHORIZATION).as_str()
        );
        if let Some(refresh) = self.location_refresh {
            log_indented!("Location refresh: every {refresh}s");
        }
    }
}
