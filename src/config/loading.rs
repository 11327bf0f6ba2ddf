//! Configuration loading functionality.
//!
//! Handles locating and reading `duskmode.toml`, merging the `geo.toml`
//! coordinate override and applying defaults.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use super::builder::create_default_config;
use super::validation::validate_config;
use super::{Config, GeoConfig};
use crate::common::constants::*;
use crate::common::utils::private_path;

/// Global configuration directory, set once at startup
static CONFIG_DIR: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Set the configuration directory for the current process.
/// This can only be called once, typically at startup.
/// Returns an error if already set.
pub fn set_config_dir(dir: Option<String>) -> Result<()> {
    CONFIG_DIR
        .set(dir.map(PathBuf::from))
        .map_err(|_| anyhow::anyhow!("Configuration directory already set"))
}

/// Path of `duskmode.toml`: the `--config` directory if one was given,
/// otherwise `$XDG_CONFIG_HOME/duskmode/`.
pub fn get_config_path() -> Result<PathBuf> {
    if let Some(custom_dir) = CONFIG_DIR.get().and_then(|d| d.clone()) {
        return Ok(custom_dir.join(CONFIG_FILE_NAME));
    }

    let config_dir = dirs::config_dir().context("Could not determine config directory")?;
    Ok(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// The directory containing `duskmode.toml` and `geo.toml`.
pub fn get_config_base_dir() -> Result<PathBuf> {
    let config_path = get_config_path()?;
    config_path
        .parent()
        .map(|p| p.to_path_buf())
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
}

pub fn get_geo_path() -> Result<PathBuf> {
    Ok(get_config_base_dir()?.join(GEO_FILE_NAME))
}

/// Load configuration using automatic path detection.
///
/// A commented default file is created first if none exists.
pub fn load() -> Result<Config> {
    let config_path = get_config_path()?;

    if !config_path.exists() {
        create_default_config(&config_path, None)
            .context("Failed to create default config during load")?;
        log_block_start!("Created default configuration at {}", private_path(&config_path));
    }

    load_from_path(&config_path).with_context(|| {
        format!(
            "Failed to load configuration from {}",
            private_path(&config_path)
        )
    })
}

/// Load configuration from a specific path.
///
/// This version does NOT create a default config if the path doesn't exist.
pub fn load_from_path(path: &Path) -> Result<Config> {
    if !path.exists() {
        anyhow::bail!(
            "Configuration file not found at {}",
            private_path(path)
        );
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", private_path(path)))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config from {}", private_path(path)))?;

    // geo.toml values are validated together with the main file
    load_geo_override_from_path(&mut config, path)?;

    validate_config(&config)?;

    apply_defaults(&mut config);

    Ok(config)
}

/// Fill in every field that has a fixed default.
///
/// `rate`, `interval`, the coordinate, `denied_retry`, `location_refresh` and
/// `transition_command` stay unset when absent since absence is meaningful.
fn apply_defaults(config: &mut Config) {
    if config.mode.is_none() {
        config.mode = Some(DEFAULT_MODE);
    }
    if config.transition.is_none() {
        config.transition = Some(DEFAULT_TRANSITION);
    }
    if config.intensity.is_none() {
        config.intensity = Some(DEFAULT_INTENSITY);
    }
    if config.authorization.is_none() {
        config.authorization = Some(DEFAULT_AUTHORIZATION);
    }
    if config.unknown_retry.is_none() {
        config.unknown_retry = Some(DEFAULT_UNKNOWN_RETRY_SECS);
    }
    if config.script_command.is_none() {
        config.script_command = Some(DEFAULT_SCRIPT_COMMAND.to_string());
    }
}

/// Load geo.toml from the directory of a specific config path
pub(crate) fn load_geo_override_from_path(config: &mut Config, config_path: &Path) -> Result<()> {
    let geo_path = if let Some(parent) = config_path.parent() {
        parent.join(GEO_FILE_NAME)
    } else {
        return Ok(());
    };

    if !geo_path.exists() {
        return Ok(());
    }

    match fs::read_to_string(&geo_path) {
        Ok(content) => match toml::from_str::<GeoConfig>(&content) {
            Ok(geo_config) => {
                if let Some(lat) = geo_config.latitude {
                    config.latitude = Some(lat);
                }
                if let Some(lon) = geo_config.longitude {
                    config.longitude = Some(lon);
                }
            }
            Err(e) => {
                log_warning!(
                    "Failed to parse geo.toml: {e}. Using coordinates from main config."
                );
            }
        },
        Err(e) => {
            log_warning!("Failed to read geo.toml: {e}. Using coordinates from main config.");
        }
    }

    Ok(())
}
