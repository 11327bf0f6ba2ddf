//! Writing configuration files: the commented default `duskmode.toml` and the
//! `geo.toml` that holds a persisted coordinate.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use super::loading::{get_config_base_dir, get_geo_path};
use crate::common::constants::*;
use crate::common::utils::private_path;
use crate::geo::Coordinate;

/// Create a default configuration file with every setting documented.
///
/// When `coordinate` is given it is stored in `geo.toml` next to the new file
/// rather than in the main file.
pub fn create_default_config(path: &Path, coordinate: Option<Coordinate>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    let config_content = ConfigBuilder::new()
        .add_section("Theme")
        .add_setting(
            "mode",
            &format!("\"{DEFAULT_MODE}\""),
            "\"auto\" follows the sun, \"light\" or \"dark\" pin a theme",
        )
        .add_setting(
            "transition",
            &DEFAULT_TRANSITION.to_string(),
            "Cross-fade with transition_command when available",
        )
        .add_setting(
            "intensity",
            &DEFAULT_INTENSITY.to_string(),
            "Track closeness to the next sunrise or sunset",
        )
        .add_section("Schedule")
        .add_commented_setting(
            "rate",
            "4",
            &format!(
                "Updates per half-cycle ({MINIMUM_RATE}-{MAXIMUM_RATE}), wins over interval"
            ),
        )
        .add_commented_setting(
            "interval",
            "900",
            &format!(
                "Seconds between updates ({MINIMUM_INTERVAL_SECS}-{MAXIMUM_INTERVAL_SECS})"
            ),
        )
        .add_section("Location")
        .add_setting(
            "authorization",
            &format!("\"{}\"", DEFAULT_AUTHORIZATION.as_str()),
            "Location access: \"none\", \"when-in-use\" or \"always\"",
        )
        .add_setting(
            "unknown_retry",
            &DEFAULT_UNKNOWN_RETRY_SECS.to_string(),
            &format!(
                "Seconds before asking again after no fix ({MINIMUM_RETRY_SECS}-{MAXIMUM_UNKNOWN_RETRY_SECS} | 0 = give up)"
            ),
        )
        .add_commented_setting(
            "denied_retry",
            "600",
            &format!(
                "Seconds before asking again after a denial ({MINIMUM_RETRY_SECS}-{MAXIMUM_DENIED_RETRY_SECS} | 0 = give up)"
            ),
        )
        .add_commented_setting(
            "location_refresh",
            "3600",
            &format!(
                "Re-resolve the location periodically ({MINIMUM_LOCATION_REFRESH_SECS}-{MAXIMUM_LOCATION_REFRESH_SECS}) seconds"
            ),
        )
        .add_section("Commands")
        .add_setting(
            "script_command",
            &format!("\"{DEFAULT_SCRIPT_COMMAND}\""),
            "Applies a theme; {theme} and {scheme} are substituted",
        )
        .add_commented_setting(
            "transition_command",
            "\"my-crossfade {theme}\"",
            "Animated alternative, used when transition = true",
        )
        .build();

    fs::write(path, config_content).context("Failed to write default config file")?;

    if let Some(coordinate) = coordinate
        && let Some(dir) = path.parent()
    {
        write_geo_file(&dir.join(GEO_FILE_NAME), coordinate)?;
    }

    Ok(())
}

/// Persist a resolved coordinate to `geo.toml` in the active config directory.
///
/// The main configuration file is never touched.
pub fn update_coordinates(coordinate: Coordinate) -> Result<()> {
    let dir = get_config_base_dir()?;
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", private_path(&dir)))?;

    let geo_path = get_geo_path()?;
    write_geo_file(&geo_path, coordinate)?;

    log_block_start!("Saved location to {}", private_path(&geo_path));
    log_indented!("Latitude: {:.6}", coordinate.latitude);
    log_indented!("Longitude: {:.6}", coordinate.longitude);
    Ok(())
}

fn write_geo_file(geo_path: &Path, coordinate: Coordinate) -> Result<()> {
    let geo_content = format!(
        "#[Private geo coordinates]\nlatitude = {:.6}\nlongitude = {:.6}\n",
        coordinate.latitude, coordinate.longitude
    );
    fs::write(geo_path, geo_content)
        .with_context(|| format!("Failed to write coordinates to {}", private_path(geo_path)))
}

/// Builds a TOML document whose trailing comments line up in one column.
struct ConfigBuilder {
    entries: Vec<ConfigEntry>,
}

struct ConfigEntry {
    content: String,
    entry_type: EntryType,
}

enum EntryType {
    Section,
    Setting { line: String, comment: String },
}

impl ConfigBuilder {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn add_section(mut self, title: &str) -> Self {
        self.entries.push(ConfigEntry {
            content: format!("#[{title}]"),
            entry_type: EntryType::Section,
        });
        self
    }

    fn add_setting(mut self, key: &str, value: &str, comment: &str) -> Self {
        self.entries.push(ConfigEntry {
            content: String::new(),
            entry_type: EntryType::Setting {
                line: format!("{key} = {value}"),
                comment: format!("# {comment}"),
            },
        });
        self
    }

    /// A setting that is documented but left disabled.
    fn add_commented_setting(mut self, key: &str, value: &str, comment: &str) -> Self {
        self.entries.push(ConfigEntry {
            content: String::new(),
            entry_type: EntryType::Setting {
                line: format!("#{key} = {value}"),
                comment: format!("# {comment}"),
            },
        });
        self
    }

    fn build(self) -> String {
        let max_width = self
            .entries
            .iter()
            .filter_map(|entry| match &entry.entry_type {
                EntryType::Setting { line, .. } => Some(line.len()),
                EntryType::Section => None,
            })
            .max()
            .unwrap_or(0)
            + 1;

        let mut result = Vec::new();
        let mut first_section = true;

        for entry in self.entries {
            match entry.entry_type {
                EntryType::Section => {
                    if !first_section {
                        result.push(String::new());
                    }
                    result.push(entry.content);
                    first_section = false;
                }
                EntryType::Setting { line, comment } => {
                    let padding = " ".repeat(max_width - line.len());
                    result.push(format!("{line}{padding}{comment}"));
                }
            }
        }

        let mut document = result.join("\n");
        document.push('\n');
        document
    }
}
