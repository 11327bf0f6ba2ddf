//! Set command implementation: apply a theme once and exit.
//!
//! `set auto` applies whatever the sun says right now for the configured (or
//! freshly requested) coordinate.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::config;
use crate::core::ScheduleError;
use crate::geo::{Coordinate, GeoClueProvider, SolarPredictor, SunriseEquation};
use crate::theme::{CommandBackend, DispatchOutcome, Mode, Theme, ThemeDispatcher};

pub fn handle_set_command(mode: Mode, debug_enabled: bool) -> Result<()> {
    log_version!();

    let config = config::load().context("Configuration failed")?;

    let target = match mode.fixed_theme() {
        Some(theme) => theme,
        None => {
            let provider = Arc::new(GeoClueProvider::new(debug_enabled));
            let coordinate = super::locate_once(&config, provider, debug_enabled)?;
            predicted_theme(&SunriseEquation, coordinate, Utc::now())?
        }
    };

    let backend = Arc::new(CommandBackend::new(
        config.script_command(),
        config.transition_command.clone(),
    ));
    let dispatcher = ThemeDispatcher::new(backend, debug_enabled);

    match dispatcher.apply(target, config.scheduler_config().transition)? {
        DispatchOutcome::Unchanged => log_block_start!("Already using the {target} theme"),
        DispatchOutcome::Animated | DispatchOutcome::Scripted => {}
    }
    log_end!();
    Ok(())
}

/// The theme of the half-cycle `now` falls in.
pub(crate) fn predicted_theme(
    predictor: &dyn SolarPredictor,
    coordinate: Coordinate,
    now: DateTime<Utc>,
) -> Result<Theme, ScheduleError> {
    predictor
        .predict(now, coordinate)
        .map(|predictions| Theme::for_predictions(&predictions))
        .ok_or(ScheduleError::UnableToPredict {
            location: coordinate,
            at: now,
        })
}

pub fn display_help() {
    log_version!();
    log_block_start!("set - Apply a theme once");
    log_block_start!("Usage: duskmode set <light|dark|auto>");
    log_block_start!("Arguments:");
    log_indented!("light, dark  Apply that theme");
    log_indented!("auto         Apply the theme matching the sun at your location");
    log_block_start!("Notes:");
    log_indented!("The theme is applied with script_command, or transition_command");
    log_indented!("when transition = true. A running daemon is not affected.");
    log_end!();
}
