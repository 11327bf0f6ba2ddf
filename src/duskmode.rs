//! Application coordinator that manages the complete lifecycle of duskmode.
//!
//! This module acquires the process-wide resources and then sits in the main
//! loop. It manages:
//! - Configuration loading and hot reload
//! - Signal handler setup
//! - The UI thread and the shared [`AppContext`]
//! - The [`SchedulerSupervisor`] that owns the scheduling tasks
//! - Persisting a newly resolved location to `geo.toml`
//!
//! Normal startup is `Duskmode::new(debug_enabled).run()`.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError};

use crate::common::constants::SUPERVISOR_POLL_INTERVAL;
use crate::common::utils::private_path;
use crate::config::{self, Config};
use crate::core::{
    AppContext, Intensity, ScheduleError, SchedulerSupervisor, UiContext, UiHandle,
    UiObservers,
};
use crate::geo::{GeoClueProvider, Location, PhasePredictions, SunriseEquation};
use crate::io::signals::{SignalMessage, SignalState, setup_signal_handler};
use crate::theme::{CommandBackend, Theme, ThemeDispatcher};
use crate::time_source::RealTimeSource;

/// Two stored coordinates closer than this are the same place. Matches the
/// six decimals written to `geo.toml`.
const COORDINATE_EPSILON: f64 = 1e-6;

/// Builder for configuring and running the duskmode daemon.
pub struct Duskmode {
    debug_enabled: bool,
    show_headers: bool,
}

impl Duskmode {
    pub fn new(debug_enabled: bool) -> Self {
        Self {
            debug_enabled,
            show_headers: true,
        }
    }

    /// Skip the version header.
    pub fn without_headers(mut self) -> Self {
        self.show_headers = false;
        self
    }

    /// Run until a shutdown signal arrives or a scheduling error turns fatal.
    pub fn run(self) -> Result<()> {
        if self.show_headers {
            log_version!();
        }

        let config = config::load().context("Configuration failed")?;

        let signal_state = setup_signal_handler(self.debug_enabled)?;

        if let Err(e) =
            config::start_config_watcher(signal_state.signal_sender.clone(), self.debug_enabled)
            && self.debug_enabled
        {
            log_pipe!();
            log_warning!("Config file watching unavailable: {}", e);
            log_indented!("Hot config reload disabled, use SIGUSR2 for manual reload");
        }

        let config_path = config::get_config_path().ok();
        config.log_config(config_path.as_ref());

        let (ui, observers) = UiContext::spawn()?;

        let mut daemon = Daemon {
            supervisor: build_supervisor(&config, ui.handle(), self.debug_enabled),
            config,
            ui: ui.handle(),
            observers: ObserverLog::new(&observers, self.debug_enabled),
            debug_enabled: self.debug_enabled,
        };
        daemon.observers.watch_location(&daemon.supervisor);

        log_block_start!("Starting duskmode in {} mode", daemon.config.mode());
        let mode = daemon.config.mode();
        daemon.apply(|supervisor| supervisor.set_mode(mode))?;

        let result = daemon.main_loop(&signal_state);

        log_block_start!("Shutting down duskmode...");
        let shutdown = daemon.supervisor.shutdown();
        ui.shutdown();
        log_end!();

        result.and(shutdown)
    }
}

/// State owned by the main loop.
struct Daemon {
    supervisor: SchedulerSupervisor,
    config: Config,
    ui: UiHandle,
    observers: ObserverLog,
    debug_enabled: bool,
}

impl Daemon {
    fn main_loop(&mut self, signal_state: &SignalState) -> Result<()> {
        while signal_state.is_running() {
            match signal_state
                .signal_receiver
                .recv_timeout(SUPERVISOR_POLL_INTERVAL)
            {
                Ok(SignalMessage::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Ok(SignalMessage::Reload) => self.reload()?,
                Err(RecvTimeoutError::Timeout) => {}
            }

            if let Some(exit) = self.supervisor.poll()?
                && self.debug_enabled
            {
                log_pipe!();
                log_debug!("Automatic scheduling stopped: {exit}");
            }

            self.observers.drain(&self.config);
        }
        Ok(())
    }

    /// Re-read the configuration and hand what changed to the supervisor.
    fn reload(&mut self) -> Result<()> {
        let new_config = match config::load() {
            Ok(config) => config,
            Err(e) => {
                log_pipe!();
                log_warning!("Failed to reload configuration: {e:#}");
                log_indented!("Keeping the previous configuration");
                return Ok(());
            }
        };

        if new_config == self.config {
            log_block_start!("Configuration unchanged, recomputing");
            return self.apply(|supervisor| supervisor.refresh());
        }

        let mut settings = new_config.supervisor_settings();
        let live = self.supervisor.location().get();
        if same_place(settings.stored_location, live) {
            settings.stored_location = live;
        }

        if new_config.script_command != self.config.script_command
            || new_config.transition_command != self.config.transition_command
        {
            // The commands live in the backend; rebuild around them
            log_block_start!("Theme commands changed, restarting scheduling");
            self.supervisor.shutdown()?;
            if live.is_valid() {
                settings.stored_location = live;
            }
            let mut rebuilt = new_config.clone();
            if let Location::Resolved(coordinate) = settings.stored_location {
                rebuilt.latitude = Some(coordinate.latitude);
                rebuilt.longitude = Some(coordinate.longitude);
            }
            self.supervisor = build_supervisor(&rebuilt, self.ui.clone(), self.debug_enabled);
            self.observers.watch_location(&self.supervisor);
            let mode = new_config.mode();
            self.config = new_config;
            return self.apply(|supervisor| supervisor.set_mode(mode));
        }

        let mode_changed = new_config.mode() != self.config.mode();
        let mode = new_config.mode();
        self.config = new_config;

        if !mode_changed {
            return self.apply(|supervisor| supervisor.update_settings(settings));
        }

        // Order the two so that a running loop is never restarted just to be stopped
        log_block_start!("Switching to {mode} mode");
        if mode.fixed_theme().is_none() {
            self.apply(|supervisor| supervisor.update_settings(settings))?;
            self.apply(|supervisor| supervisor.set_mode(mode))
        } else {
            self.apply(|supervisor| supervisor.set_mode(mode))?;
            self.apply(|supervisor| supervisor.update_settings(settings))
        }
    }

    /// Run a supervisor operation. A [`ScheduleError`] coming out of it is
    /// fatal; anything else is logged and the daemon carries on.
    fn apply(
        &mut self,
        operation: impl FnOnce(&mut SchedulerSupervisor) -> Result<()>,
    ) -> Result<()> {
        match operation(&mut self.supervisor) {
            Ok(()) => Ok(()),
            Err(e) if e.downcast_ref::<ScheduleError>().is_some() => Err(e),
            Err(e) => {
                log_pipe!();
                log_error!("{e:#}");
                Ok(())
            }
        }
    }
}

fn build_supervisor(config: &Config, ui: UiHandle, debug_enabled: bool) -> SchedulerSupervisor {
    let backend = Arc::new(CommandBackend::new(
        config.script_command(),
        config.transition_command.clone(),
    ));
    let dispatcher = ThemeDispatcher::new(backend, debug_enabled);
    let settings = config.supervisor_settings();
    if settings.scheduler.transition {
        dispatcher.probe_transition();
    }

    let context = AppContext {
        time: Arc::new(RealTimeSource),
        predictor: Arc::new(SunriseEquation),
        provider: Arc::new(GeoClueProvider::new(debug_enabled)),
        dispatcher,
        ui,
        // Debug runs surface scheduling errors instead of pausing quietly
        on_error: (!debug_enabled).then(AppContext::logging_error_handler),
        debug_enabled,
    };

    SchedulerSupervisor::new(context, settings)
}

fn same_place(a: Location, b: Location) -> bool {
    match (a, b) {
        (Location::Resolved(a), Location::Resolved(b)) => {
            (a.latitude - b.latitude).abs() < COORDINATE_EPSILON
                && (a.longitude - b.longitude).abs() < COORDINATE_EPSILON
        }
        _ => false,
    }
}

/// Reports what the engine publishes and persists new locations.
struct ObserverLog {
    theme: Receiver<Option<Theme>>,
    predictions: Receiver<Option<PhasePredictions>>,
    intensity: Receiver<Intensity>,
    location: Option<Receiver<Location>>,
    debug_enabled: bool,
}

impl ObserverLog {
    fn new(observers: &UiObservers, debug_enabled: bool) -> Self {
        Self {
            theme: observers.theme.subscribe(),
            predictions: observers.predictions.subscribe(),
            intensity: observers.intensity.subscribe(),
            location: None,
            debug_enabled,
        }
    }

    fn watch_location(&mut self, supervisor: &SchedulerSupervisor) {
        self.location = Some(supervisor.location().subscribe());
    }

    fn drain(&mut self, config: &Config) {
        if let Some(theme) = self.theme.try_iter().last().flatten()
            && self.debug_enabled
        {
            log_debug!("Applied theme: {theme}");
        }

        if let Some(Some(predictions)) = self.predictions.try_iter().last()
            && self.debug_enabled
        {
            let next = predictions.next_transition();
            log_debug!(
                "Next {} at {}",
                if predictions.is_daytime { "sunset" } else { "sunrise" },
                next.with_timezone(&chrono::Local).format("%H:%M:%S")
            );
        }

        if let Some(Intensity::Level(level)) = self.intensity.try_iter().last()
            && self.debug_enabled
        {
            log_debug!("Intensity: {level:.3}");
        }

        let resolved = self
            .location
            .as_ref()
            .and_then(|rx| rx.try_iter().last());
        if let Some(location @ Location::Resolved(coordinate)) = resolved
            && !same_place(location, config.stored_location())
        {
            if let Err(e) = config::update_coordinates(coordinate) {
                log_warning!("Failed to save location: {e:#}");
            } else if self.debug_enabled
                && let Ok(path) = config::get_geo_path()
            {
                log_debug!("Location persisted to {}", private_path(&path));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinate;

    #[test]
    fn test_same_place_tolerates_persisted_precision() {
        let live = Location::Resolved(Coordinate::new(52.520_008_3, 13.404_954_2));
        let stored = Location::Resolved(Coordinate::new(52.520_008, 13.404_954));
        assert!(same_place(live, stored));
        assert!(!same_place(
            live,
            Location::Resolved(Coordinate::new(52.53, 13.404_954))
        ));
        assert!(!same_place(live, Location::Unknown));
        assert!(!same_place(Location::Denied, Location::Denied));
    }
}
