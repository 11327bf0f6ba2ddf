//! Mode-driven ownership of the scheduling tasks.
//!
//! In automatic mode the supervisor runs two threads under one child cancel
//! token: the location resolver (sole writer of the location cell) and the
//! deadline scheduler (its reader). In a fixed mode nothing runs; the pinned
//! theme is dispatched once. Every mode change cancels and joins the previous
//! run before the next one starts, so at most one loop is ever alive.
//!
//! The location publisher moves into the resolver thread for the length of a
//! run and comes back when the thread is joined.

use anyhow::{Context, Result};
use std::thread::{self, JoinHandle};

use super::cancel::CancelToken;
use super::cell::{Publisher, Subscriber, observable};
use super::context::AppContext;
use super::deadline::ScheduleError;
use super::scheduler::{DeadlineScheduler, LoopExit, ScheduleAction, SchedulerConfig};
use crate::geo::{Location, LocationResolver, ResolverConfig};
use crate::theme::{Mode, Theme, ThemeDispatcher};

/// Everything configurable about an automatic run.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SupervisorSettings {
    pub scheduler: SchedulerConfig,
    pub resolver: ResolverConfig,
    /// Caller-provided coordinate, seeded into the location cell.
    pub stored_location: Location,
}

struct AutoRun {
    cancel: CancelToken,
    resolver: JoinHandle<Publisher<Location>>,
    scheduler: JoinHandle<Result<LoopExit, ScheduleError>>,
}

pub struct SchedulerSupervisor {
    context: AppContext,
    settings: SupervisorSettings,
    mode: Mode,
    applied: bool,
    root: CancelToken,
    // `None` while a run owns it
    location: Option<Publisher<Location>>,
    location_rx: Subscriber<Location>,
    run: Option<AutoRun>,
}

impl SchedulerSupervisor {
    /// Create an idle supervisor. Nothing runs until [`Self::set_mode`].
    pub fn new(context: AppContext, settings: SupervisorSettings) -> Self {
        let (location, location_rx) = observable(settings.stored_location);
        Self {
            context,
            settings,
            mode: Mode::Auto,
            applied: false,
            root: CancelToken::new(),
            location: Some(location),
            location_rx,
            run: None,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn settings(&self) -> &SupervisorSettings {
        &self.settings
    }

    /// Reader of the shared location cell.
    pub fn location(&self) -> Subscriber<Location> {
        self.location_rx.clone()
    }

    /// Whether an automatic loop is alive.
    pub fn is_running(&self) -> bool {
        self.run
            .as_ref()
            .is_some_and(|run| !run.scheduler.is_finished())
    }

    /// Switch to `mode`. Re-applying the current mode does nothing.
    pub fn set_mode(&mut self, mode: Mode) -> Result<()> {
        if self.applied && mode == self.mode {
            return Ok(());
        }
        let stopped = self.stop_run();
        self.mode = mode;
        self.applied = true;
        self.start()?;
        stopped.map(|_| ())
    }

    /// Recompute from scratch: restart the loop, or re-dispatch the pinned theme.
    ///
    /// This is also how a loop stopped by a handled error is resumed.
    pub fn refresh(&mut self) -> Result<()> {
        let stopped = self.stop_run();
        self.applied = true;
        self.start()?;
        stopped.map(|_| ())
    }

    /// Replace the settings, restarting an automatic loop if they changed.
    pub fn update_settings(&mut self, settings: SupervisorSettings) -> Result<()> {
        if settings == self.settings {
            return Ok(());
        }
        // A stored coordinate that only echoes the live cell changes nothing
        let location_only = SupervisorSettings {
            stored_location: self.settings.stored_location,
            ..settings
        } == self.settings;
        if location_only && settings.stored_location == self.location_rx.get() {
            self.settings = settings;
            return Ok(());
        }

        if settings.scheduler.transition && !self.settings.scheduler.transition {
            self.context.dispatcher.probe_transition();
        }

        let stopped = self.stop_run();
        if settings.stored_location != self.settings.stored_location
            && settings.stored_location.is_valid()
            && let Some(location) = &self.location
        {
            location.set(settings.stored_location);
        }
        self.settings = settings;

        if self.applied && self.mode == Mode::Auto {
            self.start()?;
        }
        stopped.map(|_| ())
    }

    /// Reap a loop that ended on its own.
    ///
    /// Returns how it ended, or the error if it was fatal.
    pub fn poll(&mut self) -> Result<Option<LoopExit>> {
        let finished = self
            .run
            .as_ref()
            .is_some_and(|run| run.scheduler.is_finished());
        match self.run.take() {
            Some(run) if finished => self.finish(run).map(Some),
            run => {
                self.run = run;
                Ok(None)
            }
        }
    }

    /// Cancel everything and join the threads.
    pub fn shutdown(&mut self) -> Result<()> {
        self.root.cancel();
        self.stop_run().map(|_| ())
    }

    fn start(&mut self) -> Result<()> {
        match self.mode.fixed_theme() {
            None => self.start_auto(),
            Some(theme) => {
                apply_on_ui(
                    &self.context,
                    self.context.dispatcher.clone(),
                    theme,
                    self.settings.scheduler.transition,
                );
                Ok(())
            }
        }
    }

    fn start_auto(&mut self) -> Result<()> {
        let Some(location) = self.location.take() else {
            anyhow::bail!("Location cell is still owned by a previous run");
        };
        let cancel = self.root.child();

        let resolver = LocationResolver::new(
            self.settings.resolver,
            self.context.provider.clone(),
            self.context.time.clone(),
            location,
            self.context.debug_enabled,
        );
        let resolver = thread::Builder::new()
            .name("location".into())
            .spawn({
                let cancel = cancel.clone();
                move || resolver.run(cancel)
            })
            .context("Failed to spawn location resolver")?;

        let mut scheduler = DeadlineScheduler::new(
            self.settings.scheduler,
            self.context.clone(),
            self.location_rx.clone(),
            theme_action(&self.context, self.settings.scheduler.transition),
        );
        let spawned = thread::Builder::new().name("scheduler".into()).spawn({
            let cancel = cancel.clone();
            move || {
                let exit = scheduler.run(&cancel);
                // Take the resolver down with the loop
                cancel.cancel();
                exit
            }
        });

        let scheduler = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                cancel.cancel();
                self.reclaim_location(resolver);
                return Err(e).context("Failed to spawn scheduler");
            }
        };

        self.run = Some(AutoRun {
            cancel,
            resolver,
            scheduler,
        });
        Ok(())
    }

    fn stop_run(&mut self) -> Result<Option<LoopExit>> {
        match self.run.take() {
            Some(run) => {
                run.cancel.cancel();
                self.finish(run).map(Some)
            }
            None => Ok(None),
        }
    }

    fn finish(&mut self, run: AutoRun) -> Result<LoopExit> {
        let outcome = run.scheduler.join();
        self.reclaim_location(run.resolver);

        match outcome {
            Ok(Ok(exit)) => {
                if self.context.debug_enabled {
                    log_debug!("Scheduling loop ended: {exit}");
                }
                Ok(exit)
            }
            Ok(Err(error)) => Err(error.into()),
            Err(_) => anyhow::bail!("Scheduler thread panicked"),
        }
    }

    fn reclaim_location(&mut self, resolver: JoinHandle<Publisher<Location>>) {
        match resolver.join() {
            Ok(location) => self.location = Some(location),
            Err(_) => {
                log_error!("Location resolver panicked, starting from the stored location");
                let (location, location_rx) = observable(self.settings.stored_location);
                self.location = Some(location);
                self.location_rx = location_rx;
            }
        }
    }
}

impl Drop for SchedulerSupervisor {
    fn drop(&mut self) {
        self.root.cancel();
        let _ = self.stop_run();
    }
}

/// Per-cycle action: dispatch the theme of the current half-cycle.
fn theme_action(context: &AppContext, allow_transition: bool) -> ScheduleAction {
    let context = context.clone();
    Box::new(move |predictions| {
        apply_on_ui(
            &context,
            context.dispatcher.clone(),
            Theme::for_predictions(predictions),
            allow_transition,
        );
    })
}

/// Dispatch `target` on the UI thread and record it as the applied theme.
///
/// Script failures are logged and never stop the caller.
fn apply_on_ui(
    context: &AppContext,
    dispatcher: ThemeDispatcher,
    target: Theme,
    allow_transition: bool,
) {
    let outcome = context.ui.call(move |ui| {
        let outcome = dispatcher.apply(target, allow_transition);
        if outcome.is_ok() {
            ui.theme.set(Some(target));
        }
        outcome
    });

    match outcome {
        Some(Ok(_)) => {}
        Some(Err(e)) => {
            log_pipe!();
            log_error!("{e}");
        }
        None => log_warning!("UI context is gone, {target} theme not applied"),
    }
}
