//! The predict, act, sleep loop.
//!
//! One cycle:
//!
//! 1. wait for a valid location, capture `now` and predict the bracketing
//!    transitions (no usable pair stops the loop as unable-to-predict);
//! 2. publish the predictions and pick the deadline under the configured
//!    policy;
//! 3. publish the intensity signal if it is tracked;
//! 4. validate the deadline (outside `(now, now + 24h]` stops the loop);
//! 5. run the action with the predictions;
//! 6. sleep until the deadline.
//!
//! Cancellation is checked at the loop top, before the action, and aborts the
//! sleep. A stopped loop never restarts itself; the supervisor owns that.
//! Whatever way the loop ends, the intensity goes back to undetermined.

use std::fmt;
use std::num::NonZeroU32;
use std::time::Duration;

use chrono::{Local, TimeDelta};

use super::cancel::CancelToken;
use super::cell::Subscriber;
use super::context::AppContext;
use super::deadline::{
    Intensity, SchedulePolicy, ScheduleError, intensity, next_deadline, validate_deadline,
};
use crate::common::utils::format_duration;
use crate::geo::{Location, PhasePredictions};

/// Tunables of the scheduling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SchedulerConfig {
    pub rate: Option<NonZeroU32>,
    pub interval: Option<Duration>,
    pub intensity: bool,
    pub transition: bool,
}

impl SchedulerConfig {
    pub fn policy(&self) -> SchedulePolicy {
        let interval = self
            .interval
            .and_then(|interval| TimeDelta::from_std(interval).ok());
        SchedulePolicy::select(self.rate, interval)
    }
}

/// Why a loop ended without a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    Cancelled,
    UnableToPredict,
    InvalidDeadline,
}

impl fmt::Display for LoopExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopExit::Cancelled => f.write_str("cancelled"),
            LoopExit::UnableToPredict => f.write_str("unable to predict"),
            LoopExit::InvalidDeadline => f.write_str("invalid deadline"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Running,
    Sleeping,
    Stopped,
}

/// Called once per cycle with the fresh predictions.
pub type ScheduleAction = Box<dyn FnMut(&PhasePredictions) + Send>;

pub struct DeadlineScheduler {
    config: SchedulerConfig,
    context: AppContext,
    location: Subscriber<Location>,
    action: ScheduleAction,
    state: SchedulerState,
}

impl DeadlineScheduler {
    pub fn new(
        config: SchedulerConfig,
        context: AppContext,
        location: Subscriber<Location>,
        action: ScheduleAction,
    ) -> Self {
        Self {
            config,
            context,
            location,
            action,
            state: SchedulerState::Stopped,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Run until cancelled or stopped by an error.
    ///
    /// Errors go to the registered handler and end the loop with `Ok`; with no
    /// handler they are returned.
    pub fn run(&mut self, cancel: &CancelToken) -> Result<LoopExit, ScheduleError> {
        let result = self.run_cycles(cancel);
        self.state = SchedulerState::Stopped;
        self.context.ui.call(|ui| {
            ui.intensity.set(Intensity::Undetermined);
        });
        result
    }

    fn run_cycles(&mut self, cancel: &CancelToken) -> Result<LoopExit, ScheduleError> {
        let policy = self.config.policy();
        if self.context.debug_enabled {
            let clock = if self.context.time.is_simulated() {
                " on a simulated clock"
            } else {
                ""
            };
            log_debug!("Scheduling {policy}{clock}");
        }

        loop {
            if cancel.is_cancelled() {
                return Ok(LoopExit::Cancelled);
            }
            let Some(coordinate) = self
                .location
                .wait_until(Location::is_valid, cancel)
                .and_then(|location| location.coordinate())
            else {
                return Ok(LoopExit::Cancelled);
            };

            self.state = SchedulerState::Running;
            let now = self.context.time.now();

            let Some(predictions) = self.context.predictor.predict(now, coordinate) else {
                self.context.ui.post(|ui| {
                    ui.predictions.set(None);
                    ui.intensity.set(Intensity::Undetermined);
                });
                return self.report(
                    ScheduleError::UnableToPredict {
                        location: coordinate,
                        at: now,
                    },
                    LoopExit::UnableToPredict,
                );
            };
            self.context.ui.post(move |ui| {
                ui.predictions.set(Some(predictions));
            });

            let deadline = next_deadline(policy, &predictions, now);

            if self.config.intensity {
                let level = Intensity::Level(intensity(&predictions, now));
                self.context.ui.post(move |ui| {
                    ui.intensity.set(level);
                });
            }

            if let Err(error) = validate_deadline(deadline, now) {
                return self.report(error, LoopExit::InvalidDeadline);
            }
            if cancel.is_cancelled() {
                return Ok(LoopExit::Cancelled);
            }

            (self.action)(&predictions);

            if self.context.debug_enabled {
                let remaining = (deadline - now).to_std().unwrap_or_default();
                log_debug!(
                    "{} until next update at {}",
                    format_duration(remaining),
                    deadline.with_timezone(&Local).format("%H:%M:%S")
                );
            }

            self.state = SchedulerState::Sleeping;
            if !self.context.time.sleep_until(deadline, cancel) {
                return Ok(LoopExit::Cancelled);
            }
        }
    }

    fn report(&self, error: ScheduleError, exit: LoopExit) -> Result<LoopExit, ScheduleError> {
        match &self.context.on_error {
            Some(handler) => {
                handler(&error);
                Ok(exit)
            }
            None => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::ErrorHandler;
    use crate::core::ui::{UiContext, UiObservers};
    use crate::geo::locator::MockLocationProvider;
    use crate::geo::solar::MockSolarPredictor;
    use crate::geo::{Coordinate, SolarPredictor};
    use crate::theme::backend::MockThemeBackend;
    use crate::theme::{Theme, ThemeDispatcher};
    use crate::time_source::{SimulatedTimeSource, TimeSource};
    use crate::core::cell::observable;
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::{Arc, Mutex};

    const BERLIN: Location = Location::Resolved(Coordinate::new(52.52, 13.405));

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
    }

    /// Days from 06:00 to 18:00 UTC, nights in between.
    fn twelve_hour_days() -> MockSolarPredictor {
        let mut predictor = MockSolarPredictor::new();
        predictor.expect_predict().returning(|now, _| {
            let date = now.date_naive();
            let six = date.and_hms_opt(6, 0, 0).unwrap().and_utc();
            let eighteen = date.and_hms_opt(18, 0, 0).unwrap().and_utc();
            Some(if now < six {
                PhasePredictions {
                    sunrise: six,
                    sunset: eighteen - TimeDelta::days(1),
                    is_daytime: false,
                }
            } else if now < eighteen {
                PhasePredictions {
                    sunrise: six,
                    sunset: eighteen,
                    is_daytime: true,
                }
            } else {
                PhasePredictions {
                    sunrise: six + TimeDelta::days(1),
                    sunset: eighteen,
                    is_daytime: false,
                }
            })
        });
        predictor
    }

    struct Harness {
        context: AppContext,
        observers: UiObservers,
        _ui: UiContext,
    }

    fn harness(
        predictor: impl SolarPredictor + 'static,
        time: Arc<dyn TimeSource>,
        on_error: Option<ErrorHandler>,
    ) -> Harness {
        crate::common::logger::Log::set_enabled(false);
        let (ui, observers) = UiContext::spawn().unwrap();
        let context = AppContext {
            time,
            predictor: Arc::new(predictor),
            provider: Arc::new(MockLocationProvider::new()),
            dispatcher: ThemeDispatcher::new(Arc::new(MockThemeBackend::new()), false),
            ui: ui.handle(),
            on_error,
            debug_enabled: false,
        };
        Harness {
            context,
            observers,
            _ui: ui,
        }
    }

    fn recording_action() -> (ScheduleAction, Arc<Mutex<Vec<PhasePredictions>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let action: ScheduleAction = Box::new(move |p| sink.lock().unwrap().push(*p));
        (action, seen)
    }

    fn collecting_handler() -> (ErrorHandler, Arc<Mutex<Vec<ScheduleError>>>) {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        let handler: ErrorHandler = Arc::new(move |e| sink.lock().unwrap().push(e.clone()));
        (handler, errors)
    }

    #[test]
    fn test_rate_loop_acts_at_each_sample_and_flips_once() {
        let time = Arc::new(SimulatedTimeSource::new(at(1, 6)).with_end_time(at(1, 18)));
        let h = harness(twelve_hour_days(), time.clone(), None);
        let (location, subscriber) = observable(BERLIN);
        let (action, seen) = recording_action();
        let config = SchedulerConfig {
            rate: NonZeroU32::new(4),
            ..Default::default()
        };

        let mut scheduler = DeadlineScheduler::new(config, h.context.clone(), subscriber, action);
        let exit = scheduler.run(&CancelToken::new());
        drop(location);

        assert_eq!(exit, Ok(LoopExit::Cancelled));
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        assert_eq!(time.waits(), vec![TimeDelta::hours(3); 4]);

        let themes: Vec<Theme> = seen
            .lock()
            .unwrap()
            .iter()
            .map(Theme::for_predictions)
            .collect();
        assert_eq!(
            themes,
            vec![Theme::Light, Theme::Light, Theme::Light, Theme::Light, Theme::Dark]
        );
    }

    #[test]
    fn test_intensity_is_published_and_reset_on_exit() {
        let time = Arc::new(SimulatedTimeSource::new(at(1, 15)).with_end_time(at(1, 17)));
        let h = harness(twelve_hour_days(), time, None);
        let updates = h.observers.intensity.subscribe();
        let (_location, subscriber) = observable(BERLIN);
        let (action, _) = recording_action();
        let config = SchedulerConfig {
            intensity: true,
            ..Default::default()
        };

        let mut scheduler = DeadlineScheduler::new(config, h.context.clone(), subscriber, action);
        assert_eq!(scheduler.run(&CancelToken::new()), Ok(LoopExit::Cancelled));

        let values: Vec<Intensity> = updates.try_iter().collect();
        assert_eq!(values.len(), 2);
        let level = values[0].level().unwrap();
        assert!((level - 1.5_f64.log2()).abs() < 1e-9);
        assert_eq!(values[1], Intensity::Undetermined);
        assert_eq!(h.observers.intensity.get(), Intensity::Undetermined);
    }

    #[test]
    fn test_unable_to_predict_stops_without_action() {
        let mut predictor = MockSolarPredictor::new();
        predictor.expect_predict().times(1).return_const(None);
        let time = Arc::new(SimulatedTimeSource::new(at(1, 12)));
        let (handler, errors) = collecting_handler();
        let h = harness(predictor, time, Some(handler));
        let (_location, subscriber) = observable(BERLIN);
        let (action, seen) = recording_action();

        let mut scheduler =
            DeadlineScheduler::new(SchedulerConfig::default(), h.context.clone(), subscriber, action);
        assert_eq!(
            scheduler.run(&CancelToken::new()),
            Ok(LoopExit::UnableToPredict)
        );

        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(
            *errors.lock().unwrap(),
            vec![ScheduleError::UnableToPredict {
                location: Coordinate::new(52.52, 13.405),
                at: at(1, 12)
            }]
        );
        assert_eq!(h.observers.predictions.get(), None);
        assert_eq!(h.observers.intensity.get(), Intensity::Undetermined);
    }

    #[test]
    fn test_unable_to_predict_without_handler_is_fatal() {
        let mut predictor = MockSolarPredictor::new();
        predictor.expect_predict().return_const(None);
        let h = harness(predictor, Arc::new(SimulatedTimeSource::new(at(1, 12))), None);
        let (_location, subscriber) = observable(BERLIN);
        let (action, _) = recording_action();

        let mut scheduler =
            DeadlineScheduler::new(SchedulerConfig::default(), h.context.clone(), subscriber, action);
        assert!(matches!(
            scheduler.run(&CancelToken::new()),
            Err(ScheduleError::UnableToPredict { .. })
        ));
    }

    #[test]
    fn test_deadline_in_the_past_skips_action() {
        let now = at(1, 12);
        let mut predictor = MockSolarPredictor::new();
        // Clock skew: the predicted sunset already passed
        predictor.expect_predict().return_const(Some(PhasePredictions {
            sunrise: at(1, 6),
            sunset: now - TimeDelta::seconds(1),
            is_daytime: true,
        }));
        let (handler, errors) = collecting_handler();
        let h = harness(predictor, Arc::new(SimulatedTimeSource::new(now)), Some(handler));
        let (_location, subscriber) = observable(BERLIN);
        let (action, seen) = recording_action();

        let mut scheduler =
            DeadlineScheduler::new(SchedulerConfig::default(), h.context.clone(), subscriber, action);
        assert_eq!(
            scheduler.run(&CancelToken::new()),
            Ok(LoopExit::InvalidDeadline)
        );

        assert!(seen.lock().unwrap().is_empty());
        assert!(matches!(
            errors.lock().unwrap().as_slice(),
            [ScheduleError::InvalidDeadline { too_soon: true, .. }]
        ));
    }

    /// Clock whose first sleep is interrupted by a cancellation.
    struct InterruptedClock {
        now: DateTime<Utc>,
    }

    impl TimeSource for InterruptedClock {
        fn now(&self) -> DateTime<Utc> {
            self.now
        }

        fn sleep_until(&self, _deadline: DateTime<Utc>, cancel: &CancelToken) -> bool {
            cancel.cancel();
            false
        }

        fn is_simulated(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_cancel_mid_sleep_does_not_act_again() {
        let time = Arc::new(InterruptedClock { now: at(1, 12) });
        let h = harness(twelve_hour_days(), time, None);
        let (_location, subscriber) = observable(BERLIN);
        let (action, seen) = recording_action();
        let cancel = CancelToken::new();

        let mut scheduler =
            DeadlineScheduler::new(SchedulerConfig::default(), h.context.clone(), subscriber, action);
        assert_eq!(scheduler.run(&cancel), Ok(LoopExit::Cancelled));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_waits_for_valid_location() {
        let time = Arc::new(SimulatedTimeSource::new(at(1, 12)).with_end_time(at(1, 13)));
        let h = harness(twelve_hour_days(), time, None);
        let (location, subscriber) = observable(Location::Unknown);
        let (action, seen) = recording_action();

        let runner = {
            let context = h.context.clone();
            std::thread::spawn(move || {
                let mut scheduler =
                    DeadlineScheduler::new(SchedulerConfig::default(), context, subscriber, action);
                scheduler.run(&CancelToken::new())
            })
        };

        std::thread::sleep(std::time::Duration::from_millis(50));
        assert!(seen.lock().unwrap().is_empty());
        location.set(Location::Denied);
        location.set(BERLIN);

        // Sunset at 18:00 is past the simulation end, so one cycle runs
        assert_eq!(runner.join().unwrap(), Ok(LoopExit::Cancelled));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_cancelled_before_location_never_predicts() {
        let mut predictor = MockSolarPredictor::new();
        predictor.expect_predict().never();
        let h = harness(predictor, Arc::new(SimulatedTimeSource::new(at(1, 12))), None);
        let (_location, subscriber) = observable(Location::Unknown);
        let (action, _) = recording_action();
        let cancel = CancelToken::new();
        cancel.cancel();

        let mut scheduler =
            DeadlineScheduler::new(SchedulerConfig::default(), h.context.clone(), subscriber, action);
        assert_eq!(scheduler.run(&cancel), Ok(LoopExit::Cancelled));
    }
}
