//! Runs the scheduling engine against a fast-forward clock and the real solar
//! predictor, checking what a user would see over several days.

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use duskmode::core::scheduler::ScheduleAction;
use duskmode::core::{
    AppContext, CancelToken, DeadlineScheduler, LoopExit, SchedulerConfig, SchedulerSupervisor,
    SupervisorSettings, UiContext, observable,
};
use duskmode::geo::{
    AuthorizationLevel, Coordinate, FixedProvider, Location, PhasePredictions, ResolverConfig,
    SolarPredictor, SunriseEquation,
};
use duskmode::theme::{Mode, Theme, ThemeBackend, ThemeDispatcher};
use duskmode::time_source::{SimulatedTimeSource, TimeSource};
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const BERLIN: Location = Location::Resolved(Coordinate::new(52.52, 13.405));

/// Backend that remembers every scripted theme.
#[derive(Default)]
struct RecordingBackend {
    applied: Mutex<Vec<Theme>>,
}

impl ThemeBackend for RecordingBackend {
    fn name(&self) -> &'static str {
        "recording"
    }
    fn current_theme(&self) -> Option<Theme> {
        self.applied.lock().unwrap().last().copied()
    }
    fn can_animate(&self) -> bool {
        false
    }
    fn set_animated(&self, _theme: Theme) -> Result<(), String> {
        Err("unsupported".into())
    }
    fn run_script(&self, theme: Theme) -> Result<(), String> {
        self.applied.lock().unwrap().push(theme);
        Ok(())
    }
}

fn equinox_noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 20, 12, 0, 0).unwrap()
}

fn context(
    time: Arc<SimulatedTimeSource>,
    backend: Arc<RecordingBackend>,
    ui: &UiContext,
) -> AppContext {
    AppContext {
        time,
        predictor: Arc::new(SunriseEquation),
        provider: Arc::new(FixedProvider(BERLIN)),
        dispatcher: ThemeDispatcher::new(backend, false),
        ui: ui.handle(),
        on_error: Some(AppContext::logging_error_handler()),
        debug_enabled: false,
    }
}

fn wait_for<T>(mut poll: impl FnMut() -> Option<T>) -> T {
    let start = Instant::now();
    loop {
        if let Some(value) = poll() {
            return value;
        }
        assert!(start.elapsed() < Duration::from_secs(10), "timed out");
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_three_days_of_automatic_mode_alternate_themes() {
    duskmode::common::logger::Log::set_enabled(false);
    let start = equinox_noon();
    let time = Arc::new(SimulatedTimeSource::new(start).with_end_time(start + TimeDelta::days(3)));
    let backend = Arc::new(RecordingBackend::default());
    let (ui, observers) = UiContext::spawn().unwrap();

    let settings = SupervisorSettings {
        stored_location: BERLIN,
        resolver: ResolverConfig {
            authorization: Some(AuthorizationLevel::Always),
            ..Default::default()
        },
        ..Default::default()
    };
    let mut supervisor =
        SchedulerSupervisor::new(context(time.clone(), backend.clone(), &ui), settings);

    supervisor.set_mode(Mode::Auto).unwrap();
    let exit = wait_for(|| supervisor.poll().unwrap());
    assert_eq!(exit, LoopExit::Cancelled);

    // Noon, then three sunsets and three sunrises; the fourth sunset is past the end
    let applied = backend.applied.lock().unwrap().clone();
    assert_eq!(applied.len(), 7);
    assert_eq!(applied[0], Theme::Light);
    assert!(applied.windows(2).all(|pair| pair[0] != pair[1]));
    assert_eq!(observers.theme.get(), Some(Theme::Light));

    let waits = time.waits();
    assert_eq!(waits.len(), 6);
    assert!(waits.iter().all(|w| *w > TimeDelta::zero() && *w < TimeDelta::hours(24)));
    assert_eq!(time.now(), start + waits.iter().fold(TimeDelta::zero(), |a, w| a + *w));

    supervisor.shutdown().unwrap();
    ui.shutdown();
}

#[test]
fn test_scheduler_sleeps_exactly_until_each_transition() {
    duskmode::common::logger::Log::set_enabled(false);
    let start = equinox_noon();
    let time = Arc::new(SimulatedTimeSource::new(start).with_end_time(start + TimeDelta::days(2)));
    let (ui, _observers) = UiContext::spawn().unwrap();
    let (_location, location_rx) = observable(BERLIN);

    let seen = Arc::new(Mutex::new(Vec::<PhasePredictions>::new()));
    let sink = Arc::clone(&seen);
    let action: ScheduleAction = Box::new(move |p| sink.lock().unwrap().push(*p));

    let mut scheduler = DeadlineScheduler::new(
        SchedulerConfig::default(),
        context(time.clone(), Arc::default(), &ui),
        location_rx,
        action,
    );
    assert_eq!(scheduler.run(&CancelToken::new()), Ok(LoopExit::Cancelled));

    let seen = seen.lock().unwrap();
    let waits = time.waits();
    assert_eq!(seen.len(), waits.len() + 1);

    // Each cycle wakes at the transition the previous one predicted
    let mut now = start;
    for (predictions, wait) in seen.iter().zip(&waits) {
        assert!(predictions.previous_transition() <= now);
        now += *wait;
        assert_eq!(now, predictions.next_transition());
    }
    assert!(seen.windows(2).all(|pair| pair[0].is_daytime != pair[1].is_daytime));

    ui.shutdown();
}

#[test]
fn test_rate_samples_split_the_afternoon_evenly() {
    duskmode::common::logger::Log::set_enabled(false);
    let start = equinox_noon();
    let time = Arc::new(SimulatedTimeSource::new(start).with_end_time(start + TimeDelta::hours(12)));
    let (ui, _observers) = UiContext::spawn().unwrap();
    let (_location, location_rx) = observable(BERLIN);

    let config = SchedulerConfig {
        rate: NonZeroU32::new(24),
        ..Default::default()
    };
    let mut scheduler = DeadlineScheduler::new(
        config,
        context(time.clone(), Arc::default(), &ui),
        location_rx,
        Box::new(|_| {}),
    );
    assert_eq!(scheduler.run(&CancelToken::new()), Ok(LoopExit::Cancelled));

    let predictions = SunriseEquation
        .predict(start, Coordinate::new(52.52, 13.405))
        .expect("Berlin has a sunset in March");
    let step = TimeDelta::nanoseconds(predictions.span().num_nanoseconds().unwrap() / 24);
    let waits = time.waits();

    // The first wait is partial; the rest are whole steps until sunset
    assert!(waits[0] <= step);
    let daytime: Vec<_> = waits
        .iter()
        .skip(1)
        .take_while(|w| **w == step)
        .collect();
    assert!(!daytime.is_empty());
    assert!(daytime.len() < 24);

    ui.shutdown();
}
