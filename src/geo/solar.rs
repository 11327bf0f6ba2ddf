//! Sunrise and sunset prediction.
//!
//! The scheduler only ever asks one question: which two transitions bracket
//! `now`? [`PhasePredictions`] answers it as a pair. During the day it holds
//! today's sunrise (passed) and sunset (upcoming); during the night it holds the
//! previous sunset and the next sunrise. Either way the two instants span the
//! current half-cycle.
//!
//! The astronomy itself comes from the `sunrise` crate. Latitudes where the sun
//! does not cross the horizon on a given day are detected up front from the
//! solar declination, since the crate has no failure mode of its own for them.

use chrono::{DateTime, Datelike, NaiveDate, TimeDelta, Utc};
use sunrise::{Coordinates, SolarDay, SolarEvent};

use super::location::Coordinate;

/// The two transitions bracketing a moment in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhasePredictions {
    pub sunrise: DateTime<Utc>,
    pub sunset: DateTime<Utc>,
    pub is_daytime: bool,
}

impl PhasePredictions {
    /// The transition that ends the current half-cycle.
    pub fn next_transition(&self) -> DateTime<Utc> {
        if self.is_daytime {
            self.sunset
        } else {
            self.sunrise
        }
    }

    /// The transition that started the current half-cycle.
    pub fn previous_transition(&self) -> DateTime<Utc> {
        if self.is_daytime {
            self.sunrise
        } else {
            self.sunset
        }
    }

    /// Length of the current half-cycle.
    pub fn span(&self) -> TimeDelta {
        self.next_transition() - self.previous_transition()
    }
}

/// Swappable astronomical model.
#[cfg_attr(test, mockall::automock)]
pub trait SolarPredictor: Send + Sync {
    /// Predict the transitions bracketing `now` at `coordinate`.
    ///
    /// `None` means there is no usable sunrise/sunset pair, as during polar
    /// day or polar night.
    fn predict(&self, now: DateTime<Utc>, coordinate: Coordinate) -> Option<PhasePredictions>;
}

/// Standard sunrise equation (sun's upper limb at -0.833°).
#[derive(Debug, Default, Clone, Copy)]
pub struct SunriseEquation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    Rise,
    Set,
}

/// Refraction-corrected altitude of the sun's upper limb at the horizon.
const HORIZON_ALTITUDE_DEG: f64 = -0.833;

/// Days searched on either side of `now` for bracketing events.
const SEARCH_RADIUS_DAYS: i64 = 2;

impl SolarPredictor for SunriseEquation {
    fn predict(&self, now: DateTime<Utc>, coordinate: Coordinate) -> Option<PhasePredictions> {
        if !coordinate.is_valid() {
            return None;
        }

        let today = now.date_naive();
        let mut events: Vec<(DateTime<Utc>, Event)> = (-SEARCH_RADIUS_DAYS..=SEARCH_RADIUS_DAYS)
            .filter_map(|offset| today.checked_add_signed(TimeDelta::days(offset)))
            .filter_map(|date| day_events(date, coordinate))
            .flat_map(|(rise, set)| [(rise, Event::Rise), (set, Event::Set)])
            .collect();
        events.sort_by_key(|(at, _)| *at);

        let previous = events.iter().rev().find(|(at, _)| *at <= now)?;
        let next = events.iter().find(|(at, _)| *at > now)?;

        match (previous, next) {
            ((sunrise, Event::Rise), (sunset, Event::Set)) => Some(PhasePredictions {
                sunrise: *sunrise,
                sunset: *sunset,
                is_daytime: true,
            }),
            ((sunset, Event::Set), (sunrise, Event::Rise)) => Some(PhasePredictions {
                sunrise: *sunrise,
                sunset: *sunset,
                is_daytime: false,
            }),
            // A missing event in between; the sun skipped the horizon
            _ => None,
        }
    }
}

/// Sunrise and sunset for one calendar date, if the sun crosses the horizon.
fn day_events(date: NaiveDate, coordinate: Coordinate) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    if !crosses_horizon(date, coordinate.latitude) {
        return None;
    }

    let coordinates = Coordinates::new(coordinate.latitude, coordinate.longitude)?;
    let day = SolarDay::new(coordinates, date);
    let sunrise = day.event_time(SolarEvent::Sunrise);
    let sunset = day.event_time(SolarEvent::Sunset);

    // Results far from the requested date mean the equation degenerated
    let noon = date.and_hms_opt(12, 0, 0)?.and_utc();
    let window = TimeDelta::hours(36);
    let plausible = |at: DateTime<Utc>| (at - noon).abs() <= window;

    (plausible(sunrise) && plausible(sunset) && sunrise < sunset).then_some((sunrise, sunset))
}

/// Whether the sun both rises and sets on `date` at `latitude`.
fn crosses_horizon(date: NaiveDate, latitude: f64) -> bool {
    let day_of_year = f64::from(date.ordinal());
    let declination = (23.44_f64.to_radians())
        * ((360.0 / 365.0) * (284.0 + day_of_year)).to_radians().sin();
    let phi = latitude.to_radians();

    let denominator = phi.cos() * declination.cos();
    if denominator.abs() < f64::EPSILON {
        return false;
    }
    let cos_hour_angle =
        (HORIZON_ALTITUDE_DEG.to_radians().sin() - phi.sin() * declination.sin()) / denominator;
    cos_hour_angle.abs() <= 1.0
}
