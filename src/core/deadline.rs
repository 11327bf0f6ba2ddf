//! Deadline policies, deadline validation and the intensity signal.
//!
//! All arithmetic works on the current half-cycle, the span between the
//! previous and the next transition of a [`PhasePredictions`] pair:
//!
//! ```text
//!   previous                                   next
//!      |---------|---------|---------|---------|      rate = 4
//!                          ^ now -> deadline = next boundary
//!
//!      |--|-------|-------|-------|-------|-------|   interval = d
//!         ^ grid aligned back from `next`, so the remainder lands first
//! ```
//!
//! Nanosecond integer arithmetic keeps repeated deadlines on the same grid.

use std::fmt;
use std::num::NonZeroU32;

use chrono::{DateTime, Local, TimeDelta, Utc};

use crate::common::constants::MAXIMUM_DEADLINE_LEAD_SECS;
use crate::geo::{Coordinate, PhasePredictions};

/// How the next wake-up is chosen. Exactly one applies per cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulePolicy {
    /// Wake at the next transition.
    #[default]
    Transition,
    /// Wake at `N` evenly spaced boundaries across the half-cycle.
    Rate(NonZeroU32),
    /// Wake every fixed interval, aligned to the next transition.
    Interval(TimeDelta),
}

impl SchedulePolicy {
    /// Pick the policy for the configured options. `rate` wins over `interval`.
    pub fn select(rate: Option<NonZeroU32>, interval: Option<TimeDelta>) -> Self {
        match (rate, interval) {
            (Some(rate), _) => SchedulePolicy::Rate(rate),
            (None, Some(interval)) if interval > TimeDelta::zero() => {
                SchedulePolicy::Interval(interval)
            }
            _ => SchedulePolicy::Transition,
        }
    }
}

impl fmt::Display for SchedulePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulePolicy::Transition => f.write_str("at each transition"),
            SchedulePolicy::Rate(n) => write!(f, "{n} updates per half-cycle"),
            SchedulePolicy::Interval(d) => write!(f, "every {}s", d.num_seconds()),
        }
    }
}

/// Compute the next wake-up for `now` under `policy`.
pub fn next_deadline(
    policy: SchedulePolicy,
    predictions: &PhasePredictions,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let next = predictions.next_transition();

    match policy {
        SchedulePolicy::Transition => next,
        SchedulePolicy::Rate(samples) => rate_deadline(samples, predictions, now).unwrap_or(next),
        SchedulePolicy::Interval(interval) => interval_deadline(interval, next, now).unwrap_or(next),
    }
}

/// Next of `N` boundaries splitting the half-cycle. The integer remainder of
/// the division is absorbed by the last sample, which is the transition.
fn rate_deadline(
    samples: NonZeroU32,
    predictions: &PhasePredictions,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let previous = predictions.previous_transition();
    let next = predictions.next_transition();
    let samples = i64::from(samples.get());

    let span = (next - previous).num_nanoseconds()?;
    let step = span / samples;
    if step <= 0 {
        return Some(next);
    }

    let elapsed = (now - previous).num_nanoseconds()?.max(0);
    let boundary = elapsed / step + 1;
    if boundary >= samples {
        return Some(next);
    }

    Some(previous + TimeDelta::nanoseconds(boundary * step))
}

/// Next point of the grid `next - k * interval` strictly after `now`.
fn interval_deadline(
    interval: TimeDelta,
    next: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let interval = interval.num_nanoseconds()?;
    if interval <= 0 {
        return None;
    }
    let remaining = (next - now).num_nanoseconds()?;

    let mut offset = remaining.rem_euclid(interval);
    if offset == 0 {
        offset = interval;
    }
    Some(now + TimeDelta::nanoseconds(offset))
}

/// Errors that stop a scheduling loop.
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleError {
    /// No usable sunrise/sunset pair at this location and time.
    UnableToPredict {
        location: Coordinate,
        at: DateTime<Utc>,
    },
    /// The computed deadline falls outside `(now, now + 24h]`.
    InvalidDeadline {
        deadline: DateTime<Utc>,
        now: DateTime<Utc>,
        too_soon: bool,
    },
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleError::UnableToPredict { location, at } => write!(
                f,
                "Unable to predict the current phase at {} with location: {location}",
                at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
            ),
            ScheduleError::InvalidDeadline {
                deadline,
                now,
                too_soon,
            } => write!(
                f,
                "Update at {} occurs too {} (now {}), the system clock may have changed underneath the scheduler",
                deadline.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
                if *too_soon { "soon" } else { "late" },
                now.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
            ),
        }
    }
}

impl std::error::Error for ScheduleError {}

/// Check that `deadline` lies in `(now, now + 24h]`.
pub fn validate_deadline(deadline: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), ScheduleError> {
    let lead = deadline - now;
    let too_soon = lead <= TimeDelta::zero();
    let too_late = lead > TimeDelta::seconds(MAXIMUM_DEADLINE_LEAD_SECS);

    if too_soon || too_late {
        return Err(ScheduleError::InvalidDeadline {
            deadline,
            now,
            too_soon,
        });
    }
    Ok(())
}

/// Closeness to the upcoming transition.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Intensity {
    /// Not running, or predictions unavailable.
    #[default]
    Undetermined,
    Level(f64),
}

impl Intensity {
    pub fn level(self) -> Option<f64> {
        match self {
            Intensity::Undetermined => None,
            Intensity::Level(level) => Some(level),
        }
    }
}

impl fmt::Display for Intensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Intensity::Undetermined => f.write_str("undetermined"),
            Intensity::Level(level) => write!(f, "{:.0}%", level * 100.0),
        }
    }
}

/// Logarithmic closeness to the next transition, clamped to `[0, 1]`.
///
/// With `f` the elapsed fraction of the half-cycle this is `log2(2f)`: zero
/// for the first half, then rising steeply to one at the transition.
pub fn intensity(predictions: &PhasePredictions, now: DateTime<Utc>) -> f64 {
    let previous = predictions.previous_transition();
    let span = (predictions.next_transition() - previous).num_milliseconds() as f64;
    let elapsed = (now - previous).num_milliseconds() as f64;

    let value = (2.0 * elapsed / span).log2();
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, minute, 0).unwrap()
    }

    fn day(sunrise: DateTime<Utc>, sunset: DateTime<Utc>) -> PhasePredictions {
        PhasePredictions {
            sunrise,
            sunset,
            is_daytime: true,
        }
    }

    fn night(sunset: DateTime<Utc>, sunrise: DateTime<Utc>) -> PhasePredictions {
        PhasePredictions {
            sunrise,
            sunset,
            is_daytime: false,
        }
    }

    fn rate(n: u32) -> SchedulePolicy {
        SchedulePolicy::Rate(NonZeroU32::new(n).unwrap())
    }

    #[test]
    fn test_noon_deadline_is_same_day_sunset() {
        let p = day(at(1, 6, 0), at(1, 20, 0));
        let now = at(1, 12, 0);
        let deadline = next_deadline(SchedulePolicy::Transition, &p, now);
        assert_eq!(deadline, at(1, 20, 0));
        assert!(validate_deadline(deadline, now).is_ok());
    }

    #[test]
    fn test_late_evening_deadline_is_next_sunrise() {
        let p = night(at(1, 20, 0), at(2, 6, 0));
        let now = at(1, 22, 0);
        assert_eq!(
            next_deadline(SchedulePolicy::Transition, &p, now),
            at(2, 6, 0)
        );
    }

    #[test]
    fn test_rate_walks_four_samples_to_sunset() {
        let p = day(at(1, 6, 0), at(1, 18, 0));
        let mut now = at(1, 6, 0);
        let mut deadlines = Vec::new();
        while now < p.sunset {
            now = next_deadline(rate(4), &p, now);
            deadlines.push(now);
        }
        assert_eq!(
            deadlines,
            vec![at(1, 9, 0), at(1, 12, 0), at(1, 15, 0), at(1, 18, 0)]
        );
    }

    #[test]
    fn test_rate_is_independent_of_offset_within_sample() {
        let p = day(at(1, 6, 0), at(1, 18, 0));
        for minute in [1, 30, 59] {
            assert_eq!(next_deadline(rate(4), &p, at(1, 7, minute)), at(1, 9, 0));
        }
        assert_eq!(next_deadline(rate(4), &p, at(1, 9, 0)), at(1, 12, 0));
    }

    #[test]
    fn test_rate_absorbs_remainder_in_last_sample() {
        // 10h night split 3 ways: 3h20m steps, last one ends at sunrise
        let p = night(at(1, 20, 0), at(2, 6, 0));
        assert_eq!(next_deadline(rate(3), &p, at(1, 20, 0)), at(1, 23, 20));
        assert_eq!(next_deadline(rate(3), &p, at(1, 23, 20)), at(2, 2, 40));
        assert_eq!(next_deadline(rate(3), &p, at(2, 2, 40)), at(2, 6, 0));
    }

    #[test]
    fn test_rate_of_one_is_the_transition() {
        let p = day(at(1, 6, 0), at(1, 18, 0));
        assert_eq!(next_deadline(rate(1), &p, at(1, 6, 0)), at(1, 18, 0));
    }

    #[test]
    fn test_interval_grid_is_aligned_to_transition() {
        let p = day(at(1, 6, 0), at(1, 18, 10));
        let policy = SchedulePolicy::Interval(TimeDelta::hours(1));

        // The 10 minute remainder comes first, then whole hours
        let first = next_deadline(policy, &p, at(1, 6, 0));
        assert_eq!(first, at(1, 6, 10));
        assert_eq!(next_deadline(policy, &p, first), at(1, 7, 10));
        assert_eq!(next_deadline(policy, &p, at(1, 7, 40)), at(1, 8, 10));
        assert_eq!(next_deadline(policy, &p, at(1, 17, 10)), at(1, 18, 10));
    }

    #[test]
    fn test_interval_tiles_half_cycle_without_drift() {
        let p = day(at(1, 6, 0), at(1, 18, 0));
        let policy = SchedulePolicy::Interval(TimeDelta::minutes(25));
        let mut now = at(1, 6, 0);
        let mut steps = 0;
        while now < p.sunset {
            let deadline = next_deadline(policy, &p, now);
            assert!(deadline > now);
            assert_eq!((p.sunset - deadline).num_seconds() % (25 * 60), 0);
            now = deadline;
            steps += 1;
        }
        assert_eq!(now, p.sunset);
        // 720 minutes = 28 * 25 + 20
        assert_eq!(steps, 29);
    }

    #[test]
    fn test_rate_takes_precedence_over_interval() {
        let policy = SchedulePolicy::select(NonZeroU32::new(6), Some(TimeDelta::minutes(5)));
        assert_eq!(policy, rate(6));
        assert_eq!(
            SchedulePolicy::select(None, Some(TimeDelta::minutes(5))),
            SchedulePolicy::Interval(TimeDelta::minutes(5))
        );
        assert_eq!(SchedulePolicy::select(None, None), SchedulePolicy::Transition);
    }

    #[test]
    fn test_validate_rejects_past_and_far_deadlines() {
        let now = at(1, 12, 0);
        assert_eq!(
            validate_deadline(now - TimeDelta::seconds(1), now),
            Err(ScheduleError::InvalidDeadline {
                deadline: now - TimeDelta::seconds(1),
                now,
                too_soon: true
            })
        );
        assert!(validate_deadline(now, now).is_err());
        assert!(validate_deadline(now + TimeDelta::hours(24), now).is_ok());
        assert!(matches!(
            validate_deadline(now + TimeDelta::hours(24) + TimeDelta::seconds(1), now),
            Err(ScheduleError::InvalidDeadline { too_soon: false, .. })
        ));
    }

    #[test]
    fn test_invalid_deadline_message_names_direction() {
        let now = at(1, 12, 0);
        let err = validate_deadline(now - TimeDelta::seconds(1), now).unwrap_err();
        assert!(err.to_string().contains("too soon"));
    }

    #[test]
    fn test_intensity_curve() {
        let p = day(at(1, 6, 0), at(1, 18, 0));
        assert_eq!(intensity(&p, at(1, 6, 0)), 0.0);
        assert_eq!(intensity(&p, at(1, 12, 0)), 0.0);
        assert!((intensity(&p, at(1, 15, 0)) - 1.5_f64.log2()).abs() < 1e-9);
        assert_eq!(intensity(&p, at(1, 18, 0)), 1.0);
        assert_eq!(intensity(&p, at(1, 19, 0)), 1.0);
    }

    #[test]
    fn test_intensity_degenerate_span_is_clamped() {
        let p = day(at(1, 6, 0), at(1, 6, 0));
        let value = intensity(&p, at(1, 6, 0));
        assert!((0.0..=1.0).contains(&value));
    }
}
