//! Predict command implementation: show what the scheduler would do now.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use std::sync::Arc;

use crate::common::utils::format_duration;
use crate::config;
use crate::core::ScheduleError;
use crate::core::deadline::{SchedulePolicy, intensity, next_deadline, validate_deadline};
use crate::geo::{Coordinate, GeoClueProvider, PhasePredictions, SolarPredictor, SunriseEquation};
use crate::theme::Theme;

/// One scheduling cycle, computed without acting on it.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub coordinate: Coordinate,
    pub predictions: PhasePredictions,
    pub theme: Theme,
    pub deadline: DateTime<Utc>,
    pub intensity: f64,
}

pub fn handle_predict_command(debug_enabled: bool) -> Result<()> {
    log_version!();

    let config = config::load().context("Configuration failed")?;
    let provider = Arc::new(GeoClueProvider::new(debug_enabled));
    let coordinate = super::locate_once(&config, provider, debug_enabled)?;

    let policy = config.scheduler_config().policy();
    let now = Utc::now();
    let prediction = predict(&SunriseEquation, coordinate, policy, now)?;

    let local = |time: DateTime<Utc>| time.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S");
    let until = |time: DateTime<Utc>| {
        format_duration((time - now).to_std().unwrap_or_default())
    };

    log_block_start!("Location: {}", prediction.coordinate);
    log_block_start!(
        "It is {} ({} theme)",
        if prediction.predictions.is_daytime { "day" } else { "night" },
        prediction.theme
    );
    log_indented!("Sunrise: {}", local(prediction.predictions.sunrise));
    log_indented!("Sunset:  {}", local(prediction.predictions.sunset));
    log_block_start!("Updates: {}", policy);
    log_indented!(
        "Next update: {} (in {})",
        local(prediction.deadline),
        until(prediction.deadline)
    );
    log_indented!("Intensity: {:.0}%", prediction.intensity * 100.0);
    log_end!();
    Ok(())
}

/// Predict, pick the theme and compute the next deadline for `now`.
pub fn predict(
    predictor: &dyn SolarPredictor,
    coordinate: Coordinate,
    policy: SchedulePolicy,
    now: DateTime<Utc>,
) -> Result<Prediction, ScheduleError> {
    let predictions =
        predictor
            .predict(now, coordinate)
            .ok_or(ScheduleError::UnableToPredict {
                location: coordinate,
                at: now,
            })?;

    let deadline = next_deadline(policy, &predictions, now);
    validate_deadline(deadline, now)?;

    Ok(Prediction {
        coordinate,
        predictions,
        theme: Theme::for_predictions(&predictions),
        deadline,
        intensity: intensity(&predictions, now),
    })
}

pub fn display_help() {
    log_version!();
    log_block_start!("predict - Show the current solar schedule");
    log_block_start!("Usage: duskmode predict");
    log_block_start!("Shows:");
    log_indented!("The location in use, sunrise and sunset, the matching theme,");
    log_indented!("when the next update would happen and the current intensity.");
    log_end!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::solar::MockSolarPredictor;
    use chrono::{TimeDelta, TimeZone};
    use std::num::NonZeroU32;

    const BERLIN: Coordinate = Coordinate::new(52.52, 13.405);

    fn fixed_day() -> MockSolarPredictor {
        let mut predictor = MockSolarPredictor::new();
        predictor.expect_predict().returning(|now, _| {
            let sunrise = now.date_naive().and_hms_opt(6, 0, 0).unwrap().and_utc();
            Some(PhasePredictions {
                sunrise,
                sunset: sunrise + TimeDelta::hours(14),
                is_daytime: true,
            })
        });
        predictor
    }

    #[test]
    fn test_prediction_at_noon() {
        let now = Utc.with_ymd_and_hms(2024, 6, 21, 13, 0, 0).unwrap();
        let prediction = predict(&fixed_day(), BERLIN, SchedulePolicy::Transition, now).unwrap();

        assert_eq!(prediction.theme, Theme::Light);
        assert_eq!(
            prediction.deadline,
            Utc.with_ymd_and_hms(2024, 6, 21, 20, 0, 0).unwrap()
        );
        assert_eq!(prediction.intensity, 0.0);
    }

    #[test]
    fn test_prediction_uses_rate_policy() {
        let now = Utc.with_ymd_and_hms(2024, 6, 21, 7, 0, 0).unwrap();
        let policy = SchedulePolicy::Rate(NonZeroU32::new(7).unwrap());
        let prediction = predict(&fixed_day(), BERLIN, policy, now).unwrap();

        // 14h day in 7 steps of 2h: 06, 08, 10, ...
        assert_eq!(
            prediction.deadline,
            Utc.with_ymd_and_hms(2024, 6, 21, 8, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_prediction_late_in_the_day_is_intense() {
        let now = Utc.with_ymd_and_hms(2024, 6, 21, 19, 30, 0).unwrap();
        let prediction = predict(&fixed_day(), BERLIN, SchedulePolicy::Transition, now).unwrap();
        assert!(prediction.intensity > 0.9 && prediction.intensity <= 1.0);
    }

    #[test]
    fn test_polar_night_is_unpredictable() {
        let now = Utc.with_ymd_and_hms(2024, 12, 21, 12, 0, 0).unwrap();
        let tromso = Coordinate::new(69.65, 18.96);
        assert!(matches!(
            predict(&SunriseEquation, tromso, SchedulePolicy::Transition, now),
            Err(ScheduleError::UnableToPredict { .. })
        ));
    }
}
