//! Configuration validation functionality.
//!
//! Rejects values the engine cannot honor: out-of-range schedule parameters,
//! impossible coordinates and retry delays outside their windows.

use anyhow::Result;

use super::Config;
use crate::common::constants::*;

/// Validate a configuration after the geo.toml override has been merged.
pub fn validate_config(config: &Config) -> Result<()> {
    if let Some(rate) = config.rate
        && !(MINIMUM_RATE..=MAXIMUM_RATE).contains(&rate)
    {
        anyhow::bail!(
            "rate ({}) must be between {} and {} updates per half-cycle",
            rate,
            MINIMUM_RATE,
            MAXIMUM_RATE
        );
    }

    if let Some(interval) = config.interval
        && !(MINIMUM_INTERVAL_SECS..=MAXIMUM_INTERVAL_SECS).contains(&interval)
    {
        anyhow::bail!(
            "interval ({} seconds) must be between {} and {} seconds",
            interval,
            MINIMUM_INTERVAL_SECS,
            MAXIMUM_INTERVAL_SECS
        );
    }

    if let Some(lat) = config.latitude
        && !(-90.0..=90.0).contains(&lat)
    {
        anyhow::bail!("latitude must be between -90 and 90 degrees (got {})", lat);
    }

    if let Some(lon) = config.longitude
        && !(-180.0..=180.0).contains(&lon)
    {
        anyhow::bail!(
            "longitude must be between -180 and 180 degrees (got {})",
            lon
        );
    }

    if config.latitude.is_some() != config.longitude.is_some() {
        anyhow::bail!("latitude and longitude must be given together");
    }

    if let Some(retry) = config.unknown_retry {
        validate_retry_delay(retry, MAXIMUM_UNKNOWN_RETRY_SECS, "unknown_retry")?;
    }

    if let Some(retry) = config.denied_retry {
        validate_retry_delay(retry, MAXIMUM_DENIED_RETRY_SECS, "denied_retry")?;
    }

    if let Some(refresh) = config.location_refresh
        && !(MINIMUM_LOCATION_REFRESH_SECS..=MAXIMUM_LOCATION_REFRESH_SECS).contains(&refresh)
    {
        anyhow::bail!(
            "location_refresh ({} seconds) must be between {} and {} seconds",
            refresh,
            MINIMUM_LOCATION_REFRESH_SECS,
            MAXIMUM_LOCATION_REFRESH_SECS
        );
    }

    if let Some(command) = &config.script_command
        && command.trim().is_empty()
    {
        anyhow::bail!("script_command must not be empty");
    }

    if let Some(command) = &config.transition_command
        && command.trim().is_empty()
    {
        anyhow::bail!("transition_command must not be empty (remove it to disable transitions)");
    }

    Ok(())
}

/// A retry delay is either 0 (do not retry) or inside `[MINIMUM_RETRY_SECS, maximum]`.
pub(crate) fn validate_retry_delay(seconds: f64, maximum: f64, field_name: &str) -> Result<()> {
    if seconds == 0.0 {
        return Ok(());
    }
    if !(MINIMUM_RETRY_SECS..=maximum).contains(&seconds) {
        anyhow::bail!(
            "{} ({} seconds) must be 0 or between {} and {} seconds",
            field_name,
            seconds,
            MINIMUM_RETRY_SECS,
            maximum
        );
    }
    Ok(())
}
