//! Command-line command handlers for duskmode.
//!
//! Each one-shot command lives in its own submodule. They share the lookup of
//! a coordinate, which unlike the daemon never waits to retry.

pub mod help;
pub mod predict;
pub mod set;

use anyhow::Result;
use std::sync::Arc;

use crate::config::Config;
use crate::core::{CancelToken, observable};
use crate::geo::{Coordinate, Location, LocationProvider, LocationResolver, ResolverConfig};
use crate::time_source::RealTimeSource;

/// The configured coordinate, or a single answer from `provider`.
pub(crate) fn locate_once(
    config: &Config,
    provider: Arc<dyn LocationProvider>,
    debug_enabled: bool,
) -> Result<Coordinate> {
    if let Some(coordinate) = config.stored_location().coordinate() {
        return Ok(coordinate);
    }

    let resolver_config = ResolverConfig {
        unknown_retry: None,
        denied_retry: None,
        refresh_interval: None,
        ..config.resolver_config()
    };
    if resolver_config.authorization.is_none() {
        anyhow::bail!(
            "No coordinate configured and location access is disabled (authorization = \"none\")"
        );
    }

    let (cell, _) = observable(Location::Unknown);
    let mut resolver = LocationResolver::new(
        resolver_config,
        provider,
        Arc::new(RealTimeSource),
        cell,
        debug_enabled,
    );

    match resolver.resolve(&CancelToken::new()) {
        Some(Location::Resolved(coordinate)) => Ok(coordinate),
        Some(Location::Denied) => anyhow::bail!("Location access was denied"),
        _ => anyhow::bail!("Location is unknown; set latitude and longitude in the config"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Authorization;
    use crate::geo::FixedProvider;

    const BERLIN: Coordinate = Coordinate::new(52.52, 13.405);

    #[test]
    fn test_stored_coordinate_wins() {
        crate::common::logger::Log::set_enabled(false);
        let config = Config {
            latitude: Some(BERLIN.latitude),
            longitude: Some(BERLIN.longitude),
            ..Default::default()
        };
        let provider = Arc::new(FixedProvider(Location::Denied));
        assert_eq!(locate_once(&config, provider, false).unwrap(), BERLIN);
    }

    #[test]
    fn test_provider_answer_is_used_once() {
        crate::common::logger::Log::set_enabled(false);
        let provider = Arc::new(FixedProvider(Location::Resolved(BERLIN)));
        assert_eq!(
            locate_once(&Config::default(), provider, false).unwrap(),
            BERLIN
        );

        let denied = Arc::new(FixedProvider(Location::Denied));
        let error = locate_once(&Config::default(), denied, false).unwrap_err();
        assert!(error.to_string().contains("denied"));
    }

    #[test]
    fn test_disabled_authorization_without_coordinate_fails() {
        let config = Config {
            authorization: Some(Authorization::None),
            ..Default::default()
        };
        let provider = Arc::new(FixedProvider(Location::Resolved(BERLIN)));
        assert!(locate_once(&config, provider, false).is_err());
    }
}
