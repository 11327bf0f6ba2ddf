//! Where the host is, and when the sun rises and sets there.
//!
//! - [`location`]: coordinates, location sentinels and authorization levels
//! - [`locator`]: the retrying [`LocationResolver`] and the provider trait
//! - [`geoclue`]: GeoClue2 provider over the system D-Bus
//! - [`solar`]: sunrise/sunset prediction

pub mod geoclue;
pub mod location;
pub mod locator;
pub mod solar;

pub use geoclue::GeoClueProvider;
pub use location::{AuthorizationLevel, Coordinate, Location};
pub use locator::{FixedProvider, LocationProvider, LocationResolver, ResolverConfig, ResolverState};
pub use solar::{PhasePredictions, SolarPredictor, SunriseEquation};
