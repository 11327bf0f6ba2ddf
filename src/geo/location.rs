//! Coordinates, location states and authorization scopes.

use std::fmt;

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Finite and inside the geographic domain.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ns = if self.latitude >= 0.0 { 'N' } else { 'S' };
        let ew = if self.longitude >= 0.0 { 'E' } else { 'W' };
        write!(
            f,
            "{:.3}°{ns}, {:.3}°{ew}",
            self.latitude.abs(),
            self.longitude.abs()
        )
    }
}

/// What the resolver currently knows about the host's position.
///
/// `Unknown` and `Denied` are the two sentinels; a `Resolved` coordinate may
/// still be out of range, which [`Location::is_valid`] rejects.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Location {
    #[default]
    Unknown,
    Denied,
    Resolved(Coordinate),
}

impl Location {
    /// Usable by the solar predictor.
    pub fn is_valid(&self) -> bool {
        matches!(self, Location::Resolved(c) if c.is_valid())
    }

    /// The coordinate, if valid.
    pub fn coordinate(&self) -> Option<Coordinate> {
        match self {
            Location::Resolved(c) if c.is_valid() => Some(*c),
            _ => None,
        }
    }
}

impl From<Coordinate> for Location {
    fn from(coordinate: Coordinate) -> Self {
        Location::Resolved(coordinate)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Unknown => f.write_str("unknown"),
            Location::Denied => f.write_str("denied"),
            Location::Resolved(c) if c.is_valid() => write!(f, "{c}"),
            Location::Resolved(c) => write!(f, "invalid ({}, {})", c.latitude, c.longitude),
        }
    }
}

/// Permission scope requested from the location service. Ordered from the
/// narrowest to the widest scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AuthorizationLevel {
    WhenInUse,
    Always,
}

impl AuthorizationLevel {
    /// Parse a config value. `"none"` yields `Ok(None)`.
    pub fn parse(value: &str) -> anyhow::Result<Option<Self>> {
        match value {
            "none" => Ok(None),
            "when-in-use" => Ok(Some(AuthorizationLevel::WhenInUse)),
            "always" => Ok(Some(AuthorizationLevel::Always)),
            other => anyhow::bail!(
                "Invalid authorization '{other}' (expected \"none\", \"when-in-use\" or \"always\")"
            ),
        }
    }
}

impl fmt::Display for AuthorizationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthorizationLevel::WhenInUse => f.write_str("when-in-use"),
            AuthorizationLevel::Always => f.write_str("always"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_validity() {
        assert!(Location::from(Coordinate::new(52.52, 13.405)).is_valid());
        assert!(Location::from(Coordinate::new(-90.0, 180.0)).is_valid());

        assert!(!Location::Unknown.is_valid());
        assert!(!Location::Denied.is_valid());
        assert!(!Location::from(Coordinate::new(91.0, 0.0)).is_valid());
        assert!(!Location::from(Coordinate::new(0.0, -180.5)).is_valid());
        assert!(!Location::from(Coordinate::new(f64::NAN, 0.0)).is_valid());
        assert!(!Location::from(Coordinate::new(0.0, f64::INFINITY)).is_valid());
    }

    #[test]
    fn test_coordinate_display() {
        assert_eq!(Coordinate::new(52.52, 13.405).to_string(), "52.520°N, 13.405°E");
        assert_eq!(Coordinate::new(-33.9, -70.1).to_string(), "33.900°S, 70.100°W");
    }

    #[test]
    fn test_authorization_parse_and_order() {
        assert_eq!(AuthorizationLevel::parse("none").unwrap(), None);
        assert_eq!(
            AuthorizationLevel::parse("always").unwrap(),
            Some(AuthorizationLevel::Always)
        );
        assert!(AuthorizationLevel::parse("sometimes").is_err());
        assert!(AuthorizationLevel::WhenInUse < AuthorizationLevel::Always);
    }
}
