//! GeoClue2 location provider over the system D-Bus.
//!
//! One request creates a fresh GeoClue client, announces our desktop id and
//! the accuracy the authorization level allows, starts it, and polls the
//! client's `Location` property until a fix arrives or the timeout passes.

use std::time::{Duration, Instant};

use zbus::blocking::Connection;
use zbus::proxy::CacheProperties;
use zbus::zvariant::OwnedObjectPath;

use super::location::{AuthorizationLevel, Coordinate, Location};
use super::locator::LocationProvider;
use crate::common::constants::{DESKTOP_ID, LOCATION_FIX_TIMEOUT, LOCATION_POLL_INTERVAL};
use crate::core::cancel::CancelToken;

#[zbus::proxy(
    interface = "org.freedesktop.GeoClue2.Manager",
    default_service = "org.freedesktop.GeoClue2",
    default_path = "/org/freedesktop/GeoClue2/Manager"
)]
trait GeoClueManager {
    fn get_client(&self) -> zbus::Result<OwnedObjectPath>;
}

#[zbus::proxy(
    interface = "org.freedesktop.GeoClue2.Client",
    default_service = "org.freedesktop.GeoClue2"
)]
trait GeoClueClient {
    fn start(&self) -> zbus::Result<()>;

    fn stop(&self) -> zbus::Result<()>;

    #[zbus(property)]
    fn location(&self) -> zbus::Result<OwnedObjectPath>;

    #[zbus(property)]
    fn set_desktop_id(&self, id: &str) -> zbus::Result<()>;

    #[zbus(property)]
    fn set_requested_accuracy_level(&self, level: u32) -> zbus::Result<()>;
}

#[zbus::proxy(
    interface = "org.freedesktop.GeoClue2.Location",
    default_service = "org.freedesktop.GeoClue2"
)]
trait GeoClueLocation {
    #[zbus(property)]
    fn latitude(&self) -> zbus::Result<f64>;

    #[zbus(property)]
    fn longitude(&self) -> zbus::Result<f64>;
}

// GClueAccuracyLevel values
const ACCURACY_CITY: u32 = 4;
const ACCURACY_EXACT: u32 = 8;

/// Location provider backed by the GeoClue2 service.
#[derive(Debug, Default, Clone, Copy)]
pub struct GeoClueProvider {
    debug_enabled: bool,
}

impl GeoClueProvider {
    pub fn new(debug_enabled: bool) -> Self {
        Self { debug_enabled }
    }

    fn try_request(
        &self,
        authorization: AuthorizationLevel,
        cancel: &CancelToken,
    ) -> zbus::Result<Option<Coordinate>> {
        let connection = Connection::system()?;
        let manager = GeoClueManagerProxyBlocking::new(&connection)?;
        let client_path = manager.get_client()?;

        let client = GeoClueClientProxyBlocking::builder(&connection)
            .path(client_path)?
            .cache_properties(CacheProperties::No)
            .build()?;
        client.set_desktop_id(DESKTOP_ID)?;
        client.set_requested_accuracy_level(accuracy_level(authorization))?;
        client.start()?;

        let fix = self.wait_for_fix(&connection, &client, cancel);
        let _ = client.stop();
        fix
    }

    fn wait_for_fix(
        &self,
        connection: &Connection,
        client: &GeoClueClientProxyBlocking<'_>,
        cancel: &CancelToken,
    ) -> zbus::Result<Option<Coordinate>> {
        let fix = poll_for_fix(cancel, LOCATION_FIX_TIMEOUT, LOCATION_POLL_INTERVAL, || {
            let path = client.location()?;
            if path.as_str() == "/" {
                return Ok(None);
            }
            let location = GeoClueLocationProxyBlocking::builder(connection)
                .path(path)?
                .cache_properties(CacheProperties::No)
                .build()?;
            Ok(Some(Coordinate::new(
                location.latitude()?,
                location.longitude()?,
            )))
        })?;

        if fix.is_none() && self.debug_enabled && !cancel.is_cancelled() {
            log_debug!(
                "No location fix within {}s",
                LOCATION_FIX_TIMEOUT.as_secs()
            );
        }
        Ok(fix)
    }
}

impl LocationProvider for GeoClueProvider {
    fn request(&self, authorization: AuthorizationLevel, cancel: &CancelToken) -> Location {
        if cancel.is_cancelled() {
            return Location::Unknown;
        }
        match self.try_request(authorization, cancel) {
            Ok(Some(coordinate)) => Location::Resolved(coordinate),
            Ok(None) => Location::Unknown,
            Err(e) if is_access_denied(&e) => Location::Denied,
            Err(e) => {
                if self.debug_enabled {
                    log_debug!("GeoClue request failed: {e}");
                }
                Location::Unknown
            }
        }
    }
}

/// Call `probe` every `interval` until it yields a fix, `timeout` passes or
/// `cancel` fires.
fn poll_for_fix(
    cancel: &CancelToken,
    timeout: Duration,
    interval: Duration,
    mut probe: impl FnMut() -> zbus::Result<Option<Coordinate>>,
) -> zbus::Result<Option<Coordinate>> {
    let started = Instant::now();

    while started.elapsed() < timeout {
        if let Some(coordinate) = probe()? {
            return Ok(Some(coordinate));
        }
        if cancel.wait_timeout(interval) {
            break;
        }
    }
    Ok(None)
}

fn accuracy_level(authorization: AuthorizationLevel) -> u32 {
    match authorization {
        AuthorizationLevel::WhenInUse => ACCURACY_CITY,
        AuthorizationLevel::Always => ACCURACY_EXACT,
    }
}

fn is_access_denied(error: &zbus::Error) -> bool {
    error.to_string().contains("AccessDenied")
}
