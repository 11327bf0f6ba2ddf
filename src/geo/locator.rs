//! Location resolution with per-outcome retry.
//!
//! The resolver is the only writer of the shared location cell. It asks its
//! [`LocationProvider`] for a coordinate until it gets a terminal answer:
//!
//! - a valid coordinate is always terminal;
//! - `unknown` (including out-of-range coordinates) is retried after
//!   `unknown_retry` if one is configured, otherwise it is terminal;
//! - `denied` is retried after `denied_retry` if one is configured, otherwise
//!   it is terminal.
//!
//! Intermediate answers stay internal; only the terminal value is written.
//! With no authorization level configured nothing is requested at all and the
//! caller-provided value passes through unchanged.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::location::{AuthorizationLevel, Location};
use crate::common::utils::format_duration;
use crate::core::cancel::CancelToken;
use crate::core::cell::{Publisher, Subscriber};
use crate::time_source::TimeSource;

/// Source of raw location answers.
#[cfg_attr(test, mockall::automock)]
pub trait LocationProvider: Send + Sync {
    /// Ask for the current position once.
    ///
    /// Returns [`Location::Unknown`] promptly once `cancel` fires.
    fn request(&self, authorization: AuthorizationLevel, cancel: &CancelToken) -> Location;
}

/// Provider that always answers with the same value.
#[derive(Debug, Clone, Copy)]
pub struct FixedProvider(pub Location);

impl LocationProvider for FixedProvider {
    fn request(&self, _authorization: AuthorizationLevel, _cancel: &CancelToken) -> Location {
        self.0
    }
}

/// Retry and refresh policy.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ResolverConfig {
    /// `None` disables requests entirely.
    pub authorization: Option<AuthorizationLevel>,
    pub unknown_retry: Option<Duration>,
    pub denied_retry: Option<Duration>,
    /// Re-request on this cadence even after a successful resolution.
    pub refresh_interval: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolverState {
    #[default]
    Idle,
    Requesting,
    Unknown,
    Denied,
    Resolved,
}

impl fmt::Display for ResolverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResolverState::Idle => "idle",
            ResolverState::Requesting => "requesting",
            ResolverState::Unknown => "unknown",
            ResolverState::Denied => "denied",
            ResolverState::Resolved => "resolved",
        };
        f.write_str(name)
    }
}

pub struct LocationResolver {
    config: ResolverConfig,
    provider: Arc<dyn LocationProvider>,
    time: Arc<dyn TimeSource>,
    cell: Publisher<Location>,
    state: ResolverState,
    debug_enabled: bool,
}

impl LocationResolver {
    pub fn new(
        config: ResolverConfig,
        provider: Arc<dyn LocationProvider>,
        time: Arc<dyn TimeSource>,
        cell: Publisher<Location>,
        debug_enabled: bool,
    ) -> Self {
        Self {
            config,
            provider,
            time,
            cell,
            state: ResolverState::Idle,
            debug_enabled,
        }
    }

    pub fn state(&self) -> ResolverState {
        self.state
    }

    pub fn subscriber(&self) -> Subscriber<Location> {
        self.cell.subscriber()
    }

    /// Request until a terminal answer and write it to the cell.
    ///
    /// Returns `None` if cancelled while waiting to retry.
    pub fn resolve(&mut self, cancel: &CancelToken) -> Option<Location> {
        let Some(authorization) = self.config.authorization else {
            return Some(self.cell.get());
        };

        loop {
            if cancel.is_cancelled() {
                return None;
            }

            self.state = ResolverState::Requesting;
            let answer = self.provider.request(authorization, cancel);
            // An interrupted request says nothing about the location
            if cancel.is_cancelled() {
                return None;
            }

            let retry = match answer {
                answer if answer.is_valid() => {
                    self.state = ResolverState::Resolved;
                    self.cell.set(answer);
                    return Some(answer);
                }
                Location::Denied => {
                    self.state = ResolverState::Denied;
                    self.config.denied_retry
                }
                _ => {
                    self.state = ResolverState::Unknown;
                    self.config.unknown_retry
                }
            };

            let Some(delay) = retry else {
                log_warning!("Location {answer}, giving up");
                self.cell.set(answer);
                return Some(answer);
            };

            if self.debug_enabled {
                log_debug!(
                    "Location {answer}, asking again in {}",
                    format_duration(delay)
                );
            }
            if !self.time.sleep(delay, cancel) {
                return None;
            }
        }
    }

    /// Resolve if needed, then keep refreshing until cancelled.
    ///
    /// Hands the cell back so the owner can keep it across runs.
    pub fn run(mut self, cancel: CancelToken) -> Publisher<Location> {
        if self.cell.get().is_valid() {
            self.state = ResolverState::Resolved;
        } else if self.config.authorization.is_some() {
            log_block_start!("Resolving location...");
            if let Some(location) = self.resolve(&cancel)
                && location.is_valid()
            {
                log_decorated!("Location resolved: {location}");
            }
        }

        if let (Some(interval), Some(authorization)) =
            (self.config.refresh_interval, self.config.authorization)
        {
            while self.time.sleep(interval, &cancel) {
                self.state = ResolverState::Requesting;
                let answer = self.provider.request(authorization, &cancel);
                if cancel.is_cancelled() {
                    break;
                }
                self.state = match answer {
                    answer if answer.is_valid() => ResolverState::Resolved,
                    Location::Denied => ResolverState::Denied,
                    _ => ResolverState::Unknown,
                };
                if self.cell.set(answer) && self.debug_enabled {
                    log_debug!("Location refreshed: {answer}");
                }
            }
        }

        self.cell
    }
}
