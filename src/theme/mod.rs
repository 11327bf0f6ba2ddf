//! Theme targets, the mode that selects them, and the machinery that applies
//! them to the desktop.
//!
//! - [`backend`]: the platform primitives (current theme, animated and scripted set)
//! - [`dispatcher`]: strategy selection and idempotence on top of a backend

pub mod backend;
pub mod dispatcher;

pub use backend::{CommandBackend, ThemeBackend};
pub use dispatcher::{DispatchOutcome, ThemeDispatcher, ThemeError};

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

use crate::geo::PhasePredictions;

/// Desktop color scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    /// The theme that matches the current half-cycle.
    pub fn for_predictions(predictions: &PhasePredictions) -> Self {
        if predictions.is_daytime {
            Theme::Light
        } else {
            Theme::Dark
        }
    }

    /// Value of the freedesktop `color-scheme` setting for this theme.
    pub fn color_scheme(self) -> &'static str {
        match self {
            Theme::Light => "prefer-light",
            Theme::Dark => "prefer-dark",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Light => f.write_str("light"),
            Theme::Dark => f.write_str("dark"),
        }
    }
}

/// Who decides the theme: the sun, or the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Auto,
    Light,
    Dark,
}

impl Mode {
    /// The pinned theme, or `None` in automatic mode.
    pub fn fixed_theme(self) -> Option<Theme> {
        match self {
            Mode::Auto => None,
            Mode::Light => Some(Theme::Light),
            Mode::Dark => Some(Theme::Dark),
        }
    }
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Mode::Auto),
            "light" => Ok(Mode::Light),
            "dark" => Ok(Mode::Dark),
            other => anyhow::bail!("Invalid mode '{other}' (expected \"auto\", \"light\" or \"dark\")"),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Auto => f.write_str("auto"),
            Mode::Light => f.write_str("light"),
            Mode::Dark => f.write_str("dark"),
        }
    }
}
