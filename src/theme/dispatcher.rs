//! Strategy selection for applying a theme.

use std::fmt;
use std::sync::Arc;

use super::{Theme, ThemeBackend};

/// Failure of the scripted strategy, carrying the platform's raw message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThemeError {
    Script(String),
}

impl fmt::Display for ThemeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThemeError::Script(message) => write!(f, "Theme script failed: {message}"),
        }
    }
}

impl std::error::Error for ThemeError {}

/// What `apply` ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The desktop already showed the target theme.
    Unchanged,
    Animated,
    Scripted,
}

/// Applies themes through a backend, skipping redundant platform calls.
#[derive(Clone)]
pub struct ThemeDispatcher {
    backend: Arc<dyn ThemeBackend>,
    debug_enabled: bool,
}

impl ThemeDispatcher {
    pub fn new(backend: Arc<dyn ThemeBackend>, debug_enabled: bool) -> Self {
        Self {
            backend,
            debug_enabled,
        }
    }

    /// Apply `target`, animated if allowed and available, scripted otherwise.
    pub fn apply(&self, target: Theme, allow_transition: bool) -> Result<DispatchOutcome, ThemeError> {
        if self.backend.current_theme() == Some(target) {
            if self.debug_enabled {
                log_debug!("Theme already {target}, nothing to do");
            }
            return Ok(DispatchOutcome::Unchanged);
        }

        if allow_transition && self.backend.can_animate() {
            match self.backend.set_animated(target) {
                Ok(()) => {
                    log_block_start!("Switched to {target} theme (animated)");
                    return Ok(DispatchOutcome::Animated);
                }
                Err(e) => {
                    log_warning!("Animated transition failed, falling back to script: {e}");
                }
            }
        }

        self.backend.run_script(target).map_err(ThemeError::Script)?;
        log_block_start!("Switched to {target} theme");
        Ok(DispatchOutcome::Scripted)
    }

    /// Probe the animated strategy once, warning if it is unavailable.
    pub fn probe_transition(&self) -> bool {
        let available = self.backend.can_animate();
        if !available {
            log_warning!(
                "Animated transitions enabled but the {} backend cannot animate; using script",
                self.backend.name()
            );
        }
        available
    }
}
