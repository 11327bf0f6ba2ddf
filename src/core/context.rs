//! Process-wide collaborators, built once at startup and passed down.

use std::sync::Arc;

use super::deadline::ScheduleError;
use super::ui::UiHandle;
use crate::geo::{LocationProvider, SolarPredictor};
use crate::theme::ThemeDispatcher;
use crate::time_source::TimeSource;

/// Callback that receives scheduling errors instead of them being fatal.
pub type ErrorHandler = Arc<dyn Fn(&ScheduleError) + Send + Sync>;

/// Everything the resolver, scheduler and supervisor need from the outside.
///
/// Cloning is cheap; all members are shared handles.
#[derive(Clone)]
pub struct AppContext {
    pub time: Arc<dyn TimeSource>,
    pub predictor: Arc<dyn SolarPredictor>,
    pub provider: Arc<dyn LocationProvider>,
    pub dispatcher: ThemeDispatcher,
    pub ui: UiHandle,
    /// `None` makes scheduling errors fatal to the caller.
    pub on_error: Option<ErrorHandler>,
    pub debug_enabled: bool,
}

impl AppContext {
    /// Log-and-continue handler used by the daemon outside of debug runs.
    pub fn logging_error_handler() -> ErrorHandler {
        Arc::new(|error: &ScheduleError| {
            log_pipe!();
            log_error!("{error}");
            log_indented!("Scheduling paused until the next reload");
        })
    }
}
