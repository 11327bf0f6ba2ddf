//! The scheduling engine.
//!
//! This module owns everything that runs while duskmode is in automatic mode:
//!
//! - [`cancel`]: cooperative cancellation tokens forming the task tree
//! - [`cell`]: single-writer observable values
//! - [`ui`]: the UI-affine thread that owns user-visible state
//! - [`context`]: collaborators shared by every task
//! - [`deadline`]: deadline policies, validation and the intensity signal
//! - [`scheduler`]: the predict, act, sleep loop
//! - [`supervisor`]: mode-driven start/stop of the loop and its resolver

pub mod cancel;
pub mod cell;
pub mod context;
pub mod deadline;
pub mod scheduler;
pub mod supervisor;
pub mod ui;

pub use cancel::CancelToken;
pub use cell::{Publisher, Subscriber, observable};
pub use context::{AppContext, ErrorHandler};
pub use deadline::{Intensity, SchedulePolicy, ScheduleError};
pub use scheduler::{DeadlineScheduler, LoopExit, SchedulerConfig};
pub use supervisor::{SchedulerSupervisor, SupervisorSettings};
pub use ui::{UiContext, UiHandle, UiObservers};
