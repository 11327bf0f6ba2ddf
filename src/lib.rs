//! # duskmode
//!
//! Library behind the duskmode binary: automatic light/dark theme switching
//! driven by sunrise and sunset.
//!
//! ## Architecture
//!
//! - **Entry Point**: [`Duskmode`] acquires resources and runs the main loop
//! - **Engine**: `core` holds the cancellation tree, observable cells, the UI
//!   thread, the [`DeadlineScheduler`](core::DeadlineScheduler) and the
//!   [`SchedulerSupervisor`](core::SchedulerSupervisor)
//! - **Geographic**: `geo` resolves the location and predicts sunrise/sunset
//! - **Theme**: `theme` decides and applies light or dark
//! - **Configuration**: `config` for TOML settings with hot reload
//! - **Commands**: `commands` for the one-shot CLI commands
//! - **Infrastructure**: signal handling, time sources, logging and utilities

// Import macros from logger module for use in all submodules
#[macro_use]
pub mod common;

// Public API modules
pub mod args;
pub mod commands;
pub mod config;
pub mod core;
pub mod geo;
pub mod io;
pub mod theme;
pub mod time_source;

mod duskmode;

// Re-export for binary
pub use duskmode::Duskmode;
