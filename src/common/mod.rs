// Shared helpers used across the crate
// Logger must be first for macro availability
#[macro_use]
pub mod logger;

pub mod constants;
pub mod utils;
