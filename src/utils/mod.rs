//! Shared helpers: logging setup, timing and process groups

pub mod logger;
pub mod process;
pub mod timer;
