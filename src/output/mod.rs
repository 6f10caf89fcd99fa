//! Output formatting module
//!
//! Provides output formats for run reports and comparisons.

mod formatter;

pub use formatter::{OutputFormat, ResultFormatter};
