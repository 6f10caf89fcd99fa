//! Logging utilities
//!
//! Logs go to stderr so stdout only carries results (and, for workers, the
//! JSON result document).

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Verbosity levels accepted on the command line
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verbosity {
    /// 0: warnings and errors only
    Quiet,
    /// 1: basic progress
    Basic,
    /// 2: extended output
    Extended,
}

impl Verbosity {
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            0 => Some(Verbosity::Quiet),
            1 => Some(Verbosity::Basic),
            2 => Some(Verbosity::Extended),
            _ => None,
        }
    }

    pub fn level(self) -> u8 {
        match self {
            Verbosity::Quiet => 0,
            Verbosity::Basic => 1,
            Verbosity::Extended => 2,
        }
    }

    pub fn to_tracing_level(self) -> Level {
        match self {
            Verbosity::Quiet => Level::WARN,
            Verbosity::Basic => Level::INFO,
            Verbosity::Extended => Level::DEBUG,
        }
    }
}

impl Default for Verbosity {
    fn default() -> Self {
        Verbosity::Basic
    }
}

/// Filter directive for a verbosity, unless RUST_LOG is set
///
/// Level 0 still shows warnings and errors.
pub fn filter_for(verbosity: Verbosity) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "subject_runner={}",
            verbosity.to_tracing_level()
        ))
    })
}

/// Initialize the logger with specified verbosity
pub fn init_logger(verbosity: Verbosity) {
    tracing_subscriber::fmt()
        .with_env_filter(filter_for(verbosity))
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
