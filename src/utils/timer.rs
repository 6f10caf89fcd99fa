//! Timing helpers for jobs and run phases

use std::fmt;
use std::time::{Duration, Instant};

/// Times one job; logs the elapsed time on `stop`
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    label: String,
}

impl Timer {
    pub fn start(label: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            label: label.into(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed().as_millis() as u64
    }

    pub fn stop(self) -> Duration {
        let elapsed = self.elapsed();
        tracing::debug!("{} took {}ms", self.label, elapsed.as_millis());
        elapsed
    }
}

/// Durations of the successive phases of a run
///
/// `mark` closes the current phase; each phase starts where the previous
/// one ended.
#[derive(Debug)]
pub struct RunPhases {
    start: Instant,
    last: Instant,
    phases: Vec<(&'static str, Duration)>,
}

impl RunPhases {
    pub fn start() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last: now,
            phases: Vec::new(),
        }
    }

    pub fn mark(&mut self, phase: &'static str) {
        let now = Instant::now();
        self.phases.push((phase, now - self.last));
        self.last = now;
    }

    #[cfg(test)]
    pub fn phases(&self) -> &[(&'static str, Duration)] {
        &self.phases
    }

    pub fn total(&self) -> Duration {
        self.start.elapsed()
    }
}

impl fmt::Display for RunPhases {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (phase, duration) in &self.phases {
            write!(f, "{}={}ms ", phase, duration.as_millis())?;
        }
        write!(f, "total={}ms", self.total().as_millis())
    }
}
