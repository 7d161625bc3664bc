//! # Cadence Module
//!
//! Computes the sleep between acquisition iterations so captures land roughly
//! every `target` seconds despite variable per-iteration latency.
//!
//! Pacing is best effort. An iteration that overruns the target (the video
//! window, for example) gets no sleep, and the overrun is never paid back on
//! later iterations.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Sleep, in whole seconds, for an iteration that has run `elapsed_secs`.
///
/// The result is clamped to `[0, target_secs]` for any `elapsed_secs`,
/// including negative values from a clock step backwards.
#[must_use]
pub fn sleep_secs(elapsed_secs: i64, target_secs: u64) -> u64 {
    let target = i64::try_from(target_secs).unwrap_or(i64::MAX);
    let remaining = target.saturating_sub(elapsed_secs).clamp(0, target);
    remaining as u64
}

/// Fixed-cadence pacing for the acquisition loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CadenceController {
    target_secs: u64,
}

impl CadenceController {
    #[must_use]
    pub fn new(target_secs: u64) -> Self {
        Self { target_secs }
    }

    #[must_use]
    pub fn target_secs(&self) -> u64 {
        self.target_secs
    }

    /// Sleep needed after an iteration that started at `previous_start`.
    ///
    /// Elapsed time is truncated to whole seconds before subtracting.
    #[must_use]
    pub fn compute_sleep(&self, now: DateTime<Utc>, previous_start: DateTime<Utc>) -> Duration {
        let elapsed = (now - previous_start).num_seconds();
        Duration::from_secs(sleep_secs(elapsed, self.target_secs))
    }
}
