//! # Ephemeris Module
//!
//! Where the platform is and whether it is in sunlight.
//!
//! This module handles:
//! - The [`PlatformTracker`] seam consumed once per iteration
//! - A two-line-element backend propagated with SGP4 ([`tle::TleTracker`])
//! - Frame conversions and the Earth-shadow test ([`geometry`])

pub mod geometry;
pub mod tle;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;

pub use tle::TleTracker;

/// Geodetic subpoint in decimal degrees (north and east positive)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GroundPosition {
    pub latitude: f64,
    pub longitude: f64,
}

/// Platform position and illumination service
#[cfg_attr(test, mockall::automock)]
pub trait PlatformTracker {
    /// Ground position directly beneath the platform at `time`
    fn position_at(&self, time: DateTime<Utc>) -> Result<GroundPosition>;

    /// Whether the platform is in direct sunlight at `time`
    fn is_illuminated(&self, time: DateTime<Utc>) -> Result<bool>;
}
