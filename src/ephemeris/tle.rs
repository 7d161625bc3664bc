//! # TLE Tracker
//!
//! Platform tracking from a two-line element set propagated with SGP4.
//!
//! The element file holds the two TLE lines, optionally preceded by a name line:
//!
//! ```text
//! ISS (ZARYA)
//! 1 25544U 98067A   20194.88612269 -.00002218  00000-0 -31515-4 0  9992
//! 2 25544  51.6461 221.2784 0001413  89.1723 280.4612 15.49507896236008
//! ```
//!
//! Elements degrade with age; refresh the file before each run.

use chrono::{DateTime, Utc};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use super::geometry::{
    earth_fixed_to_geodetic, gmst, inertial_to_earth_fixed, is_sunlit, sun_direction,
};
use super::{GroundPosition, PlatformTracker};
use crate::error::{OrbitCaptureError, Result};

/// SGP4-backed platform tracker
pub struct TleTracker {
    name: Option<String>,
    epoch: DateTime<Utc>,
    elements: sgp4::Elements,
    constants: sgp4::Constants,
}

impl std::fmt::Debug for TleTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TleTracker")
            .field("name", &self.name)
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}

impl TleTracker {
    /// Load elements from a TLE file
    ///
    /// # Errors
    ///
    /// Returns `Ephemeris` if the file is missing or does not hold a valid element set.
    /// Without elements the mission cannot run, so callers treat this as fatal.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            OrbitCaptureError::Ephemeris(format!("Failed to read TLE {}: {}", path.display(), e))
        })?;

        let tracker = Self::from_tle_str(&contents)?;
        info!(
            "Loaded elements for {} (epoch {})",
            tracker.name.as_deref().unwrap_or("unnamed object"),
            tracker.epoch
        );
        Ok(tracker)
    }

    /// Parse elements from TLE text (two lines, or three with a name line)
    pub fn from_tle_str(contents: &str) -> Result<Self> {
        let lines: Vec<&str> = contents
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.trim().is_empty())
            .collect();

        let (name, line1, line2) = match lines.as_slice() {
            [line1, line2] => (None, *line1, *line2),
            [name, line1, line2] => (Some(name.trim().to_string()), *line1, *line2),
            _ => {
                return Err(OrbitCaptureError::Ephemeris(format!(
                    "Expected 2 or 3 TLE lines, found {}",
                    lines.len()
                )))
            }
        };

        let elements = sgp4::Elements::from_tle(name.clone(), line1.as_bytes(), line2.as_bytes())
            .map_err(|e| OrbitCaptureError::Ephemeris(format!("Invalid TLE: {}", e)))?;

        let constants = sgp4::Constants::from_elements(&elements)
            .map_err(|e| OrbitCaptureError::Ephemeris(format!("Unusable elements: {}", e)))?;

        let epoch = elements.datetime.and_utc();

        Ok(Self {
            name,
            epoch,
            elements,
            constants,
        })
    }

    /// Element set epoch
    #[must_use]
    pub fn epoch(&self) -> DateTime<Utc> {
        self.epoch
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn norad_id(&self) -> u64 {
        self.elements.norad_id
    }

    /// TEME position in km at `time`
    fn inertial_position(&self, time: DateTime<Utc>) -> Result<[f64; 3]> {
        let minutes = (time - self.epoch).num_milliseconds() as f64 / 60_000.0;
        let prediction = self
            .constants
            .propagate(sgp4::MinutesSinceEpoch(minutes))
            .map_err(|e| {
                OrbitCaptureError::Ephemeris(format!("Propagation failed at {}: {}", time, e))
            })?;
        Ok(prediction.position)
    }
}

impl PlatformTracker for TleTracker {
    fn position_at(&self, time: DateTime<Utc>) -> Result<GroundPosition> {
        let inertial = self.inertial_position(time)?;
        let position = earth_fixed_to_geodetic(inertial_to_earth_fixed(inertial, gmst(time)));
        debug!(
            "Subpoint at {}: {:.4}, {:.4}",
            time, position.latitude, position.longitude
        );
        Ok(position)
    }

    fn is_illuminated(&self, time: DateTime<Utc>) -> Result<bool> {
        let inertial = self.inertial_position(time)?;
        Ok(is_sunlit(inertial, sun_direction(time)))
    }
}
