//! # Telemetry Module
//!
//! Append-only CSV log of one sensor sample per iteration.
//!
//! This module handles:
//! - Writing the fixed header once when the log is created
//! - Reopening an existing log for append without repeating the header
//! - Rounding every value to 2 decimal places (timestamp excepted)
//! - Flushing each row so a power cut loses at most the current sample

use chrono::{DateTime, Utc};
use std::fs::{File, OpenOptions};
use std::path::Path;
use tracing::debug;

use crate::ephemeris::GroundPosition;
use crate::error::Result;
use crate::hardware::sensors::SensorReadings;

/// Column titles, in row order
pub const HEADER: [&str; 12] = [
    "Date/time",
    "Latitude",
    "Longitude",
    "Temperature",
    "Humidity",
    "Pressure",
    "Pitch",
    "Roll",
    "Yaw",
    "X",
    "Y",
    "Z",
];

/// Timestamp format for the first column
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// One telemetry row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySample {
    pub timestamp: DateTime<Utc>,
    /// Subpoint used for this row; `None` leaves both columns empty
    pub position: Option<GroundPosition>,
    pub readings: SensorReadings,
}

impl TelemetrySample {
    /// Render the sample as CSV fields
    #[must_use]
    pub fn to_row(&self) -> Vec<String> {
        let r = &self.readings;
        let (latitude, longitude) = match self.position {
            Some(p) => (round2(p.latitude), round2(p.longitude)),
            None => (String::new(), String::new()),
        };

        vec![
            self.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            latitude,
            longitude,
            round2(r.temperature),
            round2(r.humidity),
            round2(r.pressure),
            round2(r.orientation.pitch),
            round2(r.orientation.roll),
            round2(r.orientation.yaw),
            round2(r.acceleration.x),
            round2(r.acceleration.y),
            round2(r.acceleration.z),
        ]
    }
}

fn round2(value: f64) -> String {
    format!("{:.2}", value)
}

/// CSV telemetry log writer
pub struct TelemetryLog {
    writer: csv::Writer<File>,
    rows: u64,
}

impl std::fmt::Debug for TelemetryLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryLog")
            .field("rows", &self.rows)
            .finish_non_exhaustive()
    }
}

impl TelemetryLog {
    /// Open the log at `path`, writing the header only if the file is new or empty
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let is_new = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        if is_new {
            writer.write_record(HEADER)?;
            writer.flush()?;
            debug!("Created telemetry log {}", path.display());
        }

        Ok(Self { writer, rows: 0 })
    }

    /// Append one sample
    pub fn append(&mut self, sample: &TelemetrySample) -> Result<()> {
        self.writer.write_record(sample.to_row())?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    /// Rows appended through this handle
    #[must_use]
    pub fn rows(&self) -> u64 {
        self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::sensors::{Acceleration, Orientation};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn sample(position: Option<GroundPosition>) -> TelemetrySample {
        TelemetrySample {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 20, 12, 0, 8).unwrap(),
            position,
            readings: SensorReadings {
                temperature: 26.4149,
                humidity: 40.996,
                pressure: 1001.2,
                orientation: Orientation { pitch: 1.004, roll: 359.999, yaw: 180.0 },
                acceleration: Acceleration { x: -0.0123, y: 0.5, z: 0.9876 },
            },
        }
    }

    #[test]
    fn test_row_rounding() {
        let row = sample(Some(GroundPosition { latitude: -33.8688, longitude: 151.2093 })).to_row();
        assert_eq!(
            row,
            vec![
                "2024-03-20 12:00:08.000000",
                "-33.87",
                "151.21",
                "26.41",
                "41.00",
                "1001.20",
                "1.00",
                "360.00",
                "180.00",
                "-0.01",
                "0.50",
                "0.99",
            ]
        );
    }

    #[test]
    fn test_row_without_position() {
        let row = sample(None).to_row();
        assert_eq!(row.len(), HEADER.len());
        assert_eq!(row[1], "");
        assert_eq!(row[2], "");
    }

    #[test]
    fn test_header_written_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.csv");

        let mut log = TelemetryLog::open(&path).unwrap();
        log.append(&sample(None)).unwrap();
        drop(log);

        let mut log = TelemetryLog::open(&path).unwrap();
        log.append(&sample(None)).unwrap();
        assert_eq!(log.rows(), 1);
        drop(log);

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.iter().collect::<Vec<_>>(), HEADER.to_vec());
        assert_eq!(reader.records().count(), 2);
    }

    #[test]
    fn test_rows_flushed_immediately() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.csv");

        let mut log = TelemetryLog::open(&path).unwrap();
        log.append(&sample(None)).unwrap();

        // Read while the writer is still open
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.starts_with("Date/time,Latitude,Longitude,"));
    }
}
