//! # Error Types
//!
//! Custom error types for Orbit Capture using `thiserror`.

use thiserror::Error;

/// Main error type for Orbit Capture
#[derive(Debug, Error)]
pub enum OrbitCaptureError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Platform position / illumination errors
    #[error("Ephemeris error: {0}")]
    Ephemeris(String),

    /// Camera errors
    #[error("Camera error: {0}")]
    Camera(String),

    /// Sensor read errors
    #[error("Sensor error: {0}")]
    Sensor(String),

    /// Telemetry CSV log errors
    #[error("Telemetry log error: {0}")]
    TelemetryLog(#[from] csv::Error),

    /// Capture manifest errors
    #[error("Capture manifest error: {0}")]
    Manifest(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl OrbitCaptureError {
    /// Whether this failure only affects the current iteration.
    ///
    /// Hardware reads and per-iteration ephemeris queries are transient: the next
    /// iteration is the natural retry. Filesystem, log and configuration failures
    /// invalidate the run's accounting and are fatal.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            OrbitCaptureError::Camera(_)
                | OrbitCaptureError::Sensor(_)
                | OrbitCaptureError::Ephemeris(_)
        )
    }
}

/// Result type alias for Orbit Capture
pub type Result<T> = std::result::Result<T, OrbitCaptureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hardware_errors_are_transient() {
        assert!(OrbitCaptureError::Camera("busy".to_string()).is_transient());
        assert!(OrbitCaptureError::Sensor("i2c nack".to_string()).is_transient());
        assert!(OrbitCaptureError::Ephemeris("propagation".to_string()).is_transient());
    }

    #[test]
    fn test_filesystem_errors_are_fatal() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        assert!(!OrbitCaptureError::Io(io).is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = OrbitCaptureError::Sensor("humidity read failed".to_string());
        assert_eq!(err.to_string(), "Sensor error: humidity read failed");
    }
}
