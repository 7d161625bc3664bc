//! # Storage Module
//!
//! Image directory layout, the cumulative image budget and the capture manifest.
//!
//! Captures are named after the UTC second they were taken,
//! `images/20240320-120008.jpg` or `images/20240320-120008.h264`.

pub mod budget;
pub mod manifest;

use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::capture::CaptureMode;
use crate::error::Result;

pub use budget::{BudgetOutcome, StorageBudget};
pub use manifest::CaptureManifest;

/// strftime pattern for capture file stems
pub const CAPTURE_NAME_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Path for a capture taken at `timestamp`
#[must_use]
pub fn capture_path(image_dir: &Path, timestamp: DateTime<Utc>, mode: CaptureMode) -> PathBuf {
    image_dir.join(format!(
        "{}.{}",
        timestamp.format(CAPTURE_NAME_FORMAT),
        mode.extension()
    ))
}

/// Create the image directory if it does not exist yet
pub fn ensure_image_dir(image_dir: &Path) -> Result<()> {
    if !image_dir.is_dir() {
        fs::create_dir_all(image_dir)?;
        info!("Created image directory {}", image_dir.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_capture_path_photo() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 20, 9, 5, 7).unwrap();
        let path = capture_path(Path::new("images"), ts, CaptureMode::Photo);
        assert_eq!(path, PathBuf::from("images/20240320-090507.jpg"));
    }

    #[test]
    fn test_capture_path_video() {
        let ts = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
        let path = capture_path(Path::new("/data/images"), ts, CaptureMode::Video);
        assert_eq!(path, PathBuf::from("/data/images/20241231-235959.h264"));
    }

    #[test]
    fn test_ensure_image_dir_creates_and_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let images = dir.path().join("images");

        ensure_image_dir(&images).unwrap();
        assert!(images.is_dir());
        ensure_image_dir(&images).unwrap();
        assert!(images.is_dir());
    }

    #[test]
    fn test_ensure_image_dir_blocked_by_file() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("images");
        fs::write(&blocker, b"not a directory").unwrap();

        assert!(ensure_image_dir(&blocker).is_err());
    }
}
