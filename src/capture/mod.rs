//! # Capture Module
//!
//! Capture modes, the record of a finished capture, and the one-shot
//! photo/video selector.

pub mod selector;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

pub use selector::{CaptureModeSelector, VideoLatch};

/// What an illuminated iteration captures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    Photo,
    Video,
}

impl CaptureMode {
    /// File extension for captures in this mode
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            CaptureMode::Photo => "jpg",
            CaptureMode::Video => "h264",
        }
    }
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureMode::Photo => write!(f, "photo"),
            CaptureMode::Video => write!(f, "video"),
        }
    }
}

/// A completed capture
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureRecord {
    pub timestamp: DateTime<Utc>,
    pub file_path: PathBuf,
    pub size_bytes: u64,
    pub is_video: bool,
}
