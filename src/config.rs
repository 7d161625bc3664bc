//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every field has a default, so an empty file describes the standard mission:
//! a 3 hour run at an 8 second cadence with a 2800 MiB image budget.

use serde::de::Error;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{OrbitCaptureError, Result};
use crate::hardware::camera::Resolution;

/// Bytes per MiB
pub const BYTES_PER_MIB: u64 = 1024 * 1024;

/// Longest accepted run (30 days)
pub const MAX_RUN_DURATION_S: u64 = 30 * 24 * 60 * 60;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub mission: MissionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default)]
    pub ephemeris: EphemerisConfig,
    #[serde(default)]
    pub sensors: SensorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// When the platform position is fetched during an iteration
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PositionFix {
    /// Fetch the subpoint every iteration, before the illumination check
    EveryIteration,
    /// Fetch only on illuminated iterations; dark rows reuse the last fix
    IlluminatedOnly,
}

/// Camera driver selection
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CameraBackend {
    Rpicam,
    Simulated,
}

/// Sensor driver selection
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SensorBackend {
    SenseHat,
    Simulated,
}

/// Run duration and pacing
#[derive(Debug, Deserialize, Clone)]
pub struct MissionConfig {
    #[serde(default = "default_run_duration_s")]
    pub run_duration_s: u64,

    #[serde(default = "default_cadence_s")]
    pub cadence_s: u64,

    #[serde(default = "default_isolate_failures")]
    pub isolate_failures: bool,

    #[serde(default = "default_position_fix")]
    pub position_fix: PositionFix,
}

/// Image directory, telemetry log and budget ceiling
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_image_dir")]
    pub image_dir: PathBuf,

    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,

    #[serde(default = "default_manifest_file")]
    pub manifest_file: PathBuf,

    #[serde(default = "default_budget_mib")]
    pub budget_mib: u64,

    #[serde(default = "default_count_existing")]
    pub count_existing: bool,
}

/// Still-photo camera settings
#[derive(Debug, Deserialize, Clone)]
pub struct CameraConfig {
    #[serde(default = "default_camera_backend")]
    pub backend: CameraBackend,

    #[serde(default = "default_still_width")]
    pub still_width: u32,

    #[serde(default = "default_still_height")]
    pub still_height: u32,

    #[serde(default = "default_still_quality")]
    pub still_quality: u8,

    /// Frame rate restored after a video; the HQ sensor tops out at 10 fps at full resolution
    #[serde(default = "default_still_framerate")]
    pub still_framerate: u32,

    /// Static EXIF tags written once at startup
    #[serde(default)]
    pub exif: BTreeMap<String, String>,

    #[serde(default = "default_simulated_photo_bytes")]
    pub simulated_photo_bytes: u64,

    #[serde(default = "default_simulated_video_bytes")]
    pub simulated_video_bytes: u64,
}

/// One-shot video capture settings
#[derive(Debug, Deserialize, Clone)]
pub struct VideoConfig {
    #[serde(default = "default_video_enabled")]
    pub enabled: bool,

    #[serde(default = "default_video_width")]
    pub width: u32,

    #[serde(default = "default_video_height")]
    pub height: u32,

    #[serde(default = "default_video_framerate")]
    pub framerate: u32,

    #[serde(default = "default_video_quality")]
    pub quality: u8,

    #[serde(default = "default_video_duration_s")]
    pub duration_s: u64,

    #[serde(default = "default_trigger_min")]
    pub trigger_min: u32,

    #[serde(default = "default_trigger_max")]
    pub trigger_max: u32,

    #[serde(default = "default_sentinel")]
    pub sentinel: u32,

    #[serde(default)]
    pub seed: Option<u64>,
}

/// Orbit element source
#[derive(Debug, Deserialize, Clone)]
pub struct EphemerisConfig {
    #[serde(default = "default_tle_path")]
    pub tle_path: PathBuf,
}

/// Sensor package settings
#[derive(Debug, Deserialize, Clone)]
pub struct SensorConfig {
    #[serde(default = "default_sensor_backend")]
    pub backend: SensorBackend,

    /// Seed for simulated sensor noise
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Log output settings
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_run_duration_s() -> u64 { 3 * 60 * 60 }
fn default_cadence_s() -> u64 { 8 }
fn default_isolate_failures() -> bool { true }
fn default_position_fix() -> PositionFix { PositionFix::EveryIteration }

fn default_image_dir() -> PathBuf { PathBuf::from("images") }
fn default_data_file() -> PathBuf { PathBuf::from("data.csv") }
fn default_manifest_file() -> PathBuf { PathBuf::from("captures.jsonl") }
fn default_budget_mib() -> u64 { 2800 }
fn default_count_existing() -> bool { true }

fn default_camera_backend() -> CameraBackend { CameraBackend::Rpicam }
fn default_still_width() -> u32 { 4056 }
fn default_still_height() -> u32 { 3040 }
fn default_still_quality() -> u8 { 90 }
fn default_still_framerate() -> u32 { 10 }
fn default_simulated_photo_bytes() -> u64 { 3 * BYTES_PER_MIB }
fn default_simulated_video_bytes() -> u64 { 40 * BYTES_PER_MIB }

fn default_video_enabled() -> bool { true }
fn default_video_width() -> u32 { 1920 }
fn default_video_height() -> u32 { 1080 }
fn default_video_framerate() -> u32 { 30 }
fn default_video_quality() -> u8 { 20 }
fn default_video_duration_s() -> u64 { 60 }
fn default_trigger_min() -> u32 { 1 }
fn default_trigger_max() -> u32 { 20 }
fn default_sentinel() -> u32 { 1 }

fn default_tle_path() -> PathBuf { PathBuf::from("config/iss.tle") }

fn default_sensor_backend() -> SensorBackend { SensorBackend::SenseHat }

fn default_log_dir() -> PathBuf { PathBuf::from("./logs") }
fn default_log_level() -> String { "info".to_string() }

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            run_duration_s: default_run_duration_s(),
            cadence_s: default_cadence_s(),
            isolate_failures: default_isolate_failures(),
            position_fix: default_position_fix(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            image_dir: default_image_dir(),
            data_file: default_data_file(),
            manifest_file: default_manifest_file(),
            budget_mib: default_budget_mib(),
            count_existing: default_count_existing(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            backend: default_camera_backend(),
            still_width: default_still_width(),
            still_height: default_still_height(),
            still_quality: default_still_quality(),
            still_framerate: default_still_framerate(),
            exif: BTreeMap::new(),
            simulated_photo_bytes: default_simulated_photo_bytes(),
            simulated_video_bytes: default_simulated_video_bytes(),
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            enabled: default_video_enabled(),
            width: default_video_width(),
            height: default_video_height(),
            framerate: default_video_framerate(),
            quality: default_video_quality(),
            duration_s: default_video_duration_s(),
            trigger_min: default_trigger_min(),
            trigger_max: default_trigger_max(),
            sentinel: default_sentinel(),
            seed: None,
        }
    }
}

impl Default for EphemerisConfig {
    fn default() -> Self {
        Self { tle_path: default_tle_path() }
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            backend: default_sensor_backend(),
            seed: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            level: default_log_level(),
        }
    }
}

/// Shorthand for a validation failure
fn invalid(msg: impl std::fmt::Display) -> OrbitCaptureError {
    OrbitCaptureError::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails (including negative values for unsigned fields)
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use orbit_capture::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Hard wall-clock limit for the run
    #[must_use]
    pub fn run_duration(&self) -> Duration {
        Duration::from_secs(self.mission.run_duration_s)
    }

    /// Image budget ceiling in bytes
    #[must_use]
    pub fn budget_bytes(&self) -> u64 {
        self.storage.budget_mib.saturating_mul(BYTES_PER_MIB)
    }

    #[must_use]
    pub fn still_resolution(&self) -> Resolution {
        Resolution::new(self.camera.still_width, self.camera.still_height)
    }

    #[must_use]
    pub fn video_resolution(&self) -> Resolution {
        Resolution::new(self.video.width, self.video.height)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        // Mission timing
        if self.mission.run_duration_s == 0 || self.mission.run_duration_s > MAX_RUN_DURATION_S {
            return Err(invalid(format!(
                "run_duration_s must be between 1 and {}",
                MAX_RUN_DURATION_S
            )));
        }

        if self.mission.cadence_s == 0 || self.mission.cadence_s > 3600 {
            return Err(invalid("cadence_s must be between 1 and 3600"));
        }

        // Storage
        if self.storage.image_dir.as_os_str().is_empty() {
            return Err(invalid("image_dir cannot be empty"));
        }

        if self.storage.data_file.as_os_str().is_empty() {
            return Err(invalid("data_file cannot be empty"));
        }

        if self.storage.manifest_file.as_os_str().is_empty() {
            return Err(invalid("manifest_file cannot be empty"));
        }

        if self.storage.budget_mib == 0 {
            return Err(invalid("budget_mib must be greater than 0"));
        }

        // Still camera
        if self.camera.still_width == 0 || self.camera.still_height == 0 {
            return Err(invalid("still resolution must be non-zero"));
        }

        if self.camera.still_quality == 0 || self.camera.still_quality > 100 {
            return Err(invalid("still_quality must be between 1 and 100"));
        }

        if self.camera.still_framerate == 0 || self.camera.still_framerate > 120 {
            return Err(invalid("still_framerate must be between 1 and 120"));
        }

        // Video
        if self.video.width == 0 || self.video.height == 0 {
            return Err(invalid("video resolution must be non-zero"));
        }

        if self.video.framerate == 0 || self.video.framerate > 120 {
            return Err(invalid("video framerate must be between 1 and 120"));
        }

        if self.video.quality == 0 || self.video.quality > 40 {
            return Err(invalid("video quality must be between 1 and 40"));
        }

        if self.video.duration_s == 0 || self.video.duration_s >= self.mission.run_duration_s {
            return Err(invalid("video duration_s must be non-zero and shorter than the run"));
        }

        if self.video.trigger_min > self.video.trigger_max {
            return Err(invalid("trigger_min must not exceed trigger_max"));
        }

        if self.video.sentinel < self.video.trigger_min || self.video.sentinel > self.video.trigger_max {
            return Err(invalid(format!(
                "sentinel {} is outside the trigger range {}..={}",
                self.video.sentinel, self.video.trigger_min, self.video.trigger_max
            )));
        }

        // Ephemeris
        if self.ephemeris.tle_path.as_os_str().is_empty() {
            return Err(invalid("tle_path cannot be empty"));
        }

        // Logging
        if self.logging.log_dir.as_os_str().is_empty() {
            return Err(invalid("log_dir cannot be empty"));
        }

        if self.logging.level.parse::<tracing::Level>().is_err() {
            return Err(invalid(format!("unknown log level '{}'", self.logging.level)));
        }

        Ok(())
    }
}
