//! Simulated camera and sensors for bench runs without the flight hardware

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use super::camera::{Camera, ExifTags, Resolution};
use super::sensors::{Acceleration, Orientation, SensorPack};
use crate::error::{OrbitCaptureError, Result};

/// Camera that writes placeholder files of a fixed size
#[derive(Debug)]
pub struct SimulatedCamera {
    photo_bytes: u64,
    video_bytes: u64,
    resolution: Resolution,
    persistent_exif: ExifTags,
    recording: Option<PathBuf>,
}

impl SimulatedCamera {
    pub fn new(photo_bytes: u64, video_bytes: u64) -> Self {
        Self {
            photo_bytes,
            video_bytes,
            resolution: Resolution::new(0, 0),
            persistent_exif: ExifTags::new(),
            recording: None,
        }
    }

    fn write_placeholder(path: &Path, size: u64) -> Result<()> {
        let file = File::create(path)?;
        file.set_len(size)?;
        Ok(())
    }
}

impl Camera for SimulatedCamera {
    fn configure(&mut self, resolution: Resolution, _framerate: u32) -> Result<()> {
        self.resolution = resolution;
        Ok(())
    }

    fn set_exif_tag(&mut self, key: &str, value: &str) -> Result<()> {
        self.persistent_exif.insert(key, value);
        Ok(())
    }

    fn capture_photo(&mut self, path: &Path, quality: u8, exif: &ExifTags) -> Result<()> {
        debug!(
            "Simulated {} photo q{} with {} tags -> {}",
            self.resolution,
            quality,
            exif.len() + self.persistent_exif.len(),
            path.display()
        );
        Self::write_placeholder(path, self.photo_bytes)
    }

    fn start_video(&mut self, path: &Path, _quality: u8, _duration: Duration) -> Result<()> {
        if self.recording.is_some() {
            return Err(OrbitCaptureError::Camera("Recording already in progress".to_string()));
        }
        self.recording = Some(path.to_path_buf());
        Ok(())
    }

    fn stop_video(&mut self) -> Result<()> {
        let path = self
            .recording
            .take()
            .ok_or_else(|| OrbitCaptureError::Camera("No recording in progress".to_string()))?;
        Self::write_placeholder(&path, self.video_bytes)
    }

    fn close(&mut self) -> Result<()> {
        self.recording = None;
        Ok(())
    }
}

/// Sensor package returning cabin-like values with small random noise
#[derive(Debug)]
pub struct SimulatedSensors {
    rng: StdRng,
    yaw: f64,
}

impl SimulatedSensors {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng, yaw: 0.0 }
    }

    fn noisy(&mut self, nominal: f64, spread: f64) -> f64 {
        nominal + self.rng.gen_range(-spread..=spread)
    }
}

impl SensorPack for SimulatedSensors {
    fn temperature(&mut self) -> Result<f64> {
        Ok(self.noisy(26.5, 0.3))
    }

    fn humidity(&mut self) -> Result<f64> {
        Ok(self.noisy(42.0, 1.0))
    }

    fn pressure(&mut self) -> Result<f64> {
        Ok(self.noisy(1002.0, 0.5))
    }

    fn orientation(&mut self) -> Result<Orientation> {
        // Slow tumble around the yaw axis
        self.yaw = (self.yaw + self.rng.gen_range(0.0..2.0)).rem_euclid(360.0);
        Ok(Orientation {
            pitch: self.noisy(0.0, 1.0),
            roll: self.noisy(0.0, 1.0),
            yaw: self.yaw,
        })
    }

    fn accelerometer(&mut self) -> Result<Acceleration> {
        // Free fall: near-zero apparent gravity
        Ok(Acceleration {
            x: self.noisy(0.0, 0.02),
            y: self.noisy(0.0, 0.02),
            z: self.noisy(0.0, 0.02),
        })
    }

    fn clear(&mut self) -> Result<()> {
        Ok(())
    }
}
