//! # Hardware Module
//!
//! Camera and sensor package seams plus their drivers.
//!
//! This module handles:
//! - The [`Camera`] and [`SensorPack`] traits the acquisition loop is written against
//! - Driving the Raspberry Pi camera through the `rpicam-apps` tools
//! - Reading the Sense HAT through its Industrial I/O drivers
//! - Simulated camera and sensors for bench runs without hardware

pub mod camera;
pub mod rpicam;
pub mod sense_hat;
pub mod sensors;
pub mod sim;

pub use camera::{Camera, ExifTags, Resolution};
pub use rpicam::RpicamCamera;
pub use sense_hat::SenseHat;
pub use sensors::{Acceleration, Orientation, SensorPack, SensorReadings};
pub use sim::{SimulatedCamera, SimulatedSensors};

/// Camera trait object, for backends chosen at runtime
impl<T: Camera + ?Sized> Camera for Box<T> {
    fn configure(&mut self, resolution: Resolution, framerate: u32) -> crate::error::Result<()> {
        (**self).configure(resolution, framerate)
    }

    fn set_exif_tag(&mut self, key: &str, value: &str) -> crate::error::Result<()> {
        (**self).set_exif_tag(key, value)
    }

    fn capture_photo(
        &mut self,
        path: &std::path::Path,
        quality: u8,
        exif: &ExifTags,
    ) -> crate::error::Result<()> {
        (**self).capture_photo(path, quality, exif)
    }

    fn start_video(
        &mut self,
        path: &std::path::Path,
        quality: u8,
        duration: std::time::Duration,
    ) -> crate::error::Result<()> {
        (**self).start_video(path, quality, duration)
    }

    fn stop_video(&mut self) -> crate::error::Result<()> {
        (**self).stop_video()
    }

    fn close(&mut self) -> crate::error::Result<()> {
        (**self).close()
    }
}

/// Sensor trait object, for backends chosen at runtime
impl<T: SensorPack + ?Sized> SensorPack for Box<T> {
    fn temperature(&mut self) -> crate::error::Result<f64> {
        (**self).temperature()
    }

    fn humidity(&mut self) -> crate::error::Result<f64> {
        (**self).humidity()
    }

    fn pressure(&mut self) -> crate::error::Result<f64> {
        (**self).pressure()
    }

    fn orientation(&mut self) -> crate::error::Result<Orientation> {
        (**self).orientation()
    }

    fn accelerometer(&mut self) -> crate::error::Result<Acceleration> {
        (**self).accelerometer()
    }

    fn clear(&mut self) -> crate::error::Result<()> {
        (**self).clear()
    }
}
