//! Trait abstraction for camera operations to enable testing

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::error::Result;

/// Sensor readout resolution in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// EXIF tag set keyed by `IFD.TagName` (e.g. `GPS.GPSLatitude`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExifTags(BTreeMap<String, String>);

impl ExifTags {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Camera service consumed by the acquisition loop.
///
/// Calls block until the hardware has finished; the loop owns the handle
/// exclusively for the whole run.
pub trait Camera {
    /// Set the readout resolution and frame rate for subsequent captures
    fn configure(&mut self, resolution: Resolution, framerate: u32) -> Result<()>;

    /// Set a tag that is written into every subsequent photo
    fn set_exif_tag(&mut self, key: &str, value: &str) -> Result<()>;

    /// Capture a JPEG still to `path`, merging `exif` over the persistent tags
    fn capture_photo(&mut self, path: &Path, quality: u8, exif: &ExifTags) -> Result<()>;

    /// Begin recording `duration` of H.264 video to `path`
    fn start_video(&mut self, path: &Path, quality: u8, duration: Duration) -> Result<()>;

    /// Wait for the recording started by [`Camera::start_video`] to be finalized
    fn stop_video(&mut self) -> Result<()>;

    /// Release the device
    fn close(&mut self) -> Result<()>;
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use crate::clock::mocks::FakeClock;
    use crate::error::OrbitCaptureError;
    use std::fs::File;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    /// Camera operations observed by [`MockCamera`]
    #[derive(Debug, Clone, PartialEq)]
    pub enum CameraCall {
        Configure(Resolution, u32),
        SetExifTag(String, String),
        CapturePhoto(PathBuf, u8, ExifTags),
        StartVideo(PathBuf, u8, Duration),
        StopVideo,
        Close,
    }

    /// What a successful photo leaves at the capture path
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum PhotoOutput {
        /// Sparse file of `photo_bytes`
        File,
        /// Nothing, as if the driver lost the file
        Missing,
        /// A non-empty directory, which `remove_file` cannot delete
        Undeletable,
    }

    /// Mock camera that writes sparse files of a fixed size
    #[derive(Clone)]
    pub struct MockCamera {
        pub calls: Arc<Mutex<Vec<CameraCall>>>,
        pub photo_bytes: u64,
        pub video_bytes: u64,
        pub capture_error: Arc<Mutex<Option<String>>>,
        pub photo_output: Arc<Mutex<PhotoOutput>>,
        /// Optional clock advanced by `capture_latency` on every photo
        pub clock: Option<FakeClock>,
        pub capture_latency: Duration,
        recording: Arc<Mutex<Option<PathBuf>>>,
    }

    impl MockCamera {
        pub fn new(photo_bytes: u64, video_bytes: u64) -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                photo_bytes,
                video_bytes,
                capture_error: Arc::new(Mutex::new(None)),
                photo_output: Arc::new(Mutex::new(PhotoOutput::File)),
                clock: None,
                capture_latency: Duration::ZERO,
                recording: Arc::new(Mutex::new(None)),
            }
        }

        pub fn with_latency(mut self, clock: FakeClock, latency: Duration) -> Self {
            self.clock = Some(clock);
            self.capture_latency = latency;
            self
        }

        pub fn get_calls(&self) -> Vec<CameraCall> {
            self.calls.lock().unwrap().clone()
        }

        pub fn set_capture_error(&self, message: &str) {
            *self.capture_error.lock().unwrap() = Some(message.to_string());
        }

        pub fn set_photo_output(&self, output: PhotoOutput) {
            *self.photo_output.lock().unwrap() = output;
        }

        fn write_sparse(path: &Path, size: u64) -> Result<()> {
            let file = File::create(path)?;
            file.set_len(size)?;
            Ok(())
        }

        fn fail_if_requested(&self) -> Result<()> {
            if let Some(message) = self.capture_error.lock().unwrap().clone() {
                return Err(OrbitCaptureError::Camera(message));
            }
            Ok(())
        }
    }

    impl Camera for MockCamera {
        fn configure(&mut self, resolution: Resolution, framerate: u32) -> Result<()> {
            self.calls.lock().unwrap().push(CameraCall::Configure(resolution, framerate));
            Ok(())
        }

        fn set_exif_tag(&mut self, key: &str, value: &str) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(CameraCall::SetExifTag(key.to_string(), value.to_string()));
            Ok(())
        }

        fn capture_photo(&mut self, path: &Path, quality: u8, exif: &ExifTags) -> Result<()> {
            self.calls.lock().unwrap().push(CameraCall::CapturePhoto(
                path.to_path_buf(),
                quality,
                exif.clone(),
            ));
            if let Some(clock) = &self.clock {
                clock.advance(self.capture_latency);
            }
            self.fail_if_requested()?;

            let output = *self.photo_output.lock().unwrap();
            match output {
                PhotoOutput::File => Self::write_sparse(path, self.photo_bytes),
                PhotoOutput::Missing => Ok(()),
                PhotoOutput::Undeletable => {
                    std::fs::create_dir_all(path)?;
                    Self::write_sparse(&path.join("frame.raw"), self.photo_bytes)
                }
            }
        }

        fn start_video(&mut self, path: &Path, quality: u8, duration: Duration) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(CameraCall::StartVideo(path.to_path_buf(), quality, duration));
            self.fail_if_requested()?;
            *self.recording.lock().unwrap() = Some(path.to_path_buf());
            Ok(())
        }

        fn stop_video(&mut self) -> Result<()> {
            self.calls.lock().unwrap().push(CameraCall::StopVideo);
            if let Some(path) = self.recording.lock().unwrap().take() {
                Self::write_sparse(&path, self.video_bytes)?;
            }
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            self.calls.lock().unwrap().push(CameraCall::Close);
            Ok(())
        }
    }
}
