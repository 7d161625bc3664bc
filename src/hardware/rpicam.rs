//! # rpicam Camera Driver
//!
//! Drives the Raspberry Pi camera through the `rpicam-still` and `rpicam-vid`
//! command line tools.
//!
//! - Stills run one blocking `rpicam-still` per capture, with a short preview so
//!   auto exposure and white balance settle, and EXIF tags passed as `--exif KEY=VALUE`.
//! - Video starts an `rpicam-vid` child with `--timeout` set to the clip length on
//!   [`Camera::start_video`]. [`Camera::stop_video`] waits for it to exit on its own so
//!   the encoder flushes the tail of the stream; it is only killed after a grace period.
//!
//! `rpicam-vid` has no H.264 quantizer option, so the 1–40 video quality scale
//! (lower is better) is mapped linearly onto a bitrate cap, see [`h264_bitrate`].

use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::camera::{Camera, ExifTags, Resolution};
use crate::error::{OrbitCaptureError, Result};

/// Default still capture tool
pub const STILL_BINARY: &str = "rpicam-still";

/// Default video capture tool
pub const VIDEO_BINARY: &str = "rpicam-vid";

/// Preview time before a still, for AE/AWB convergence
const STILL_SETTLE_MS: u64 = 1000;

/// How long `stop_video` waits for `rpicam-vid` to finish on its own
const VIDEO_EXIT_GRACE: Duration = Duration::from_secs(5);

const VIDEO_EXIT_POLL: Duration = Duration::from_millis(50);

/// Bitrate at the best video quality (1)
const MAX_BITRATE_BPS: u64 = 25_000_000;

/// Worst video quality accepted
const MAX_VIDEO_QUALITY: u64 = 40;

/// Bitrate cap in bits/s for a video quality of 1 (best) to 40 (smallest)
#[must_use]
pub fn h264_bitrate(quality: u8) -> u64 {
    let quality = u64::from(quality).clamp(1, MAX_VIDEO_QUALITY);
    MAX_BITRATE_BPS * (MAX_VIDEO_QUALITY + 1 - quality) / MAX_VIDEO_QUALITY
}

/// Raspberry Pi camera handle
pub struct RpicamCamera {
    still_binary: String,
    video_binary: String,
    resolution: Resolution,
    framerate: u32,
    persistent_exif: ExifTags,
    recording: Option<Child>,
}

impl std::fmt::Debug for RpicamCamera {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpicamCamera")
            .field("resolution", &self.resolution)
            .field("framerate", &self.framerate)
            .field("recording", &self.recording.is_some())
            .finish_non_exhaustive()
    }
}

impl RpicamCamera {
    /// Open the camera using the default tool names
    ///
    /// # Errors
    ///
    /// Returns `Camera` if `rpicam-still` cannot be executed
    pub fn open(resolution: Resolution) -> Result<Self> {
        Self::open_with_binaries(STILL_BINARY, VIDEO_BINARY, resolution)
    }

    /// Open the camera with explicit tool paths
    pub fn open_with_binaries(still: &str, video: &str, resolution: Resolution) -> Result<Self> {
        let status = Command::new(still)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| OrbitCaptureError::Camera(format!("Failed to run {}: {}", still, e)))?;

        if !status.success() {
            return Err(OrbitCaptureError::Camera(format!(
                "{} --version exited with {}",
                still, status
            )));
        }

        info!("Camera ready via {} / {}", still, video);
        Ok(Self {
            still_binary: still.to_string(),
            video_binary: video.to_string(),
            resolution,
            framerate: 30,
            persistent_exif: ExifTags::new(),
            recording: None,
        })
    }

    /// Arguments for one still capture
    fn still_args(&self, path: &Path, quality: u8, exif: &ExifTags) -> Vec<String> {
        let mut args = vec![
            "--nopreview".to_string(),
            "--timeout".to_string(),
            STILL_SETTLE_MS.to_string(),
            "--width".to_string(),
            self.resolution.width.to_string(),
            "--height".to_string(),
            self.resolution.height.to_string(),
            "--quality".to_string(),
            quality.to_string(),
            "--output".to_string(),
            path.display().to_string(),
        ];

        let mut merged = self.persistent_exif.clone();
        for (key, value) in exif.iter() {
            merged.insert(key, value);
        }
        for (key, value) in merged.iter() {
            args.push("--exif".to_string());
            args.push(format!("{}={}", key, value));
        }

        args
    }

    /// Arguments for a recording of `duration`
    fn video_args(&self, path: &Path, quality: u8, duration: Duration) -> Vec<String> {
        vec![
            "--nopreview".to_string(),
            "--timeout".to_string(),
            duration.as_millis().max(1).to_string(),
            "--codec".to_string(),
            "h264".to_string(),
            "--width".to_string(),
            self.resolution.width.to_string(),
            "--height".to_string(),
            self.resolution.height.to_string(),
            "--framerate".to_string(),
            self.framerate.to_string(),
            "--bitrate".to_string(),
            h264_bitrate(quality).to_string(),
            "--output".to_string(),
            path.display().to_string(),
        ]
    }

    /// Wait for the recording child to exit, killing it once the grace period runs out
    fn finish_recording(&mut self, grace: Duration) -> Result<()> {
        let Some(mut child) = self.recording.take() else {
            return Err(OrbitCaptureError::Camera("No recording in progress".to_string()));
        };

        let deadline = Instant::now() + grace;
        loop {
            let exited = child.try_wait().map_err(|e| {
                OrbitCaptureError::Camera(format!("Failed to poll {}: {}", self.video_binary, e))
            })?;
            if let Some(status) = exited {
                if !status.success() {
                    return Err(OrbitCaptureError::Camera(format!(
                        "{} exited with {}",
                        self.video_binary, status
                    )));
                }
                return Ok(());
            }

            if Instant::now() >= deadline {
                warn!(
                    "{} still running {}s after the clip ended, killing it",
                    self.video_binary,
                    grace.as_secs()
                );
                if let Err(e) = child.kill() {
                    debug!("Video process already stopped: {}", e);
                }
                child.wait().map_err(|e| {
                    OrbitCaptureError::Camera(format!("Failed to reap {}: {}", self.video_binary, e))
                })?;
                return Ok(());
            }

            thread::sleep(VIDEO_EXIT_POLL);
        }
    }

    /// Kill any recording in progress
    fn terminate_recording(&mut self) -> Result<()> {
        if let Some(mut child) = self.recording.take() {
            // Already exited is fine; the recording is complete either way
            if let Err(e) = child.kill() {
                debug!("Video process already stopped: {}", e);
            }
            child.wait()?;
        }
        Ok(())
    }
}

impl Camera for RpicamCamera {
    fn configure(&mut self, resolution: Resolution, framerate: u32) -> Result<()> {
        debug!("Camera configured for {} @ {} fps", resolution, framerate);
        self.resolution = resolution;
        self.framerate = framerate;
        Ok(())
    }

    fn set_exif_tag(&mut self, key: &str, value: &str) -> Result<()> {
        self.persistent_exif.insert(key, value);
        Ok(())
    }

    fn capture_photo(&mut self, path: &Path, quality: u8, exif: &ExifTags) -> Result<()> {
        let output = Command::new(&self.still_binary)
            .args(self.still_args(path, quality, exif))
            .stdout(Stdio::null())
            .output()
            .map_err(|e| {
                OrbitCaptureError::Camera(format!("Failed to run {}: {}", self.still_binary, e))
            })?;

        if !output.status.success() {
            return Err(OrbitCaptureError::Camera(format!(
                "{} failed ({}): {}",
                self.still_binary,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    fn start_video(&mut self, path: &Path, quality: u8, duration: Duration) -> Result<()> {
        if self.recording.is_some() {
            return Err(OrbitCaptureError::Camera("Recording already in progress".to_string()));
        }

        let child = Command::new(&self.video_binary)
            .args(self.video_args(path, quality, duration))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                OrbitCaptureError::Camera(format!("Failed to run {}: {}", self.video_binary, e))
            })?;

        self.recording = Some(child);
        Ok(())
    }

    fn stop_video(&mut self) -> Result<()> {
        self.finish_recording(VIDEO_EXIT_GRACE)
    }

    fn close(&mut self) -> Result<()> {
        self.terminate_recording()
    }
}

impl Drop for RpicamCamera {
    fn drop(&mut self) {
        if let Err(e) = self.terminate_recording() {
            warn!("Failed to stop video process on drop: {}", e);
        }
    }
}
