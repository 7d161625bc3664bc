//! # Capture Mode Selector
//!
//! Swaps exactly one still photo per run for a video clip, at a random point.
//!
//! Each illuminated iteration draws a uniform integer from the trigger range.
//! While the latch is armed, a draw equal to the sentinel selects video and fires
//! the latch; once fired it never re-arms, so later matching draws stay photos.
//! With the default range `1..=20` and sentinel `1`, the chance that a run of
//! `K` illuminated iterations records no video is `(19/20)^K`.

use rand::Rng;
use std::ops::RangeInclusive;
use tracing::info;

use super::CaptureMode;

/// One-shot video latch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoLatch {
    NotYetTriggered,
    Triggered,
}

/// Randomized one-shot photo/video decision
#[derive(Debug)]
pub struct CaptureModeSelector<R: Rng> {
    range: RangeInclusive<u32>,
    sentinel: u32,
    latch: VideoLatch,
    rng: R,
}

impl<R: Rng> CaptureModeSelector<R> {
    /// Create an armed selector.
    ///
    /// The RNG is owned for the whole run and never re-seeded.
    pub fn new(range: RangeInclusive<u32>, sentinel: u32, rng: R) -> Self {
        debug_assert!(range.contains(&sentinel), "sentinel must lie in the trigger range");
        Self {
            range,
            sentinel,
            latch: VideoLatch::NotYetTriggered,
            rng,
        }
    }

    #[must_use]
    pub fn latch(&self) -> VideoLatch {
        self.latch
    }

    /// Draw once and decide this iteration's capture mode
    pub fn select_mode(&mut self) -> CaptureMode {
        let draw = self.rng.gen_range(self.range.clone());

        if self.latch == VideoLatch::NotYetTriggered && draw == self.sentinel {
            self.latch = VideoLatch::Triggered;
            info!("Video trigger drawn ({}), switching to video for this iteration", draw);
            return CaptureMode::Video;
        }

        CaptureMode::Photo
    }
}
