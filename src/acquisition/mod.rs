//! # Acquisition Loop
//!
//! The time-boxed control loop that ties everything together.
//!
//! ## Iteration
//!
//! ```text
//! Idle -> Querying -> Illuminated | Dark -> Telemetry -> Pacing -> Idle ... -> Terminated
//! ```
//!
//! 1. **Idle**: stop at the top of the iteration once the run deadline has passed
//!    (or a stop was requested). The deadline never interrupts a capture.
//! 2. **Querying**: platform position and illumination for the current time.
//! 3. **Illuminated**: geotag, choose photo or the one-shot video, capture, count the
//!    file against the budget and roll it back if the ceiling is exceeded.
//! 4. **Dark**: nothing is captured.
//! 5. **Telemetry**: always read the sensors and append one CSV row.
//! 6. **Pacing**: sleep toward the target cadence.
//!
//! ## Failures
//!
//! With `isolate_failures` on, transient camera, sensor and ephemeris failures are
//! logged and skip only the affected step. Filesystem and log write failures end
//! the run. With it off, any failure ends the run. The camera and sensor handles
//! are released on every exit path.

use chrono::{DateTime, Utc};
use rand::Rng;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::cadence::CadenceController;
use crate::capture::{CaptureMode, CaptureModeSelector, CaptureRecord};
use crate::clock::Clock;
use crate::config::{Config, PositionFix, BYTES_PER_MIB};
use crate::ephemeris::{GroundPosition, PlatformTracker};
use crate::error::{OrbitCaptureError, Result};
use crate::geotag;
use crate::hardware::camera::Camera;
use crate::hardware::sensors::{read_all, SensorPack};
use crate::storage::{self, BudgetOutcome, CaptureManifest, StorageBudget};
use crate::telemetry::{TelemetryLog, TelemetrySample};

/// Where the loop is within an iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    Idle,
    Querying,
    Illuminated,
    Dark,
    Telemetry,
    Pacing,
    Terminated,
}

/// Counters reported at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub iterations: u64,
    pub illuminated: u64,
    pub dark: u64,
    pub photos: u64,
    pub videos: u64,
    pub rolled_back: u64,
    pub isolated_failures: u64,
    pub telemetry_rows: u64,
    pub retained_bytes: u64,
}

/// Mutable state owned by the loop for one run
#[derive(Debug)]
pub struct RunState<R: Rng> {
    pub phase: LoopPhase,
    pub start_time: DateTime<Utc>,
    pub previous_iteration_time: DateTime<Utc>,
    /// Last successful subpoint
    pub last_position: Option<GroundPosition>,
    pub budget: StorageBudget,
    pub selector: CaptureModeSelector<R>,
    pub summary: RunSummary,
}

/// External services the loop drives
pub struct Collaborators<C, S, T, K> {
    pub camera: C,
    pub sensors: S,
    pub tracker: T,
    pub clock: K,
}

/// Sunlight-gated capture and telemetry loop
pub struct AcquisitionLoop<C, S, T, K, R: Rng> {
    config: Config,
    run_limit: chrono::Duration,
    cadence: CadenceController,
    camera: C,
    sensors: S,
    tracker: T,
    clock: K,
    telemetry: TelemetryLog,
    manifest: CaptureManifest,
    stop: Option<watch::Receiver<bool>>,
    state: RunState<R>,
}

impl<C, S, T, K, R> AcquisitionLoop<C, S, T, K, R>
where
    C: Camera,
    S: SensorPack,
    T: PlatformTracker,
    K: Clock,
    R: Rng,
{
    /// Prepare the image directory, budget, telemetry log and manifest
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or any output file or the
    /// image directory cannot be created.
    pub fn new(config: Config, collaborators: Collaborators<C, S, T, K>, rng: R) -> Result<Self> {
        config.validate()?;

        let run_limit = chrono::Duration::from_std(config.run_duration()).map_err(|e| {
            OrbitCaptureError::Config(serde::de::Error::custom(format!(
                "run_duration_s out of range: {}",
                e
            )))
        })?;

        storage::ensure_image_dir(&config.storage.image_dir)?;

        let budget = if config.storage.count_existing {
            StorageBudget::from_existing(config.budget_bytes(), &config.storage.image_dir)?
        } else {
            StorageBudget::new(config.budget_bytes())
        };

        let telemetry = TelemetryLog::open(&config.storage.data_file)?;
        let manifest = CaptureManifest::open(&config.storage.manifest_file)?;

        let selector = CaptureModeSelector::new(
            config.video.trigger_min..=config.video.trigger_max,
            config.video.sentinel,
            rng,
        );

        let Collaborators { camera, sensors, tracker, clock } = collaborators;
        let now = clock.now();

        Ok(Self {
            cadence: CadenceController::new(config.mission.cadence_s),
            run_limit,
            camera,
            sensors,
            tracker,
            clock,
            telemetry,
            manifest,
            stop: None,
            state: RunState {
                phase: LoopPhase::Idle,
                start_time: now,
                previous_iteration_time: now,
                last_position: None,
                budget,
                selector,
                summary: RunSummary::default(),
            },
            config,
        })
    }

    /// Honor stop requests from `stop` at iteration boundaries
    #[must_use]
    pub fn with_stop_signal(mut self, stop: watch::Receiver<bool>) -> Self {
        self.stop = Some(stop);
        self
    }

    #[must_use]
    pub fn state(&self) -> &RunState<R> {
        &self.state
    }

    /// Run until the deadline, then release the hardware
    ///
    /// # Errors
    ///
    /// Returns the first fatal failure. The camera and sensors are released
    /// before returning either way.
    pub async fn run(&mut self) -> Result<RunSummary> {
        let result = self.run_until_deadline().await;
        self.release();
        self.state.phase = LoopPhase::Terminated;
        self.state.summary.retained_bytes = self.state.budget.consumed_bytes();
        self.state.summary.telemetry_rows = self.telemetry.rows();

        result?;
        let summary = self.state.summary.clone();
        info!(
            "Run complete: {} iterations ({} sunlit, {} dark), {} photos, {} videos, {} rolled back, {} isolated failures, {:.2} MiB retained",
            summary.iterations,
            summary.illuminated,
            summary.dark,
            summary.photos,
            summary.videos,
            summary.rolled_back,
            summary.isolated_failures,
            mib(summary.retained_bytes)
        );
        Ok(summary)
    }

    async fn run_until_deadline(&mut self) -> Result<()> {
        self.prepare_camera()?;

        let start = self.clock.now();
        self.state.start_time = start;
        self.state.previous_iteration_time = start;
        info!(
            "Starting acquisition: {}s run, {}s cadence, {:.2} of {:.2} MiB budget used",
            self.config.mission.run_duration_s,
            self.config.mission.cadence_s,
            mib(self.state.budget.consumed_bytes()),
            mib(self.state.budget.ceiling_bytes())
        );

        loop {
            self.enter(LoopPhase::Idle);
            let now = self.clock.now();

            if now - self.state.start_time >= self.run_limit {
                info!("Run duration reached");
                break;
            }
            if self.stop_requested() {
                info!("Stop requested, ending run");
                break;
            }

            self.state.summary.iterations += 1;
            self.run_iteration(now).await?;

            if self.pace().await {
                info!("Stop requested, ending run");
                break;
            }
        }

        Ok(())
    }

    /// Still resolution and static EXIF tags
    fn prepare_camera(&mut self) -> Result<()> {
        self.camera
            .configure(self.config.still_resolution(), self.config.camera.still_framerate)?;
        for (key, value) in &self.config.camera.exif {
            self.camera.set_exif_tag(key, value)?;
        }
        Ok(())
    }

    /// One pass through query, capture, telemetry
    async fn run_iteration(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.enter(LoopPhase::Querying);

        let mut fresh_position = None;
        if self.config.mission.position_fix == PositionFix::EveryIteration {
            fresh_position = self.query_position(now)?;
        }

        let illumination = self.tracker.is_illuminated(now);
        let illuminated = self.isolate("Illumination query", illumination)?;

        match illuminated {
            Some(true) => {
                self.enter(LoopPhase::Illuminated);
                self.state.summary.illuminated += 1;
                info!("In sunlight");

                if self.config.mission.position_fix == PositionFix::IlluminatedOnly {
                    fresh_position = self.query_position(now)?;
                }

                match fresh_position {
                    Some(position) => self.capture(now, &position).await?,
                    None => warn!("No position fix, skipping capture"),
                }
            }
            Some(false) => {
                self.enter(LoopPhase::Dark);
                self.state.summary.dark += 1;
                info!("In darkness");
            }
            None => {}
        }

        let row_position = match self.config.mission.position_fix {
            PositionFix::EveryIteration => fresh_position,
            PositionFix::IlluminatedOnly => self.state.last_position,
        };
        self.record_telemetry(row_position)
    }

    fn query_position(&mut self, now: DateTime<Utc>) -> Result<Option<GroundPosition>> {
        let position = self.tracker.position_at(now);
        let position = self.isolate("Position query", position)?;
        if position.is_some() {
            self.state.last_position = position;
        }
        Ok(position)
    }

    /// Capture, count and (if over budget) roll back one photo or video
    async fn capture(&mut self, now: DateTime<Utc>, position: &GroundPosition) -> Result<()> {
        let tags = geotag::gps_tags(position);
        let mode = if self.config.video.enabled {
            self.state.selector.select_mode()
        } else {
            CaptureMode::Photo
        };
        let path = storage::capture_path(&self.config.storage.image_dir, now, mode);

        let captured = match mode {
            CaptureMode::Photo => {
                self.camera
                    .capture_photo(&path, self.config.camera.still_quality, &tags)
            }
            CaptureMode::Video => self.record_video(&path).await,
        };
        if self.isolate("Capture", captured)?.is_none() {
            discard_partial(&path);
            return Ok(());
        }

        let size = self.state.budget.record(&path)?;
        info!(
            "{} ({:.2} MiB), total {:.2} MiB",
            path.display(),
            mib(size),
            mib(self.state.budget.consumed_bytes())
        );

        let outcome = match self.state.budget.enforce(&path, size) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Failed to delete {} on rollback: {}", path.display(), e);
                BudgetOutcome::RolledBack
            }
        };

        let retained = outcome == BudgetOutcome::Retained;
        if retained {
            match mode {
                CaptureMode::Photo => self.state.summary.photos += 1,
                CaptureMode::Video => self.state.summary.videos += 1,
            }
        } else {
            self.state.summary.rolled_back += 1;
            warn!(
                "Budget of {:.2} MiB exceeded, removed {}",
                mib(self.state.budget.ceiling_bytes()),
                path.display()
            );
        }

        let record = CaptureRecord {
            timestamp: now,
            file_path: path,
            size_bytes: size,
            is_video: mode == CaptureMode::Video,
        };
        self.manifest.append(&record, retained)
    }

    /// Reconfigure for video, record for the fixed duration, restore stills.
    ///
    /// The recording window is never cut short, not by the deadline nor by a
    /// stop request.
    async fn record_video(&mut self, path: &Path) -> Result<()> {
        self.camera
            .configure(self.config.video_resolution(), self.config.video.framerate)?;

        let recorded = self.record_clip(path).await;

        let restored = self
            .camera
            .configure(self.config.still_resolution(), self.config.camera.still_framerate);

        match (recorded, restored) {
            (Err(e), Err(restore)) => {
                warn!("Failed to restore still configuration: {}", restore);
                Err(e)
            }
            (recorded, restored) => recorded.and(restored),
        }
    }

    async fn record_clip(&mut self, path: &Path) -> Result<()> {
        let duration = Duration::from_secs(self.config.video.duration_s);
        info!("Recording {}s video to {}", duration.as_secs(), path.display());

        self.camera
            .start_video(path, self.config.video.quality, duration)?;
        self.clock.sleep(duration).await;
        self.camera.stop_video()
    }

    fn record_telemetry(&mut self, position: Option<GroundPosition>) -> Result<()> {
        self.enter(LoopPhase::Telemetry);

        let readings = read_all(&mut self.sensors);
        let Some(readings) = self.isolate("Sensor read", readings)? else {
            return Ok(());
        };

        let sample = TelemetrySample {
            timestamp: self.clock.now(),
            position,
            readings,
        };
        self.telemetry.append(&sample)?;

        debug!(
            "temperature = {:.2} humidity = {:.2} pressure = {:.2} pitch = {:.2} roll = {:.2} yaw = {:.2} x = {:.2} y = {:.2} z = {:.2}",
            readings.temperature,
            readings.humidity,
            readings.pressure,
            readings.orientation.pitch,
            readings.orientation.roll,
            readings.orientation.yaw,
            readings.acceleration.x,
            readings.acceleration.y,
            readings.acceleration.z
        );
        Ok(())
    }

    /// Sleep toward the cadence; returns true if a stop arrived meanwhile
    async fn pace(&mut self) -> bool {
        self.enter(LoopPhase::Pacing);

        let sleep = self
            .cadence
            .compute_sleep(self.clock.now(), self.state.previous_iteration_time);
        debug!("Sleeping {}s", sleep.as_secs());

        let stopped = match self.stop.as_mut() {
            Some(stop) => {
                tokio::select! {
                    _ = self.clock.sleep(sleep) => false,
                    _ = wait_for_stop(stop) => true,
                }
            }
            None => {
                self.clock.sleep(sleep).await;
                false
            }
        };

        self.state.previous_iteration_time = self.clock.now();
        stopped
    }

    fn stop_requested(&self) -> bool {
        self.stop.as_ref().is_some_and(|stop| *stop.borrow())
    }

    /// Apply the failure policy to one step's result
    fn isolate<V>(&mut self, step: &str, result: Result<V>) -> Result<Option<V>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if self.config.mission.isolate_failures && e.is_transient() => {
                warn!("{} failed, skipping for this iteration: {}", step, e);
                self.state.summary.isolated_failures += 1;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn enter(&mut self, phase: LoopPhase) {
        self.state.phase = phase;
    }

    fn release(&mut self) {
        if let Err(e) = self.camera.close() {
            warn!("Failed to close camera: {}", e);
        }
        if let Err(e) = self.sensors.clear() {
            warn!("Failed to clear sensor display: {}", e);
        }
    }
}

/// Resolve once the stop flag is set; never resolves if the sender is gone
async fn wait_for_stop(stop: &mut watch::Receiver<bool>) {
    loop {
        if *stop.borrow_and_update() {
            return;
        }
        if stop.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Remove whatever a failed capture left behind
fn discard_partial(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            warn!("Failed to remove partial capture {}: {}", path.display(), e);
        }
    }
}

fn mib(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MIB as f64
}
