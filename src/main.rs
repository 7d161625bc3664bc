//! # Orbit Capture
//!
//! Photographs the ground track while the platform is in sunlight and logs cabin
//! telemetry every iteration, for a fixed run duration.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Parse the command line and load the configuration
//!    - Set up logging to stdout and a daily rolling file
//!    - Load orbital elements, open the camera and sensors
//!
//! 2. **Main Loop**
//!    - Run the acquisition loop until the run duration has elapsed
//!    - Ctrl+C requests a stop at the next iteration boundary
//!
//! 3. **Shutdown**
//!    - Release the camera and sensors
//!    - Log the run summary
//!
//! ```bash
//! cargo run --release -- --config config/default.toml
//! ```

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use orbit_capture::acquisition::{AcquisitionLoop, Collaborators};
use orbit_capture::clock::SystemClock;
use orbit_capture::config::{CameraBackend, Config, LoggingConfig, SensorBackend};
use orbit_capture::hardware::{
    Camera, RpicamCamera, SenseHat, SensorPack, SimulatedCamera, SimulatedSensors,
};
use orbit_capture::ephemeris::TleTracker;

/// Elements older than this give visibly wrong positions
const STALE_ELEMENTS_DAYS: i64 = 14;

/// Log file name prefix inside the log directory
const LOG_FILE_PREFIX: &str = "orbit-capture.log";

#[derive(Debug, Parser)]
#[command(name = "orbit-capture", version, about)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    config: PathBuf,
}

/// Install stdout and rolling-file log layers; the guard must outlive the run
fn init_logging(logging: &LoggingConfig) -> Result<WorkerGuard> {
    std::fs::create_dir_all(&logging.log_dir)
        .with_context(|| format!("Failed to create log directory {}", logging.log_dir.display()))?;

    let appender = tracing_appender::rolling::daily(&logging.log_dir, LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .context("Invalid log filter")?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .try_init()
        .context("Failed to install log subscriber")?;

    Ok(guard)
}

fn open_camera(config: &Config) -> Result<Box<dyn Camera>> {
    let camera: Box<dyn Camera> = match config.camera.backend {
        CameraBackend::Rpicam => Box::new(RpicamCamera::open(config.still_resolution())?),
        CameraBackend::Simulated => {
            info!("Using simulated camera");
            Box::new(SimulatedCamera::new(
                config.camera.simulated_photo_bytes,
                config.camera.simulated_video_bytes,
            ))
        }
    };
    Ok(camera)
}

fn open_sensors(config: &Config) -> Result<Box<dyn SensorPack>> {
    let sensors: Box<dyn SensorPack> = match config.sensors.backend {
        SensorBackend::SenseHat => Box::new(SenseHat::open()?),
        SensorBackend::Simulated => {
            info!("Using simulated sensors");
            Box::new(SimulatedSensors::new(config.sensors.seed))
        }
    };
    Ok(sensors)
}

/// Real camera with simulated sensors: the telemetry log would look real but is not
fn telemetry_is_simulated_on_hardware(config: &Config) -> bool {
    config.camera.backend != CameraBackend::Simulated
        && config.sensors.backend == SensorBackend::Simulated
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    let _guard = init_logging(&config.logging)?;

    info!("Orbit Capture v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded from {}", cli.config.display());

    let tracker = TleTracker::load(&config.ephemeris.tle_path)?;
    let age = Utc::now() - tracker.epoch();
    if age.num_days() > STALE_ELEMENTS_DAYS {
        warn!(
            "Orbital elements are {} days old, positions will drift",
            age.num_days()
        );
    }

    if telemetry_is_simulated_on_hardware(&config) {
        warn!("Sensors are simulated while the camera is real; data.csv will hold synthetic readings");
    }

    let rng = match config.video.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let collaborators = Collaborators {
        camera: open_camera(&config)?,
        sensors: open_sensors(&config)?,
        tracker,
        clock: SystemClock,
    };

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, stopping after the current iteration...");
                stop_tx.send_replace(true);
            }
            Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    let mut acquisition =
        AcquisitionLoop::new(config, collaborators, rng)?.with_stop_signal(stop_rx);
    let summary = acquisition.run().await?;

    info!(
        "Captured {} photos and {} videos over {} iterations",
        summary.photos, summary.videos, summary.iterations
    );
    Ok(())
}
