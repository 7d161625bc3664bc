//! # Sense HAT Driver
//!
//! Reads the Raspberry Pi Sense HAT through the kernel's Industrial I/O drivers.
//!
//! With the `rpi-sense` overlay loaded, each sensor shows up as a device under
//! `/sys/bus/iio/devices`:
//!
//! | Chip | Channels used |
//! |---|---|
//! | HTS221 | `in_humidityrelative`, `in_temp` |
//! | LPS25H | `in_pressure` |
//! | LSM9DS1 | `in_accel_{x,y,z}`, `in_magn_{x,y,z}` |
//!
//! Devices are matched by the channels they expose rather than by name. A channel
//! value is `<chan>_input` when the driver provides it, otherwise
//! `(<chan>_raw + offset) * scale`, with offset and scale taken from the channel
//! or its shared `<type>_` attribute.
//!
//! Orientation is a tilt-compensated compass solution from the accelerometer and
//! magnetometer, in degrees on `[0, 360)`. The LED matrix framebuffer
//! (`RPi-Sense FB`) is blanked by [`SensorPack::clear`].

use glob::{glob, Pattern};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::sensors::{Acceleration, Orientation, SensorPack};
use crate::error::{OrbitCaptureError, Result};

/// IIO device directory
pub const IIO_ROOT: &str = "/sys/bus/iio/devices";

/// Framebuffer class directory
pub const GRAPHICS_ROOT: &str = "/sys/class/graphics";

/// Device node directory
pub const DEV_ROOT: &str = "/dev";

/// Framebuffer name reported by the Sense HAT LED matrix driver
const FRAMEBUFFER_NAME: &str = "RPi-Sense FB";

/// 8x8 pixels, RGB565
const LED_MATRIX_BYTES: usize = 8 * 8 * 2;

/// m/s^2 per g
const STANDARD_GRAVITY: f64 = 9.80665;

/// Sense HAT handle
#[derive(Debug)]
pub struct SenseHat {
    humidity: PathBuf,
    pressure: PathBuf,
    accel: PathBuf,
    magn: PathBuf,
    framebuffer: Option<PathBuf>,
}

impl SenseHat {
    /// Locate the Sense HAT sensors under the standard sysfs paths
    ///
    /// # Errors
    ///
    /// Returns `Sensor` if any of the four sensor devices is missing
    pub fn open() -> Result<Self> {
        Self::open_at(Path::new(IIO_ROOT), Path::new(GRAPHICS_ROOT), Path::new(DEV_ROOT))
    }

    /// Locate the sensors under explicit sysfs and device roots
    pub fn open_at(iio_root: &Path, graphics_root: &Path, dev_root: &Path) -> Result<Self> {
        let devices = find_devices(iio_root, "iio:device*")?;

        let hat = Self {
            humidity: device_with_channel(&devices, "in_humidityrelative", iio_root)?,
            pressure: device_with_channel(&devices, "in_pressure", iio_root)?,
            accel: device_with_channel(&devices, "in_accel_x", iio_root)?,
            magn: device_with_channel(&devices, "in_magn_x", iio_root)?,
            framebuffer: find_framebuffer(graphics_root, dev_root)?,
        };

        if hat.framebuffer.is_none() {
            warn!("Sense HAT LED matrix framebuffer not found, clear() will do nothing");
        }
        info!(
            "Sense HAT ready: humidity {}, pressure {}, accel {}, magn {}",
            hat.humidity.display(),
            hat.pressure.display(),
            hat.accel.display(),
            hat.magn.display()
        );
        Ok(hat)
    }

    fn acceleration_g(&self) -> Result<Acceleration> {
        Ok(Acceleration {
            x: read_channel(&self.accel, "in_accel_x", "in_accel")? / STANDARD_GRAVITY,
            y: read_channel(&self.accel, "in_accel_y", "in_accel")? / STANDARD_GRAVITY,
            z: read_channel(&self.accel, "in_accel_z", "in_accel")? / STANDARD_GRAVITY,
        })
    }

    fn magnetic_field(&self) -> Result<[f64; 3]> {
        Ok([
            read_channel(&self.magn, "in_magn_x", "in_magn")?,
            read_channel(&self.magn, "in_magn_y", "in_magn")?,
            read_channel(&self.magn, "in_magn_z", "in_magn")?,
        ])
    }
}

impl SensorPack for SenseHat {
    /// HTS221 die temperature, °C
    fn temperature(&mut self) -> Result<f64> {
        Ok(read_channel(&self.humidity, "in_temp", "in_temp")? / 1000.0)
    }

    fn humidity(&mut self) -> Result<f64> {
        // milli-percent
        Ok(read_channel(&self.humidity, "in_humidityrelative", "in_humidityrelative")? / 1000.0)
    }

    fn pressure(&mut self) -> Result<f64> {
        // kPa to hPa
        Ok(read_channel(&self.pressure, "in_pressure", "in_pressure")? * 10.0)
    }

    fn orientation(&mut self) -> Result<Orientation> {
        let accel = self.acceleration_g()?;
        let magn = self.magnetic_field()?;
        Ok(tilt_compensated_orientation(accel, magn))
    }

    fn accelerometer(&mut self) -> Result<Acceleration> {
        self.acceleration_g()
    }

    fn clear(&mut self) -> Result<()> {
        if let Some(framebuffer) = &self.framebuffer {
            fs::write(framebuffer, [0u8; LED_MATRIX_BYTES]).map_err(|e| {
                OrbitCaptureError::Sensor(format!(
                    "Failed to blank {}: {}",
                    framebuffer.display(),
                    e
                ))
            })?;
            debug!("LED matrix cleared");
        }
        Ok(())
    }
}

/// Pitch, roll and heading in degrees from gravity (g) and magnetic field vectors
#[must_use]
pub fn tilt_compensated_orientation(accel: Acceleration, magn: [f64; 3]) -> Orientation {
    let roll = accel.y.atan2(accel.z);
    let pitch = (-accel.x).atan2(accel.y.hypot(accel.z));

    let (sin_roll, cos_roll) = roll.sin_cos();
    let (sin_pitch, cos_pitch) = pitch.sin_cos();
    let [mx, my, mz] = magn;

    let horizontal_x = mx * cos_pitch + my * sin_pitch * sin_roll + mz * sin_pitch * cos_roll;
    let horizontal_y = my * cos_roll - mz * sin_roll;
    let yaw = (-horizontal_y).atan2(horizontal_x);

    Orientation {
        pitch: to_degrees_360(pitch),
        roll: to_degrees_360(roll),
        yaw: to_degrees_360(yaw),
    }
}

fn to_degrees_360(radians: f64) -> f64 {
    let degrees = radians.to_degrees().rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negatives
    if degrees >= 360.0 {
        0.0
    } else {
        degrees
    }
}

/// Directories under `root` matching `pattern`
fn find_devices(root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full = format!("{}/{}", Pattern::escape(&root.to_string_lossy()), pattern);
    let mut devices = Vec::new();

    for entry in glob(&full)
        .map_err(|e| OrbitCaptureError::Sensor(format!("Glob pattern error: {}", e)))?
    {
        match entry {
            Ok(path) => devices.push(path),
            Err(e) => warn!("Error accessing {}: {}", full, e),
        }
    }

    devices.sort();
    Ok(devices)
}

/// First device exposing `channel`
fn device_with_channel(devices: &[PathBuf], channel: &str, root: &Path) -> Result<PathBuf> {
    devices
        .iter()
        .find(|device| {
            device.join(format!("{}_raw", channel)).exists()
                || device.join(format!("{}_input", channel)).exists()
        })
        .cloned()
        .ok_or_else(|| {
            OrbitCaptureError::Sensor(format!(
                "No IIO device under {} exposes {} (is the rpi-sense overlay loaded?)",
                root.display(),
                channel
            ))
        })
}

/// Device node of the LED matrix framebuffer, if present
fn find_framebuffer(graphics_root: &Path, dev_root: &Path) -> Result<Option<PathBuf>> {
    for fb in find_devices(graphics_root, "fb*")? {
        let Some(name) = read_trimmed(&fb.join("name"))? else {
            continue;
        };
        if name == FRAMEBUFFER_NAME {
            if let Some(node) = fb.file_name() {
                return Ok(Some(dev_root.join(node)));
            }
        }
    }
    Ok(None)
}

/// Scaled value of one channel
fn read_channel(device: &Path, channel: &str, channel_type: &str) -> Result<f64> {
    if let Some(value) = read_value(&device.join(format!("{}_input", channel)))? {
        return Ok(value);
    }

    let raw_path = device.join(format!("{}_raw", channel));
    let raw = read_value(&raw_path)?.ok_or_else(|| {
        OrbitCaptureError::Sensor(format!("{} is missing", raw_path.display()))
    })?;
    let offset = read_attribute(device, channel, channel_type, "offset")?.unwrap_or(0.0);
    let scale = read_attribute(device, channel, channel_type, "scale")?.unwrap_or(1.0);

    Ok((raw + offset) * scale)
}

/// Per-channel attribute, falling back to the shared per-type one
fn read_attribute(
    device: &Path,
    channel: &str,
    channel_type: &str,
    attribute: &str,
) -> Result<Option<f64>> {
    if let Some(value) = read_value(&device.join(format!("{}_{}", channel, attribute)))? {
        return Ok(Some(value));
    }
    read_value(&device.join(format!("{}_{}", channel_type, attribute)))
}

fn read_value(path: &Path) -> Result<Option<f64>> {
    let Some(content) = read_trimmed(path)? else {
        return Ok(None);
    };
    content.parse::<f64>().map(Some).map_err(|e| {
        OrbitCaptureError::Sensor(format!("Failed to parse {}: {}", path.display(), e))
    })
}

fn read_trimmed(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content.trim().to_string())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(OrbitCaptureError::Sensor(format!(
            "Failed to read {}: {}",
            path.display(),
            e
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::sensors::read_all;
    use tempfile::TempDir;

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-6, "{} != {}", actual, expected);
    }

    fn write_attrs(dir: &Path, attrs: &[(&str, &str)]) {
        fs::create_dir_all(dir).unwrap();
        for (name, value) in attrs {
            fs::write(dir.join(name), format!("{}\n", value)).unwrap();
        }
    }

    /// Fake sysfs with the four Sense HAT devices and the LED framebuffer
    struct FakeSysfs {
        dir: TempDir,
    }

    impl FakeSysfs {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let iio = dir.path().join("iio");

            write_attrs(
                &iio.join("iio:device0"),
                &[
                    ("name", "hts221"),
                    ("in_humidityrelative_raw", "100"),
                    ("in_humidityrelative_offset", "-20"),
                    ("in_humidityrelative_scale", "500"),
                    ("in_temp_raw", "200"),
                    ("in_temp_offset", "50"),
                    ("in_temp_scale", "100"),
                ],
            );
            write_attrs(
                &iio.join("iio:device1"),
                &[
                    ("name", "lps25h"),
                    ("in_pressure_raw", "40000"),
                    ("in_pressure_scale", "0.0025"),
                ],
            );
            write_attrs(
                &iio.join("iio:device2"),
                &[
                    ("name", "lsm9ds1_accel"),
                    ("in_accel_x_raw", "0"),
                    ("in_accel_y_raw", "0"),
                    ("in_accel_z_raw", "1000"),
                    ("in_accel_scale", "0.00980665"),
                ],
            );
            write_attrs(
                &iio.join("iio:device3"),
                &[
                    ("name", "lsm9ds1_magn"),
                    ("in_magn_x_raw", "1000"),
                    ("in_magn_y_raw", "0"),
                    ("in_magn_z_raw", "0"),
                    ("in_magn_scale", "0.000146"),
                ],
            );

            write_attrs(&dir.path().join("graphics/fb0"), &[("name", "bcm2708_fb")]);
            write_attrs(&dir.path().join("graphics/fb1"), &[("name", FRAMEBUFFER_NAME)]);
            fs::create_dir_all(dir.path().join("dev")).unwrap();
            fs::write(dir.path().join("dev/fb1"), [0xffu8; LED_MATRIX_BYTES]).unwrap();

            Self { dir }
        }

        fn path(&self, sub: &str) -> PathBuf {
            self.dir.path().join(sub)
        }

        fn open(&self) -> Result<SenseHat> {
            SenseHat::open_at(&self.path("iio"), &self.path("graphics"), &self.path("dev"))
        }
    }

    #[test]
    fn test_read_all_converts_units() {
        let sysfs = FakeSysfs::new();
        let mut hat = sysfs.open().unwrap();

        let readings = read_all(&mut hat).unwrap();
        assert_close(readings.temperature, 25.0);
        assert_close(readings.humidity, 40.0);
        assert_close(readings.pressure, 1000.0);
        assert_close(readings.acceleration.x, 0.0);
        assert_close(readings.acceleration.z, 1.0);
        assert_close(readings.orientation.pitch, 0.0);
        assert_close(readings.orientation.roll, 0.0);
        assert_close(readings.orientation.yaw, 0.0);
    }

    #[test]
    fn test_processed_input_preferred_over_raw() {
        let sysfs = FakeSysfs::new();
        write_attrs(&sysfs.path("iio/iio:device1"), &[("in_pressure_input", "101.325")]);

        let mut hat = sysfs.open().unwrap();
        assert_close(hat.pressure().unwrap(), 1013.25);
    }

    #[test]
    fn test_missing_device_fails_open() {
        let sysfs = FakeSysfs::new();
        fs::remove_dir_all(sysfs.path("iio/iio:device1")).unwrap();

        match sysfs.open() {
            Err(OrbitCaptureError::Sensor(msg)) => assert!(msg.contains("in_pressure")),
            other => panic!("Expected Sensor error, got: {:?}", other),
        }
    }

    #[test]
    fn test_unparseable_value_is_sensor_error() {
        let sysfs = FakeSysfs::new();
        let mut hat = sysfs.open().unwrap();
        write_attrs(&sysfs.path("iio/iio:device0"), &[("in_temp_raw", "garbage")]);

        let err = hat.temperature().unwrap_err();
        assert!(matches!(err, OrbitCaptureError::Sensor(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn test_clear_blanks_led_matrix() {
        let sysfs = FakeSysfs::new();
        let mut hat = sysfs.open().unwrap();

        hat.clear().unwrap();
        let pixels = fs::read(sysfs.path("dev/fb1")).unwrap();
        assert_eq!(pixels.len(), LED_MATRIX_BYTES);
        assert!(pixels.iter().all(|b| *b == 0));
    }

    #[test]
    fn test_clear_without_framebuffer_is_ok() {
        let sysfs = FakeSysfs::new();
        fs::remove_dir_all(sysfs.path("graphics/fb1")).unwrap();

        let mut hat = sysfs.open().unwrap();
        assert!(hat.clear().is_ok());
    }

    #[test]
    fn test_orientation_tilt_and_heading() {
        let level = Acceleration { x: 0.0, y: 0.0, z: 1.0 };

        // Field pointing west of the sensor's x axis: heading 90°
        let east = tilt_compensated_orientation(level, [0.0, -1.0, 0.0]);
        assert_close(east.yaw, 90.0);

        // Rolled onto the +y side
        let rolled = tilt_compensated_orientation(Acceleration { x: 0.0, y: 1.0, z: 0.0 }, [1.0, 0.0, 0.0]);
        assert_close(rolled.roll, 90.0);

        // Nose down
        let pitched = tilt_compensated_orientation(Acceleration { x: -1.0, y: 0.0, z: 0.0 }, [0.0, 0.0, 1.0]);
        assert_close(pitched.pitch, 90.0);

        // Negative angles wrap into [0, 360)
        let wrapped = tilt_compensated_orientation(Acceleration { x: 0.0, y: -1.0, z: 0.0 }, [1.0, 0.0, 0.0]);
        assert_close(wrapped.roll, 270.0);
    }

    #[test]
    fn test_orientation_in_free_fall_is_finite() {
        let o = tilt_compensated_orientation(Acceleration::default(), [0.2, 0.1, -0.4]);
        assert!(o.pitch.is_finite() && o.roll.is_finite() && o.yaw.is_finite());
        assert!((0.0..360.0).contains(&o.yaw));
    }

    // Requires a Raspberry Pi with the Sense HAT attached
    #[test]
    #[ignore] // Run with: cargo test -- --ignored
    fn test_read_with_real_hardware() {
        match SenseHat::open() {
            Ok(mut hat) => {
                let readings = read_all(&mut hat).unwrap();
                assert!((0.0..=100.0).contains(&readings.humidity));
                assert!((260.0..=1260.0).contains(&readings.pressure));
                hat.clear().unwrap();
            }
            Err(_) => println!("No Sense HAT detected (this is OK for CI/CD)"),
        }
    }
}
