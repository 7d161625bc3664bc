//! Trait abstraction for the environmental / orientation sensor package

use crate::error::Result;

/// Orientation in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Orientation {
    pub pitch: f64,
    pub roll: f64,
    pub yaw: f64,
}

/// Raw accelerometer reading in g
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Acceleration {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// One complete read of every sensor channel
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorReadings {
    /// °C
    pub temperature: f64,
    /// %RH
    pub humidity: f64,
    /// hPa
    pub pressure: f64,
    pub orientation: Orientation,
    pub acceleration: Acceleration,
}

/// Sensor service consumed by the acquisition loop
#[cfg_attr(test, mockall::automock)]
pub trait SensorPack {
    fn temperature(&mut self) -> Result<f64>;
    fn humidity(&mut self) -> Result<f64>;
    fn pressure(&mut self) -> Result<f64>;
    fn orientation(&mut self) -> Result<Orientation>;
    fn accelerometer(&mut self) -> Result<Acceleration>;

    /// Reset the attached display
    fn clear(&mut self) -> Result<()>;
}

/// Read every channel in a fixed order; the first failure aborts the read.
pub fn read_all<S: SensorPack + ?Sized>(sensors: &mut S) -> Result<SensorReadings> {
    Ok(SensorReadings {
        temperature: sensors.temperature()?,
        humidity: sensors.humidity()?,
        pressure: sensors.pressure()?,
        orientation: sensors.orientation()?,
        acceleration: sensors.accelerometer()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OrbitCaptureError;

    fn healthy_sensors() -> MockSensorPack {
        let mut sensors = MockSensorPack::new();
        sensors.expect_temperature().returning(|| Ok(26.41));
        sensors.expect_humidity().returning(|| Ok(41.0));
        sensors.expect_pressure().returning(|| Ok(1001.2));
        sensors
            .expect_orientation()
            .returning(|| Ok(Orientation { pitch: 1.0, roll: 2.0, yaw: 3.0 }));
        sensors
            .expect_accelerometer()
            .returning(|| Ok(Acceleration { x: 0.01, y: -0.02, z: 0.99 }));
        sensors
    }

    #[test]
    fn test_read_all() {
        let mut sensors = healthy_sensors();
        let readings = read_all(&mut sensors).unwrap();
        assert_eq!(readings.temperature, 26.41);
        assert_eq!(readings.humidity, 41.0);
        assert_eq!(readings.pressure, 1001.2);
        assert_eq!(readings.orientation.yaw, 3.0);
        assert_eq!(readings.acceleration.z, 0.99);
    }

    #[test]
    fn test_read_all_stops_at_first_failure() {
        let mut sensors = MockSensorPack::new();
        sensors.expect_temperature().returning(|| Ok(20.0));
        sensors
            .expect_humidity()
            .returning(|| Err(OrbitCaptureError::Sensor("humidity timeout".to_string())));
        sensors.expect_pressure().never();
        sensors.expect_orientation().never();
        sensors.expect_accelerometer().never();

        let err = read_all(&mut sensors).unwrap_err();
        assert!(err.is_transient());
    }
}
