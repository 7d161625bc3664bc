//! Frame conversions and the Earth-shadow test
//!
//! Accuracy targets a camera geotag, not precise orbit determination: UT1 is taken
//! as UTC, the inertial frame is treated as the mean equator of date, and the Sun
//! comes from the low-precision almanac series (about 0.01°).

use chrono::{DateTime, Utc};

use super::GroundPosition;

/// WGS-84 equatorial radius in km
pub const WGS84_A: f64 = 6378.137;

/// WGS-84 first eccentricity squared
pub const WGS84_E2: f64 = 6.694_379_990_141_316e-3;

/// Julian date of the J2000.0 epoch
pub const J2000_JD: f64 = 2_451_545.0;

/// Julian date of the Unix epoch
const UNIX_EPOCH_JD: f64 = 2_440_587.5;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Julian date for a UTC instant
#[must_use]
pub fn julian_date(time: DateTime<Utc>) -> f64 {
    let seconds = time.timestamp() as f64 + f64::from(time.timestamp_subsec_nanos()) * 1e-9;
    UNIX_EPOCH_JD + seconds / SECONDS_PER_DAY
}

/// Greenwich mean sidereal time in radians, `[0, 2π)`
#[must_use]
pub fn gmst(time: DateTime<Utc>) -> f64 {
    let days = julian_date(time) - J2000_JD;
    let degrees = 280.460_618_37 + 360.985_647_366_29 * days;
    degrees.rem_euclid(360.0).to_radians()
}

/// Rotate an inertial (TEME) vector into the Earth-fixed frame
#[must_use]
pub fn inertial_to_earth_fixed(position: [f64; 3], gmst: f64) -> [f64; 3] {
    let (sin, cos) = gmst.sin_cos();
    [
        cos * position[0] + sin * position[1],
        -sin * position[0] + cos * position[1],
        position[2],
    ]
}

/// WGS-84 geodetic latitude/longitude of an Earth-fixed vector in km
#[must_use]
pub fn earth_fixed_to_geodetic(ecef: [f64; 3]) -> GroundPosition {
    let [x, y, z] = ecef;
    let longitude = y.atan2(x);
    let p = x.hypot(y);

    // Fixed-point iteration converges to sub-millimetre in a handful of steps
    let mut latitude = z.atan2(p * (1.0 - WGS84_E2));
    for _ in 0..5 {
        let sin_lat = latitude.sin();
        let n = WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
        latitude = (z + WGS84_E2 * n * sin_lat).atan2(p);
    }

    GroundPosition {
        latitude: latitude.to_degrees(),
        longitude: longitude.to_degrees(),
    }
}

/// Unit vector towards the Sun in the inertial frame
#[must_use]
pub fn sun_direction(time: DateTime<Utc>) -> [f64; 3] {
    let n = julian_date(time) - J2000_JD;
    let mean_longitude = (280.460 + 0.985_647_4 * n).rem_euclid(360.0);
    let mean_anomaly = (357.528 + 0.985_600_3 * n).rem_euclid(360.0).to_radians();
    let ecliptic_longitude = (mean_longitude
        + 1.915 * mean_anomaly.sin()
        + 0.020 * (2.0 * mean_anomaly).sin())
    .to_radians();
    let obliquity = (23.439 - 0.000_000_4 * n).to_radians();

    [
        ecliptic_longitude.cos(),
        obliquity.cos() * ecliptic_longitude.sin(),
        obliquity.sin() * ecliptic_longitude.sin(),
    ]
}

/// Cylindrical Earth-shadow test for an inertial position in km
#[must_use]
pub fn is_sunlit(position: [f64; 3], sun: [f64; 3]) -> bool {
    let along_sun = dot(position, sun);
    if along_sun >= 0.0 {
        return true;
    }

    let perpendicular = [
        position[0] - along_sun * sun[0],
        position[1] - along_sun * sun[1],
        position[2] - along_sun * sun[2],
    ];
    dot(perpendicular, perpendicular).sqrt() > WGS84_A
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_julian_date_j2000() {
        let j2000 = Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap();
        assert!((julian_date(j2000) - J2000_JD).abs() < 1e-9);
    }

    #[test]
    fn test_gmst_at_j2000() {
        let j2000 = Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap();
        assert!((gmst(j2000).to_degrees() - 280.460_618_37).abs() < 1e-6);
    }

    #[test]
    fn test_gmst_in_range() {
        let mut time = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        for _ in 0..100 {
            let angle = gmst(time);
            assert!((0.0..std::f64::consts::TAU).contains(&angle));
            time += chrono::Duration::minutes(37);
        }
    }

    #[test]
    fn test_rotation_preserves_length() {
        let v = [6000.0, -2500.0, 1200.0];
        let r = inertial_to_earth_fixed(v, 1.234);
        assert!((dot(v, v) - dot(r, r)).abs() < 1e-6);
        assert_eq!(r[2], v[2]);
    }

    #[test]
    fn test_geodetic_equator() {
        let p = earth_fixed_to_geodetic([WGS84_A + 400.0, 0.0, 0.0]);
        assert!(p.latitude.abs() < 1e-9);
        assert!(p.longitude.abs() < 1e-9);

        let p = earth_fixed_to_geodetic([0.0, -(WGS84_A + 400.0), 0.0]);
        assert!((p.longitude + 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_geodetic_pole() {
        let p = earth_fixed_to_geodetic([1e-9, 0.0, 6800.0]);
        assert!((p.latitude - 90.0).abs() < 1e-6);
    }

    #[test]
    fn test_geodetic_latitude_exceeds_geocentric() {
        // At 45° geocentric, the ellipsoid normal is steeper
        let r = 6800.0 / std::f64::consts::SQRT_2;
        let p = earth_fixed_to_geodetic([r, 0.0, r]);
        assert!(p.latitude > 45.0 && p.latitude < 45.3, "{}", p.latitude);
    }

    #[test]
    fn test_sun_direction_at_march_equinox() {
        // Ecliptic longitude ~0° at the 2024 March equinox (03:06 UTC)
        let equinox = Utc.with_ymd_and_hms(2024, 3, 20, 3, 6, 0).unwrap();
        let sun = sun_direction(equinox);
        assert!((sun[0] - 1.0).abs() < 1e-3, "{:?}", sun);
        assert!(sun[1].abs() < 0.02 && sun[2].abs() < 0.02, "{:?}", sun);
    }

    #[test]
    fn test_sun_direction_is_unit() {
        let sun = sun_direction(Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap());
        assert!((dot(sun, sun) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_sunlit_on_day_side() {
        let sun = [1.0, 0.0, 0.0];
        assert!(is_sunlit([6800.0, 0.0, 0.0], sun));
        assert!(is_sunlit([0.0, 6800.0, 0.0], sun));
    }

    #[test]
    fn test_dark_behind_earth() {
        let sun = [1.0, 0.0, 0.0];
        assert!(!is_sunlit([-6800.0, 0.0, 0.0], sun));
        assert!(!is_sunlit([-6800.0, 3000.0, 0.0], sun));
    }

    #[test]
    fn test_sunlit_beyond_shadow_cylinder() {
        let sun = [1.0, 0.0, 0.0];
        assert!(is_sunlit([-3000.0, 6500.0, 0.0], sun));
    }
}
