//! # Geotag Module
//!
//! Converts signed decimal-degree coordinates into the rational
//! degree/minute/second form used by EXIF GPS tags.
//!
//! ## Encoding
//!
//! `98° 34' 58.7"` becomes `"98/1,34/1,587/10"`: whole degrees and minutes over 1,
//! seconds scaled by 10 and rounded so one decimal digit survives as an exact
//! rational. The sign is carried separately and becomes the N/S or E/W reference tag.
//!
//! Rounding of the seconds term is half-away-from-zero. Because the decomposition
//! works on the absolute value, a tie always rounds up (`7.65"` becomes `77/10`).
//! The seconds term is not carried into minutes, so `59.96"` encodes as `600/10`.
//!
//! ## Usage
//!
//! ```
//! use orbit_capture::geotag::encode;
//!
//! let tag = encode(-33.8688);
//! assert!(tag.is_negative);
//! assert_eq!(tag.rational, "33/1,52/1,77/10");
//! ```

use crate::ephemeris::GroundPosition;
use crate::hardware::camera::ExifTags;

/// EXIF key for the latitude rational triple
pub const GPS_LATITUDE: &str = "GPS.GPSLatitude";
/// EXIF key for the latitude hemisphere (N/S)
pub const GPS_LATITUDE_REF: &str = "GPS.GPSLatitudeRef";
/// EXIF key for the longitude rational triple
pub const GPS_LONGITUDE: &str = "GPS.GPSLongitude";
/// EXIF key for the longitude hemisphere (E/W)
pub const GPS_LONGITUDE_REF: &str = "GPS.GPSLongitudeRef";

/// Angle split into sign, whole degrees, whole minutes and fractional seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dms {
    pub negative: bool,
    pub degrees: u32,
    pub minutes: u32,
    pub seconds: f64,
}

impl Dms {
    /// Decompose a signed decimal-degree angle.
    ///
    /// The sign is derived from the value itself; `-0.0` counts as non-negative.
    #[must_use]
    pub fn from_degrees(angle: f64) -> Self {
        let total_arcsec = angle.abs() * 3600.0;
        let degrees = (total_arcsec / 3600.0).floor();
        let remainder = total_arcsec - degrees * 3600.0;
        let minutes = (remainder / 60.0).floor();
        let seconds = remainder - minutes * 60.0;

        Self {
            negative: angle < 0.0,
            degrees: degrees as u32,
            minutes: minutes as u32,
            seconds,
        }
    }
}

/// EXIF representation of one coordinate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoTag {
    /// True when the source angle was negative (south / west)
    pub is_negative: bool,
    /// `"D/1,M/1,S10/10"`
    pub rational: String,
}

/// Encode a signed decimal-degree angle as an EXIF rational triple.
///
/// Any finite angle is accepted; non-finite input is a caller bug.
#[must_use]
pub fn encode(angle: f64) -> GeoTag {
    debug_assert!(angle.is_finite(), "geotag angle must be finite");

    let dms = Dms::from_degrees(angle);
    let tenths = (dms.seconds * 10.0).round() as u32;

    GeoTag {
        is_negative: dms.negative,
        rational: format!("{}/1,{}/1,{}/10", dms.degrees, dms.minutes, tenths),
    }
}

/// Build the four GPS tags for a ground position.
#[must_use]
pub fn gps_tags(position: &GroundPosition) -> ExifTags {
    let latitude = encode(position.latitude);
    let longitude = encode(position.longitude);

    let mut tags = ExifTags::new();
    tags.insert(GPS_LATITUDE, latitude.rational);
    tags.insert(GPS_LATITUDE_REF, if latitude.is_negative { "S" } else { "N" });
    tags.insert(GPS_LONGITUDE, longitude.rational);
    tags.insert(GPS_LONGITUDE_REF, if longitude.is_negative { "W" } else { "E" });
    tags
}
