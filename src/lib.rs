//! # Orbit Capture Library
//!
//! Sunlight-gated, geotagged imagery and sensor telemetry from an orbiting
//! single-board computer.
//!
//! This library provides the acquisition loop and the pieces it is built from:
//! geotag encoding, the image storage budget, the one-shot video selector, cadence
//! pacing, the TLE-driven platform tracker and the camera and sensor seams.

pub mod acquisition;
pub mod cadence;
pub mod capture;
pub mod clock;
pub mod config;
pub mod error;
pub mod ephemeris;
pub mod geotag;
pub mod hardware;
pub mod storage;
pub mod telemetry;
