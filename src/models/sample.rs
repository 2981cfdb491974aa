// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Telemetry samples recorded during a session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A WGS84 position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl From<Coordinate> for geo::Coord<f64> {
    fn from(c: Coordinate) -> Self {
        geo::Coord { x: c.lon, y: c.lat }
    }
}

/// Raw reading from the location provider, before it becomes a sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationReading {
    pub coordinate: Coordinate,
    pub altitude_m: Option<f64>,
    pub accuracy_m: Option<f64>,
    pub speed_mps: Option<f64>,
    pub bearing_deg: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// One GPS fix accepted into an outdoor session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutdoorSample {
    /// Monotonic per session, starting at 0
    pub seq: u32,
    pub recorded_at: DateTime<Utc>,
    /// Moving seconds since start (pauses excluded)
    pub elapsed_s: f64,
    pub lat: f64,
    pub lon: f64,
    pub altitude_m: Option<f64>,
    pub accuracy_m: Option<f64>,
    pub speed_mps: Option<f64>,
    pub bearing_deg: Option<f64>,
    /// Cumulative distance in meters
    pub distance_m: f64,
    pub is_moving: bool,
}

impl OutdoorSample {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lon)
    }
}

/// One treadmill tick of an indoor session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndoorSample {
    pub seq: u32,
    pub elapsed_s: f64,
    /// Cumulative distance in meters
    pub distance_m: f64,
    pub speed_mps: f64,
    pub pace_s_per_km: Option<f64>,
    pub pace_s_per_mi: Option<f64>,
    pub incline_deg: f64,
    /// Cumulative elevation gain in meters
    pub elevation_gain_m: f64,
}

/// Cumulative position of a session at one instant, the input to split detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub distance_m: f64,
    pub elapsed_s: f64,
}

impl Progress {
    pub const ZERO: Progress = Progress {
        distance_m: 0.0,
        elapsed_s: 0.0,
    };

    pub fn new(distance_m: f64, elapsed_s: f64) -> Self {
        Self {
            distance_m,
            elapsed_s,
        }
    }
}

impl From<&OutdoorSample> for Progress {
    fn from(s: &OutdoorSample) -> Self {
        Progress::new(s.distance_m, s.elapsed_s)
    }
}

impl From<&IndoorSample> for Progress {
    fn from(s: &IndoorSample) -> Self {
        Progress::new(s.distance_m, s.elapsed_s)
    }
}
