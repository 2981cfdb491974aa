// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Distance, pace and display formatting helpers.

use crate::models::{Coordinate, DistanceUnit};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// At or below this speed pace is undefined (standing still or GPS jitter).
pub const MIN_PACE_SPEED_MPS: f64 = 0.3;

pub const METERS_PER_MILE: f64 = 1609.344;

const UNKNOWN_CLOCK: &str = "--:--";
const UNKNOWN_DISTANCE: &str = "—";

/// Great-circle distance in meters (haversine).
pub fn distance(a: Coordinate, b: Coordinate) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let d_phi = (b.lat - a.lat).to_radians();
    let d_lambda = (b.lon - a.lon).to_radians();

    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // Rounding can push h slightly outside [0, 1] near identical or antipodal points
    2.0 * EARTH_RADIUS_M * h.clamp(0.0, 1.0).sqrt().asin()
}

/// Seconds per kilometer, or `None` when moving too slowly to have a pace.
pub fn pace_from_speed(speed_mps: f64) -> Option<f64> {
    if !speed_mps.is_finite() || speed_mps <= MIN_PACE_SPEED_MPS {
        return None;
    }
    Some(1000.0 / speed_mps)
}

/// Convert a per-kilometer pace to the given unit.
pub fn pace_in_unit(sec_per_km: f64, unit: DistanceUnit) -> f64 {
    match unit {
        DistanceUnit::Km => sec_per_km,
        DistanceUnit::Mi => sec_per_km * METERS_PER_MILE / 1000.0,
    }
}

/// `H:MM:SS` from one hour up, `MM:SS` below.
pub fn format_duration(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return UNKNOWN_CLOCK.to_string();
    }
    let total = seconds.floor() as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{:02}:{:02}", m, s)
    }
}

/// Distance with two decimals, e.g. `5.00 km` or `3.11 mi`.
pub fn format_distance(meters: f64, unit: DistanceUnit) -> String {
    if !meters.is_finite() {
        return UNKNOWN_DISTANCE.to_string();
    }
    match unit {
        DistanceUnit::Km => format!("{:.2} km", meters / 1000.0),
        DistanceUnit::Mi => format!("{:.2} mi", meters / METERS_PER_MILE),
    }
}

/// Pace as `MM:SS /km` or `MM:SS /mi`.
pub fn format_pace(sec_per_km: Option<f64>, unit: DistanceUnit) -> String {
    let Some(pace) = sec_per_km.filter(|p| p.is_finite() && *p >= 0.0) else {
        return UNKNOWN_CLOCK.to_string();
    };
    let total = pace_in_unit(pace, unit).round() as u64;
    let suffix = match unit {
        DistanceUnit::Km => "/km",
        DistanceUnit::Mi => "/mi",
    };
    format!("{:02}:{:02} {}", total / 60, total % 60, suffix)
}
