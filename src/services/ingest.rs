// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sample ingestion.
//!
//! Turns raw telemetry into samples and appends them to a draft:
//! 1. Convert a GPS fix or treadmill tick into a sample (cumulative distance)
//! 2. Reject samples that go backwards in time or distance
//! 3. Update running totals
//! 4. Emit kilometer splits
//!
//! No I/O happens here; the recorder decides when to checkpoint.

use crate::models::session::FixAnchor;
use crate::models::{
    DistanceUnit, IndoorDraft, IndoorSample, LocationReading, OutdoorDraft, OutdoorSample,
    Progress, SessionTotals, TreadmillControls,
};
use crate::services::geo::{self, pace_from_speed, pace_in_unit, MIN_PACE_SPEED_MPS};
use crate::services::splits::update_auto_splits;
use crate::time_utils::seconds_between;

/// Why a reading was skipped. Skips are logged, never fatal.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Rejection {
    #[error("coordinate out of range ({lat}, {lon})")]
    InvalidCoordinate { lat: f64, lon: f64 },

    #[error("fix accuracy {accuracy_m:.1} m exceeds limit of {limit_m:.1} m")]
    Inaccurate { accuracy_m: f64, limit_m: f64 },

    #[error("sample {seq} goes backwards (elapsed {elapsed_s:.1} s, distance {distance_m:.1} m)")]
    OutOfOrder {
        seq: u32,
        elapsed_s: f64,
        distance_m: f64,
    },
}

/// Result of accepting one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accepted {
    pub seq: u32,
    pub new_splits: usize,
}

// ─── Outdoor ─────────────────────────────────────────────────

/// Build the next outdoor sample from a location reading.
///
/// Distance only grows while moving: the provider's speed decides when it
/// reports one, otherwise the speed implied by the distance from `anchor`.
/// With no anchor (first fix, or first after resume) the fix adds no distance.
pub fn sample_from_fix(
    reading: &LocationReading,
    anchor: Option<&FixAnchor>,
    last: Option<&OutdoorSample>,
    elapsed_s: f64,
    max_accuracy_m: f64,
) -> Result<OutdoorSample, Rejection> {
    let c = reading.coordinate;
    let valid = c.lat.is_finite()
        && c.lon.is_finite()
        && (-90.0..=90.0).contains(&c.lat)
        && (-180.0..=180.0).contains(&c.lon);
    if !valid {
        return Err(Rejection::InvalidCoordinate {
            lat: c.lat,
            lon: c.lon,
        });
    }

    if let Some(accuracy_m) = reading.accuracy_m {
        if accuracy_m > max_accuracy_m {
            return Err(Rejection::Inaccurate {
                accuracy_m,
                limit_m: max_accuracy_m,
            });
        }
    }

    let seq = last.map_or(0, |s| s.seq + 1);
    let prev_distance = last.map_or(0.0, |s| s.distance_m);

    if let Some(anchor) = anchor {
        if reading.timestamp < anchor.timestamp {
            return Err(Rejection::OutOfOrder {
                seq,
                elapsed_s,
                distance_m: prev_distance,
            });
        }
    }

    let delta_m = anchor.map_or(0.0, |a| geo::distance(a.coordinate, c));
    let speed_mps = reading.speed_mps.filter(|s| s.is_finite() && *s >= 0.0);
    let is_moving = match (speed_mps, anchor) {
        (Some(speed), _) => pace_from_speed(speed).is_some(),
        (None, Some(a)) => {
            let dt = seconds_between(a.timestamp, reading.timestamp);
            dt > 0.0 && delta_m / dt > MIN_PACE_SPEED_MPS
        }
        (None, None) => false,
    };

    Ok(OutdoorSample {
        seq,
        recorded_at: reading.timestamp,
        elapsed_s,
        lat: c.lat,
        lon: c.lon,
        altitude_m: reading.altitude_m,
        accuracy_m: reading.accuracy_m,
        speed_mps,
        bearing_deg: reading.bearing_deg,
        distance_m: prev_distance + if is_moving { delta_m } else { 0.0 },
        is_moving,
    })
}

/// Anchor for measuring the distance to the next fix.
pub fn anchor_for(sample: &OutdoorSample) -> FixAnchor {
    FixAnchor {
        coordinate: sample.coordinate(),
        timestamp: sample.recorded_at,
    }
}

/// Append an outdoor sample, updating totals and splits.
pub fn append_outdoor_sample(
    draft: &mut OutdoorDraft,
    sample: OutdoorSample,
) -> Result<Accepted, Rejection> {
    let last = draft.samples.last();
    check_order(
        last.map(|s| (s.seq, Progress::from(s))),
        sample.seq,
        Progress::from(&sample),
    )?;

    let climb = match (last.and_then(|s| s.altitude_m), sample.altitude_m) {
        (Some(before), Some(after)) if sample.is_moving && after > before => after - before,
        _ => 0.0,
    };
    let prev = last.map_or(Progress::ZERO, Progress::from);
    let next = Progress::from(&sample);

    let new_splits = update_auto_splits(prev, next, &mut draft.splits);
    draft.totals = SessionTotals::from_progress(
        next.elapsed_s,
        next.distance_m,
        draft.totals.elevation_gain_m + climb,
    );
    let seq = sample.seq;
    draft.samples.push(sample);

    Ok(Accepted { seq, new_splits })
}

// ─── Indoor ──────────────────────────────────────────────────

/// Build the next treadmill sample at `elapsed_s` from the current controls.
pub fn treadmill_tick(
    last: Option<&IndoorSample>,
    controls: TreadmillControls,
    elapsed_s: f64,
) -> IndoorSample {
    let (seq, prev_elapsed, prev_distance, prev_gain) = match last {
        Some(s) => (s.seq + 1, s.elapsed_s, s.distance_m, s.elevation_gain_m),
        None => (0, 0.0, 0.0, 0.0),
    };
    let speed_mps = if controls.speed_mps.is_finite() {
        controls.speed_mps.max(0.0)
    } else {
        0.0
    };
    let dt = (elapsed_s - prev_elapsed).max(0.0);
    let delta_m = speed_mps * dt;
    let climb = delta_m * controls.incline_deg.to_radians().sin().max(0.0);
    let pace_s_per_km = pace_from_speed(speed_mps);

    IndoorSample {
        seq,
        elapsed_s,
        distance_m: prev_distance + delta_m,
        speed_mps,
        pace_s_per_km,
        pace_s_per_mi: pace_s_per_km.map(|p| pace_in_unit(p, DistanceUnit::Mi)),
        incline_deg: controls.incline_deg,
        elevation_gain_m: prev_gain + climb,
    }
}

/// Append an indoor sample, updating totals and splits.
pub fn append_indoor_sample(
    draft: &mut IndoorDraft,
    sample: IndoorSample,
) -> Result<Accepted, Rejection> {
    let last = draft.samples.last();
    check_order(
        last.map(|s| (s.seq, Progress::from(s))),
        sample.seq,
        Progress::from(&sample),
    )?;

    let prev = last.map_or(Progress::ZERO, Progress::from);
    let next = Progress::from(&sample);

    let new_splits = update_auto_splits(prev, next, &mut draft.splits);
    draft.totals =
        SessionTotals::from_progress(next.elapsed_s, next.distance_m, sample.elevation_gain_m);
    let seq = sample.seq;
    draft.samples.push(sample);

    Ok(Accepted { seq, new_splits })
}

/// Split detection assumes time and distance never decrease.
fn check_order(last: Option<(u32, Progress)>, seq: u32, next: Progress) -> Result<(), Rejection> {
    let Some((last_seq, last)) = last else {
        return Ok(());
    };
    if seq <= last_seq
        || next.elapsed_s < last.elapsed_s
        || next.distance_m < last.distance_m
        || !next.elapsed_s.is_finite()
        || !next.distance_m.is_finite()
    {
        return Err(Rejection::OutOfOrder {
            seq,
            elapsed_s: next.elapsed_s,
            distance_m: next.distance_m,
        });
    }
    Ok(())
}
