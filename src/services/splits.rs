// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Kilometer split detection.
//!
//! Runs on every accepted sample, so the common case (no boundary crossed)
//! must leave the split list untouched. Everything here is pure.

use crate::models::{Progress, Split, SplitKind};

pub const SPLIT_DISTANCE_M: f64 = 1000.0;

/// Shortest duration a split may report, so pace never divides by zero.
const MIN_SPLIT_DURATION_S: f64 = 1.0;

/// Number of automatic kilometer splits already emitted.
pub fn auto_split_count(splits: &[Split]) -> usize {
    splits.iter().filter(|s| s.kind == SplitKind::AutoKm).count()
}

/// Append a split for every kilometer boundary crossed between `prev` and `next`.
///
/// Returns how many splits were added. Boundaries already covered by an
/// existing auto split are skipped, which makes repeated calls with the same
/// inputs a no-op.
pub fn update_auto_splits(prev: Progress, next: Progress, splits: &mut Vec<Split>) -> usize {
    let emitted = auto_split_count(splits) as u64;
    let prev_km = whole_km(prev.distance_m).max(emitted);
    let next_km = whole_km(next.distance_m);
    if next_km <= prev_km {
        return 0;
    }

    let segment_m = next.distance_m - prev.distance_m;
    let segment_s = next.elapsed_s - prev.elapsed_s;
    let mut start = last_auto_end(splits);
    let mut index = emitted as u32;

    for km in (prev_km + 1)..=next_km {
        index += 1;
        let boundary_m = km as f64 * SPLIT_DISTANCE_M;
        let fraction = if segment_m > 0.0 {
            ((boundary_m - prev.distance_m) / segment_m).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let end = prev.elapsed_s + fraction * segment_s;
        let duration_s = (end - start).max(MIN_SPLIT_DURATION_S);

        splits.push(Split {
            index,
            distance_m: SPLIT_DISTANCE_M,
            duration_s,
            // Auto splits are exactly one kilometer
            avg_pace_s_per_km: duration_s,
            start_elapsed_s: start,
            end_elapsed_s: end,
            kind: SplitKind::AutoKm,
        });
        start = end;
    }

    (next_km - prev_km) as usize
}

/// Close a manual lap covering everything since the previous split of any kind.
///
/// `at` is the session's cumulative position now, `lap_start` where the
/// previous split ended. Returns `None` when no time has passed since then.
pub fn manual_split(splits: &mut Vec<Split>, at: Progress, lap_start: Progress) -> Option<&Split> {
    let duration_s = at.elapsed_s - lap_start.elapsed_s;
    if duration_s <= 0.0 {
        return None;
    }
    let distance_m = (at.distance_m - lap_start.distance_m).max(0.0);
    let index = splits.iter().filter(|s| s.kind == SplitKind::Manual).count() as u32 + 1;
    let avg_pace_s_per_km = if distance_m > 0.0 {
        duration_s / (distance_m / SPLIT_DISTANCE_M)
    } else {
        0.0
    };

    splits.push(Split {
        index,
        distance_m,
        duration_s,
        avg_pace_s_per_km,
        start_elapsed_s: lap_start.elapsed_s,
        end_elapsed_s: at.elapsed_s,
        kind: SplitKind::Manual,
    });
    splits.last()
}

fn whole_km(distance_m: f64) -> u64 {
    if distance_m.is_finite() && distance_m > 0.0 {
        (distance_m / SPLIT_DISTANCE_M).floor() as u64
    } else {
        0
    }
}

fn last_auto_end(splits: &[Split]) -> f64 {
    splits
        .iter()
        .rev()
        .find(|s| s.kind == SplitKind::AutoKm)
        .map_or(0.0, |s| s.end_elapsed_s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_boundary_is_noop() {
        let mut splits = Vec::new();
        let added = update_auto_splits(
            Progress::new(100.0, 30.0),
            Progress::new(900.0, 270.0),
            &mut splits,
        );
        assert_eq!(added, 0);
        assert!(splits.is_empty());
    }

    #[test]
    fn test_single_crossing_interpolates_end() {
        let mut splits = Vec::new();
        let added = update_auto_splits(
            Progress::new(900.0, 260.0),
            Progress::new(1250.0, 380.0),
            &mut splits,
        );
        assert_eq!(added, 1);
        let split = &splits[0];
        assert_eq!(split.index, 1);
        assert_eq!(split.kind, SplitKind::AutoKm);
        assert_eq!(split.start_elapsed_s, 0.0);
        // 260 + (100 / 350) * 120
        assert!((split.end_elapsed_s - 294.2857).abs() < 1e-3);
        assert!((split.duration_s - 294.2857).abs() < 1e-3);
        assert_eq!(split.avg_pace_s_per_km, split.duration_s);
        assert_eq!(split.distance_m, 1000.0);
    }

    #[test]
    fn test_repeated_call_adds_nothing() {
        let mut splits = Vec::new();
        let prev = Progress::new(900.0, 260.0);
        let next = Progress::new(1250.0, 380.0);
        assert_eq!(update_auto_splits(prev, next, &mut splits), 1);
        assert_eq!(update_auto_splits(prev, next, &mut splits), 0);
        assert_eq!(splits.len(), 1);
    }

    #[test]
    fn test_linear_five_km_session() {
        // 0 -> 5000 m over 1500 s in 10 m steps
        let mut splits = Vec::new();
        let mut prev = Progress::ZERO;
        for step in 1..=500 {
            let next = Progress::new(step as f64 * 10.0, step as f64 * 3.0);
            update_auto_splits(prev, next, &mut splits);
            prev = next;
        }

        assert_eq!(splits.len(), 5);
        for (i, split) in splits.iter().enumerate() {
            assert_eq!(split.index, i as u32 + 1);
            assert_eq!(split.kind, SplitKind::AutoKm);
            assert!((split.duration_s - 300.0).abs() < 1e-6);
            if i > 0 {
                assert_eq!(split.start_elapsed_s, splits[i - 1].end_elapsed_s);
                assert!(split.end_elapsed_s >= splits[i - 1].end_elapsed_s);
            }
        }
    }

    #[test]
    fn test_gap_crossing_several_boundaries() {
        // A sparse fix after a signal gap jumps 0.5 km -> 3.5 km
        let mut splits = Vec::new();
        let added = update_auto_splits(
            Progress::new(500.0, 150.0),
            Progress::new(3500.0, 1050.0),
            &mut splits,
        );
        assert_eq!(added, 3);
        for (split, expected_end) in splits.iter().zip([300.0, 600.0, 900.0]) {
            assert!((split.end_elapsed_s - expected_end).abs() < 1e-9);
            assert!((split.duration_s - 300.0).abs() < 1e-9);
        }
        assert_eq!(splits[1].start_elapsed_s, splits[0].end_elapsed_s);
        assert_eq!(splits[2].index, 3);
    }

    #[test]
    fn test_zero_time_segment_keeps_minimum_duration() {
        let mut splits = Vec::new();
        update_auto_splits(
            Progress::new(999.0, 0.0),
            Progress::new(1001.0, 0.0),
            &mut splits,
        );
        assert_eq!(splits[0].duration_s, 1.0);
    }

    #[test]
    fn test_auto_splits_ignore_manual_laps() {
        let mut splits = Vec::new();
        manual_split(&mut splits, Progress::new(400.0, 120.0), Progress::ZERO);
        update_auto_splits(
            Progress::new(900.0, 270.0),
            Progress::new(1100.0, 330.0),
            &mut splits,
        );

        let auto = splits.iter().find(|s| s.kind == SplitKind::AutoKm).unwrap();
        assert_eq!(auto.index, 1);
        assert_eq!(auto.start_elapsed_s, 0.0);
    }

    #[test]
    fn test_manual_split_measures_lap() {
        let mut splits = Vec::new();
        let lap = manual_split(&mut splits, Progress::new(400.0, 120.0), Progress::ZERO)
            .cloned()
            .expect("lap recorded");
        assert_eq!(lap.index, 1);
        assert_eq!(lap.distance_m, 400.0);
        assert_eq!(lap.avg_pace_s_per_km, 300.0);

        // No time since previous lap
        let here = Progress::new(400.0, 120.0);
        assert!(manual_split(&mut splits, here, here).is_none());
    }
}
