// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Locally persisted session drafts.
//!
//! A draft is created when recording starts, checkpointed while recording,
//! and deleted once the backend has the session (or the user discards it).

use crate::models::sample::{IndoorSample, OutdoorSample};
use crate::models::session::{ActivityType, DistanceUnit};
use crate::models::split::Split;
use crate::services::geo::pace_from_speed;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Draft namespace. Each kind has its own sample shape and backend tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftKind {
    Outdoor,
    Indoor,
    Strength,
}

impl DraftKind {
    pub const ALL: [DraftKind; 3] = [DraftKind::Outdoor, DraftKind::Indoor, DraftKind::Strength];

    pub fn as_str(&self) -> &'static str {
        match self {
            DraftKind::Outdoor => "outdoor",
            DraftKind::Indoor => "indoor",
            DraftKind::Strength => "strength",
        }
    }

    /// Backend table receiving the session summary row.
    pub fn session_table(&self) -> &'static str {
        match self {
            DraftKind::Outdoor => "outdoor_sessions",
            DraftKind::Indoor => "indoor_sessions",
            DraftKind::Strength => "strength_sessions",
        }
    }

    /// Backend table receiving the per-sample (or per-set) rows.
    pub fn row_table(&self) -> &'static str {
        match self {
            DraftKind::Outdoor => "outdoor_samples",
            DraftKind::Indoor => "indoor_samples",
            DraftKind::Strength => "strength_sets",
        }
    }
}

impl std::str::FromStr for DraftKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "outdoor" => Ok(DraftKind::Outdoor),
            "indoor" => Ok(DraftKind::Indoor),
            "strength" => Ok(DraftKind::Strength),
            other => Err(format!("unknown draft kind '{}'", other)),
        }
    }
}

/// Upload progress kept on the draft so a retry resumes instead of restarting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncProgress {
    /// Backend id returned by the summary insert
    pub remote_id: String,
    /// Leading rows acknowledged by the backend
    pub rows_done: usize,
}

/// Running totals shown live and uploaded with the summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionTotals {
    pub elapsed_s: f64,
    pub distance_m: f64,
    pub elevation_gain_m: f64,
    pub avg_speed_mps: f64,
    pub avg_pace_s_per_km: Option<f64>,
}

impl SessionTotals {
    pub fn from_progress(elapsed_s: f64, distance_m: f64, elevation_gain_m: f64) -> Self {
        let avg_speed_mps = if elapsed_s > 0.0 {
            distance_m / elapsed_s
        } else {
            0.0
        };
        Self {
            elapsed_s,
            distance_m,
            elevation_gain_m,
            avg_speed_mps,
            avg_pace_s_per_km: pace_from_speed(avg_speed_mps),
        }
    }
}

/// Common contract of every draft namespace.
pub trait Draft: Serialize + DeserializeOwned + Clone + Send + Sync {
    const KIND: DraftKind;

    fn id(&self) -> &str;

    fn sync_progress(&self) -> Option<&SyncProgress>;

    fn set_sync_progress(&mut self, progress: Option<SyncProgress>);

    /// Summary row for the session table. `client_id` is the idempotency key.
    fn summary_row(&self) -> serde_json::Result<Value>;

    /// Child rows (samples or sets), in order, without `session_id`.
    fn upload_rows(&self) -> serde_json::Result<Vec<Value>>;
}

// ─── Outdoor ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutdoorDraft {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub activity: ActivityType,
    pub unit: DistanceUnit,
    pub title: String,
    pub totals: SessionTotals,
    #[serde(default)]
    pub splits: Vec<Split>,
    #[serde(default)]
    pub samples: Vec<OutdoorSample>,
    #[serde(default)]
    pub sync: Option<SyncProgress>,
}

impl OutdoorDraft {
    /// Route as a precision-5 encoded polyline, if there is one to encode.
    pub fn route_polyline(&self) -> Option<String> {
        if self.samples.len() < 2 {
            return None;
        }
        let line: geo::LineString<f64> = self
            .samples
            .iter()
            .map(|s| geo::Coord::from(s.coordinate()))
            .collect();
        polyline::encode_coordinates(line, 5).ok()
    }
}

impl Draft for OutdoorDraft {
    const KIND: DraftKind = DraftKind::Outdoor;

    fn id(&self) -> &str {
        &self.id
    }

    fn sync_progress(&self) -> Option<&SyncProgress> {
        self.sync.as_ref()
    }

    fn set_sync_progress(&mut self, progress: Option<SyncProgress>) {
        self.sync = progress;
    }

    fn summary_row(&self) -> serde_json::Result<Value> {
        Ok(json!({
            "client_id": self.id,
            "activity_type": self.activity,
            "environment": "outdoor",
            "title": self.title,
            "unit": self.unit,
            "started_at": self.started_at,
            "ended_at": self.ended_at,
            "elapsed_s": self.totals.elapsed_s,
            "distance_m": self.totals.distance_m,
            "elevation_gain_m": self.totals.elevation_gain_m,
            "avg_speed_mps": self.totals.avg_speed_mps,
            "avg_pace_s_per_km": self.totals.avg_pace_s_per_km,
            "splits": serde_json::to_value(&self.splits)?,
            "route_polyline": self.route_polyline(),
        }))
    }

    fn upload_rows(&self) -> serde_json::Result<Vec<Value>> {
        self.samples.iter().map(serde_json::to_value).collect()
    }
}

// ─── Indoor ──────────────────────────────────────────────────

/// Treadmill settings driven by the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TreadmillControls {
    pub speed_mps: f64,
    pub incline_deg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndoorDraft {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub activity: ActivityType,
    pub unit: DistanceUnit,
    pub title: String,
    pub totals: SessionTotals,
    #[serde(default)]
    pub controls: TreadmillControls,
    #[serde(default)]
    pub splits: Vec<Split>,
    #[serde(default)]
    pub samples: Vec<IndoorSample>,
    #[serde(default)]
    pub sync: Option<SyncProgress>,
}

impl Draft for IndoorDraft {
    const KIND: DraftKind = DraftKind::Indoor;

    fn id(&self) -> &str {
        &self.id
    }

    fn sync_progress(&self) -> Option<&SyncProgress> {
        self.sync.as_ref()
    }

    fn set_sync_progress(&mut self, progress: Option<SyncProgress>) {
        self.sync = progress;
    }

    fn summary_row(&self) -> serde_json::Result<Value> {
        Ok(json!({
            "client_id": self.id,
            "activity_type": self.activity,
            "environment": "indoor",
            "title": self.title,
            "unit": self.unit,
            "started_at": self.started_at,
            "ended_at": self.ended_at,
            "elapsed_s": self.totals.elapsed_s,
            "distance_m": self.totals.distance_m,
            "elevation_gain_m": self.totals.elevation_gain_m,
            "avg_speed_mps": self.totals.avg_speed_mps,
            "avg_pace_s_per_km": self.totals.avg_pace_s_per_km,
            "splits": serde_json::to_value(&self.splits)?,
        }))
    }

    fn upload_rows(&self) -> serde_json::Result<Vec<Value>> {
        self.samples.iter().map(serde_json::to_value).collect()
    }
}

// ─── Strength ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrengthSet {
    pub reps: u32,
    pub weight_kg: Option<f64>,
    pub logged_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub name: String,
    #[serde(default)]
    pub sets: Vec<StrengthSet>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrengthDraft {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub title: String,
    #[serde(default)]
    pub elapsed_s: f64,
    #[serde(default)]
    pub exercises: Vec<Exercise>,
    #[serde(default)]
    pub sync: Option<SyncProgress>,
}

impl StrengthDraft {
    pub fn total_sets(&self) -> usize {
        self.exercises.iter().map(|e| e.sets.len()).sum()
    }

    /// Sum of reps × weight over weighted sets.
    pub fn volume_kg(&self) -> f64 {
        self.exercises
            .iter()
            .flat_map(|e| e.sets.iter())
            .filter_map(|s| s.weight_kg.map(|w| w * s.reps as f64))
            .sum()
    }
}

impl Draft for StrengthDraft {
    const KIND: DraftKind = DraftKind::Strength;

    fn id(&self) -> &str {
        &self.id
    }

    fn sync_progress(&self) -> Option<&SyncProgress> {
        self.sync.as_ref()
    }

    fn set_sync_progress(&mut self, progress: Option<SyncProgress>) {
        self.sync = progress;
    }

    fn summary_row(&self) -> serde_json::Result<Value> {
        Ok(json!({
            "client_id": self.id,
            "title": self.title,
            "started_at": self.started_at,
            "ended_at": self.ended_at,
            "elapsed_s": self.elapsed_s,
            "exercise_count": self.exercises.len(),
            "set_count": self.total_sets(),
            "volume_kg": self.volume_kg(),
        }))
    }

    /// One row per set. `seq` numbers sets across the whole workout.
    fn upload_rows(&self) -> serde_json::Result<Vec<Value>> {
        let mut rows = Vec::with_capacity(self.total_sets());
        for (exercise_index, exercise) in self.exercises.iter().enumerate() {
            for (set_index, set) in exercise.sets.iter().enumerate() {
                rows.push(json!({
                    "seq": rows.len(),
                    "exercise_index": exercise_index,
                    "exercise_name": exercise.name,
                    "set_index": set_index,
                    "reps": set.reps,
                    "weight_kg": set.weight_kg,
                    "logged_at": set.logged_at,
                }));
            }
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn strength_draft() -> StrengthDraft {
        let t = Utc.with_ymd_and_hms(2026, 5, 1, 18, 0, 0).unwrap();
        StrengthDraft {
            id: "abc".to_string(),
            created_at: t,
            started_at: t,
            ended_at: None,
            title: "Push day".to_string(),
            elapsed_s: 0.0,
            exercises: vec![
                Exercise {
                    name: "Bench press".to_string(),
                    sets: vec![
                        StrengthSet { reps: 8, weight_kg: Some(60.0), logged_at: t },
                        StrengthSet { reps: 6, weight_kg: Some(65.0), logged_at: t },
                    ],
                },
                Exercise {
                    name: "Push-up".to_string(),
                    sets: vec![StrengthSet { reps: 20, weight_kg: None, logged_at: t }],
                },
            ],
            sync: None,
        }
    }

    #[test]
    fn test_totals_derive_speed_and_pace() {
        let totals = SessionTotals::from_progress(300.0, 1000.0, 4.0);
        assert!((totals.avg_speed_mps - 3.333).abs() < 0.001);
        assert!((totals.avg_pace_s_per_km.unwrap() - 300.0).abs() < 1e-9);

        let idle = SessionTotals::from_progress(0.0, 0.0, 0.0);
        assert_eq!(idle.avg_speed_mps, 0.0);
        assert_eq!(idle.avg_pace_s_per_km, None);
    }

    #[test]
    fn test_strength_rows_number_sets_across_exercises() {
        let draft = strength_draft();
        let rows = draft.upload_rows().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2]["seq"], 2);
        assert_eq!(rows[2]["exercise_name"], "Push-up");
        assert_eq!(rows[2]["set_index"], 0);
        assert_eq!(draft.volume_kg(), 8.0 * 60.0 + 6.0 * 65.0);
    }

    #[test]
    fn test_draft_kind_parses_path_segment() {
        assert_eq!("indoor".parse::<DraftKind>(), Ok(DraftKind::Indoor));
        assert!("treadmill".parse::<DraftKind>().is_err());
    }
}
