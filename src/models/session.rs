// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! The one session currently being recorded.
//!
//! Each activity kind is its own variant so that, for example, an indoor
//! session can never carry GPS fixes and a strength session never carries
//! distance.

use crate::models::draft::{DraftKind, IndoorDraft, OutdoorDraft, StrengthDraft};
use crate::models::sample::Coordinate;
use crate::time_utils::seconds_between;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Run or walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Run,
    Walk,
}

/// Display unit preference. Storage is always meters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "ui/src/lib/generated/")
)]
pub enum DistanceUnit {
    #[default]
    Km,
    Mi,
}

/// What is being recorded. Also the mode stored in the session lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "ui/src/lib/generated/")
)]
pub enum SessionMode {
    OutdoorRun,
    OutdoorWalk,
    IndoorRun,
    IndoorWalk,
    Strength,
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::OutdoorRun => "outdoor_run",
            SessionMode::OutdoorWalk => "outdoor_walk",
            SessionMode::IndoorRun => "indoor_run",
            SessionMode::IndoorWalk => "indoor_walk",
            SessionMode::Strength => "strength",
        }
    }

    /// Which draft namespace a session of this mode lives in.
    pub fn draft_kind(&self) -> DraftKind {
        match self {
            SessionMode::OutdoorRun | SessionMode::OutdoorWalk => DraftKind::Outdoor,
            SessionMode::IndoorRun | SessionMode::IndoorWalk => DraftKind::Indoor,
            SessionMode::Strength => DraftKind::Strength,
        }
    }

    pub fn activity(&self) -> Option<ActivityType> {
        match self {
            SessionMode::OutdoorRun | SessionMode::IndoorRun => Some(ActivityType::Run),
            SessionMode::OutdoorWalk | SessionMode::IndoorWalk => Some(ActivityType::Walk),
            SessionMode::Strength => None,
        }
    }

    pub fn outdoor(activity: ActivityType) -> Self {
        match activity {
            ActivityType::Run => SessionMode::OutdoorRun,
            ActivityType::Walk => SessionMode::OutdoorWalk,
        }
    }

    pub fn indoor(activity: ActivityType) -> Self {
        match activity {
            ActivityType::Run => SessionMode::IndoorRun,
            ActivityType::Walk => SessionMode::IndoorWalk,
        }
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recording phase of the active session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "ui/src/lib/generated/")
)]
pub enum Phase {
    Running,
    Paused,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Running => "running",
            Phase::Paused => "paused",
        }
    }
}

/// Pause-aware stopwatch. The phase is derived from it, so the two cannot disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClock {
    pub started_at: DateTime<Utc>,
    /// Seconds spent in completed pauses
    pub paused_total_s: f64,
    /// Set while paused
    pub paused_at: Option<DateTime<Utc>>,
}

impl SessionClock {
    pub fn start(now: DateTime<Utc>) -> Self {
        Self {
            started_at: now,
            paused_total_s: 0.0,
            paused_at: None,
        }
    }

    pub fn phase(&self) -> Phase {
        if self.paused_at.is_some() {
            Phase::Paused
        } else {
            Phase::Running
        }
    }

    /// Moving seconds at `at`. Frozen while paused, never negative.
    pub fn elapsed_at(&self, at: DateTime<Utc>) -> f64 {
        let end = match self.paused_at {
            Some(paused_at) if paused_at < at => paused_at,
            _ => at,
        };
        (seconds_between(self.started_at, end) - self.paused_total_s).max(0.0)
    }

    pub fn pause(&mut self, now: DateTime<Utc>) {
        if self.paused_at.is_none() {
            self.paused_at = Some(now);
        }
    }

    pub fn resume(&mut self, now: DateTime<Utc>) {
        if let Some(paused_at) = self.paused_at.take() {
            self.paused_total_s += seconds_between(paused_at, now).max(0.0);
        }
    }
}

/// Last accepted GPS fix, used to measure the next distance delta.
#[derive(Debug, Clone, PartialEq)]
pub struct FixAnchor {
    pub coordinate: Coordinate,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct OutdoorSession {
    pub clock: SessionClock,
    pub draft: OutdoorDraft,
    /// `None` right after start, resume or restore: the next fix only sets the anchor
    pub anchor: Option<FixAnchor>,
}

#[derive(Debug, Clone)]
pub struct IndoorSession {
    pub clock: SessionClock,
    pub draft: IndoorDraft,
}

#[derive(Debug, Clone)]
pub struct StrengthSession {
    pub clock: SessionClock,
    pub draft: StrengthDraft,
}

/// The single in-flight session.
#[derive(Debug, Clone)]
pub enum ActiveSession {
    Outdoor(OutdoorSession),
    Indoor(IndoorSession),
    Strength(StrengthSession),
}

impl ActiveSession {
    pub fn mode(&self) -> SessionMode {
        match self {
            ActiveSession::Outdoor(s) => SessionMode::outdoor(s.draft.activity),
            ActiveSession::Indoor(s) => SessionMode::indoor(s.draft.activity),
            ActiveSession::Strength(_) => SessionMode::Strength,
        }
    }

    pub fn clock(&self) -> &SessionClock {
        match self {
            ActiveSession::Outdoor(s) => &s.clock,
            ActiveSession::Indoor(s) => &s.clock,
            ActiveSession::Strength(s) => &s.clock,
        }
    }

    pub fn clock_mut(&mut self) -> &mut SessionClock {
        match self {
            ActiveSession::Outdoor(s) => &mut s.clock,
            ActiveSession::Indoor(s) => &mut s.clock,
            ActiveSession::Strength(s) => &mut s.clock,
        }
    }

    pub fn phase(&self) -> Phase {
        self.clock().phase()
    }

    pub fn draft_id(&self) -> &str {
        match self {
            ActiveSession::Outdoor(s) => &s.draft.id,
            ActiveSession::Indoor(s) => &s.draft.id,
            ActiveSession::Strength(s) => &s.draft.id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            ActiveSession::Outdoor(s) => &s.draft.title,
            ActiveSession::Indoor(s) => &s.draft.title,
            ActiveSession::Strength(s) => &s.draft.title,
        }
    }

    /// Persisted pointer used to rebuild this session after a restart.
    pub fn record(&self) -> ActiveSessionRecord {
        ActiveSessionRecord {
            mode: self.mode(),
            draft_id: self.draft_id().to_string(),
            clock: self.clock().clone(),
        }
    }
}

/// What survives a restart besides the draft itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveSessionRecord {
    pub mode: SessionMode,
    pub draft_id: String,
    pub clock: SessionClock,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 6, 0, 0).unwrap()
    }

    #[test]
    fn test_clock_excludes_pauses() {
        let mut clock = SessionClock::start(t0());
        assert_eq!(clock.elapsed_at(t0() + Duration::seconds(60)), 60.0);

        clock.pause(t0() + Duration::seconds(100));
        assert_eq!(clock.phase(), Phase::Paused);
        // Frozen while paused
        assert_eq!(clock.elapsed_at(t0() + Duration::seconds(500)), 100.0);

        clock.resume(t0() + Duration::seconds(160));
        assert_eq!(clock.phase(), Phase::Running);
        assert_eq!(clock.elapsed_at(t0() + Duration::seconds(200)), 140.0);
    }

    #[test]
    fn test_clock_double_pause_keeps_first() {
        let mut clock = SessionClock::start(t0());
        clock.pause(t0() + Duration::seconds(10));
        clock.pause(t0() + Duration::seconds(50));
        clock.resume(t0() + Duration::seconds(70));
        assert_eq!(clock.paused_total_s, 60.0);
    }

    #[test]
    fn test_mode_round_trips_through_activity() {
        assert_eq!(SessionMode::outdoor(ActivityType::Walk), SessionMode::OutdoorWalk);
        assert_eq!(SessionMode::IndoorRun.activity(), Some(ActivityType::Run));
        assert_eq!(SessionMode::Strength.activity(), None);
        assert_eq!(SessionMode::IndoorWalk.draft_kind(), DraftKind::Indoor);
        assert_eq!(
            serde_json::to_string(&SessionMode::OutdoorRun).unwrap(),
            "\"outdoor_run\""
        );
    }
}
