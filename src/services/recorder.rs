// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session controller.
//!
//! Owns the single active session slot. Every command locks the slot, so
//! commands run one at a time in arrival order. Flow of a recording:
//! 1. `start` takes the session lock and writes the first draft checkpoint
//! 2. Telemetry appends samples; the draft is checkpointed on a throttle
//! 3. `finish` moves the session out of the slot, releases the lock, then uploads
//! 4. Drafts that failed to upload stay stored and are retried later

use crate::config::Config;
use crate::db::{keys, DraftStore, LocalStore};
use crate::error::AppError;
use crate::models::session::{IndoorSession, OutdoorSession, StrengthSession};
use crate::models::{
    ActiveSession, ActiveSessionRecord, ActivityType, DistanceUnit, Draft, DraftKind, Exercise,
    IndoorDraft, LocationReading, OutdoorDraft, OutdoorSample, Phase, Progress, SessionClock,
    SessionMode, SessionTotals, Split, SplitKind, StrengthDraft, StrengthSet, TreadmillControls,
};
use crate::services::backend::{RemoteBackend, RestBackend};
use crate::services::geo::{format_distance, format_duration, format_pace, pace_from_speed};
use crate::services::ingest::{self, Accepted, Rejection};
use crate::services::lock::SessionLockStore;
use crate::services::splits::{manual_split, SPLIT_DISTANCE_M};
use crate::services::sync::{upload_session, UploadReport};
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Duration, Local, Timelike, Utc};
use dashmap::DashSet;
use ring::rand::{SecureRandom, SystemRandom};
use serde::Serialize;
use tokio::sync::Mutex;

/// Recorder tuning derived from [`Config`].
#[derive(Debug, Clone)]
pub struct RecorderSettings {
    pub save_interval: Duration,
    pub save_every_samples: usize,
    pub sync_chunk_size: usize,
    pub max_fix_accuracy_m: f64,
    pub lock_max_age: Duration,
}

impl From<&Config> for RecorderSettings {
    fn from(config: &Config) -> Self {
        Self {
            save_interval: Duration::seconds(config.draft_save_interval_secs as i64),
            save_every_samples: config.draft_save_every_samples.max(1),
            sync_chunk_size: config.sync_chunk_size.max(1),
            max_fix_accuracy_m: config.max_fix_accuracy_m,
            lock_max_age: Duration::hours(config.lock_max_age_hours),
        }
    }
}

/// How to start a recording.
#[derive(Debug, Clone)]
pub struct StartOptions {
    pub mode: SessionMode,
    pub title: Option<String>,
    pub unit: DistanceUnit,
}

/// What happened to one piece of telemetry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleOutcome {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<u32>,
    pub new_splits: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl SampleOutcome {
    fn accepted(accepted: Accepted) -> Self {
        Self {
            accepted: true,
            seq: Some(accepted.seq),
            new_splits: accepted.new_splits,
            reason: None,
        }
    }

    fn skipped(reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            seq: None,
            new_splits: 0,
            reason: Some(reason.into()),
        }
    }
}

/// Result of `finish`. The recording is over either way; a failed upload
/// leaves the draft stored for a later retry.
#[derive(Debug, Clone, Serialize)]
pub struct FinishReport {
    pub draft_id: String,
    pub kind: DraftKind,
    pub synced: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub draft_id: String,
    pub kind: DraftKind,
    pub remote_id: String,
    pub rows: usize,
    pub resumed_rows: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RetryReport {
    pub attempted: usize,
    pub synced: usize,
    pub failed: usize,
}

/// Display strings for the live view.
#[derive(Debug, Clone, Serialize)]
pub struct DisplayFields {
    pub elapsed: String,
    pub distance: String,
    pub pace: String,
    pub avg_pace: String,
}

/// Read-only view of the active session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub draft_id: String,
    pub mode: SessionMode,
    pub phase: Phase,
    pub title: String,
    pub unit: DistanceUnit,
    pub started_at: DateTime<Utc>,
    pub elapsed_s: f64,
    pub distance_m: f64,
    pub elevation_gain_m: f64,
    pub current_speed_mps: Option<f64>,
    pub current_pace_s_per_km: Option<f64>,
    pub avg_pace_s_per_km: Option<f64>,
    pub sample_count: usize,
    pub splits: Vec<Split>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controls: Option<TreadmillControls>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exercises: Option<Vec<Exercise>>,
    pub display: DisplayFields,
}

/// One stored draft in the pending list.
#[derive(Debug, Clone, Serialize)]
pub struct DraftSummary {
    pub kind: DraftKind,
    pub id: String,
    pub title: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub elapsed_s: f64,
    pub distance_m: Option<f64>,
    pub rows: usize,
    pub upload_started: bool,
    pub active: bool,
}

#[derive(Default)]
struct Slot {
    active: Option<ActiveSession>,
    last_saved_at: Option<DateTime<Utc>>,
    unsaved_samples: usize,
}

/// Owns the active session and all draft bookkeeping.
pub struct SessionController<B = RestBackend> {
    slot: Mutex<Slot>,
    store: LocalStore,
    outdoor: DraftStore<OutdoorDraft>,
    indoor: DraftStore<IndoorDraft>,
    strength: DraftStore<StrengthDraft>,
    lock: SessionLockStore,
    backend: B,
    settings: RecorderSettings,
    rng: SystemRandom,
    /// Drafts with an upload in progress
    uploading: DashSet<String>,
}

impl<B: RemoteBackend> SessionController<B> {
    pub fn new(store: LocalStore, backend: B, settings: RecorderSettings) -> Self {
        Self {
            slot: Mutex::new(Slot::default()),
            outdoor: DraftStore::new(store.clone()),
            indoor: DraftStore::new(store.clone()),
            strength: DraftStore::new(store.clone()),
            lock: SessionLockStore::new(store.clone(), settings.lock_max_age),
            store,
            backend,
            settings,
            rng: SystemRandom::new(),
            uploading: DashSet::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn outdoor_drafts(&self) -> &DraftStore<OutdoorDraft> {
        &self.outdoor
    }

    pub fn indoor_drafts(&self) -> &DraftStore<IndoorDraft> {
        &self.indoor
    }

    pub fn strength_drafts(&self) -> &DraftStore<StrengthDraft> {
        &self.strength
    }

    pub fn lock_store(&self) -> &SessionLockStore {
        &self.lock
    }

    // ─── Lifecycle ───────────────────────────────────────────────

    pub async fn start(
        &self,
        options: StartOptions,
        now: DateTime<Utc>,
    ) -> Result<SessionSnapshot, AppError> {
        let mut slot = self.slot.lock().await;
        if let Some(active) = &slot.active {
            return Err(AppError::SessionAlreadyActive(active.mode()));
        }

        // Any lock still stored here is orphaned and gets cleared by the read
        if let Some(held) = self.lock.read(None, now).await? {
            return Err(AppError::SessionAlreadyActive(held.mode));
        }
        self.lock.acquire(options.mode, now).await?;

        let id = self.new_draft_id()?;
        let title = options
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| default_title(options.mode, now));
        let clock = SessionClock::start(now);

        let active = match (options.mode.draft_kind(), options.mode.activity()) {
            (DraftKind::Outdoor, Some(activity)) => ActiveSession::Outdoor(OutdoorSession {
                clock,
                draft: OutdoorDraft {
                    id,
                    created_at: now,
                    started_at: now,
                    ended_at: None,
                    activity,
                    unit: options.unit,
                    title,
                    totals: SessionTotals::default(),
                    splits: Vec::new(),
                    samples: Vec::new(),
                    sync: None,
                },
                anchor: None,
            }),
            (DraftKind::Indoor, Some(activity)) => ActiveSession::Indoor(IndoorSession {
                clock,
                draft: IndoorDraft {
                    id,
                    created_at: now,
                    started_at: now,
                    ended_at: None,
                    activity,
                    unit: options.unit,
                    title,
                    totals: SessionTotals::default(),
                    controls: TreadmillControls::default(),
                    splits: Vec::new(),
                    samples: Vec::new(),
                    sync: None,
                },
            }),
            _ => ActiveSession::Strength(StrengthSession {
                clock,
                draft: StrengthDraft {
                    id,
                    created_at: now,
                    started_at: now,
                    ended_at: None,
                    title,
                    elapsed_s: 0.0,
                    exercises: Vec::new(),
                    sync: None,
                },
            }),
        };

        slot.active = Some(active);
        if let Err(e) = self.checkpoint(&mut slot, now, true).await {
            // Leave nothing half-started behind
            slot.active = None;
            self.lock.release().await?;
            return Err(e);
        }

        let Some(active) = &slot.active else {
            return Err(AppError::NoActiveSession);
        };
        tracing::info!(
            session_id = active.draft_id(),
            mode = %active.mode(),
            "Session started"
        );
        Ok(snapshot_of(active, now))
    }

    pub async fn pause(&self, now: DateTime<Utc>) -> Result<SessionSnapshot, AppError> {
        let mut slot = self.slot.lock().await;
        let active = slot.active.as_mut().ok_or(AppError::NoActiveSession)?;
        if active.phase() == Phase::Paused {
            return Err(AppError::InvalidTransition {
                action: "pause",
                phase: Phase::Paused.as_str(),
            });
        }

        match active {
            ActiveSession::Outdoor(s) => s.anchor = None,
            ActiveSession::Indoor(s) => {
                advance_treadmill(s, now);
            }
            ActiveSession::Strength(_) => {}
        }
        active.clock_mut().pause(now);
        touch_strength_elapsed(active, now);
        tracing::info!(session_id = active.draft_id(), "Session paused");

        self.checkpoint(&mut slot, now, true).await?;
        self.current_snapshot(&slot, now)
    }

    pub async fn resume(&self, now: DateTime<Utc>) -> Result<SessionSnapshot, AppError> {
        let mut slot = self.slot.lock().await;
        let active = slot.active.as_mut().ok_or(AppError::NoActiveSession)?;
        if active.phase() == Phase::Running {
            return Err(AppError::InvalidTransition {
                action: "resume",
                phase: Phase::Running.as_str(),
            });
        }

        active.clock_mut().resume(now);
        tracing::info!(session_id = active.draft_id(), "Session resumed");

        self.checkpoint(&mut slot, now, true).await?;
        self.current_snapshot(&slot, now)
    }

    /// End the recording and upload it.
    ///
    /// The session leaves the active slot and the lock is released before the
    /// upload starts, so a slow or failing upload never blocks a new recording.
    pub async fn finish(&self, now: DateTime<Utc>) -> Result<FinishReport, AppError> {
        let mut slot = self.slot.lock().await;
        let active = slot.active.as_mut().ok_or(AppError::NoActiveSession)?;

        if let ActiveSession::Indoor(s) = active {
            advance_treadmill(s, now);
        }
        let elapsed_s = active.clock().elapsed_at(now);
        match active {
            ActiveSession::Outdoor(s) => {
                s.draft.ended_at = Some(now);
                s.draft.totals = SessionTotals::from_progress(
                    elapsed_s,
                    s.draft.totals.distance_m,
                    s.draft.totals.elevation_gain_m,
                );
            }
            ActiveSession::Indoor(s) => {
                s.draft.ended_at = Some(now);
                s.draft.totals = SessionTotals::from_progress(
                    elapsed_s,
                    s.draft.totals.distance_m,
                    s.draft.totals.elevation_gain_m,
                );
            }
            ActiveSession::Strength(s) => {
                s.draft.ended_at = Some(now);
                s.draft.elapsed_s = elapsed_s;
            }
        }

        self.checkpoint(&mut slot, now, true).await?;
        let Some(finished) = slot.active.take() else {
            return Err(AppError::NoActiveSession);
        };
        slot.last_saved_at = None;
        slot.unsaved_samples = 0;
        self.store.remove(keys::ACTIVE_SESSION).await?;
        self.lock.release().await?;
        drop(slot);

        let draft_id = finished.draft_id().to_string();
        let kind = finished.mode().draft_kind();
        tracing::info!(
            session_id = %draft_id,
            mode = %finished.mode(),
            elapsed_s,
            "Session finished"
        );

        let uploaded = match finished {
            ActiveSession::Outdoor(s) => self.upload_and_settle(&self.outdoor, s.draft).await,
            ActiveSession::Indoor(s) => self.upload_and_settle(&self.indoor, s.draft).await,
            ActiveSession::Strength(s) => self.upload_and_settle(&self.strength, s.draft).await,
        };

        Ok(match uploaded {
            Ok(report) => FinishReport {
                draft_id,
                kind,
                synced: true,
                remote_id: Some(report.remote_id),
                sync_error: None,
            },
            Err(e) => FinishReport {
                draft_id,
                kind,
                synced: false,
                remote_id: None,
                sync_error: Some(e.to_string()),
            },
        })
    }

    /// Drop the active session without uploading it.
    pub async fn discard(&self) -> Result<String, AppError> {
        let mut slot = self.slot.lock().await;
        let active = slot.active.take().ok_or(AppError::NoActiveSession)?;
        slot.last_saved_at = None;
        slot.unsaved_samples = 0;

        let draft_id = active.draft_id().to_string();
        match active.mode().draft_kind() {
            DraftKind::Outdoor => self.outdoor.delete(&draft_id).await?,
            DraftKind::Indoor => self.indoor.delete(&draft_id).await?,
            DraftKind::Strength => self.strength.delete(&draft_id).await?,
        }
        self.store.remove(keys::ACTIVE_SESSION).await?;
        self.lock.release().await?;

        tracing::info!(session_id = %draft_id, mode = %active.mode(), "Session discarded");
        Ok(draft_id)
    }

    // ─── Telemetry ───────────────────────────────────────────────

    /// Feed one GPS fix into the active outdoor session.
    pub async fn ingest_location(
        &self,
        reading: LocationReading,
        now: DateTime<Utc>,
    ) -> Result<SampleOutcome, AppError> {
        let mut slot = self.slot.lock().await;
        let session = outdoor_mut(&mut slot.active)?;
        if session.clock.phase() == Phase::Paused {
            return Ok(SampleOutcome::skipped("paused"));
        }

        let elapsed_s = session.clock.elapsed_at(reading.timestamp);
        let sample = match ingest::sample_from_fix(
            &reading,
            session.anchor.as_ref(),
            session.draft.samples.last(),
            elapsed_s,
            self.settings.max_fix_accuracy_m,
        ) {
            Ok(sample) => sample,
            Err(rejection) => return Ok(log_rejection(&session.draft.id, rejection)),
        };

        let outcome = accept_outdoor(session, sample);
        self.after_sample(&mut slot, &outcome, now).await?;
        Ok(outcome)
    }

    /// Append an already-built outdoor sample (e.g. replayed from a file).
    pub async fn record_outdoor_sample(
        &self,
        sample: OutdoorSample,
        now: DateTime<Utc>,
    ) -> Result<SampleOutcome, AppError> {
        let mut slot = self.slot.lock().await;
        let session = outdoor_mut(&mut slot.active)?;
        if session.clock.phase() == Phase::Paused {
            return Ok(SampleOutcome::skipped("paused"));
        }

        let outcome = accept_outdoor(session, sample);
        self.after_sample(&mut slot, &outcome, now).await?;
        Ok(outcome)
    }

    /// Advance a running treadmill session to `now`.
    ///
    /// Called on a timer; does nothing unless an indoor session is running.
    pub async fn tick_indoor(&self, now: DateTime<Utc>) -> Result<Option<SampleOutcome>, AppError> {
        let mut slot = self.slot.lock().await;
        let Some(ActiveSession::Indoor(session)) = slot.active.as_mut() else {
            return Ok(None);
        };
        let Some(accepted) = advance_treadmill(session, now) else {
            return Ok(None);
        };

        let outcome = SampleOutcome::accepted(accepted);
        self.after_sample(&mut slot, &outcome, now).await?;
        Ok(Some(outcome))
    }

    /// Change treadmill speed and incline. Time so far is credited at the old settings.
    pub async fn set_treadmill(
        &self,
        controls: TreadmillControls,
        now: DateTime<Utc>,
    ) -> Result<SessionSnapshot, AppError> {
        if !controls.speed_mps.is_finite() || controls.speed_mps < 0.0 {
            return Err(AppError::BadRequest("speed must be a non-negative number".to_string()));
        }
        if !controls.incline_deg.is_finite() {
            return Err(AppError::BadRequest("incline must be a number".to_string()));
        }

        let mut slot = self.slot.lock().await;
        let session = match slot.active.as_mut() {
            Some(ActiveSession::Indoor(s)) => s,
            Some(other) => return Err(AppError::WrongSessionKind(other.mode())),
            None => return Err(AppError::NoActiveSession),
        };
        let credited = advance_treadmill(session, now);
        session.draft.controls = controls;
        tracing::debug!(
            session_id = %session.draft.id,
            speed_mps = controls.speed_mps,
            incline_deg = controls.incline_deg,
            "Treadmill controls changed"
        );

        if credited.is_some() {
            slot.unsaved_samples += 1;
        }
        self.checkpoint(&mut slot, now, false).await?;
        self.current_snapshot(&slot, now)
    }

    /// Close a manual lap. Returns `None` when no time has passed since the last split.
    pub async fn lap(&self, now: DateTime<Utc>) -> Result<Option<Split>, AppError> {
        let mut slot = self.slot.lock().await;
        let active = slot.active.as_mut().ok_or(AppError::NoActiveSession)?;
        let elapsed_s = active.clock().elapsed_at(now);

        let split = match active {
            ActiveSession::Outdoor(s) => {
                let history: Vec<Progress> = s.draft.samples.iter().map(Progress::from).collect();
                record_lap(&mut s.draft.splits, &history, elapsed_s)
            }
            ActiveSession::Indoor(s) => {
                advance_treadmill(s, now);
                let history: Vec<Progress> = s.draft.samples.iter().map(Progress::from).collect();
                record_lap(&mut s.draft.splits, &history, elapsed_s)
            }
            ActiveSession::Strength(_) => {
                return Err(AppError::WrongSessionKind(SessionMode::Strength));
            }
        };

        if let Some(split) = &split {
            tracing::info!(
                session_id = active.draft_id(),
                lap = split.index,
                distance_m = split.distance_m,
                duration_s = split.duration_s,
                "Lap recorded"
            );
            self.checkpoint(&mut slot, now, true).await?;
        }
        Ok(split)
    }

    // ─── Strength ────────────────────────────────────────────────

    /// Add an exercise to the workout, returning its index.
    pub async fn add_exercise(&self, name: &str, now: DateTime<Utc>) -> Result<usize, AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::BadRequest("exercise name is empty".to_string()));
        }

        let mut slot = self.slot.lock().await;
        let session = strength_mut(&mut slot.active)?;
        session.draft.exercises.push(Exercise {
            name: name.to_string(),
            sets: Vec::new(),
        });
        session.draft.elapsed_s = session.clock.elapsed_at(now);
        let index = session.draft.exercises.len() - 1;

        self.checkpoint(&mut slot, now, true).await?;
        Ok(index)
    }

    /// Log a set against an exercise. Sets may be logged while paused.
    pub async fn log_set(
        &self,
        exercise_index: usize,
        reps: u32,
        weight_kg: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<StrengthSet, AppError> {
        if reps == 0 {
            return Err(AppError::BadRequest("reps must be at least 1".to_string()));
        }
        if weight_kg.is_some_and(|w| !w.is_finite() || w < 0.0) {
            return Err(AppError::BadRequest("weight must be a non-negative number".to_string()));
        }

        let mut slot = self.slot.lock().await;
        let session = strength_mut(&mut slot.active)?;
        let exercise = session
            .draft
            .exercises
            .get_mut(exercise_index)
            .ok_or_else(|| AppError::NotFound(format!("exercise {}", exercise_index)))?;
        let set = StrengthSet {
            reps,
            weight_kg,
            logged_at: now,
        };
        exercise.sets.push(set.clone());
        session.draft.elapsed_s = session.clock.elapsed_at(now);

        self.checkpoint(&mut slot, now, true).await?;
        Ok(set)
    }

    // ─── Views ───────────────────────────────────────────────────

    pub async fn snapshot(&self, now: DateTime<Utc>) -> Option<SessionSnapshot> {
        let slot = self.slot.lock().await;
        slot.active.as_ref().map(|active| snapshot_of(active, now))
    }

    pub async fn active_draft_id(&self) -> Option<String> {
        let slot = self.slot.lock().await;
        slot.active.as_ref().map(|a| a.draft_id().to_string())
    }

    /// All stored drafts, most recent first within each kind.
    pub async fn list_drafts(&self) -> Result<Vec<DraftSummary>, AppError> {
        let active_id = self.active_draft_id().await;
        let is_active = |id: &str| active_id.as_deref() == Some(id);

        let mut summaries = Vec::new();
        for d in self.outdoor.list().await? {
            summaries.push(DraftSummary {
                kind: DraftKind::Outdoor,
                active: is_active(&d.id),
                title: d.title,
                started_at: d.started_at,
                ended_at: d.ended_at,
                elapsed_s: d.totals.elapsed_s,
                distance_m: Some(d.totals.distance_m),
                rows: d.samples.len(),
                upload_started: d.sync.is_some(),
                id: d.id,
            });
        }
        for d in self.indoor.list().await? {
            summaries.push(DraftSummary {
                kind: DraftKind::Indoor,
                active: is_active(&d.id),
                title: d.title,
                started_at: d.started_at,
                ended_at: d.ended_at,
                elapsed_s: d.totals.elapsed_s,
                distance_m: Some(d.totals.distance_m),
                rows: d.samples.len(),
                upload_started: d.sync.is_some(),
                id: d.id,
            });
        }
        for d in self.strength.list().await? {
            summaries.push(DraftSummary {
                kind: DraftKind::Strength,
                active: is_active(&d.id),
                rows: d.total_sets(),
                title: d.title,
                started_at: d.started_at,
                ended_at: d.ended_at,
                elapsed_s: d.elapsed_s,
                distance_m: None,
                upload_started: d.sync.is_some(),
                id: d.id,
            });
        }
        Ok(summaries)
    }

    // ─── Restart and recovery ────────────────────────────────────

    /// Rebuild the active session after a restart.
    ///
    /// A record whose draft is gone, or whose session is older than the lock
    /// max age, is dropped together with the lock; an abandoned draft stays
    /// stored for upload.
    pub async fn restore(&self, now: DateTime<Utc>) -> Result<Option<SessionSnapshot>, AppError> {
        let mut slot = self.slot.lock().await;
        if let Some(active) = &slot.active {
            return Ok(Some(snapshot_of(active, now)));
        }

        let Some(record) = self
            .store
            .get_json::<ActiveSessionRecord>(keys::ACTIVE_SESSION)
            .await?
        else {
            self.lock.read(None, now).await?;
            return Ok(None);
        };

        if now - record.clock.started_at > self.settings.lock_max_age {
            tracing::warn!(
                session_id = %record.draft_id,
                mode = %record.mode,
                "Abandoning session older than lock max age"
            );
            self.store.remove(keys::ACTIVE_SESSION).await?;
            self.lock.release().await?;
            return Ok(None);
        }

        let Some(active) = self.load_active(&record).await? else {
            tracing::warn!(session_id = %record.draft_id, "Active session draft missing");
            self.store.remove(keys::ACTIVE_SESSION).await?;
            self.lock.release().await?;
            return Ok(None);
        };

        if self.lock.read(Some(record.mode), now).await?.is_none() {
            self.lock.acquire(record.mode, record.clock.started_at).await?;
        }

        tracing::info!(
            session_id = %record.draft_id,
            mode = %record.mode,
            started_at = %format_utc_rfc3339(record.clock.started_at),
            phase = active.phase().as_str(),
            "Restored active session"
        );
        let snapshot = snapshot_of(&active, now);
        slot.active = Some(active);
        slot.last_saved_at = Some(now);
        slot.unsaved_samples = 0;
        Ok(Some(snapshot))
    }

    /// Upload one stored draft.
    pub async fn sync_draft(&self, kind: DraftKind, id: &str) -> Result<SyncReport, AppError> {
        if self.active_draft_id().await.as_deref() == Some(id) {
            return Err(AppError::InvalidTransition {
                action: "sync a draft",
                phase: "still recording",
            });
        }

        let report = match kind {
            DraftKind::Outdoor => self.sync_stored(&self.outdoor, id).await?,
            DraftKind::Indoor => self.sync_stored(&self.indoor, id).await?,
            DraftKind::Strength => self.sync_stored(&self.strength, id).await?,
        };
        Ok(SyncReport {
            draft_id: id.to_string(),
            kind,
            remote_id: report.remote_id,
            rows: report.rows,
            resumed_rows: report.resumed_rows,
        })
    }

    /// Upload every stored draft except the one being recorded.
    pub async fn retry_pending(&self) -> Result<RetryReport, AppError> {
        let active_id = self.active_draft_id().await;
        let mut report = RetryReport::default();

        for kind in DraftKind::ALL {
            let ids = match kind {
                DraftKind::Outdoor => self.outdoor.list_ids().await?,
                DraftKind::Indoor => self.indoor.list_ids().await?,
                DraftKind::Strength => self.strength.list_ids().await?,
            };
            for id in ids {
                if active_id.as_deref() == Some(id.as_str()) {
                    continue;
                }
                report.attempted += 1;
                match self.sync_draft(kind, &id).await {
                    Ok(_) => report.synced += 1,
                    Err(e) => {
                        tracing::warn!(kind = kind.as_str(), draft_id = %id, error = %e, "Pending draft upload failed");
                        report.failed += 1;
                    }
                }
            }
        }

        if report.attempted > 0 {
            tracing::info!(
                attempted = report.attempted,
                synced = report.synced,
                failed = report.failed,
                "Pending draft retry finished"
            );
        }
        Ok(report)
    }

    /// Delete a stored draft that is not being recorded.
    pub async fn delete_draft(&self, kind: DraftKind, id: &str) -> Result<(), AppError> {
        if self.active_draft_id().await.as_deref() == Some(id) {
            return Err(AppError::InvalidTransition {
                action: "delete a draft",
                phase: "still recording",
            });
        }

        let exists = match kind {
            DraftKind::Outdoor => self.outdoor.list_ids().await?.iter().any(|d| d == id),
            DraftKind::Indoor => self.indoor.list_ids().await?.iter().any(|d| d == id),
            DraftKind::Strength => self.strength.list_ids().await?.iter().any(|d| d == id),
        };
        if !exists {
            return Err(AppError::NotFound(format!("{} draft {}", kind.as_str(), id)));
        }

        match kind {
            DraftKind::Outdoor => self.outdoor.delete(id).await,
            DraftKind::Indoor => self.indoor.delete(id).await,
            DraftKind::Strength => self.strength.delete(id).await,
        }
    }

    // ─── Internals ───────────────────────────────────────────────

    fn new_draft_id(&self) -> Result<String, AppError> {
        let mut bytes = [0u8; 16];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Failed to generate draft id")))?;
        Ok(hex::encode(bytes))
    }

    fn current_snapshot(&self, slot: &Slot, now: DateTime<Utc>) -> Result<SessionSnapshot, AppError> {
        slot.active
            .as_ref()
            .map(|active| snapshot_of(active, now))
            .ok_or(AppError::NoActiveSession)
    }

    async fn after_sample(
        &self,
        slot: &mut Slot,
        outcome: &SampleOutcome,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if outcome.accepted {
            slot.unsaved_samples += 1;
        }
        self.checkpoint(slot, now, false).await
    }

    /// Save the active draft and record when forced or when the throttle is due.
    async fn checkpoint(&self, slot: &mut Slot, now: DateTime<Utc>, force: bool) -> Result<(), AppError> {
        let due = force
            || slot.unsaved_samples >= self.settings.save_every_samples
            || slot
                .last_saved_at
                .map_or(true, |saved| now - saved >= self.settings.save_interval);
        if !due {
            return Ok(());
        }
        let Some(active) = slot.active.as_ref() else {
            return Ok(());
        };

        match active {
            ActiveSession::Outdoor(s) => self.outdoor.save(&s.draft).await?,
            ActiveSession::Indoor(s) => self.indoor.save(&s.draft).await?,
            ActiveSession::Strength(s) => self.strength.save(&s.draft).await?,
        }
        self.store.set_json(keys::ACTIVE_SESSION, &active.record()).await?;

        tracing::debug!(
            session_id = active.draft_id(),
            unsaved_samples = slot.unsaved_samples,
            forced = force,
            "Draft checkpoint saved"
        );
        slot.last_saved_at = Some(now);
        slot.unsaved_samples = 0;
        Ok(())
    }

    async fn load_active(&self, record: &ActiveSessionRecord) -> Result<Option<ActiveSession>, AppError> {
        let clock = record.clock.clone();
        Ok(match record.mode.draft_kind() {
            DraftKind::Outdoor => self.outdoor.load(&record.draft_id).await?.map(|draft| {
                ActiveSession::Outdoor(OutdoorSession {
                    clock,
                    draft,
                    anchor: None,
                })
            }),
            DraftKind::Indoor => self.indoor.load(&record.draft_id).await?.map(|draft| {
                ActiveSession::Indoor(IndoorSession {
                    clock,
                    draft,
                })
            }),
            DraftKind::Strength => self
                .strength
                .load(&record.draft_id)
                .await?
                .map(|draft| ActiveSession::Strength(StrengthSession { clock, draft })),
        })
    }

    async fn sync_stored<D: Draft>(&self, drafts: &DraftStore<D>, id: &str) -> Result<UploadReport, AppError> {
        let draft = drafts
            .load(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} draft {}", D::KIND.as_str(), id)))?;
        self.upload_and_settle(drafts, draft).await
    }

    /// Upload a draft, then delete it on success or store its progress on failure.
    async fn upload_and_settle<D: Draft>(
        &self,
        drafts: &DraftStore<D>,
        mut draft: D,
    ) -> Result<UploadReport, AppError> {
        let id = draft.id().to_string();
        if !self.uploading.insert(id.clone()) {
            return Err(AppError::SyncInProgress(id));
        }

        let result = match upload_session(&self.backend, &draft, self.settings.sync_chunk_size).await {
            Ok(report) => drafts.delete(&id).await.map(|()| report),
            Err(failure) => {
                draft.set_sync_progress(failure.progress);
                match drafts.save(&draft).await {
                    Ok(()) => Err(failure.error),
                    Err(save_error) => {
                        tracing::error!(draft_id = %id, error = %save_error, "Failed to record upload progress");
                        Err(failure.error)
                    }
                }
            }
        };

        self.uploading.remove(&id);
        result
    }
}

// ─── Session helpers ─────────────────────────────────────────────

fn outdoor_mut(active: &mut Option<ActiveSession>) -> Result<&mut OutdoorSession, AppError> {
    match active.as_mut() {
        Some(ActiveSession::Outdoor(s)) => Ok(s),
        Some(other) => Err(AppError::WrongSessionKind(other.mode())),
        None => Err(AppError::NoActiveSession),
    }
}

fn strength_mut(active: &mut Option<ActiveSession>) -> Result<&mut StrengthSession, AppError> {
    match active.as_mut() {
        Some(ActiveSession::Strength(s)) => Ok(s),
        Some(other) => Err(AppError::WrongSessionKind(other.mode())),
        None => Err(AppError::NoActiveSession),
    }
}

fn accept_outdoor(session: &mut OutdoorSession, sample: OutdoorSample) -> SampleOutcome {
    let anchor = ingest::anchor_for(&sample);
    match ingest::append_outdoor_sample(&mut session.draft, sample) {
        Ok(accepted) => {
            session.anchor = Some(anchor);
            if accepted.new_splits > 0 {
                tracing::info!(
                    session_id = %session.draft.id,
                    seq = accepted.seq,
                    splits = session.draft.splits.len(),
                    "Kilometer split recorded"
                );
            }
            SampleOutcome::accepted(accepted)
        }
        Err(rejection) => log_rejection(&session.draft.id, rejection),
    }
}

fn log_rejection(session_id: &str, rejection: Rejection) -> SampleOutcome {
    tracing::warn!(session_id, reason = %rejection, "Skipping telemetry sample");
    SampleOutcome::skipped(rejection.to_string())
}

/// Credit treadmill time up to `now` at the current controls.
fn advance_treadmill(session: &mut IndoorSession, now: DateTime<Utc>) -> Option<Accepted> {
    if session.clock.phase() == Phase::Paused {
        return None;
    }
    let elapsed_s = session.clock.elapsed_at(now);
    let last = session.draft.samples.last();
    if last.is_some_and(|s| elapsed_s <= s.elapsed_s) {
        return None;
    }

    let sample = ingest::treadmill_tick(last, session.draft.controls, elapsed_s);
    match ingest::append_indoor_sample(&mut session.draft, sample) {
        Ok(accepted) => Some(accepted),
        Err(rejection) => {
            log_rejection(&session.draft.id, rejection);
            None
        }
    }
}

fn touch_strength_elapsed(active: &mut ActiveSession, now: DateTime<Utc>) {
    if let ActiveSession::Strength(s) = active {
        s.draft.elapsed_s = s.clock.elapsed_at(now);
    }
}

/// Record a manual lap ending at `elapsed_s` and the latest sample's distance.
fn record_lap(splits: &mut Vec<Split>, history: &[Progress], elapsed_s: f64) -> Option<Split> {
    let distance_m = history.last().map_or(0.0, |p| p.distance_m);
    let start = lap_start(splits, history);
    manual_split(splits, Progress::new(distance_m, elapsed_s), start).cloned()
}

/// Where the current lap began: the end of the latest split of either kind.
fn lap_start(splits: &[Split], history: &[Progress]) -> Progress {
    let Some(latest) = splits
        .iter()
        .max_by(|a, b| a.end_elapsed_s.total_cmp(&b.end_elapsed_s))
    else {
        return Progress::ZERO;
    };

    let distance_m = match latest.kind {
        SplitKind::AutoKm => latest.index as f64 * SPLIT_DISTANCE_M,
        SplitKind::Manual => history
            .iter()
            .rev()
            .find(|p| p.elapsed_s <= latest.end_elapsed_s)
            .map_or(0.0, |p| p.distance_m),
    };
    Progress::new(distance_m, latest.end_elapsed_s)
}

fn default_title(mode: SessionMode, started_at: DateTime<Utc>) -> String {
    let part_of_day = match started_at.with_timezone(&Local).hour() {
        5..=11 => "Morning",
        12..=16 => "Afternoon",
        17..=21 => "Evening",
        _ => "Night",
    };
    let activity = match (mode.draft_kind(), mode.activity()) {
        (DraftKind::Outdoor, Some(ActivityType::Run)) => "Run",
        (DraftKind::Outdoor, _) => "Walk",
        (DraftKind::Indoor, Some(ActivityType::Run)) => "Treadmill Run",
        (DraftKind::Indoor, _) => "Treadmill Walk",
        (DraftKind::Strength, _) => "Workout",
    };
    format!("{} {}", part_of_day, activity)
}

fn snapshot_of(active: &ActiveSession, now: DateTime<Utc>) -> SessionSnapshot {
    let elapsed_s = active.clock().elapsed_at(now);
    let (unit, started_at, distance_m, elevation_gain_m, current_speed_mps, sample_count, splits) =
        match active {
            ActiveSession::Outdoor(s) => (
                s.draft.unit,
                s.draft.started_at,
                s.draft.totals.distance_m,
                s.draft.totals.elevation_gain_m,
                s.draft.samples.last().and_then(|x| x.speed_mps),
                s.draft.samples.len(),
                s.draft.splits.clone(),
            ),
            ActiveSession::Indoor(s) => (
                s.draft.unit,
                s.draft.started_at,
                s.draft.totals.distance_m,
                s.draft.totals.elevation_gain_m,
                Some(s.draft.controls.speed_mps),
                s.draft.samples.len(),
                s.draft.splits.clone(),
            ),
            ActiveSession::Strength(s) => (
                DistanceUnit::default(),
                s.draft.started_at,
                0.0,
                0.0,
                None,
                s.draft.total_sets(),
                Vec::new(),
            ),
        };

    let current_pace_s_per_km = current_speed_mps.and_then(pace_from_speed);
    let avg_pace_s_per_km = if distance_m > 0.0 && elapsed_s > 0.0 {
        pace_from_speed(distance_m / elapsed_s)
    } else {
        None
    };

    SessionSnapshot {
        draft_id: active.draft_id().to_string(),
        mode: active.mode(),
        phase: active.phase(),
        title: active.title().to_string(),
        unit,
        started_at,
        elapsed_s,
        distance_m,
        elevation_gain_m,
        current_speed_mps,
        current_pace_s_per_km,
        avg_pace_s_per_km,
        sample_count,
        splits,
        controls: match active {
            ActiveSession::Indoor(s) => Some(s.draft.controls),
            _ => None,
        },
        exercises: match active {
            ActiveSession::Strength(s) => Some(s.draft.exercises.clone()),
            _ => None,
        },
        display: DisplayFields {
            elapsed: format_duration(elapsed_s),
            distance: format_distance(distance_m, unit),
            pace: format_pace(current_pace_s_per_km, unit),
            avg_pace: format_pace(avg_pace_s_per_km, unit),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(index: u32, kind: SplitKind, end_elapsed_s: f64) -> Split {
        Split {
            index,
            distance_m: 0.0,
            duration_s: 0.0,
            avg_pace_s_per_km: 0.0,
            start_elapsed_s: 0.0,
            end_elapsed_s,
            kind,
        }
    }

    #[test]
    fn test_lap_starts_at_latest_split() {
        let history = [
            Progress::new(500.0, 150.0),
            Progress::new(1100.0, 330.0),
            Progress::new(1400.0, 420.0),
        ];
        assert_eq!(lap_start(&[], &history), Progress::ZERO);

        let auto = [split(1, SplitKind::AutoKm, 300.0)];
        assert_eq!(lap_start(&auto, &history), Progress::new(1000.0, 300.0));

        let mixed = [split(1, SplitKind::AutoKm, 300.0), split(1, SplitKind::Manual, 400.0)];
        assert_eq!(lap_start(&mixed, &history), Progress::new(1100.0, 400.0));
    }

    #[test]
    fn test_record_lap_after_auto_split() {
        let history = [Progress::new(900.0, 270.0), Progress::new(1300.0, 390.0)];
        let mut splits = vec![split(1, SplitKind::AutoKm, 300.0)];
        let lap = record_lap(&mut splits, &history, 400.0).expect("lap");
        assert_eq!(lap.kind, SplitKind::Manual);
        assert_eq!(lap.index, 1);
        assert_eq!(lap.distance_m, 300.0);
        assert_eq!(lap.duration_s, 100.0);
    }

    #[test]
    fn test_settings_from_config() {
        let settings = RecorderSettings::from(&Config::test_default());
        assert_eq!(settings.save_every_samples, 10);
        assert_eq!(settings.save_interval, Duration::seconds(5));
        assert_eq!(settings.lock_max_age, Duration::hours(12));
    }
}
