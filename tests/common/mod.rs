// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use stride_recorder::config::Config;
use stride_recorder::db::LocalStore;
use stride_recorder::error::AppError;
use stride_recorder::models::{
    ActivityType, DistanceUnit, OutdoorDraft, OutdoorSample, SessionMode, SessionTotals,
};
use stride_recorder::routes::create_router;
use stride_recorder::services::{
    RecorderSettings, RemoteBackend, RestBackend, SessionController, StartOptions,
};
use stride_recorder::AppState;

/// Fixed start time for deterministic clocks.
#[allow(dead_code)]
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 1, 6, 0, 0).unwrap()
}

#[allow(dead_code)]
pub fn at(seconds: i64) -> DateTime<Utc> {
    t0() + Duration::seconds(seconds)
}

/// Create a test app with an in-memory store.
/// The backend URL points at a closed port, so uploads fail fast.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();
    let backend = RestBackend::new(&config.backend_url, &config.backend_api_key)
        .expect("Failed to build backend client");
    let recorder = SessionController::new(
        LocalStore::in_memory(),
        backend,
        RecorderSettings::from(&config),
    );

    let state = Arc::new(AppState { config, recorder });
    (create_router(state.clone()), state)
}

/// Backend double that records every call and can be told to fail.
#[derive(Default)]
pub struct FakeBackend {
    pub sessions: Mutex<Vec<(String, Value)>>,
    /// Every `insert_rows` attempt, including failed ones
    pub row_calls: Mutex<Vec<(String, Vec<Value>)>>,
    /// Zero-based `insert_rows` call that should fail
    pub fail_row_call: Mutex<Option<usize>>,
    pub fail_session_insert: AtomicBool,
}

#[allow(dead_code)]
impl FakeBackend {
    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn row_call_count(&self) -> usize {
        self.row_calls.lock().unwrap().len()
    }

    pub fn fail_rows_on(&self, call: Option<usize>) {
        *self.fail_row_call.lock().unwrap() = call;
    }

    pub fn fail_sessions(&self, fail: bool) {
        self.fail_session_insert.store(fail, Ordering::SeqCst);
    }
}

impl RemoteBackend for FakeBackend {
    async fn insert_session(&self, table: &str, row: &Value) -> Result<String, AppError> {
        if self.fail_session_insert.load(Ordering::SeqCst) {
            return Err(AppError::Backend("HTTP 503 Service Unavailable".to_string()));
        }
        let mut sessions = self.sessions.lock().unwrap();
        sessions.push((table.to_string(), row.clone()));
        Ok(format!("remote-{}", sessions.len()))
    }

    async fn insert_rows(&self, table: &str, rows: &[Value]) -> Result<(), AppError> {
        let mut calls = self.row_calls.lock().unwrap();
        let call = calls.len();
        calls.push((table.to_string(), rows.to_vec()));
        if *self.fail_row_call.lock().unwrap() == Some(call) {
            return Err(AppError::Backend("HTTP 500 Internal Server Error".to_string()));
        }
        Ok(())
    }
}

/// Settings matching `Config::test_default()`.
#[allow(dead_code)]
pub fn test_settings() -> RecorderSettings {
    RecorderSettings::from(&Config::test_default())
}

/// Controller over an in-memory store and a fake backend.
#[allow(dead_code)]
pub fn test_controller() -> SessionController<FakeBackend> {
    SessionController::new(LocalStore::in_memory(), FakeBackend::default(), test_settings())
}

#[allow(dead_code)]
pub fn start_options(mode: SessionMode) -> StartOptions {
    StartOptions {
        mode,
        title: None,
        unit: DistanceUnit::Km,
    }
}

/// A moving outdoor sample at the given cumulative distance and elapsed time.
#[allow(dead_code)]
pub fn outdoor_sample(seq: u32, distance_m: f64, elapsed_s: f64) -> OutdoorSample {
    OutdoorSample {
        seq,
        recorded_at: t0() + Duration::milliseconds((elapsed_s * 1000.0) as i64),
        elapsed_s,
        lat: 37.3861 + distance_m / 111_195.0,
        lon: -122.0839,
        altitude_m: Some(30.0),
        accuracy_m: Some(4.0),
        speed_mps: Some(3.4),
        bearing_deg: Some(0.0),
        distance_m,
        is_moving: true,
    }
}

/// A finished outdoor draft with `samples` evenly spaced samples.
#[allow(dead_code)]
pub fn finished_outdoor_draft(id: &str, samples: u32) -> OutdoorDraft {
    let samples: Vec<OutdoorSample> = (0..samples)
        .map(|seq| outdoor_sample(seq, seq as f64 * 10.0, seq as f64 * 3.0))
        .collect();
    let (distance_m, elapsed_s) = samples
        .last()
        .map_or((0.0, 0.0), |s| (s.distance_m, s.elapsed_s));

    OutdoorDraft {
        id: id.to_string(),
        created_at: t0(),
        started_at: t0(),
        ended_at: Some(t0() + Duration::seconds(elapsed_s as i64)),
        activity: ActivityType::Run,
        unit: DistanceUnit::Km,
        title: "Morning Run".to_string(),
        totals: SessionTotals::from_progress(elapsed_s, distance_m, 0.0),
        splits: Vec::new(),
        samples,
        sync: None,
    }
}
