// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Active session commands.

use crate::error::{AppError, Result};
use crate::models::{
    Coordinate, DistanceUnit, LocationReading, SessionMode, Split, StrengthSet, TreadmillControls,
};
use crate::services::{FinishReport, SampleOutcome, SessionSnapshot, StartOptions};
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

/// Session routes (require the control token).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/session", get(get_session))
        .route("/api/session/start", post(start))
        .route("/api/session/pause", post(pause))
        .route("/api/session/resume", post(resume))
        .route("/api/session/finish", post(finish))
        .route("/api/session/discard", post(discard))
        .route("/api/session/location", post(location))
        .route("/api/session/lap", post(lap))
        .route("/api/session/treadmill", put(treadmill))
        .route("/api/session/exercises", post(add_exercise))
        .route("/api/session/exercises/{index}/sets", post(log_set))
}

/// Reject a request body that fails its field constraints.
pub(crate) fn validated<T: Validate>(body: T) -> Result<T> {
    body.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    Ok(body)
}

// ─── Lifecycle ───────────────────────────────────────────────

#[derive(Serialize)]
pub struct SessionResponse {
    pub session: Option<SessionSnapshot>,
}

async fn get_session(State(state): State<Arc<AppState>>) -> Json<SessionResponse> {
    Json(SessionResponse {
        session: state.recorder.snapshot(Utc::now()).await,
    })
}

#[derive(Debug, Deserialize, Validate)]
pub struct StartRequest {
    pub mode: SessionMode,
    #[validate(length(max = 120))]
    pub title: Option<String>,
    #[serde(default)]
    pub unit: DistanceUnit,
}

async fn start(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StartRequest>,
) -> Result<Json<SessionSnapshot>> {
    let body = validated(body)?;
    let options = StartOptions {
        mode: body.mode,
        title: body.title,
        unit: body.unit,
    };
    Ok(Json(state.recorder.start(options, Utc::now()).await?))
}

async fn pause(State(state): State<Arc<AppState>>) -> Result<Json<SessionSnapshot>> {
    Ok(Json(state.recorder.pause(Utc::now()).await?))
}

async fn resume(State(state): State<Arc<AppState>>) -> Result<Json<SessionSnapshot>> {
    Ok(Json(state.recorder.resume(Utc::now()).await?))
}

async fn finish(State(state): State<Arc<AppState>>) -> Result<Json<FinishReport>> {
    Ok(Json(state.recorder.finish(Utc::now()).await?))
}

#[derive(Serialize)]
pub struct DiscardResponse {
    pub draft_id: String,
}

async fn discard(State(state): State<Arc<AppState>>) -> Result<Json<DiscardResponse>> {
    let draft_id = state.recorder.discard().await?;
    Ok(Json(DiscardResponse { draft_id }))
}

// ─── Telemetry ───────────────────────────────────────────────

/// One fix from the location provider.
#[derive(Debug, Deserialize, Validate)]
pub struct LocationRequest {
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub lon: f64,
    pub altitude_m: Option<f64>,
    #[validate(range(min = 0.0))]
    pub accuracy_m: Option<f64>,
    #[validate(range(min = 0.0))]
    pub speed_mps: Option<f64>,
    pub bearing_deg: Option<f64>,
    /// Fix time; defaults to arrival time
    pub timestamp: Option<DateTime<Utc>>,
}

async fn location(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LocationRequest>,
) -> Result<Json<SampleOutcome>> {
    let body = validated(body)?;
    let now = Utc::now();
    let reading = LocationReading {
        coordinate: Coordinate::new(body.lat, body.lon),
        altitude_m: body.altitude_m,
        accuracy_m: body.accuracy_m,
        speed_mps: body.speed_mps,
        bearing_deg: body.bearing_deg,
        timestamp: body.timestamp.unwrap_or(now),
    };
    Ok(Json(state.recorder.ingest_location(reading, now).await?))
}

#[derive(Serialize)]
pub struct LapResponse {
    pub split: Option<Split>,
}

async fn lap(State(state): State<Arc<AppState>>) -> Result<Json<LapResponse>> {
    let split = state.recorder.lap(Utc::now()).await?;
    Ok(Json(LapResponse { split }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct TreadmillRequest {
    #[validate(range(min = 0.0, max = 12.0))]
    pub speed_mps: f64,
    #[validate(range(min = -5.0, max = 30.0))]
    #[serde(default)]
    pub incline_deg: f64,
}

async fn treadmill(
    State(state): State<Arc<AppState>>,
    Json(body): Json<TreadmillRequest>,
) -> Result<Json<SessionSnapshot>> {
    let body = validated(body)?;
    let controls = TreadmillControls {
        speed_mps: body.speed_mps,
        incline_deg: body.incline_deg,
    };
    Ok(Json(state.recorder.set_treadmill(controls, Utc::now()).await?))
}

// ─── Strength ────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct ExerciseRequest {
    #[validate(length(min = 1, max = 80))]
    pub name: String,
}

#[derive(Serialize)]
pub struct ExerciseResponse {
    pub index: usize,
}

async fn add_exercise(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ExerciseRequest>,
) -> Result<Json<ExerciseResponse>> {
    let body = validated(body)?;
    let index = state.recorder.add_exercise(&body.name, Utc::now()).await?;
    Ok(Json(ExerciseResponse { index }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetRequest {
    #[validate(range(min = 1, max = 1000))]
    pub reps: u32,
    #[validate(range(min = 0.0, max = 1000.0))]
    pub weight_kg: Option<f64>,
}

async fn log_set(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
    Json(body): Json<SetRequest>,
) -> Result<Json<StrengthSet>> {
    let body = validated(body)?;
    let set = state
        .recorder
        .log_set(index, body.reps, body.weight_kg, Utc::now())
        .await?;
    Ok(Json(set))
}
