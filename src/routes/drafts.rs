// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stored draft routes.

use crate::error::{AppError, Result};
use crate::models::DraftKind;
use crate::services::{DraftSummary, SyncReport};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/drafts", get(list_drafts))
        .route("/api/drafts/{kind}/{id}/sync", post(sync_draft))
        .route("/api/drafts/{kind}/{id}", delete(delete_draft))
}

async fn list_drafts(State(state): State<Arc<AppState>>) -> Result<Json<Vec<DraftSummary>>> {
    Ok(Json(state.recorder.list_drafts().await?))
}

async fn sync_draft(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Json<SyncReport>> {
    let kind: DraftKind = kind.parse().map_err(AppError::BadRequest)?;
    Ok(Json(state.recorder.sync_draft(kind, &id).await?))
}

async fn delete_draft(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<StatusCode> {
    let kind: DraftKind = kind.parse().map_err(AppError::BadRequest)?;
    state.recorder.delete_draft(kind, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
