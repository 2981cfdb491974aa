// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Upload of a finished draft to the remote backend.
//!
//! Two steps:
//! 1. Insert the summary row, obtaining the backend session id
//! 2. Insert the child rows tagged with that id, in fixed-size chunks
//!
//! A failure stops the upload at that point. The progress made so far is
//! returned with the error so the caller can store it on the draft, and the
//! next attempt picks up where this one stopped.

use crate::error::AppError;
use crate::models::{Draft, SyncProgress};
use crate::services::backend::RemoteBackend;
use serde_json::Value;

/// Outcome of a completed upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadReport {
    pub remote_id: String,
    pub rows: usize,
    /// Chunks sent by this attempt
    pub chunks: usize,
    /// Rows skipped because an earlier attempt already uploaded them
    pub resumed_rows: usize,
}

/// An upload that stopped partway.
#[derive(Debug, thiserror::Error)]
#[error("upload stopped: {error}")]
pub struct SyncFailure {
    /// `None` when the summary insert itself failed
    pub progress: Option<SyncProgress>,
    #[source]
    pub error: AppError,
}

/// Upload `draft`, resuming from its stored sync progress.
pub async fn upload_session<D, B>(
    backend: &B,
    draft: &D,
    chunk_size: usize,
) -> Result<UploadReport, SyncFailure>
where
    D: Draft,
    B: RemoteBackend,
{
    let kind = D::KIND;
    let chunk_size = chunk_size.max(1);

    let fail = |progress: Option<SyncProgress>, error: AppError| SyncFailure { progress, error };
    let encode_error =
        |e: serde_json::Error| AppError::Internal(anyhow::anyhow!("Failed to encode draft: {}", e));

    let mut progress = match draft.sync_progress() {
        Some(p) => {
            tracing::info!(
                draft_id = draft.id(),
                remote_id = %p.remote_id,
                rows_done = p.rows_done,
                "Resuming upload"
            );
            p.clone()
        }
        None => {
            let summary = draft.summary_row().map_err(|e| fail(None, encode_error(e)))?;
            let remote_id = backend
                .insert_session(kind.session_table(), &summary)
                .await
                .map_err(|e| fail(None, e))?;
            tracing::debug!(draft_id = draft.id(), remote_id = %remote_id, "Inserted session summary");
            SyncProgress {
                remote_id,
                rows_done: 0,
            }
        }
    };

    let rows = draft
        .upload_rows()
        .map_err(|e| fail(Some(progress.clone()), encode_error(e)))?;
    let resumed_rows = progress.rows_done.min(rows.len());
    let session_id = Value::String(progress.remote_id.clone());
    let mut chunks = 0;

    for chunk in rows[resumed_rows..].chunks(chunk_size) {
        let tagged: Vec<Value> = chunk
            .iter()
            .cloned()
            .map(|mut row| {
                if let Value::Object(fields) = &mut row {
                    fields.insert("session_id".to_string(), session_id.clone());
                }
                row
            })
            .collect();

        if let Err(error) = backend.insert_rows(kind.row_table(), &tagged).await {
            tracing::warn!(
                draft_id = draft.id(),
                first_row = progress.rows_done,
                rows = tagged.len(),
                error = %error,
                "Chunk upload failed"
            );
            return Err(fail(Some(progress), error));
        }
        progress.rows_done += chunk.len();
        chunks += 1;
    }

    tracing::info!(
        kind = kind.as_str(),
        draft_id = draft.id(),
        remote_id = %progress.remote_id,
        rows = rows.len(),
        chunks,
        resumed_rows,
        "Session uploaded"
    );

    Ok(UploadReport {
        remote_id: progress.remote_id,
        rows: rows.len(),
        chunks,
        resumed_rows,
    })
}
