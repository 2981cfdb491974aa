// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Chunked upload, partial failure and resume.

use common::{finished_outdoor_draft, start_options, t0, test_settings, FakeBackend};
use stride_recorder::db::LocalStore;
use stride_recorder::error::AppError;
use stride_recorder::models::{DraftKind, SessionMode, SyncProgress};
use stride_recorder::services::{upload_session, SessionController};

mod common;

fn controller_with_chunks(chunk_size: usize) -> SessionController<FakeBackend> {
    let mut settings = test_settings();
    settings.sync_chunk_size = chunk_size;
    SessionController::new(LocalStore::in_memory(), FakeBackend::default(), settings)
}

#[tokio::test]
async fn test_failed_chunk_stops_upload_and_keeps_draft() {
    let recorder = controller_with_chunks(2);
    recorder
        .outdoor_drafts()
        .save(&finished_outdoor_draft("d1", 5))
        .await
        .unwrap();
    recorder.backend().fail_rows_on(Some(1));

    let err = recorder.sync_draft(DraftKind::Outdoor, "d1").await.unwrap_err();
    assert!(matches!(err, AppError::Backend(_)));

    // Chunk 1 sent, chunk 2 attempted, chunk 3 never sent
    let backend = recorder.backend();
    assert_eq!(backend.session_count(), 1);
    let calls = backend.row_calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].1[0]["seq"], 0);
    assert_eq!(calls[1].1[0]["seq"], 2);

    let kept = recorder.outdoor_drafts().load("d1").await.unwrap().expect("draft kept");
    assert_eq!(
        kept.sync,
        Some(SyncProgress {
            remote_id: "remote-1".to_string(),
            rows_done: 2,
        })
    );
}

#[tokio::test]
async fn test_retry_resumes_after_acknowledged_chunks() {
    let recorder = controller_with_chunks(2);
    recorder
        .outdoor_drafts()
        .save(&finished_outdoor_draft("d1", 5))
        .await
        .unwrap();
    recorder.backend().fail_rows_on(Some(1));
    recorder.sync_draft(DraftKind::Outdoor, "d1").await.unwrap_err();

    recorder.backend().fail_rows_on(None);
    let report = recorder.sync_draft(DraftKind::Outdoor, "d1").await.unwrap();
    assert_eq!(report.remote_id, "remote-1");
    assert_eq!(report.rows, 5);
    assert_eq!(report.resumed_rows, 2);

    // No second summary insert; chunks 2 and 3 sent once more
    let backend = recorder.backend();
    assert_eq!(backend.session_count(), 1);
    let calls = backend.row_calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 4);
    assert_eq!(calls[2].1[0]["seq"], 2);
    assert_eq!(calls[3].1.len(), 1);
    assert!(calls
        .iter()
        .flat_map(|(_, rows)| rows.iter())
        .all(|row| row["session_id"] == "remote-1"));

    assert!(recorder.outdoor_drafts().load("d1").await.unwrap().is_none());
    assert!(recorder.outdoor_drafts().list_ids().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_resume_with_larger_chunks_uploads_every_row() {
    let backend = FakeBackend::default();
    let mut draft = finished_outdoor_draft("d4", 6);

    backend.fail_rows_on(Some(1));
    let failure = upload_session(&backend, &draft, 2).await.unwrap_err();
    assert_eq!(
        failure.progress,
        Some(SyncProgress {
            remote_id: "remote-1".to_string(),
            rows_done: 2,
        })
    );

    // Chunk size changed between attempts
    draft.sync = failure.progress;
    backend.fail_rows_on(None);
    let report = upload_session(&backend, &draft, 4).await.unwrap();
    assert_eq!(report.resumed_rows, 2);
    assert_eq!(report.chunks, 1);

    let calls = backend.row_calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 3);
    let resumed: Vec<i64> = calls[2].1.iter().map(|row| row["seq"].as_i64().unwrap()).collect();
    assert_eq!(resumed, vec![2, 3, 4, 5]);
    assert_eq!(backend.session_count(), 1);
}

#[tokio::test]
async fn test_summary_failure_records_no_progress() {
    let backend = FakeBackend::default();
    backend.fail_sessions(true);
    let draft = finished_outdoor_draft("d2", 3);

    let failure = upload_session(&backend, &draft, 500).await.unwrap_err();
    assert!(failure.progress.is_none());
    assert!(failure.error.is_retryable());
    assert_eq!(backend.row_call_count(), 0);
}

#[tokio::test]
async fn test_empty_draft_uploads_summary_only() {
    let backend = FakeBackend::default();
    let draft = finished_outdoor_draft("d3", 0);

    let report = upload_session(&backend, &draft, 500).await.unwrap();
    assert_eq!(report.rows, 0);
    assert_eq!(report.chunks, 0);
    assert_eq!(backend.session_count(), 1);
    assert_eq!(backend.row_call_count(), 0);
}

#[tokio::test]
async fn test_retry_pending_skips_active_draft() {
    let recorder = controller_with_chunks(500);
    recorder
        .outdoor_drafts()
        .save(&finished_outdoor_draft("orphan", 4))
        .await
        .unwrap();
    let active_id = recorder
        .start(start_options(SessionMode::OutdoorRun), t0())
        .await
        .unwrap()
        .draft_id;

    let report = recorder.retry_pending().await.unwrap();
    assert_eq!(report.attempted, 1);
    assert_eq!(report.synced, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(recorder.outdoor_drafts().list_ids().await.unwrap(), vec![active_id.clone()]);

    assert!(matches!(
        recorder.sync_draft(DraftKind::Outdoor, &active_id).await,
        Err(AppError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn test_sync_missing_draft_not_found() {
    let recorder = controller_with_chunks(500);
    assert!(matches!(
        recorder.sync_draft(DraftKind::Indoor, "nope").await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        recorder.delete_draft(DraftKind::Indoor, "nope").await,
        Err(AppError::NotFound(_))
    ));
}
