// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session lock expiry and recovery.

use chrono::Duration;
use common::{at, start_options, t0, test_controller, test_settings, FakeBackend};
use stride_recorder::db::LocalStore;
use stride_recorder::models::SessionMode;
use stride_recorder::services::{SessionController, SessionLockStore};

mod common;

#[tokio::test]
async fn test_lock_older_than_twelve_hours_cleared() {
    let store = LocalStore::in_memory();
    let locks = SessionLockStore::new(store.clone(), Duration::hours(12));
    locks.acquire(SessionMode::OutdoorRun, t0()).await.unwrap();

    let read = locks
        .read(Some(SessionMode::OutdoorRun), t0() + Duration::hours(13))
        .await
        .unwrap();
    assert!(read.is_none());
    assert!(store.get("session_lock").await.unwrap().is_none());
}

#[tokio::test]
async fn test_lock_without_session_cleared() {
    let store = LocalStore::in_memory();
    let locks = SessionLockStore::new(store.clone(), Duration::hours(12));
    locks.acquire(SessionMode::Strength, t0()).await.unwrap();

    let read = locks.read(None, t0() + Duration::hours(1)).await.unwrap();
    assert!(read.is_none());
    assert!(store.get("session_lock").await.unwrap().is_none());
}

#[tokio::test]
async fn test_orphaned_lock_does_not_block_start() {
    let recorder = test_controller();
    recorder
        .lock_store()
        .acquire(SessionMode::IndoorRun, t0())
        .await
        .unwrap();

    let snapshot = recorder
        .start(start_options(SessionMode::OutdoorRun), at(60))
        .await
        .unwrap();
    assert_eq!(snapshot.mode, SessionMode::OutdoorRun);

    let lock = recorder
        .lock_store()
        .read(Some(SessionMode::OutdoorRun), at(61))
        .await
        .unwrap()
        .expect("lock held");
    assert_eq!(lock.started_at, at(60));
}

#[tokio::test]
async fn test_restore_abandons_stale_session() {
    let store = LocalStore::in_memory();
    let first = SessionController::new(store.clone(), FakeBackend::default(), test_settings());
    let id = first
        .start(start_options(SessionMode::OutdoorWalk), t0())
        .await
        .unwrap()
        .draft_id;
    drop(first);

    let second = SessionController::new(store.clone(), FakeBackend::default(), test_settings());
    let restored = second.restore(t0() + Duration::hours(13)).await.unwrap();
    assert!(restored.is_none());
    assert!(store.get("session_lock").await.unwrap().is_none());

    // The draft itself is kept for upload
    assert_eq!(second.outdoor_drafts().list_ids().await.unwrap(), vec![id]);
}
