// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Advisory lock marking that a recording is in progress.
//!
//! The lock is only trusted while it agrees with the active session. Stale,
//! orphaned or unreadable locks are cleared on read.

use crate::db::{keys, LocalStore};
use crate::error::AppError;
use crate::models::{SessionLock, SessionMode};
use chrono::{DateTime, Duration, Utc};

#[derive(Clone)]
pub struct SessionLockStore {
    store: LocalStore,
    max_age: Duration,
}

impl SessionLockStore {
    pub fn new(store: LocalStore, max_age: Duration) -> Self {
        Self { store, max_age }
    }

    pub async fn acquire(&self, mode: SessionMode, now: DateTime<Utc>) -> Result<SessionLock, AppError> {
        let lock = SessionLock {
            mode,
            started_at: now,
        };
        self.store.set_json(keys::SESSION_LOCK, &lock).await?;
        tracing::debug!(mode = %mode, "Acquired session lock");
        Ok(lock)
    }

    /// Current lock, if it is still valid for `active_mode`.
    ///
    /// Clears the stored lock and returns `None` when it is malformed, older
    /// than the max age, there is no active session, or the modes disagree.
    pub async fn read(
        &self,
        active_mode: Option<SessionMode>,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionLock>, AppError> {
        if self.store.get(keys::SESSION_LOCK).await?.is_none() {
            return Ok(None);
        }

        let Some(lock) = self.store.get_json::<SessionLock>(keys::SESSION_LOCK).await? else {
            self.release().await?;
            return Ok(None);
        };

        let reason = if now - lock.started_at > self.max_age {
            Some("expired")
        } else {
            match active_mode {
                None => Some("no active session"),
                Some(mode) if mode != lock.mode => Some("mode mismatch"),
                Some(_) => None,
            }
        };

        match reason {
            Some(reason) => {
                tracing::info!(mode = %lock.mode, reason, "Clearing stale session lock");
                self.release().await?;
                Ok(None)
            }
            None => Ok(Some(lock)),
        }
    }

    pub async fn release(&self) -> Result<(), AppError> {
        self.store.remove(keys::SESSION_LOCK).await
    }
}
