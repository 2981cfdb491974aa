// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session lock record.

use crate::models::session::SessionMode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Marks that a recording of `mode` has been in progress since `started_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionLock {
    pub mode: SessionMode,
    pub started_at: DateTime<Utc>,
}
