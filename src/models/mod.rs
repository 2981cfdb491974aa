// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the recorder.

pub mod draft;
pub mod lock;
pub mod sample;
pub mod session;
pub mod split;

pub use draft::{
    Draft, DraftKind, Exercise, IndoorDraft, OutdoorDraft, SessionTotals, StrengthDraft,
    StrengthSet, SyncProgress, TreadmillControls,
};
pub use lock::SessionLock;
pub use sample::{Coordinate, IndoorSample, LocationReading, OutdoorSample, Progress};
pub use session::{
    ActiveSession, ActiveSessionRecord, ActivityType, DistanceUnit, Phase, SessionClock,
    SessionMode,
};
pub use split::{Split, SplitKind};
