// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - recording and sync logic.

pub mod backend;
pub mod geo;
pub mod ingest;
pub mod lock;
pub mod recorder;
pub mod splits;
pub mod sync;

pub use backend::{RemoteBackend, RestBackend};
pub use lock::SessionLockStore;
pub use recorder::{
    DraftSummary, FinishReport, RecorderSettings, RetryReport, SampleOutcome, SessionController,
    SessionSnapshot, StartOptions, SyncReport,
};
pub use sync::{upload_session, SyncFailure, UploadReport};
