// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Stride recorder: live run, walk and workout recording.
//!
//! This crate records an in-progress session from GPS fixes or treadmill
//! ticks, checkpoints it locally so it survives restarts, and uploads the
//! finished session to the sync backend.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use services::SessionController;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub recorder: SessionController,
}
