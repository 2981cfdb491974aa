// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stride recorder daemon
//!
//! Records the active run, walk or workout for the local UI shell and
//! uploads finished sessions to the sync backend.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use stride_recorder::{
    config::Config,
    db::LocalStore,
    services::{RecorderSettings, RestBackend, SessionController},
    AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting stride recorder");

    let store = LocalStore::open(&config.data_dir)
        .await
        .expect("Failed to open local store");

    let backend = RestBackend::new(&config.backend_url, &config.backend_api_key)
        .expect("Failed to initialize sync backend client");
    tracing::info!(url = %config.backend_url, "Sync backend configured");

    let recorder = SessionController::new(store, backend, RecorderSettings::from(&config));

    // Pick up a session interrupted by a crash or restart
    match recorder.restore(Utc::now()).await {
        Ok(Some(snapshot)) => tracing::info!(
            session_id = %snapshot.draft_id,
            mode = %snapshot.mode,
            "Resuming interrupted session"
        ),
        Ok(None) => {}
        Err(e) => tracing::error!(error = %e, "Failed to restore active session"),
    }

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        recorder,
    });

    // Upload drafts left over from earlier runs
    let retry_state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = retry_state.recorder.retry_pending().await {
            tracing::error!(error = %e, "Pending draft retry failed");
        }
    });

    // Drive treadmill sessions
    let tick_state = state.clone();
    let tick_every = Duration::from_secs(config.indoor_tick_secs.max(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick_every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            if let Err(e) = tick_state.recorder.tick_indoor(Utc::now()).await {
                tracing::warn!(error = %e, "Treadmill tick failed");
            }
        }
    });

    // Build router
    let app = stride_recorder::routes::create_router(state);

    // Start server (local UI shell only)
    let addr = format!("127.0.0.1:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("stride_recorder=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
