// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Daemon configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Directory holding drafts, the lock and the active session record
    pub data_dir: PathBuf,
    /// Base URL of the REST sync backend (e.g. `https://host/rest/v1`)
    pub backend_url: String,
    /// Origin of the UI shell allowed by CORS
    pub ui_origin: String,
    /// Local API port
    pub port: u16,

    // --- Recorder tuning ---
    /// Checkpoint the draft at least this often while recording
    pub draft_save_interval_secs: u64,
    /// Checkpoint the draft after this many new samples
    pub draft_save_every_samples: usize,
    /// Rows per sample insert request
    pub sync_chunk_size: usize,
    /// GPS fixes less accurate than this are skipped
    pub max_fix_accuracy_m: f64,
    /// Locks older than this are treated as abandoned
    pub lock_max_age_hours: i64,
    /// Treadmill tick cadence
    pub indoor_tick_secs: u64,

    // --- Secrets ---
    /// API key sent to the sync backend
    pub backend_api_key: String,
    /// Bearer token the UI must present on `/api` routes
    pub control_token: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            data_dir: env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            backend_url: env::var("BACKEND_URL")
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .map_err(|_| ConfigError::Missing("BACKEND_URL"))?,
            ui_origin: env::var("UI_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            port: parse_or("PORT", 8787)?,

            draft_save_interval_secs: parse_or("DRAFT_SAVE_INTERVAL_SECS", 5)?,
            draft_save_every_samples: parse_or("DRAFT_SAVE_EVERY_SAMPLES", 10)?,
            sync_chunk_size: parse_or("SYNC_CHUNK_SIZE", 500)?,
            max_fix_accuracy_m: parse_or("MAX_FIX_ACCURACY_M", 50.0)?,
            lock_max_age_hours: parse_or("LOCK_MAX_AGE_HOURS", 12)?,
            indoor_tick_secs: parse_or("INDOOR_TICK_SECS", 1)?,

            backend_api_key: env::var("BACKEND_API_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("BACKEND_API_KEY"))?,
            control_token: env::var("CONTROL_TOKEN")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("CONTROL_TOKEN"))?,
        })
    }

    /// Config for tests only: in-memory friendly values, no backend reachable.
    pub fn test_default() -> Self {
        Self {
            data_dir: PathBuf::from("./test-data"),
            backend_url: "http://127.0.0.1:9/rest/v1".to_string(),
            ui_origin: "http://localhost:5173".to_string(),
            port: 8787,
            draft_save_interval_secs: 5,
            draft_save_every_samples: 10,
            sync_chunk_size: 500,
            max_fix_accuracy_m: 50.0,
            lock_max_age_hours: 12,
            indoor_tick_secs: 1,
            backend_api_key: "test_api_key".to_string(),
            control_token: "test_control_token".to_string(),
        }
    }
}

/// Read an optional variable, falling back to `default` when unset.
fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, raw)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        // Set required env vars for test
        env::set_var("BACKEND_URL", "https://example.test/rest/v1/");
        env::set_var("BACKEND_API_KEY", "test_key");
        env::set_var("CONTROL_TOKEN", "test_token");
        env::set_var("SYNC_CHUNK_SIZE", "250");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.backend_url, "https://example.test/rest/v1");
        assert_eq!(config.backend_api_key, "test_key");
        assert_eq!(config.sync_chunk_size, 250);
        assert_eq!(config.lock_max_age_hours, 12);

        env::set_var("SYNC_CHUNK_SIZE", "lots");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("SYNC_CHUNK_SIZE", _)));
        env::remove_var("SYNC_CHUNK_SIZE");
    }
}
