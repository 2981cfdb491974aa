// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! String key-value store standing in for device storage.
//!
//! Two backends:
//! - Directory: one JSON file per key, replaced atomically via rename
//! - Memory: process-local map, used by tests and ephemeral runs
//!
//! Writes through one store are serialized. Callers that read a value and
//! write it back hold a [`StoreWriter`] across both steps.

use crate::error::AppError;
use dashmap::DashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Local key-value store.
#[derive(Clone)]
pub struct LocalStore {
    backend: Backend,
    writes: Arc<Mutex<()>>,
}

#[derive(Clone)]
enum Backend {
    Memory(Arc<DashMap<String, String>>),
    Directory(PathBuf),
}

impl LocalStore {
    /// Open (creating if needed) a directory-backed store.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, AppError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            AppError::Storage(format!("Failed to create {}: {}", dir.display(), e))
        })?;

        tracing::info!(path = %dir.display(), "Opened local store");

        Ok(Self {
            backend: Backend::Directory(dir),
            writes: Arc::new(Mutex::new(())),
        })
    }

    /// Create an in-memory store. Contents are lost on drop.
    pub fn in_memory() -> Self {
        Self {
            backend: Backend::Memory(Arc::new(DashMap::new())),
            writes: Arc::new(Mutex::new(())),
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        match &self.backend {
            Backend::Memory(map) => Ok(map.get(key).map(|v| v.value().clone())),
            Backend::Directory(dir) => match tokio::fs::read_to_string(key_path(dir, key)).await {
                Ok(value) => Ok(Some(value)),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
                Err(e) => Err(AppError::Storage(format!("Failed to read {}: {}", key, e))),
            },
        }
    }

    /// Exclusive write access until the returned writer is dropped.
    pub async fn writer(&self) -> StoreWriter<'_> {
        StoreWriter {
            store: self,
            _guard: self.writes.lock().await,
        }
    }

    /// Overwrite `key`.
    pub async fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        self.writer().await.set(key, value).await
    }

    /// Remove `key`. Removing a missing key is not an error.
    pub async fn remove(&self, key: &str) -> Result<(), AppError> {
        self.writer().await.remove(key).await
    }

    /// Read and parse a JSON value. Unparsable data is logged and treated as absent.
    pub async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, AppError> {
        let Some(raw) = self.get(key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(key, error = %e, "Ignoring malformed stored value");
                Ok(None)
            }
        }
    }

    pub async fn set_json<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<(), AppError> {
        self.writer().await.set_json(key, value).await
    }
}

/// Holds the store's write lock. Obtained from [`LocalStore::writer`].
pub struct StoreWriter<'a> {
    store: &'a LocalStore,
    _guard: MutexGuard<'a, ()>,
}

impl StoreWriter<'_> {
    pub async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, AppError> {
        self.store.get_json(key).await
    }

    /// Directory writes go through a temp file so a crash mid-write never
    /// leaves a truncated value behind.
    pub async fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        match &self.store.backend {
            Backend::Memory(map) => {
                map.insert(key.to_string(), value.to_string());
                Ok(())
            }
            Backend::Directory(dir) => {
                let path = key_path(dir, key);
                let tmp = tmp_path(&path);
                if let Err(e) = tokio::fs::write(&tmp, value).await {
                    let _ = tokio::fs::remove_file(&tmp).await;
                    return Err(AppError::Storage(format!("Failed to write {}: {}", key, e)));
                }
                tokio::fs::rename(&tmp, &path)
                    .await
                    .map_err(|e| AppError::Storage(format!("Failed to commit {}: {}", key, e)))
            }
        }
    }

    pub async fn set_json<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<(), AppError> {
        let raw = serde_json::to_string(value)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to encode {}: {}", key, e)))?;
        self.set(key, &raw).await
    }

    pub async fn remove(&self, key: &str) -> Result<(), AppError> {
        match &self.store.backend {
            Backend::Memory(map) => {
                map.remove(key);
                Ok(())
            }
            Backend::Directory(dir) => match tokio::fs::remove_file(key_path(dir, key)).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(AppError::Storage(format!("Failed to remove {}: {}", key, e))),
            },
        }
    }
}

/// Keys contain `:` so they are percent-encoded into file names.
fn key_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{}.json", urlencoding::encode(key)))
}

/// Unique per write and per process.
fn tmp_path(path: &Path) -> PathBuf {
    let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    path.with_extension(format!("json.{}.{}.tmp", std::process::id(), n))
}
