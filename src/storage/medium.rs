// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Persistence media for the string cache
//!
//! A medium stores one opaque blob per namespace. The cache layer above decides
//! what goes in the blob.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, OnceLock, PoisonError};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

#[derive(Debug, Error)]
pub enum MediumError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error on {path}: {reason}")]
    Io { path: String, reason: String },
}

/// Read-modify-write step for [`StorageMedium::update`]. Receives the current
/// blob and returns the replacement, or `None` to leave the blob unchanged.
pub type BlobUpdate = Box<dyn FnOnce(Option<String>) -> Option<String> + Send>;

#[async_trait]
pub trait StorageMedium: Send + Sync {
    async fn read(&self, namespace: &str) -> Result<Option<String>, MediumError>;
    async fn write(&self, namespace: &str, blob: String) -> Result<(), MediumError>;
    async fn delete(&self, namespace: &str) -> Result<(), MediumError>;

    /// Apply `update` to the namespace blob atomically. Concurrent updates of
    /// the same stored data never interleave, whichever handle issues them.
    async fn update(&self, namespace: &str, update: BlobUpdate) -> Result<(), MediumError>;
}

/// Process-local medium
#[derive(Clone, Default)]
pub struct MemoryMedium {
    blobs: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw blob for a namespace, bypassing the cache layer
    pub async fn raw(&self, namespace: &str) -> Option<String> {
        self.blobs.read().await.get(namespace).cloned()
    }

    /// Overwrite a namespace blob directly (used to simulate corruption)
    pub async fn put_raw(&self, namespace: &str, blob: impl Into<String>) {
        self.blobs
            .write()
            .await
            .insert(namespace.to_string(), blob.into());
    }
}

#[async_trait]
impl StorageMedium for MemoryMedium {
    async fn read(&self, namespace: &str) -> Result<Option<String>, MediumError> {
        Ok(self.blobs.read().await.get(namespace).cloned())
    }

    async fn write(&self, namespace: &str, blob: String) -> Result<(), MediumError> {
        self.blobs.write().await.insert(namespace.to_string(), blob);
        Ok(())
    }

    async fn delete(&self, namespace: &str) -> Result<(), MediumError> {
        self.blobs.write().await.remove(namespace);
        Ok(())
    }

    async fn update(&self, namespace: &str, update: BlobUpdate) -> Result<(), MediumError> {
        let mut blobs = self.blobs.write().await;
        if let Some(next) = update(blobs.get(namespace).cloned()) {
            blobs.insert(namespace.to_string(), next);
        }
        Ok(())
    }
}

/// Durable medium: `<dir>/<namespace>.json`, replaced atomically on write
#[derive(Clone, Debug)]
pub struct FileMedium {
    dir: PathBuf,
}

impl FileMedium {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, namespace: &str) -> PathBuf {
        let file_name: String = namespace
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", file_name))
    }
}

fn io_error(path: &Path, err: std::io::Error) -> MediumError {
    MediumError::Io {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

/// Process-wide lock for one blob file, shared by every `FileMedium` handle
fn file_lock(path: &Path) -> Arc<Mutex<()>> {
    static LOCKS: OnceLock<StdMutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();
    let mut locks = LOCKS
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    locks.entry(path.to_path_buf()).or_default().clone()
}

async fn read_file(path: &Path) -> Result<Option<String>, MediumError> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_error(path, e)),
    }
}

async fn replace_file(dir: &Path, path: &Path, blob: String) -> Result<(), MediumError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| io_error(dir, e))?;

    let tmp = path.with_extension(format!("json.{}.tmp", uuid::Uuid::new_v4().simple()));
    tokio::fs::write(&tmp, blob)
        .await
        .map_err(|e| io_error(&tmp, e))?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(io_error(path, e));
    }
    Ok(())
}

#[async_trait]
impl StorageMedium for FileMedium {
    async fn read(&self, namespace: &str) -> Result<Option<String>, MediumError> {
        read_file(&self.path_for(namespace)).await
    }

    async fn write(&self, namespace: &str, blob: String) -> Result<(), MediumError> {
        let path = self.path_for(namespace);
        let lock = file_lock(&path);
        let _guard = lock.lock().await;
        replace_file(&self.dir, &path, blob).await
    }

    async fn delete(&self, namespace: &str) -> Result<(), MediumError> {
        let path = self.path_for(namespace);
        let lock = file_lock(&path);
        let _guard = lock.lock().await;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    async fn update(&self, namespace: &str, update: BlobUpdate) -> Result<(), MediumError> {
        let path = self.path_for(namespace);
        let lock = file_lock(&path);
        let _guard = lock.lock().await;
        let current = read_file(&path).await?;
        match update(current) {
            Some(next) => replace_file(&self.dir, &path, next).await,
            None => Ok(()),
        }
    }
}

/// Medium for environments without storage; every call fails
#[derive(Clone, Copy, Debug, Default)]
pub struct UnavailableMedium;

#[async_trait]
impl StorageMedium for UnavailableMedium {
    async fn read(&self, _namespace: &str) -> Result<Option<String>, MediumError> {
        Err(MediumError::Unavailable("no storage medium".to_string()))
    }

    async fn write(&self, _namespace: &str, _blob: String) -> Result<(), MediumError> {
        Err(MediumError::Unavailable("no storage medium".to_string()))
    }

    async fn delete(&self, _namespace: &str) -> Result<(), MediumError> {
        Err(MediumError::Unavailable("no storage medium".to_string()))
    }

    async fn update(&self, _namespace: &str, _update: BlobUpdate) -> Result<(), MediumError> {
        Err(MediumError::Unavailable("no storage medium".to_string()))
    }
}
