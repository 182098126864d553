//! Session-scoped storage for the visit cache.
//!
//! The cache is always read and written as a whole map, the same way the
//! browser's session storage hands back a single `cbgr` object.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::config::Config;
use crate::models::{HostnameEntry, VisitCache};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Whole-map storage substrate for the visit cache
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self) -> Result<VisitCache, StoreError>;

    async fn set(&self, cache: VisitCache) -> Result<(), StoreError>;

    /// Look up one hostname
    async fn entry(&self, hostname: &str) -> Result<Option<HostnameEntry>, StoreError> {
        Ok(self.get().await?.remove(hostname))
    }
}

/// Empty the cache, as done when the extension is installed or reloaded
pub async fn reset_on_install(store: &dyn SessionStore) -> Result<(), StoreError> {
    tracing::info!(key = Config::SESSION_KEY, "resetting visit cache");
    store.set(VisitCache::new()).await
}

/// Process-lifetime store
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    cache: Mutex<VisitCache>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self) -> Result<VisitCache, StoreError> {
        Ok(self.cache.lock().clone())
    }

    async fn set(&self, cache: VisitCache) -> Result<(), StoreError> {
        *self.cache.lock() = cache;
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionFile {
    #[serde(default)]
    cbgr: VisitCache,
}

/// Store kept in a JSON file so separate CLI runs share one session.
///
/// The file holds a single object keyed by [`Config::SESSION_KEY`].
#[derive(Debug, Clone)]
pub struct JsonFileSessionStore {
    path: PathBuf,
}

impl JsonFileSessionStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

}

#[async_trait]
impl SessionStore for JsonFileSessionStore {
    async fn get(&self) -> Result<VisitCache, StoreError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(VisitCache::new()),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(VisitCache::new());
        }
        let file: SessionFile = serde_json::from_str(&raw)?;
        Ok(file.cbgr)
    }

    async fn set(&self, cache: VisitCache) -> Result<(), StoreError> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        tokio::fs::create_dir_all(&parent).await?;

        let json = serde_json::to_string_pretty(&SessionFile { cbgr: cache })?;
        let path = self.path.clone();

        // Each write gets its own temp file, renamed over the session file
        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            let mut tmp = NamedTempFile::new_in(&parent)?;
            tmp.write_all(json.as_bytes())?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
    }
}
