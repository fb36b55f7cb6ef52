//! Durable local marker store.
//!
//! Markers are single string keys that survive restarts on this device and
//! are never synchronised elsewhere. The reconciler uses them to remember
//! that a subject has already seen the VIP welcome.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use standing_common::{AppError, AppResult};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Key of the welcome-seen marker for a subject.
#[must_use]
pub fn welcome_seen_key(subject_id: &str) -> String {
    format!("welcome_seen:{subject_id}")
}

/// Keyed string store that outlives the process.
#[async_trait]
pub trait MarkerStore: Send + Sync {
    /// Read a marker.
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Write a marker.
    async fn set(&self, key: &str, value: &str) -> AppResult<()>;
}

/// Process-local marker store.
#[derive(Debug, Default)]
pub struct MemoryMarkerStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryMarkerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MarkerStore for MemoryMarkerStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> AppResult<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Marker store persisted as a single JSON object file.
///
/// The file is read on first use and rewritten on every `set`.
pub struct FileMarkerStore {
    path: PathBuf,
    cache: Mutex<Option<HashMap<String, String>>>,
}

impl FileMarkerStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(None),
        }
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> AppResult<HashMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(HashMap::new()),
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| {
                AppError::MarkerStore(format!(
                    "Corrupt marker file {}: {e}",
                    self.path.display()
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No marker file yet");
                Ok(HashMap::new())
            }
            Err(e) => Err(AppError::MarkerStore(format!(
                "Failed to read marker file: {e}"
            ))),
        }
    }

    async fn persist(&self, entries: &HashMap<String, String>) -> AppResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::MarkerStore(format!("Failed to create directory: {e}")))?;
        }

        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| AppError::MarkerStore(e.to_string()))?;

        // Write then rename so a crash never leaves a half-written file.
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| AppError::MarkerStore(format!("Failed to write marker file: {e}")))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| AppError::MarkerStore(format!("Failed to replace marker file: {e}")))
    }
}

#[async_trait]
impl MarkerStore for FileMarkerStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut cache = self.cache.lock().await;
        if cache.is_none() {
            *cache = Some(self.load().await?);
        }
        Ok(cache.as_ref().and_then(|entries| entries.get(key).cloned()))
    }

    async fn set(&self, key: &str, value: &str) -> AppResult<()> {
        let mut cache = self.cache.lock().await;
        let mut entries = match cache.take() {
            Some(entries) => entries,
            None => self.load().await?,
        };
        entries.insert(key.to_string(), value.to_string());

        let result = self.persist(&entries).await;
        // Keep the in-memory view even if the write failed.
        *cache = Some(entries);
        result
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_welcome_seen_key() {
        assert_eq!(welcome_seen_key("user1"), "welcome_seen:user1");
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryMarkerStore::new();
        assert!(store.get("k").await.unwrap().is_none());

        store.set("k", "true").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("true"));
    }

    #[tokio::test]
    async fn test_file_store_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("markers.json");

        let store = FileMarkerStore::new(&path);
        assert!(store.get("welcome_seen:user1").await.unwrap().is_none());
        store.set("welcome_seen:user1", "true").await.unwrap();

        let reopened = FileMarkerStore::new(&path);
        assert_eq!(
            reopened.get("welcome_seen:user1").await.unwrap().as_deref(),
            Some("true")
        );
        assert!(reopened.get("welcome_seen:user2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_keeps_existing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("markers.json");

        let store = FileMarkerStore::new(&path);
        store.set("a", "1").await.unwrap();
        store.set("b", "2").await.unwrap();

        let reopened = FileMarkerStore::new(&path);
        assert_eq!(reopened.get("a").await.unwrap().as_deref(), Some("1"));
        assert_eq!(reopened.get("b").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_file_store_corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("markers.json");
        tokio::fs::write(&path, "not json").await.unwrap();

        let store = FileMarkerStore::new(&path);
        assert!(matches!(
            store.get("a").await,
            Err(AppError::MarkerStore(_))
        ));
    }
}
