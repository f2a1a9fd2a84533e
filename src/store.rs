//! Token persistence backends.

use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::traits::{StoreError, TokenStore};

/// Durable key holding the access token.
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Durable key holding the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// In-process store. Nothing survives a restart; intended for tests and
/// hosts that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Synchronous read for inspection.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.entries.read().clone()
    }
}

impl TokenStore for MemoryTokenStore {
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.write().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        let mut entries = self.entries.write();
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }
}

/// Store backed by a single JSON document on disk.
///
/// Writes go to a sibling temp file that is renamed over the document, so a
/// crash mid-write leaves the previous contents intact.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl FileTokenStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(entries)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        tracing::debug!(path = %self.path.display(), keys = entries.len(), "Token file written");
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        entries.insert(key.to_owned(), value.to_owned());
        self.write_all(&entries).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await?.remove(key))
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        let before = entries.len();
        for key in keys {
            entries.remove(*key);
        }
        if entries.len() == before {
            return Ok(());
        }
        self.write_all(&entries).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_set_get_remove() {
        let store = MemoryTokenStore::new();
        store.set(ACCESS_TOKEN_KEY, "a1").await.unwrap();
        store.set(REFRESH_TOKEN_KEY, "r1").await.unwrap();
        assert_eq!(store.get(ACCESS_TOKEN_KEY).await.unwrap().as_deref(), Some("a1"));

        store
            .remove(&[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, "unknown"])
            .await
            .unwrap();
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tokens.json");

        let store = FileTokenStore::new(&path);
        assert_eq!(store.get(ACCESS_TOKEN_KEY).await.unwrap(), None);
        store.set(ACCESS_TOKEN_KEY, "a1").await.unwrap();
        store.set(REFRESH_TOKEN_KEY, "r1").await.unwrap();
        drop(store);

        let reopened = FileTokenStore::new(&path);
        assert_eq!(reopened.get(ACCESS_TOKEN_KEY).await.unwrap().as_deref(), Some("a1"));
        assert_eq!(reopened.get(REFRESH_TOKEN_KEY).await.unwrap().as_deref(), Some("r1"));
        assert!(!path.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn test_file_store_remove_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("tokens.json"));
        store.set(ACCESS_TOKEN_KEY, "a1").await.unwrap();
        store.set("locale", "fr").await.unwrap();

        store.remove(&[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY]).await.unwrap();
        assert_eq!(store.get(ACCESS_TOKEN_KEY).await.unwrap(), None);
        assert_eq!(store.get("locale").await.unwrap().as_deref(), Some("fr"));
    }

    #[tokio::test]
    async fn test_file_store_rejects_corrupt_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let store = FileTokenStore::new(&path);
        assert!(store.get(ACCESS_TOKEN_KEY).await.is_err());
    }
}
