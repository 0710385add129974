//! Durable key-value storage on the device.
//!
//! Holds the dog profile and the local member list across restarts.
//! [`FileStore`] keeps every key in one JSON object on disk and rewrites it
//! atomically on each change; [`MemoryStore`] is the volatile variant.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use crate::error::TailTalkError;

/// Key under which the dog profile is stored.
pub const PROFILE_KEY: &str = "tailtalk_dog";

/// Key under which the member list is stored.
pub const USERS_KEY: &str = "tailtalk_users";

/// Simple string key-value storage.
#[async_trait]
pub trait LocalStore: Send + Sync + fmt::Debug {
    /// Returns the value for `key`, if set.
    async fn get(&self, key: &str) -> Result<Option<String>, TailTalkError>;

    /// Sets `key` to `value`.
    async fn set(&self, key: &str, value: String) -> Result<(), TailTalkError>;

    /// Removes `key`. Removing a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), TailTalkError>;
}

/// Reads and deserializes a JSON value.
///
/// # Errors
///
/// Returns [`TailTalkError::Storage`] if the store fails or the stored
/// value is not valid JSON for `T`.
pub async fn load_json<T: DeserializeOwned>(
    store: &dyn LocalStore,
    key: &str,
) -> Result<Option<T>, TailTalkError> {
    match store.get(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Serializes and writes a JSON value.
///
/// # Errors
///
/// Returns [`TailTalkError::Storage`] if serialization or the store fails.
pub async fn save_json<T: Serialize + Sync>(
    store: &dyn LocalStore,
    key: &str,
    value: &T,
) -> Result<(), TailTalkError> {
    store.set(key, serde_json::to_string(value)?).await
}

/// Key-value store backed by a single JSON file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    /// Creates a store at `path`. The file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<BTreeMap<String, String>, TailTalkError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(TailTalkError::Storage(e.to_string())),
        }
    }

    async fn write_all(&self, map: &BTreeMap<String, String>) -> Result<(), TailTalkError> {
        let bytes = serde_json::to_vec_pretty(map)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| TailTalkError::Storage(e.to_string()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| TailTalkError::Storage(e.to_string()))
    }
}

#[async_trait]
impl LocalStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, TailTalkError> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await?.remove(key))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), TailTalkError> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_all().await?;
        map.insert(key.to_string(), value);
        self.write_all(&map).await
    }

    async fn delete(&self, key: &str) -> Result<(), TailTalkError> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_all().await?;
        if map.remove(key).is_some() {
            self.write_all(&map).await?;
        }
        Ok(())
    }
}

/// Volatile key-value store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, TailTalkError> {
        Ok(self.map.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), TailTalkError> {
        self.map.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), TailTalkError> {
        self.map.lock().await.remove(key);
        Ok(())
    }
}
