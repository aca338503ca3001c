//! Durable key-value persistence.
//!
//! Async, namespaced string keys with JSON values, mirroring the extension
//! storage area: point reads, writes, bulk read-all and bulk delete.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::StorageError;

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Write `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;

    /// Delete every listed key. Absent keys are ignored.
    async fn remove(&self, keys: &[String]) -> Result<(), StorageError>;

    async fn get_all(&self) -> Result<HashMap<String, Value>, StorageError>;
}

/// Process-local store, used by tests and as a no-disk fallback.
#[derive(Default)]
pub struct MemoryStore {
    items: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.items.lock().contains_key(key)
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.items.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.items.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, keys: &[String]) -> Result<(), StorageError> {
        let mut items = self.items.lock();
        for key in keys {
            items.remove(key);
        }
        Ok(())
    }

    async fn get_all(&self) -> Result<HashMap<String, Value>, StorageError> {
        Ok(self.items.lock().clone())
    }
}

/// Whole-file JSON snapshot store. Every mutation rewrites the file through a
/// temporary sibling and a rename.
pub struct JsonFileStore {
    path: PathBuf,
    items: tokio::sync::Mutex<HashMap<String, Value>>,
}

impl JsonFileStore {
    /// Open (or lazily create) the store at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let items = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => HashMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        log::debug!("Opened store {} ({} keys)", path.display(), items.len());
        Ok(Self {
            path,
            items: tokio::sync::Mutex::new(items),
        })
    }

    async fn persist(&self, items: &HashMap<String, Value>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let bytes = serde_json::to_vec(items)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl KvStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.items.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let mut items = self.items.lock().await;
        items.insert(key.to_string(), value);
        self.persist(&items).await
    }

    async fn remove(&self, keys: &[String]) -> Result<(), StorageError> {
        let mut items = self.items.lock().await;
        let before = items.len();
        for key in keys {
            items.remove(key);
        }
        if items.len() == before {
            return Ok(());
        }
        self.persist(&items).await
    }

    async fn get_all(&self) -> Result<HashMap<String, Value>, StorageError> {
        Ok(self.items.lock().await.clone())
    }
}

/// Open the file store at `path`, or fall back to a process-local store when
/// the file cannot be read. Summaries still flow; they are just not kept.
pub async fn open_or_memory(path: impl AsRef<Path>) -> Arc<dyn KvStore> {
    let path = path.as_ref();
    match JsonFileStore::open(path).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            log::error!(
                "Cache store {} unusable, continuing without persistence: {}",
                path.display(),
                e
            );
            Arc::new(MemoryStore::new())
        }
    }
}
