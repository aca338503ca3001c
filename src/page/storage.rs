//! Page-local synchronous string storage (the `localStorage` of a page).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::StorageError;

pub trait LocalStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: &str);
    fn remove_item(&self, key: &str);
}

#[derive(Default)]
pub struct MemoryLocalStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryLocalStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStorage for MemoryLocalStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.lock().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) {
        self.items.lock().insert(key.to_string(), value.to_string());
    }

    fn remove_item(&self, key: &str) {
        self.items.lock().remove(key);
    }
}

/// JSON-file backed storage. Write failures are logged; the in-memory view
/// stays authoritative for the rest of the session.
pub struct FileLocalStorage {
    path: PathBuf,
    items: Mutex<HashMap<String, String>>,
}

impl FileLocalStorage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let items = match std::fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => HashMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            items: Mutex::new(items),
        })
    }

    fn persist(&self, items: &HashMap<String, String>) {
        let result = (|| -> Result<(), StorageError> {
            if let Some(parent) = self.path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(&self.path, serde_json::to_vec_pretty(items)?)?;
            Ok(())
        })();
        if let Err(e) = result {
            log::error!("Could not save {}: {}", self.path.display(), e);
        }
    }
}

impl LocalStorage for FileLocalStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.lock().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) {
        let mut items = self.items.lock();
        items.insert(key.to_string(), value.to_string());
        self.persist(&items);
    }

    fn remove_item(&self, key: &str) {
        let mut items = self.items.lock();
        if items.remove(key).is_some() {
            self.persist(&items);
        }
    }
}

/// Open the file-backed storage at `path`, or an empty in-memory one when the
/// file cannot be read, so every override reads as absent.
pub fn open_or_memory(path: impl AsRef<Path>) -> Arc<dyn LocalStorage> {
    let path = path.as_ref();
    match FileLocalStorage::open(path) {
        Ok(storage) => Arc::new(storage),
        Err(e) => {
            log::error!("Override storage {} unusable, ignoring overrides: {}", path.display(), e);
            Arc::new(MemoryLocalStorage::new())
        }
    }
}
