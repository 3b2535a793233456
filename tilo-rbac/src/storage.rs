//! Key/value storage backends for the role store
//!
//! The role lives in two kinds of location: the role cookie (visible to the
//! edge checkpoint) and a persistent local store. Both are modelled as
//! [`KeyValueStorage`]; the cookie flavour is [`crate::cookie::CookieJar`].

use crate::error::RbacError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

type RbacResult<T> = std::result::Result<T, RbacError>;

/// A string key/value storage location
pub trait KeyValueStorage: Send + Sync {
    /// Read a key; a missing key is `Ok(None)`
    fn get(&self, key: &str) -> RbacResult<Option<String>>;

    /// Write a key
    fn set(&self, key: &str, value: &str) -> RbacResult<()>;

    /// Remove a key; removing a missing key is not an error
    fn remove(&self, key: &str) -> RbacResult<()>;
}

/// In-memory storage, the default persistent store for tests and demos
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no key is stored
    pub fn is_empty(&self) -> bool {
        self.entries
            .read()
            .map(|entries| entries.is_empty())
            .unwrap_or(true)
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> RbacResult<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| RbacError::Storage("memory storage lock poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> RbacResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| RbacError::Storage("memory storage lock poisoned".to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> RbacResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| RbacError::Storage("memory storage lock poisoned".to_string()))?;
        entries.remove(key);
        Ok(())
    }
}

/// Persistent storage backed by a JSON object on disk
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    // Serializes read-modify-write cycles on the file
    lock: Mutex<()>,
}

impl FileStorage {
    /// Open storage at `path`; the file is created on first write
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> RbacResult<HashMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(HashMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(RbacError::Storage(format!(
                "Failed to read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn save(&self, entries: &HashMap<String, String>) -> RbacResult<()> {
        let content = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, content).map_err(|e| {
            RbacError::Storage(format!("Failed to write {}: {}", self.path.display(), e))
        })
    }

    fn update<F>(&self, apply: F) -> RbacResult<()>
    where
        F: FnOnce(&mut HashMap<String, String>),
    {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| RbacError::Storage("file storage lock poisoned".to_string()))?;
        let mut entries = self.load()?;
        apply(&mut entries);
        self.save(&entries)
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> RbacResult<Option<String>> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| RbacError::Storage("file storage lock poisoned".to_string()))?;
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> RbacResult<()> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> RbacResult<()> {
        self.update(|entries| {
            entries.remove(key);
        })
    }
}

/// One client's partition of a shared storage backend.
///
/// Keys are stored as `<scope>:<key>` in the inner storage, so clients never
/// see or clear each other's entries.
pub struct ScopedStorage {
    inner: Arc<dyn KeyValueStorage>,
    scope: String,
}

impl ScopedStorage {
    pub fn new(inner: Arc<dyn KeyValueStorage>, scope: &str) -> Self {
        Self {
            inner,
            scope: scope.to_string(),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    fn scoped_key(&self, key: &str) -> String {
        format!("{}:{}", self.scope, key)
    }
}

impl KeyValueStorage for ScopedStorage {
    fn get(&self, key: &str) -> RbacResult<Option<String>> {
        self.inner.get(&self.scoped_key(key))
    }

    fn set(&self, key: &str, value: &str) -> RbacResult<()> {
        self.inner.set(&self.scoped_key(key), value)
    }

    fn remove(&self, key: &str) -> RbacResult<()> {
        self.inner.remove(&self.scoped_key(key))
    }
}
