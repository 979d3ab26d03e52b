use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::SessionStoreError;

/// Key/value persistence seam beneath the session store.
///
/// Implementations are synchronous by contract; callers treat reads and
/// writes as non-suspending operations.
pub trait StorageBackend: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, SessionStoreError>;
    fn write(&self, key: &str, value: &str) -> Result<(), SessionStoreError>;
    fn remove(&self, key: &str) -> Result<(), SessionStoreError>;
}

/// File-per-key storage rooted at a directory.
#[derive(Debug)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path holding the value for `key`.
    #[must_use]
    pub fn key_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

impl StorageBackend for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>, SessionStoreError> {
        let path = self.key_path(key);
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(source) if source.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(SessionStoreError::io("reading storage key", path, source)),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), SessionStoreError> {
        fs::create_dir_all(&self.root)
            .map_err(|source| SessionStoreError::io("creating storage root", &self.root, source))?;
        let path = self.key_path(key);
        fs::write(&path, value)
            .map_err(|source| SessionStoreError::io("writing storage key", path, source))
    }

    fn remove(&self, key: &str) -> Result<(), SessionStoreError> {
        let path = self.key_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SessionStoreError::io("removing storage key", path, source)),
        }
    }
}

/// In-memory storage for tests and ephemeral embeddings.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl StorageBackend for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>, SessionStoreError> {
        Ok(self.lock().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), SessionStoreError> {
        self.lock().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SessionStoreError> {
        self.lock().remove(key);
        Ok(())
    }
}
