//! Storage collaborators for snapshot persistence.
//!
//! A [`StorageBackend`] is a synchronous key-value surface with string
//! values. The persistence adapter owns exactly one key per form instance;
//! backends do no cross-instance coordination.
//!
//! ## Backends
//!
//! - [`SessionStorage`] - In-process map; contents die with the value
//! - [`LocalStorage`] - One JSON file per key in a directory; survives restarts
//! - [`DisabledStorage`] - Stores nothing

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

use formflow_core::settings::{PersistenceSettings, StorageKind};
use formflow_core::FormflowError;

/// A synchronous key-value store used by the persistence adapter.
///
/// Implementations must be `Send + Sync` because debounced writes run on a
/// tokio task.
pub trait StorageBackend: Send + Sync + fmt::Debug {
    /// Reads the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>, FormflowError>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), FormflowError>;

    /// Removes `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), FormflowError>;

    /// A short name for log output.
    fn name(&self) -> &'static str;
}

/// Builds the backend selected by `settings`.
///
/// A disabled `persistence.enabled` flag wins over the backend kind.
pub fn storage_from_settings(settings: &PersistenceSettings) -> Arc<dyn StorageBackend> {
    if !settings.enabled {
        return Arc::new(DisabledStorage);
    }
    match settings.backend {
        StorageKind::Session => Arc::new(SessionStorage::new()),
        StorageKind::Local => Arc::new(LocalStorage::new(&settings.directory)),
        StorageKind::Disabled => Arc::new(DisabledStorage),
    }
}

// ---------------------------------------------------------------------------
// Session storage
// ---------------------------------------------------------------------------

/// A thread-safe, process-scoped key-value store.
///
/// Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct SessionStorage {
    store: Arc<RwLock<HashMap<String, String>>>,
}

impl SessionStorage {
    /// Creates a new empty session store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored keys.
    pub fn len(&self) -> usize {
        self.store.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StorageBackend for SessionStorage {
    fn get(&self, key: &str) -> Result<Option<String>, FormflowError> {
        let store = self.store.read().unwrap_or_else(PoisonError::into_inner);
        Ok(store.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), FormflowError> {
        let mut store = self.store.write().unwrap_or_else(PoisonError::into_inner);
        store.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), FormflowError> {
        let mut store = self.store.write().unwrap_or_else(PoisonError::into_inner);
        store.remove(key);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "session"
    }
}

// ---------------------------------------------------------------------------
// Local (file) storage
// ---------------------------------------------------------------------------

/// A file-backed store keeping each key in `{directory}/{key}.json`.
///
/// Keys are percent-encoded to form the file name, so distinct keys never
/// share a file. The directory is created on first write.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    directory: PathBuf,
}

impl LocalStorage {
    /// Creates a store rooted at `directory`.
    pub fn new(directory: impl AsRef<Path>) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
        }
    }

    /// Returns the directory holding the files.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn file_for(&self, key: &str) -> PathBuf {
        let file_name = utf8_percent_encode(key, NON_ALPHANUMERIC);
        self.directory.join(format!("{file_name}.json"))
    }
}

impl StorageBackend for LocalStorage {
    fn get(&self, key: &str) -> Result<Option<String>, FormflowError> {
        let path = self.file_for(key);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(FormflowError::StorageError(format!(
                "Failed to read '{}': {e}",
                path.display()
            ))),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), FormflowError> {
        std::fs::create_dir_all(&self.directory).map_err(|e| {
            FormflowError::StorageError(format!(
                "Failed to create storage directory '{}': {e}",
                self.directory.display()
            ))
        })?;
        let path = self.file_for(key);
        std::fs::write(&path, value.as_bytes()).map_err(|e| {
            FormflowError::StorageError(format!("Failed to write '{}': {e}", path.display()))
        })
    }

    fn remove(&self, key: &str) -> Result<(), FormflowError> {
        let path = self.file_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FormflowError::StorageError(format!(
                "Failed to remove '{}': {e}",
                path.display()
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

// ---------------------------------------------------------------------------
// Disabled storage
// ---------------------------------------------------------------------------

/// A backend that accepts writes and forgets them.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledStorage;

impl StorageBackend for DisabledStorage {
    fn get(&self, _key: &str) -> Result<Option<String>, FormflowError> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), FormflowError> {
        Ok(())
    }

    fn remove(&self, _key: &str) -> Result<(), FormflowError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_storage_set_get_remove() {
        let storage = SessionStorage::new();
        assert!(storage.is_empty());
        storage.set("k", "v1").unwrap();
        storage.set("k", "v2").unwrap();
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("v2"));
        assert_eq!(storage.len(), 1);
        storage.remove("k").unwrap();
        storage.remove("k").unwrap();
        assert_eq!(storage.get("k").unwrap(), None);
    }

    #[test]
    fn test_session_storage_clones_share_state() {
        let a = SessionStorage::new();
        let b = a.clone();
        a.set("shared", "yes").unwrap();
        assert_eq!(b.get("shared").unwrap().as_deref(), Some("yes"));
    }

    #[test]
    fn test_local_storage_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("nested"));
        assert_eq!(storage.get("formflow:signup").unwrap(), None);

        storage.set("formflow:signup", r#"{"step":1}"#).unwrap();
        assert_eq!(
            storage.get("formflow:signup").unwrap().as_deref(),
            Some(r#"{"step":1}"#)
        );
        assert!(dir.path().join("nested/formflow%3Asignup.json").exists());

        storage.remove("formflow:signup").unwrap();
        assert_eq!(storage.get("formflow:signup").unwrap(), None);
        storage.remove("formflow:signup").unwrap();
    }

    #[test]
    fn test_local_storage_keys_never_share_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        storage.set("formflow:a.b", "dotted").unwrap();
        storage.set("formflow:a_b", "underscored").unwrap();
        storage.set("formflow:a%2Eb", "literal").unwrap();

        assert_eq!(storage.get("formflow:a.b").unwrap().as_deref(), Some("dotted"));
        assert_eq!(storage.get("formflow:a_b").unwrap().as_deref(), Some("underscored"));
        assert_eq!(storage.get("formflow:a%2Eb").unwrap().as_deref(), Some("literal"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 3);
    }

    #[test]
    fn test_local_storage_survives_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        LocalStorage::new(dir.path()).set("k", "persisted").unwrap();
        let reopened = LocalStorage::new(dir.path());
        assert_eq!(reopened.get("k").unwrap().as_deref(), Some("persisted"));
    }

    #[test]
    fn test_local_storage_write_failure_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "not a directory").unwrap();
        let storage = LocalStorage::new(&blocker);
        let err = storage.set("k", "v").unwrap_err();
        assert_eq!(err.code(), "storage");
    }

    #[test]
    fn test_disabled_storage_forgets() {
        let storage = DisabledStorage;
        storage.set("k", "v").unwrap();
        assert_eq!(storage.get("k").unwrap(), None);
    }

    #[test]
    fn test_storage_from_settings() {
        let mut settings = PersistenceSettings::default();
        assert_eq!(storage_from_settings(&settings).name(), "session");

        settings.backend = StorageKind::Local;
        assert_eq!(storage_from_settings(&settings).name(), "local");

        settings.enabled = false;
        assert_eq!(storage_from_settings(&settings).name(), "disabled");
    }
}
