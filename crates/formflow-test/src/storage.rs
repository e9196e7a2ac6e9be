//! Storage doubles for persistence tests.
//!
//! [`RecordingStorage`] behaves like session storage but keeps a log of
//! every operation so tests can count writes and inspect what was stored.
//! [`FailingStorage`] rejects everything, like a full or disabled store.
//!
//! ## Example
//!
//! ```
//! use formflow_storage::StorageBackend;
//! use formflow_test::storage::{RecordingStorage, StorageOp};
//!
//! let storage = RecordingStorage::new();
//! storage.set("formflow:signup", "{}").unwrap();
//!
//! storage.assert_write_count(1);
//! assert_eq!(storage.ops()[0], StorageOp::Set {
//!     key: "formflow:signup".into(),
//!     value: "{}".into(),
//! });
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;

use formflow_core::FormflowError;
use formflow_storage::{PersistedSnapshot, SessionStorage, StorageBackend};

/// One call made against a [`RecordingStorage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOp {
    /// A read of `key`.
    Get(String),
    /// A write of `value` under `key`.
    Set {
        /// The storage key.
        key: String,
        /// The stored text.
        value: String,
    },
    /// A removal of `key`.
    Remove(String),
}

/// An in-memory store that records every operation.
///
/// Clones share both the data and the log, so a test can keep one handle
/// while the form owns another.
#[derive(Debug, Clone, Default)]
pub struct RecordingStorage {
    inner: SessionStorage,
    log: Arc<Mutex<Vec<StorageOp>>>,
}

impl RecordingStorage {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every recorded operation in order.
    pub fn ops(&self) -> Vec<StorageOp> {
        self.log.lock().expect("RecordingStorage lock poisoned").clone()
    }

    /// Returns every `(key, value)` write in order.
    pub fn writes(&self) -> Vec<(String, String)> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                StorageOp::Set { key, value } => Some((key, value)),
                _ => None,
            })
            .collect()
    }

    /// Returns the number of writes.
    pub fn write_count(&self) -> usize {
        self.writes().len()
    }

    /// Returns the number of removals.
    pub fn remove_count(&self) -> usize {
        self.ops()
            .iter()
            .filter(|op| matches!(op, StorageOp::Remove(_)))
            .count()
    }

    /// Forgets the recorded operations, keeping the data.
    pub fn clear_log(&self) {
        self.log.lock().expect("RecordingStorage lock poisoned").clear();
    }

    /// Returns the raw text stored under `key` without recording a read.
    pub fn stored(&self, key: &str) -> Option<String> {
        self.inner.get(key).ok().flatten()
    }

    /// Stores raw text under `key` without recording a write.
    pub fn seed(&self, key: &str, value: &str) {
        let _ = self.inner.set(key, value);
    }

    /// Stores a snapshot under `key` without recording a write.
    pub fn seed_snapshot<V: serde::Serialize>(&self, key: &str, snapshot: &PersistedSnapshot<V>) {
        let encoded = serde_json::to_string(snapshot).expect("snapshot encodes");
        self.seed(key, &encoded);
    }

    /// Decodes the snapshot stored under `key`.
    pub fn snapshot<V: DeserializeOwned>(&self, key: &str) -> Option<PersistedSnapshot<V>> {
        self.stored(key)
            .and_then(|raw| serde_json::from_str(&raw).ok())
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Asserts that exactly `expected` writes happened.
    ///
    /// # Panics
    ///
    /// Panics if the count does not match.
    pub fn assert_write_count(&self, expected: usize) {
        let actual = self.write_count();
        assert_eq!(
            actual, expected,
            "Expected {expected} storage write(s), but {actual} happened: {:?}",
            self.writes()
        );
    }

    fn record(&self, op: StorageOp) {
        self.log
            .lock()
            .expect("RecordingStorage lock poisoned")
            .push(op);
    }
}

impl StorageBackend for RecordingStorage {
    fn get(&self, key: &str) -> Result<Option<String>, FormflowError> {
        self.record(StorageOp::Get(key.to_string()));
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), FormflowError> {
        self.record(StorageOp::Set {
            key: key.to_string(),
            value: value.to_string(),
        });
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), FormflowError> {
        self.record(StorageOp::Remove(key.to_string()));
        self.inner.remove(key)
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// A store whose every operation fails.
#[derive(Debug, Clone)]
pub struct FailingStorage {
    message: String,
    attempts: Arc<AtomicUsize>,
}

impl Default for FailingStorage {
    fn default() -> Self {
        Self::new("quota exceeded")
    }
}

impl FailingStorage {
    /// Creates a store that fails with `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns how many operations were attempted.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn fail<T>(&self) -> Result<T, FormflowError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(FormflowError::StorageError(self.message.clone()))
    }
}

impl StorageBackend for FailingStorage {
    fn get(&self, _key: &str) -> Result<Option<String>, FormflowError> {
        self.fail()
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), FormflowError> {
        self.fail()
    }

    fn remove(&self, _key: &str) -> Result<(), FormflowError> {
        self.fail()
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}
