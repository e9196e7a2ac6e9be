//! Integration tests for the persistence adapter against counting and
//! failing backends.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use formflow_core::FormflowError;
use formflow_storage::{
    LocalStorage, PersistedSnapshot, PersistenceAdapter, SessionStorage, StorageBackend,
};

type Values = BTreeMap<String, String>;

fn values(pairs: &[(&str, &str)]) -> Values {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

/// Wraps a session store and counts writes.
#[derive(Debug, Default)]
struct CountingStorage {
    inner: SessionStorage,
    writes: AtomicUsize,
}

impl StorageBackend for CountingStorage {
    fn get(&self, key: &str) -> Result<Option<String>, FormflowError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), FormflowError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), FormflowError> {
        self.inner.remove(key)
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

/// Rejects every operation, like a full or blocked store.
#[derive(Debug)]
struct FullStorage;

impl StorageBackend for FullStorage {
    fn get(&self, _key: &str) -> Result<Option<String>, FormflowError> {
        Err(FormflowError::StorageError("quota exceeded".into()))
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), FormflowError> {
        Err(FormflowError::StorageError("quota exceeded".into()))
    }

    fn remove(&self, _key: &str) -> Result<(), FormflowError> {
        Err(FormflowError::StorageError("quota exceeded".into()))
    }

    fn name(&self) -> &'static str {
        "full"
    }
}

#[tokio::test(start_paused = true)]
async fn test_typing_burst_produces_one_write() {
    let storage = Arc::new(CountingStorage::default());
    let mut adapter: PersistenceAdapter<Values> =
        PersistenceAdapter::new(storage.clone(), "formflow:signup")
            .with_debounce(StdDuration::from_millis(500));

    let mut typed = String::new();
    for c in "jane@example.com".chars() {
        typed.push(c);
        adapter.schedule_save(PersistedSnapshot::new(0, values(&[("email", &typed)])));
        tokio::time::sleep(StdDuration::from_millis(50)).await;
    }
    assert_eq!(storage.writes.load(Ordering::SeqCst), 0);

    tokio::time::sleep(StdDuration::from_millis(600)).await;
    assert_eq!(storage.writes.load(Ordering::SeqCst), 1);
    let loaded = adapter.load().unwrap();
    assert_eq!(loaded.values["email"], "jane@example.com");
}

#[tokio::test(start_paused = true)]
async fn test_step_change_write_is_immediate() {
    let storage = Arc::new(CountingStorage::default());
    let mut adapter: PersistenceAdapter<Values> =
        PersistenceAdapter::new(storage.clone(), "formflow:signup");

    adapter.schedule_save(PersistedSnapshot::new(0, values(&[("name", "Jane")])));
    adapter.save(&PersistedSnapshot::new(1, values(&[("name", "Jane")])));
    assert_eq!(storage.writes.load(Ordering::SeqCst), 1);

    tokio::time::sleep(StdDuration::from_secs(1)).await;
    assert_eq!(storage.writes.load(Ordering::SeqCst), 1);
    assert_eq!(adapter.load().unwrap().step, 1);
}

#[test]
fn test_resume_after_restart_with_local_storage() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = PersistedSnapshot::new(2, values(&[("name", "Jane"), ("plan", "pro")]));

    {
        let mut adapter: PersistenceAdapter<Values> =
            PersistenceAdapter::new(Arc::new(LocalStorage::new(dir.path())), "formflow:signup");
        adapter.save(&snapshot);
    }

    let adapter: PersistenceAdapter<Values> =
        PersistenceAdapter::new(Arc::new(LocalStorage::new(dir.path())), "formflow:signup");
    assert_eq!(adapter.load(), Some(snapshot));
}

#[test]
fn test_day_old_snapshot_is_discarded_and_removed() {
    let storage = SessionStorage::new();
    let mut adapter: PersistenceAdapter<Values> =
        PersistenceAdapter::new(Arc::new(storage.clone()), "formflow:signup");

    let taken = Utc::now() - Duration::hours(25);
    adapter.save(&PersistedSnapshot::at(1, values(&[("name", "Jane")]), taken));

    assert!(adapter.load().is_none());
    assert!(storage.is_empty());
}

#[test]
fn test_other_instances_keys_are_untouched() {
    let storage = SessionStorage::new();
    let mut a: PersistenceAdapter<Values> =
        PersistenceAdapter::new(Arc::new(storage.clone()), "formflow:a");
    let b: PersistenceAdapter<Values> =
        PersistenceAdapter::new(Arc::new(storage.clone()), "formflow:b");

    a.save(&PersistedSnapshot::new(0, values(&[("x", "1")])));
    assert!(b.load().is_none());
    a.clear();
    assert!(storage.is_empty());
}

#[test]
fn test_failing_storage_is_swallowed() {
    let mut adapter: PersistenceAdapter<Values> =
        PersistenceAdapter::new(Arc::new(FullStorage), "formflow:signup");

    adapter.save(&PersistedSnapshot::new(0, values(&[("name", "Jane")])));
    adapter.schedule_save(PersistedSnapshot::new(0, values(&[("name", "Janet")])));
    assert!(adapter.load().is_none());
    adapter.clear();
}
