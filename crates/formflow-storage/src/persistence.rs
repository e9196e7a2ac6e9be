//! The snapshot persistence adapter.
//!
//! [`PersistenceAdapter`] is a scoped, best-effort cache of in-progress form
//! state. It never fails outward: storage and (de)serialization errors are
//! logged with `tracing` and swallowed, so a form keeps working when storage
//! is full or disabled.
//!
//! Writes come in two flavours:
//! - [`save`](PersistenceAdapter::save) writes immediately (used on step
//!   changes) and cancels any pending debounced write;
//! - [`schedule_save`](PersistenceAdapter::schedule_save) debounces (used on
//!   field changes). Only the most recent snapshot of a burst is written.
//!
//! A debounced write carries the generation it was scheduled in and only
//! writes, under the pending lock, if no later `save`, `flush`, `clear`, or
//! `cancel_pending` has bumped the generation. A write already running when
//! one of those is called completes before it, so it can never land after a
//! newer snapshot or after a removal.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use formflow_core::settings::PersistenceSettings;

use crate::backends::{storage_from_settings, DisabledStorage, StorageBackend};
use crate::debounce::Debouncer;
use crate::snapshot::PersistedSnapshot;

/// Default snapshot lifetime.
pub const DEFAULT_MAX_AGE_HOURS: i64 = 24;

/// Upper bound on a configured lifetime (about a century).
const MAX_AGE_CAP_HOURS: i64 = 24 * 365 * 100;

/// Default debounce delay for field-change writes.
pub const DEFAULT_DEBOUNCE: StdDuration = StdDuration::from_millis(500);

#[derive(Debug)]
struct Pending<V> {
    generation: u64,
    snapshot: Option<PersistedSnapshot<V>>,
}

impl<V> Pending<V> {
    const fn empty() -> Self {
        Self {
            generation: 0,
            snapshot: None,
        }
    }

    /// Makes every scheduled write stale and returns the waiting snapshot.
    fn invalidate(&mut self) -> Option<PersistedSnapshot<V>> {
        self.generation = self.generation.wrapping_add(1);
        self.snapshot.take()
    }
}

type PendingSlot<V> = Arc<Mutex<Pending<V>>>;

fn lock<V>(slot: &Mutex<Pending<V>>) -> MutexGuard<'_, Pending<V>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Saves, loads, and clears one form instance's snapshot under one key.
#[derive(Debug)]
pub struct PersistenceAdapter<V> {
    backend: Arc<dyn StorageBackend>,
    key: String,
    max_age: Duration,
    pending: PendingSlot<V>,
    timer: Debouncer,
}

impl<V> PersistenceAdapter<V>
where
    V: Serialize + DeserializeOwned + Send + 'static,
{
    /// Creates an adapter writing to `key` on `backend` with the default
    /// 24-hour lifetime and 500 ms debounce.
    pub fn new(backend: Arc<dyn StorageBackend>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
            max_age: Duration::hours(DEFAULT_MAX_AGE_HOURS),
            pending: Arc::new(Mutex::new(Pending::empty())),
            timer: Debouncer::new(DEFAULT_DEBOUNCE),
        }
    }

    /// Creates an adapter from settings: backend kind, key prefix, lifetime,
    /// and debounce delay.
    pub fn from_settings(settings: &PersistenceSettings, form_id: &str) -> Self {
        Self::with_backend(storage_from_settings(settings), settings, form_id)
    }

    /// Like [`from_settings`](Self::from_settings) but with a caller-supplied
    /// backend. A disabled `enabled` flag still wins.
    pub fn with_backend(
        backend: Arc<dyn StorageBackend>,
        settings: &PersistenceSettings,
        form_id: &str,
    ) -> Self {
        let backend: Arc<dyn StorageBackend> = if settings.enabled {
            backend
        } else {
            Arc::new(DisabledStorage)
        };
        Self::new(backend, settings.key_for(form_id))
            .with_max_age(Duration::hours(
                i64::try_from(settings.max_age_hours)
                    .unwrap_or(MAX_AGE_CAP_HOURS)
                    .min(MAX_AGE_CAP_HOURS),
            ))
            .with_debounce(StdDuration::from_millis(settings.debounce_ms))
    }

    /// Sets how long a snapshot stays valid.
    #[must_use]
    pub const fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Sets the debounce delay for [`schedule_save`](Self::schedule_save).
    #[must_use]
    pub fn with_debounce(mut self, delay: StdDuration) -> Self {
        self.timer.cancel();
        self.timer = Debouncer::new(delay);
        self
    }

    /// Returns the storage key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the backend.
    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    /// Returns `true` while a debounced write is waiting.
    pub fn has_pending(&self) -> bool {
        self.timer.is_pending()
    }

    /// Writes `snapshot` now, discarding any pending debounced write.
    pub fn save(&mut self, snapshot: &PersistedSnapshot<V>) {
        self.timer.cancel();
        let mut pending = lock(&self.pending);
        pending.invalidate();
        write_snapshot(self.backend.as_ref(), &self.key, snapshot);
    }

    /// Schedules `snapshot` to be written after the debounce delay.
    ///
    /// A later call replaces both the snapshot and the timer, so a burst of
    /// changes produces exactly one write holding the last snapshot. Outside
    /// a tokio runtime the write happens immediately.
    pub fn schedule_save(&mut self, snapshot: PersistedSnapshot<V>) {
        let generation = {
            let mut pending = lock(&self.pending);
            pending.invalidate();
            pending.snapshot = Some(snapshot);
            pending.generation
        };

        let slot = Arc::clone(&self.pending);
        let backend = Arc::clone(&self.backend);
        let key = self.key.clone();
        let scheduled = self.timer.schedule(async move {
            let mut pending = lock(&slot);
            if pending.generation != generation {
                return;
            }
            if let Some(snapshot) = pending.snapshot.take() {
                write_snapshot(backend.as_ref(), &key, &snapshot);
            }
        });

        if !scheduled {
            tracing::debug!(key = %self.key, "no async runtime, writing snapshot immediately");
            self.flush();
        }
    }

    /// Writes the pending debounced snapshot now. Returns `true` if there
    /// was one.
    pub fn flush(&mut self) -> bool {
        self.timer.cancel();
        let mut pending = lock(&self.pending);
        pending.invalidate().map_or(false, |snapshot| {
            write_snapshot(self.backend.as_ref(), &self.key, &snapshot);
            true
        })
    }

    /// Drops the pending debounced snapshot without writing it.
    pub fn cancel_pending(&mut self) {
        self.timer.cancel();
        lock(&self.pending).invalidate();
    }

    /// Reads the stored snapshot if it is fresh.
    pub fn load(&self) -> Option<PersistedSnapshot<V>> {
        self.load_at(Utc::now())
    }

    /// Reads the stored snapshot as of `now`.
    ///
    /// Stale or undecodable entries are removed and `None` is returned.
    pub fn load_at(&self, now: DateTime<Utc>) -> Option<PersistedSnapshot<V>> {
        let raw = match self.backend.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key = %self.key, backend = self.backend.name(), error = %e, "failed to read snapshot");
                return None;
            }
        };

        let snapshot: PersistedSnapshot<V> = match serde_json::from_str(&raw) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "discarding undecodable snapshot");
                self.remove_entry();
                return None;
            }
        };

        if snapshot.is_stale(now, self.max_age) {
            tracing::debug!(key = %self.key, taken_at = %snapshot.timestamp, "discarding stale snapshot");
            self.remove_entry();
            return None;
        }

        Some(snapshot)
    }

    /// Removes the stored snapshot and any pending write.
    pub fn clear(&mut self) {
        self.timer.cancel();
        let mut pending = lock(&self.pending);
        pending.invalidate();
        self.remove_entry();
    }

    fn remove_entry(&self) {
        if let Err(e) = self.backend.remove(&self.key) {
            tracing::warn!(key = %self.key, backend = self.backend.name(), error = %e, "failed to remove snapshot");
        }
    }
}

fn write_snapshot<V: Serialize>(
    backend: &dyn StorageBackend,
    key: &str,
    snapshot: &PersistedSnapshot<V>,
) {
    let encoded = match serde_json::to_string(snapshot) {
        Ok(encoded) => encoded,
        Err(e) => {
            tracing::warn!(key, error = %e, "failed to encode snapshot");
            return;
        }
    };
    match backend.set(key, &encoded) {
        Ok(()) => tracing::trace!(key, step = snapshot.step, "snapshot written"),
        Err(e) => {
            tracing::warn!(key, backend = backend.name(), error = %e, "failed to write snapshot");
        }
    }
}
