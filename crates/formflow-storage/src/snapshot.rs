//! The persisted snapshot format.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A serialized copy of in-progress form state.
///
/// Generic over the values mapping so the storage layer does not depend on
/// the forms crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSnapshot<V> {
    /// The active step index when the snapshot was taken.
    pub step: usize,
    /// The form values.
    pub values: V,
    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,
}

impl<V> PersistedSnapshot<V> {
    /// Creates a snapshot stamped with the current time.
    pub fn new(step: usize, values: V) -> Self {
        Self::at(step, values, Utc::now())
    }

    /// Creates a snapshot with an explicit timestamp.
    pub const fn at(step: usize, values: V, timestamp: DateTime<Utc>) -> Self {
        Self {
            step,
            values,
            timestamp,
        }
    }

    /// Returns `true` if the snapshot is older than `max_age` at `now`.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        now.signed_duration_since(self.timestamp) > max_age
    }
}
