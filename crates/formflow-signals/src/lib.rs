//! # formflow-signals
//!
//! Signal dispatcher for formflow. Lets outside code observe a form's
//! lifecycle (value changes, blurs, step changes, submissions) without the
//! engine knowing who is listening.
//!
//! Signals are owned by a form instance through [`FormSignals`]; there is no
//! process-global registry, so two forms never see each other's events.
//!
//! ## Usage
//!
//! ```
//! use formflow_signals::{Signal, StepChanged};
//! use std::sync::Arc;
//!
//! let signal: Signal<StepChanged> = Signal::new();
//!
//! signal.connect("progress_bar", Arc::new(|event: &StepChanged| {
//!     println!("moved from {} to {}", event.from, event.to);
//! }));
//!
//! let notified = signal.send(&StepChanged { from: 0, to: 1 });
//! assert_eq!(notified, 1);
//! ```

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;

/// The type signature for a signal receiver callback.
///
/// Receivers must be `Send + Sync` so a form can be moved across tasks.
pub type SignalReceiver<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A signal that can be connected to and dispatched.
///
/// Each signal carries a payload type `T`. Receivers are called in the order
/// they were connected.
pub struct Signal<T: 'static> {
    receivers: RwLock<Vec<(String, SignalReceiver<T>)>>,
}

impl<T: 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("receivers", &self.receiver_count())
            .finish()
    }
}

impl<T: 'static> Signal<T> {
    /// Creates a new signal with no connected receivers.
    pub const fn new() -> Self {
        Self {
            receivers: RwLock::new(Vec::new()),
        }
    }

    /// Connects a receiver to this signal.
    ///
    /// If a receiver with the same ID is already connected, it is replaced
    /// in place (keeping its position in the call order).
    pub fn connect(&self, receiver_id: impl Into<String>, callback: SignalReceiver<T>) {
        let id = receiver_id.into();
        let mut receivers = self
            .receivers
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(entry) = receivers.iter_mut().find(|(rid, _)| *rid == id) {
            entry.1 = callback;
        } else {
            receivers.push((id, callback));
        }
    }

    /// Disconnects the receiver with the given ID.
    ///
    /// Returns `true` if a receiver was found and removed.
    pub fn disconnect(&self, receiver_id: &str) -> bool {
        let mut receivers = self
            .receivers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let len_before = receivers.len();
        receivers.retain(|(id, _)| id != receiver_id);
        receivers.len() < len_before
    }

    /// Sends the signal to all connected receivers, in connection order.
    ///
    /// Returns the number of receivers notified.
    pub fn send(&self, payload: &T) -> usize {
        // Snapshot the list so a receiver may connect/disconnect re-entrantly.
        let receivers: Vec<SignalReceiver<T>> = self
            .receivers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in &receivers {
            callback(payload);
        }
        receivers.len()
    }

    /// Returns the number of connected receivers.
    pub fn receiver_count(&self) -> usize {
        self.receivers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

// ── Form lifecycle payloads ──────────────────────────────────────────

/// A field value was set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueChanged {
    /// The field id.
    pub field: String,
    /// The new value, JSON-encoded.
    pub value: serde_json::Value,
}

/// A field lost focus and was validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldBlurred {
    /// The field id.
    pub field: String,
    /// The error computed for the field, if any.
    pub error: Option<String>,
}

/// The active step changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepChanged {
    /// The previous step index.
    pub from: usize,
    /// The new step index.
    pub to: usize,
}

/// The submit collaborator accepted the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submitted {
    /// The form id.
    pub form_id: String,
}

/// The submit collaborator rejected the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitFailed {
    /// The form id.
    pub form_id: String,
    /// The failure message surfaced to the user.
    pub message: String,
}

/// The set of signals owned by one form instance.
#[derive(Debug, Default)]
pub struct FormSignals {
    /// Fired after every `set_value`.
    pub value_changed: Signal<ValueChanged>,
    /// Fired after a blur has been validated.
    pub field_blurred: Signal<FieldBlurred>,
    /// Fired after the active step index changed.
    pub step_changed: Signal<StepChanged>,
    /// Fired after a successful submission.
    pub submitted: Signal<Submitted>,
    /// Fired after a failed submission.
    pub submit_failed: Signal<SubmitFailed>,
}

impl FormSignals {
    /// Creates a signal set with no receivers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Disconnects `receiver_id` from every signal in the set.
    ///
    /// Returns how many signals it was connected to.
    pub fn disconnect_all(&self, receiver_id: &str) -> usize {
        [
            self.value_changed.disconnect(receiver_id),
            self.field_blurred.disconnect(receiver_id),
            self.step_changed.disconnect(receiver_id),
            self.submitted.disconnect(receiver_id),
            self.submit_failed.disconnect(receiver_id),
        ]
        .into_iter()
        .filter(|removed| *removed)
        .count()
    }
}
